//! Execution Dispatcher
//!
//! Given an expanded command, decides how to run it: builtin, function,
//! or external; forked or in place. Handles the `exec` and `builtin`
//! prefixes, applies the redirection queue on the child side, reaps the
//! child on the parent side, and keeps the command-path cache honest
//! when an external command fails.

use std::ffi::CString;

use nix::sys::termios::{tcgetattr, tcsetattr, SetArg, Termios};
use nix::unistd::{fork, ForkResult};

use crate::ast::{Node, RedirOp};
use crate::interpreter::builtins;
use crate::interpreter::errors::{sigchk, Result, ShellError};
use crate::interpreter::exec::{rc_execve, Argv};
use crate::interpreter::expansion::expand_words;
use crate::interpreter::redirect;
use crate::interpreter::status::{print_status, Status};
use crate::interpreter::types::ShellState;
use crate::interpreter::walk;
use crate::signals;
use crate::syscalls::{rc_waitpid, SlowCall};
use crate::which::{is_qualified, printable, verify_cmd, which};

enum Resolution {
    /// No command word at all (bare redirection, or a lone prefix).
    Nothing,
    Function(String, Node),
    Builtin(builtins::BuiltinFn),
    External,
}

/// Run one simple command. `parent` is false when we are already in a
/// disposable process (a pipeline member, a backgrounded child) and may
/// exec in place.
pub fn exec_simple(
    shell: &mut ShellState,
    words: &[Node],
    redir_ops: &[&RedirOp],
    mut parent: bool,
) -> Result<()> {
    let mut argv = expand_words(shell, words)?;
    let redirs = redirect::expand_redirs(shell, redir_ops)?;
    if shell.flags.xtrace && !argv.is_empty() {
        eprintln!("{}", argv.join(" "));
    }

    // Prefix unwinding. `exec` forces in-place execution; `builtin` makes
    // exactly one following resolution skip the function table, and it
    // does not stack.
    let mut saw_exec = false;
    let mut skip_fn = false;
    let resolution = loop {
        let first = argv.first().cloned();
        match first.as_deref() {
            None => break Resolution::Nothing,
            Some(name) if is_qualified(name) => break Resolution::External,
            Some("exec") => {
                argv.remove(0);
                saw_exec = true;
                parent = false;
            }
            Some("builtin") => {
                if skip_fn {
                    eprintln!("rc: builtin: cannot be nested");
                    return shell.set_status(Status::Done(1));
                }
                argv.remove(0);
                skip_fn = true;
            }
            Some(name) => {
                if !skip_fn {
                    if let Some(body) = shell.funcs.get(name) {
                        break Resolution::Function(name.to_string(), body.clone());
                    }
                }
                skip_fn = false;
                match builtins::lookup(name) {
                    Some(f) => break Resolution::Builtin(f),
                    None => break Resolution::External,
                }
            }
        }
    };

    // Null exec: `exec >foo` leaves the shell alive with its own fds
    // rewired. An empty command with no redirections is a no-op.
    if matches!(resolution, Resolution::Nothing) {
        if saw_exec {
            return redirect::apply(&redirs, shell.flags.noclobber);
        }
        if redirs.is_empty() {
            return Ok(());
        }
    } else if saw_exec {
        // A real exec: there is no shell to return errors to anymore.
        shell.doomed = true;
    }

    // External resolution and environment build.
    let mut external: Option<(String, CString)> = None;
    let mut envp: Vec<CString> = Vec::new();
    if matches!(resolution, Resolution::External) {
        match which(
            argv.first().map(|s| s.as_str()),
            true,
            &shell.vars,
            &mut shell.path_cache,
        ) {
            None => {
                shell.status.set(Status::Done(1));
                if parent {
                    return shell.check_errexit();
                }
                std::process::exit(1);
            }
            Some(path) => {
                let env = shell.environ.make_env(&mut shell.vars, &mut shell.funcs);
                envp = env
                    .iter()
                    .filter_map(|s| CString::new(s.as_str()).ok())
                    .collect();
                let cpath = CString::new(path.as_str())
                    .map_err(|_| ShellError::Fatal(format!("bad path `{}'", printable(&path))))?;
                external = Some((path, cpath));
            }
        }
    }

    // Fork iff there is a parent to come back to and the command either
    // execs or rewires fds.
    let is_external = external.is_some();
    let must_fork = parent && (is_external || !redirs.is_empty());

    if !must_fork {
        if !redirs.is_empty() {
            redirect::apply(&redirs, shell.flags.noclobber)?;
        }
        return match resolution {
            Resolution::External => {
                let (path, cpath) = external.unwrap();
                exec_in_place(&argv, &cpath, &envp, &path)
            }
            Resolution::Builtin(f) => f(shell, &argv[1..]),
            Resolution::Function(name, body) => {
                walk::call_function(shell, &name, body, &argv[1..])
            }
            Resolution::Nothing => Ok(()),
        };
    }

    let tty = save_tty(shell);
    match unsafe { fork() } {
        Err(errno) => Err(ShellError::sys("fork", errno)),
        Ok(ForkResult::Child) => {
            signals::restore_defaults();
            if let Err(err) = redirect::apply(&redirs, shell.flags.noclobber) {
                eprintln!("rc: {}", err);
                std::process::exit(1);
            }
            match resolution {
                Resolution::External => {
                    let (path, cpath) = external.unwrap();
                    exec_in_place(&argv, &cpath, &envp, &path)
                }
                Resolution::Builtin(f) => {
                    let result = f(shell, &argv[1..]);
                    child_exit(shell, result)
                }
                Resolution::Function(name, body) => {
                    let result = walk::call_function(shell, &name, body, &argv[1..]);
                    child_exit(shell, result)
                }
                Resolution::Nothing => child_exit(shell, Ok(())),
            }
        }
        Ok(ForkResult::Parent { child }) => {
            // The queue dies with this scope; the child applied it.
            drop(redirs);
            let st = reap_child(shell, child.as_raw(), tty)?;
            shell.status.set(st);
            sigchk()?;
            if let Some((path, _)) = &external {
                if !shell.status.istrue() {
                    verify_cmd(&argv[0], path, &mut shell.path_cache);
                }
            }
            shell.check_errexit()
        }
    }
}

/// execve with the `#!` fallback; only comes back on failure, and then
/// the process is done for.
fn exec_in_place(argv: &[String], path: &CString, envp: &[CString], display_path: &str) -> ! {
    let mut av = Argv::new(argv, false);
    let err = rc_execve(path, &mut av, envp);
    eprintln!("rc: {}: {}", printable(display_path), err.desc());
    std::process::exit(1);
}

/// Snapshot terminal attributes before forking in an interactive shell,
/// so they can be put back if the child dies by signal mid-edit.
pub(crate) fn save_tty(shell: &ShellState) -> Option<Termios> {
    if shell.flags.interactive {
        tcgetattr(std::io::stdin()).ok()
    } else {
        None
    }
}

/// Wait for one specific child and translate the result. Restores the
/// saved terminal attributes after a signalled child, and suppresses the
/// next interactive newline when the child swallowed the user's ^C and
/// exited normally.
pub(crate) fn reap_child(
    shell: &mut ShellState,
    pid: i32,
    tty: Option<Termios>,
) -> Result<Status> {
    match rc_waitpid(pid) {
        SlowCall::Completed((_, raw)) => {
            let st = Status::from_raw(raw);
            if matches!(st, Status::Signaled { .. }) {
                if let Some(tty) = &tty {
                    let _ = tcsetattr(std::io::stdin(), SetArg::TCSANOW, tty);
                }
            }
            if matches!(st, Status::Done(_)) && signals::pending() == Some(libc::SIGINT) {
                signals::suppress_newline();
            }
            print_status(&st, false, shell.flags.interactive);
            Ok(st)
        }
        SlowCall::Interrupted => {
            shell.status.set(Status::Signaled { sig: libc::SIGINT, core: false });
            sigchk()?;
            Err(ShellError::Interrupted(libc::SIGINT))
        }
        SlowCall::Failed(errno) => Err(ShellError::sys("wait", errno)),
    }
}

/// Turn a child's walk result into its exit code. Never returns.
pub(crate) fn child_exit(shell: &mut ShellState, result: Result<()>) -> ! {
    let code = match result {
        Ok(()) => shell.status.get(),
        Err(ShellError::Exit(code)) => code,
        Err(err) => {
            if !err.is_control_flow() {
                eprintln!("rc: {}", err);
            }
            1
        }
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::ShellFlags;
    use crate::parser::parse;

    fn fresh() -> ShellState {
        ShellState::new(ShellFlags::default(), "rc", &[], &[])
    }

    fn simple_words(src: &str) -> Vec<Node> {
        match parse(src).unwrap().pop().unwrap() {
            Node::Simple(words) => words,
            other => panic!("expected simple, got {:?}", other),
        }
    }

    #[test]
    fn test_builtin_runs_in_place() {
        let _guard = crate::signals::test_support::exclusive();
        let mut shell = fresh();
        let words = simple_words("cd /");
        let before = std::env::current_dir().unwrap();
        exec_simple(&mut shell, &words, &[], true).unwrap();
        assert!(shell.istrue());
        let _ = std::env::set_current_dir(before);
    }

    #[test]
    fn test_missing_command_sets_false_status() {
        let mut shell = fresh();
        shell.assign("path", vec!["/nonexistent".to_string()], false);
        let words = simple_words("no-such-command-here");
        exec_simple(&mut shell, &words, &[], true).unwrap();
        assert!(!shell.istrue());
    }

    #[test]
    fn test_builtin_prefix_skips_functions() {
        let _guard = crate::signals::test_support::exclusive();
        let mut shell = fresh();
        // A function shadowing cd would loop forever if `builtin` did not
        // bypass it; resolution must reach the real builtin.
        let body = parse("{builtin cd /}").unwrap().pop().unwrap();
        shell.funcs.define("cd", body);
        let before = std::env::current_dir().unwrap();
        let words = simple_words("cd /");
        exec_simple(&mut shell, &words, &[], true).unwrap();
        assert!(shell.istrue());
        let _ = std::env::set_current_dir(before);
    }

    #[test]
    fn test_builtin_does_not_stack() {
        let mut shell = fresh();
        let words = simple_words("builtin builtin cd /");
        exec_simple(&mut shell, &words, &[], true).unwrap();
        assert!(!shell.istrue());
    }

    #[test]
    fn test_null_exec_applies_redirections() {
        let mut shell = fresh();
        let dir = std::env::temp_dir().join(format!("rc-dispatch-{}", std::process::id()));
        let _ = std::fs::create_dir_all(&dir);
        let target = dir.join("execout");
        // Redirect a high fd so the test process's stdout survives.
        let src = format!("exec >[9]{}", target.to_string_lossy());
        let node = parse(&src).unwrap().pop().unwrap();
        let (ops, cmd) = redirect::unwrap_redirs(&node);
        let words = match cmd {
            Node::Simple(words) => words.clone(),
            other => panic!("expected simple, got {:?}", other),
        };
        exec_simple(&mut shell, &words, &ops, true).unwrap();
        unsafe { libc::close(9) };
        assert!(target.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
