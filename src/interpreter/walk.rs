//! Tree Walker
//!
//! Evaluates parse trees: sequencing, pipelines, control structures,
//! local scopes, background jobs, and backquote capture. Simple commands
//! are handed to the dispatcher; everything that needs its own process
//! is forked here.

use std::ffi::CString;
use std::os::fd::IntoRawFd;

use nix::errno::Errno;
use nix::unistd::{fork, pipe, ForkResult};

use crate::ast::Node;
use crate::interpreter::dispatch::{self, exec_simple};
use crate::interpreter::errors::{sigchk, Result, ShellError};
use crate::interpreter::expansion::{expand_word, expand_words};
use crate::interpreter::pattern::match_any;
use crate::interpreter::redirect;
use crate::interpreter::status::{print_status, Status};
use crate::interpreter::types::ShellState;
use crate::signals;
use crate::syscalls::{rc_wait, slow_read, SlowCall};

/// Evaluate one statement.
pub fn walk(shell: &mut ShellState, node: &Node) -> Result<()> {
    match node {
        Node::Simple(words) => exec_simple(shell, words, &[], true),
        Node::Redir { .. } => {
            let (ops, cmd) = redirect::unwrap_redirs(node);
            match cmd {
                Node::Simple(words) => exec_simple(shell, words, &ops, true),
                compound => run_redirected_compound(shell, &ops, compound),
            }
        }
        Node::Pipe(_, _) => exec_pipeline(shell, node),
        Node::Seq(l, r) => {
            walk(shell, l)?;
            walk(shell, r)
        }
        Node::AndAnd(l, r) => {
            walk_condition(shell, l)?;
            if shell.istrue() {
                walk(shell, r)?;
            }
            Ok(())
        }
        Node::OrOr(l, r) => {
            walk_condition(shell, l)?;
            if !shell.istrue() {
                walk(shell, r)?;
            }
            Ok(())
        }
        Node::Bg(cmd) => exec_background(shell, cmd),
        Node::Brace(body) => walk(shell, body),
        Node::If { cond, body } => {
            walk_condition(shell, cond)?;
            let held = shell.istrue();
            shell.last_cond = held;
            if held {
                walk(shell, body)?;
            }
            Ok(())
        }
        Node::IfNot(body) => {
            if !shell.last_cond {
                walk(shell, body)?;
            }
            Ok(())
        }
        Node::While { cond, body } => {
            loop {
                sigchk()?;
                walk_condition(shell, cond)?;
                if !shell.istrue() {
                    break;
                }
                match run_loop_body(shell, body) {
                    LoopStep::Continue => continue,
                    LoopStep::Break => break,
                    LoopStep::Err(err) => return Err(err),
                }
            }
            Ok(())
        }
        Node::For { var, words, body } => {
            let items = match words {
                Some(words) => expand_words(shell, words)?,
                None => shell.vars.get("*").map(|v| v.to_vec()).unwrap_or_default(),
            };
            for item in items {
                sigchk()?;
                shell.assign(var, vec![item], false);
                match run_loop_body(shell, body) {
                    LoopStep::Continue => continue,
                    LoopStep::Break => break,
                    LoopStep::Err(err) => return Err(err),
                }
            }
            Ok(())
        }
        Node::Match { subject, patterns } => {
            let subject = match subject {
                Some(word) => expand_word(shell, word)?,
                None => Vec::new(),
            };
            let mut pats = Vec::new();
            for node in patterns {
                let literal = matches!(node, Node::Word { quoted: true, .. });
                for text in expand_word(shell, node)? {
                    pats.push((text, literal));
                }
            }
            let verdict = match_any(&subject, &pats);
            shell.set_status(Status::Done(if verdict { 0 } else { 1 }))
        }
        Node::FnDef { name, body } => {
            match body {
                Some(body) => shell.funcs.define(name, (**body).clone()),
                None => shell.funcs.delete(name),
            }
            Ok(())
        }
        Node::Assign { name, value } => {
            let values = expand_words(shell, value)?;
            shell.assign(name, values, false);
            Ok(())
        }
        Node::Local { name, value, cmd } => {
            let values = expand_words(shell, value)?;
            shell.assign(name, values, true);
            let result = walk(shell, cmd);
            shell.unassign(name, true);
            result
        }
        other => Err(ShellError::Fatal(format!("`{}' is not a command", other))),
    }
}

/// Evaluate a whole program, statement by statement.
pub fn walk_all(shell: &mut ShellState, nodes: &[Node]) -> Result<()> {
    for node in nodes {
        walk(shell, node)?;
    }
    Ok(())
}

/// Condition position: -e must not fire on a failing test.
fn walk_condition(shell: &mut ShellState, node: &Node) -> Result<()> {
    let was = shell.in_condition;
    shell.in_condition = true;
    let result = walk(shell, node);
    shell.in_condition = was;
    result
}

enum LoopStep {
    Continue,
    Break,
    Err(ShellError),
}

fn run_loop_body(shell: &mut ShellState, body: &Node) -> LoopStep {
    shell.loop_depth += 1;
    let result = walk(shell, body);
    shell.loop_depth -= 1;
    match result {
        Ok(()) => LoopStep::Continue,
        Err(ShellError::Continue) => LoopStep::Continue,
        Err(ShellError::Break) => LoopStep::Break,
        Err(err) => LoopStep::Err(err),
    }
}

/// Call a shell function: `$0` becomes the function name and `$*` the
/// arguments, both stacked for the call's extent.
pub fn call_function(
    shell: &mut ShellState,
    name: &str,
    body: Node,
    args: &[String],
) -> Result<()> {
    shell.vars.set("0", vec![name.to_string()], true);
    shell.vars.set("*", args.to_vec(), true);
    let result = walk(shell, &body);
    shell.vars.unset("*", true);
    shell.vars.unset("0", true);
    result
}

/// Top of a disposable child (pipeline member, background job): simple
/// commands may exec in place instead of forking again.
fn walk_in_child(shell: &mut ShellState, node: &Node) -> Result<()> {
    match node {
        Node::Simple(words) => exec_simple(shell, words, &[], false),
        Node::Redir { .. } => {
            let (ops, cmd) = redirect::unwrap_redirs(node);
            match cmd {
                Node::Simple(words) => exec_simple(shell, words, &ops, false),
                compound => {
                    let redirs = redirect::expand_redirs(shell, &ops)?;
                    redirect::apply(&redirs, shell.flags.noclobber)?;
                    walk(shell, compound)
                }
            }
        }
        other => walk(shell, other),
    }
}

/// A compound command under redirections runs in its own process so the
/// shell's fds survive.
fn run_redirected_compound(
    shell: &mut ShellState,
    ops: &[&crate::ast::RedirOp],
    inner: &Node,
) -> Result<()> {
    let redirs = redirect::expand_redirs(shell, ops)?;
    let tty = dispatch::save_tty(shell);
    match unsafe { fork() } {
        Err(errno) => Err(ShellError::sys("fork", errno)),
        Ok(ForkResult::Child) => {
            signals::restore_defaults();
            if let Err(err) = redirect::apply(&redirs, shell.flags.noclobber) {
                eprintln!("rc: {}", err);
                std::process::exit(1);
            }
            let result = walk(shell, inner);
            dispatch::child_exit(shell, result)
        }
        Ok(ForkResult::Parent { child }) => {
            let st = dispatch::reap_child(shell, child.as_raw(), tty)?;
            shell.status.set(st);
            sigchk()?;
            shell.check_errexit()
        }
    }
}

/// Flatten a left-leaning pipe tree into member order.
fn pipeline_members<'a>(node: &'a Node, out: &mut Vec<&'a Node>) {
    match node {
        Node::Pipe(l, r) => {
            pipeline_members(l, out);
            pipeline_members(r, out);
        }
        other => out.push(other),
    }
}

/// Run a pipeline: one process per member, statuses recorded by member
/// index as each wait returns.
fn exec_pipeline(shell: &mut ShellState, node: &Node) -> Result<()> {
    let mut members = Vec::new();
    pipeline_members(node, &mut members);
    let count = members.len();
    let mut pids: Vec<i32> = Vec::with_capacity(count);
    let mut prev_read: i32 = -1;

    for (i, member) in members.iter().enumerate() {
        let (read_end, write_end) = if i + 1 < count {
            let (r, w) = pipe().map_err(|errno| ShellError::sys("pipe", errno))?;
            (r.into_raw_fd(), w.into_raw_fd())
        } else {
            (-1, -1)
        };
        match unsafe { fork() } {
            Err(errno) => {
                if prev_read >= 0 {
                    unsafe { libc::close(prev_read) };
                }
                return Err(ShellError::sys("fork", errno));
            }
            Ok(ForkResult::Child) => {
                signals::restore_defaults();
                unsafe {
                    if prev_read >= 0 {
                        libc::dup2(prev_read, 0);
                        libc::close(prev_read);
                    }
                    if write_end >= 0 {
                        libc::dup2(write_end, 1);
                        libc::close(write_end);
                    }
                    if read_end >= 0 {
                        libc::close(read_end);
                    }
                }
                let result = walk_in_child(shell, member);
                dispatch::child_exit(shell, result)
            }
            Ok(ForkResult::Parent { child }) => {
                pids.push(child.as_raw());
                unsafe {
                    if prev_read >= 0 {
                        libc::close(prev_read);
                    }
                    if write_end >= 0 {
                        libc::close(write_end);
                    }
                }
                prev_read = read_end;
            }
        }
    }

    let mut statuses = vec![Status::NoResult; count];
    let mut remaining = count;
    while remaining > 0 {
        match rc_wait() {
            SlowCall::Completed((pid, raw)) => {
                if let Some(idx) = pids.iter().position(|p| *p == pid) {
                    statuses[idx] = Status::from_raw(raw);
                    remaining -= 1;
                } else {
                    // A background child happened to finish first.
                    shell.remove_bg_pid(pid);
                }
            }
            SlowCall::Interrupted => {
                shell.status.set_pipeline(statuses);
                return sigchk().and(Err(ShellError::Interrupted(libc::SIGINT)));
            }
            SlowCall::Failed(errno) => {
                if errno == Errno::ECHILD {
                    break;
                }
                return Err(ShellError::sys("wait", errno));
            }
        }
    }
    for st in &statuses {
        print_status(st, false, shell.flags.interactive);
    }
    shell.status.set_pipeline(statuses);
    sigchk()?;
    shell.check_errexit()
}

/// `command &`: fork, remember the pid, do not wait. The child lets go
/// of the keyboard and reads from /dev/null.
fn exec_background(shell: &mut ShellState, cmd: &Node) -> Result<()> {
    match unsafe { fork() } {
        Err(errno) => Err(ShellError::sys("fork", errno)),
        Ok(ForkResult::Child) => {
            signals::ignore_keyboard();
            let devnull = CString::new("/dev/null").unwrap();
            let fd = unsafe { libc::open(devnull.as_ptr(), libc::O_RDONLY) };
            if fd >= 0 {
                unsafe {
                    libc::dup2(fd, 0);
                    if fd != 0 {
                        libc::close(fd);
                    }
                }
            }
            let result = walk_in_child(shell, cmd);
            dispatch::child_exit(shell, result)
        }
        Ok(ForkResult::Parent { child }) => {
            let pid = child.as_raw();
            shell.add_bg_pid(pid);
            if shell.flags.interactive {
                eprintln!("{}", pid);
            }
            shell.set_status(Status::Done(0))
        }
    }
}

/// `` `{command} ``: run the block with stdout on a pipe and collect
/// everything it writes. The child's status lands in `$status` (and
/// trips -e) before the caller splits the text on `$ifs`.
pub fn backquote(shell: &mut ShellState, body: &Node) -> Result<String> {
    let (read_end, write_end) = pipe().map_err(|errno| ShellError::sys("pipe", errno))?;
    let (read_end, write_end) = (read_end.into_raw_fd(), write_end.into_raw_fd());
    match unsafe { fork() } {
        Err(errno) => {
            unsafe {
                libc::close(read_end);
                libc::close(write_end);
            }
            Err(ShellError::sys("fork", errno))
        }
        Ok(ForkResult::Child) => {
            signals::restore_defaults();
            unsafe {
                libc::close(read_end);
                libc::dup2(write_end, 1);
                if write_end != 1 {
                    libc::close(write_end);
                }
            }
            let result = walk_in_child(shell, body);
            dispatch::child_exit(shell, result)
        }
        Ok(ForkResult::Parent { child }) => {
            unsafe { libc::close(write_end) };
            let mut captured: Vec<u8> = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                match slow_read(read_end, &mut buf) {
                    SlowCall::Completed(0) => break,
                    SlowCall::Completed(n) => captured.extend_from_slice(&buf[..n]),
                    SlowCall::Interrupted => {
                        unsafe { libc::close(read_end) };
                        sigchk()?;
                        return Err(ShellError::Interrupted(libc::SIGINT));
                    }
                    SlowCall::Failed(errno) => {
                        unsafe { libc::close(read_end) };
                        return Err(ShellError::sys("read", errno));
                    }
                }
            }
            unsafe { libc::close(read_end) };
            let st = dispatch::reap_child(shell, child.as_raw(), None)?;
            shell.set_status(st)?;
            sigchk()?;
            Ok(String::from_utf8_lossy(&captured).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::ShellFlags;
    use crate::parser::parse;

    fn fresh() -> ShellState {
        ShellState::new(ShellFlags::default(), "rc", &[], &[])
    }

    fn run(shell: &mut ShellState, src: &str) -> Result<()> {
        let nodes = parse(src).unwrap();
        walk_all(shell, &nodes)
    }

    #[test]
    fn test_assignment_and_lookup() {
        let mut shell = fresh();
        run(&mut shell, "x=(a b c)").unwrap();
        assert_eq!(
            shell.vars.get("x"),
            Some(&["a".to_string(), "b".to_string(), "c".to_string()][..])
        );
    }

    #[test]
    fn test_variable_stacking_scenario() {
        let mut shell = fresh();
        run(&mut shell, "x=A {x=B {}}").unwrap();
        assert_eq!(shell.vars.get("x"), Some(&["A".to_string()][..]));
        run(&mut shell, "x=A;x=B").unwrap();
        assert_eq!(shell.vars.get("x"), Some(&["B".to_string()][..]));
    }

    #[test]
    fn test_match_sets_status() {
        let mut shell = fresh();
        run(&mut shell, "~ hay needle hay").unwrap();
        assert!(shell.istrue());
        run(&mut shell, "~ hay needle").unwrap();
        assert!(!shell.istrue());
    }

    #[test]
    fn test_match_against_list_subject() {
        let mut shell = fresh();
        run(&mut shell, "x=(a b c);~ $x b d").unwrap();
        assert!(shell.istrue());
        run(&mut shell, "~ $x q").unwrap();
        assert!(!shell.istrue());
    }

    #[test]
    fn test_match_glob_pattern() {
        let mut shell = fresh();
        run(&mut shell, "~ file.rs *.rs").unwrap();
        assert!(shell.istrue());
        // Quoted patterns stay literal.
        run(&mut shell, "~ file.rs '*.rs'").unwrap();
        assert!(!shell.istrue());
    }

    #[test]
    fn test_if_and_if_not() {
        let mut shell = fresh();
        run(&mut shell, "if(~ a a)x=then;if not x=else").unwrap();
        assert_eq!(shell.vars.get("x"), Some(&["then".to_string()][..]));
        run(&mut shell, "if(~ a b)y=then;if not y=else").unwrap();
        assert_eq!(shell.vars.get("y"), Some(&["else".to_string()][..]));
    }

    #[test]
    fn test_for_loop_with_break_continue() {
        let mut shell = fresh();
        run(
            &mut shell,
            "acc=();for(x in a b c d e f g){if(~ $x b d)continue;acc=($acc $x);if(~ $x f)break}",
        )
        .unwrap();
        assert_eq!(
            shell.vars.get("acc"),
            Some(&["a".to_string(), "c".to_string(), "e".to_string(), "f".to_string()][..])
        );
    }

    #[test]
    fn test_while_loop() {
        let mut shell = fresh();
        run(
            &mut shell,
            "n=(i i i);out=();while(~ $#n 3 2){out=($out x);n=$n(2-)}",
        )
        .unwrap();
        assert_eq!(
            shell.vars.get("out"),
            Some(&["x".to_string(), "x".to_string()][..])
        );
    }

    #[test]
    fn test_andor_chains() {
        let mut shell = fresh();
        run(&mut shell, "~ a a&&x=yes").unwrap();
        assert_eq!(shell.vars.get("x"), Some(&["yes".to_string()][..]));
        run(&mut shell, "~ a b||y=no").unwrap();
        assert_eq!(shell.vars.get("y"), Some(&["no".to_string()][..]));
    }

    #[test]
    fn test_function_definition_and_call() {
        let mut shell = fresh();
        run(&mut shell, "fn stash {saved=$*;name=$0}").unwrap();
        run(&mut shell, "stash one two").unwrap();
        assert_eq!(
            shell.vars.get("saved"),
            Some(&["one".to_string(), "two".to_string()][..])
        );
        assert_eq!(shell.vars.get("name"), Some(&["stash".to_string()][..]));
        // Parameters popped after the call.
        assert_eq!(shell.vars.get("0"), Some(&["rc".to_string()][..]));
        run(&mut shell, "fn stash").unwrap();
        assert!(!shell.funcs.contains("stash"));
    }

    #[test]
    fn test_errexit_skips_conditions() {
        let mut shell = fresh();
        shell.flags.errexit = true;
        // A failing match inside a condition must not kill the shell...
        run(&mut shell, "if(~ a b)x=nope").unwrap();
        // ...but a bare failing match must.
        assert!(matches!(
            run(&mut shell, "~ a b"),
            Err(ShellError::Exit(_))
        ));
    }

    #[test]
    fn test_local_scope_restores_on_error() {
        let mut shell = fresh();
        run(&mut shell, "x=outer").unwrap();
        let _ = run(&mut shell, "x=inner break");
        assert_eq!(shell.vars.get("x"), Some(&["outer".to_string()][..]));
    }

    #[test]
    fn test_pipeline_status_vector() {
        let _guard = signals::test_support::exclusive();
        let mut shell = fresh();
        run(&mut shell, "/bin/true|/bin/false|/bin/true").unwrap();
        assert_eq!(shell.status.pipelength(), 3);
        assert!(!shell.istrue());
        assert_eq!(shell.status.get(), 1);
        run(&mut shell, "/bin/true|/bin/true").unwrap();
        assert!(shell.istrue());
    }

    #[test]
    fn test_external_command_and_status() {
        let _guard = signals::test_support::exclusive();
        let mut shell = fresh();
        run(&mut shell, "/bin/false").unwrap();
        assert_eq!(shell.status.get(), 1);
        run(&mut shell, "/bin/true").unwrap();
        assert_eq!(shell.status.get(), 0);
    }

    #[test]
    fn test_backquote_capture() {
        let _guard = signals::test_support::exclusive();
        let mut shell = fresh();
        run(&mut shell, "x=`{/bin/echo one two}").unwrap();
        assert_eq!(
            shell.vars.get("x"),
            Some(&["one".to_string(), "two".to_string()][..])
        );
    }

    #[test]
    fn test_background_and_wait() {
        let _guard = signals::test_support::exclusive();
        let mut shell = fresh();
        run(&mut shell, "/bin/sleep 0.1&").unwrap();
        assert!(shell.istrue());
        let apids = shell.vars.get("apids").unwrap().to_vec();
        assert_eq!(apids.len(), 1);
        run(&mut shell, "wait $apid").unwrap();
        assert!(shell.istrue());
        let empty: &[String] = &[];
        assert_eq!(shell.vars.get("apids"), Some(empty));
    }

    #[test]
    fn test_redirection_to_file() {
        let _guard = signals::test_support::exclusive();
        let mut shell = fresh();
        let dir = std::env::temp_dir().join(format!("rc-walk-{}", std::process::id()));
        let _ = std::fs::create_dir_all(&dir);
        let out = dir.join("out");
        run(
            &mut shell,
            &format!("/bin/echo hello >{}", out.to_string_lossy()),
        )
        .unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "hello\n");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_errexit_on_pipeline() {
        let _guard = signals::test_support::exclusive();
        let mut shell = fresh();
        shell.flags.errexit = true;
        assert!(matches!(
            run(&mut shell, "/bin/false|/bin/false"),
            Err(ShellError::Exit(_))
        ));
    }
}
