//! Shell
//!
//! The command-reader loop on top of the interpreter: script and -c
//! sources, the interactive prompt with continuation lines and history,
//! the login profile, and the policy for what happens when an error
//! unwinds this far (interactive shells resume at the prompt,
//! non-interactive ones abort, a doomed shell exits immediately).

use std::fs::OpenOptions;
use std::io::Write;

use crate::interpreter::errors::ShellError;
use crate::interpreter::status::Status;
use crate::interpreter::types::{ShellFlags, ShellState};
use crate::interpreter::walk;
use crate::parser::{parse, ParseError};
use crate::signals;
use crate::syscalls::{slow_read, write_all, SlowCall};
use crate::which::printable;

/// Where commands come from.
pub enum Source {
    /// `-c 'command'`
    Command(String),
    /// A script file operand.
    File(String),
    /// Standard input, with or without prompts.
    Stdin,
}

pub struct Shell {
    pub state: ShellState,
    history_warned: bool,
}

enum ReadLine {
    Line(String),
    Eof,
    Interrupted,
}

impl Shell {
    pub fn new(flags: ShellFlags, name: &str, args: &[String], envp: &[String]) -> Self {
        Self { state: ShellState::new(flags, name, args, envp), history_warned: false }
    }

    /// Run to completion; the return value is the process exit code.
    pub fn run(&mut self, source: Source) -> i32 {
        signals::install_handlers(self.state.flags.interactive);
        if self.state.flags.login {
            self.run_profile();
        }
        match source {
            Source::Command(text) => self.run_text(&text),
            Source::File(path) => match std::fs::read_to_string(&path) {
                Ok(text) => self.run_text(&text),
                Err(err) => {
                    eprintln!("rc: {}: {}", printable(&path), err);
                    1
                }
            },
            Source::Stdin => {
                if self.state.flags.interactive {
                    self.run_interactive()
                } else {
                    let mut text = String::new();
                    use std::io::Read;
                    if std::io::stdin().read_to_string(&mut text).is_err() {
                        return 1;
                    }
                    self.run_text(&text)
                }
            }
        }
    }

    /// Non-interactive path: parse everything, then run statement by
    /// statement. Any error that unwinds this far aborts the input.
    fn run_text(&mut self, text: &str) -> i32 {
        if self.state.flags.verbose {
            eprint!("{}", text);
            if !text.ends_with('\n') {
                eprintln!();
            }
        }
        let nodes = match parse(text) {
            Ok(nodes) => nodes,
            Err(err) => {
                eprintln!("rc: {}", err);
                return 1;
            }
        };
        if self.state.flags.debug {
            for node in &nodes {
                eprintln!("rc: parsed: {:?}", node);
            }
        }
        if self.state.flags.noexec {
            return 0;
        }
        for node in &nodes {
            match walk::walk(&mut self.state, node) {
                Ok(()) => {}
                Err(ShellError::Exit(code)) => return code,
                Err(err) => {
                    self.report(&err);
                    return self.state.status.get();
                }
            }
        }
        self.state.status.get()
    }

    /// The prompt loop. Errors print and come back to the prompt unless
    /// `exec` has doomed the shell.
    fn run_interactive(&mut self) -> i32 {
        loop {
            // A signal that arrived between commands gets its newline
            // here, unless a well-behaved child already consumed the ^C.
            if signals::take_pending().is_some() && !signals::take_suppress_newline() {
                eprintln!();
            }
            self.prompt(0);
            let mut text = match self.read_line() {
                ReadLine::Eof => break,
                ReadLine::Interrupted => {
                    if !signals::take_suppress_newline() {
                        eprintln!();
                    }
                    signals::take_pending();
                    continue;
                }
                ReadLine::Line(line) => line,
            };
            // Unfinished quote or block: keep reading under the
            // continuation prompt.
            let nodes = loop {
                match parse(&text) {
                    Ok(nodes) => break Some(nodes),
                    Err(err) if needs_more(&err) => {
                        self.prompt(1);
                        match self.read_line() {
                            ReadLine::Line(more) => {
                                text.push('\n');
                                text.push_str(&more);
                            }
                            _ => {
                                eprintln!("rc: {}", err);
                                break None;
                            }
                        }
                    }
                    Err(err) => {
                        eprintln!("rc: {}", err);
                        break None;
                    }
                }
            };
            if !text.trim().is_empty() {
                self.history_append(&text);
            }
            let Some(nodes) = nodes else { continue };
            if self.state.flags.verbose {
                eprintln!("{}", text);
            }
            if self.state.flags.noexec {
                continue;
            }
            for node in &nodes {
                match walk::walk(&mut self.state, node) {
                    Ok(()) => {}
                    Err(ShellError::Exit(code)) => return code,
                    Err(err) => {
                        self.report(&err);
                        if self.state.doomed {
                            return self.state.status.get();
                        }
                        break;
                    }
                }
            }
        }
        self.state.status.get()
    }

    /// Translate an unwound error into `$status` and a diagnostic.
    fn report(&mut self, err: &ShellError) {
        match err {
            ShellError::Interrupted(sig) => {
                self.state
                    .status
                    .set(Status::Signaled { sig: *sig, core: false });
                if self.state.flags.interactive && !signals::take_suppress_newline() {
                    eprintln!();
                }
            }
            other => {
                eprintln!("rc: {}", other);
                self.state.status.set(Status::Done(1));
            }
        }
    }

    /// Print `$prompt(1)` or `$prompt(2)` on stderr.
    fn prompt(&mut self, which: usize) {
        let text = self
            .state
            .vars
            .get("prompt")
            .and_then(|v| v.get(which).cloned())
            .unwrap_or_default();
        write_all(2, text.as_bytes());
    }

    /// One line of input, read a byte at a time through the slow-call
    /// wrapper so ^C interrupts cleanly.
    fn read_line(&mut self) -> ReadLine {
        let mut buf: Vec<u8> = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match slow_read(0, &mut byte) {
                SlowCall::Completed(0) => {
                    if buf.is_empty() {
                        return ReadLine::Eof;
                    }
                    return ReadLine::Line(String::from_utf8_lossy(&buf).into_owned());
                }
                SlowCall::Completed(_) => {
                    if byte[0] == b'\n' {
                        return ReadLine::Line(String::from_utf8_lossy(&buf).into_owned());
                    }
                    buf.push(byte[0]);
                }
                SlowCall::Interrupted => return ReadLine::Interrupted,
                SlowCall::Failed(_) => return ReadLine::Eof,
            }
        }
    }

    /// Append one entered command to `$history`. Losing the file is not
    /// an error; it is mentioned once.
    fn history_append(&mut self, line: &str) {
        let Some(path) = self.state.vars.get("history").map(|v| v.join("")) else {
            return;
        };
        if path.is_empty() {
            return;
        }
        match OpenOptions::new().append(true).create(true).open(&path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", line);
            }
            Err(err) => {
                if !self.history_warned {
                    eprintln!("rc: can't open {}: {}", printable(&path), err);
                    self.history_warned = true;
                }
            }
        }
    }

    /// Login shells read `$home/.rcrc` if it is there.
    fn run_profile(&mut self) {
        let Some(home) = self.state.vars.get("home").map(|v| v.join("")) else {
            return;
        };
        let path = format!("{}/.rcrc", home);
        let Ok(text) = std::fs::read_to_string(&path) else {
            return;
        };
        match parse(&text) {
            Ok(nodes) => {
                for node in &nodes {
                    if let Err(err) = walk::walk(&mut self.state, node) {
                        if !err.is_control_flow() {
                            eprintln!("rc: {}", err);
                        }
                        break;
                    }
                }
            }
            Err(err) => eprintln!("rc: {}", err),
        }
    }
}

/// Does this parse error just mean the input stops mid-construct?
fn needs_more(err: &ParseError) -> bool {
    match err {
        ParseError::UnterminatedQuote { .. } => true,
        ParseError::Expected { expected, .. } => expected == "`}'" || expected == "`)'",
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh(flags: ShellFlags) -> Shell {
        Shell::new(flags, "rc", &[], &[])
    }

    #[test]
    fn test_run_command_exit_code() {
        let mut shell = fresh(ShellFlags::default());
        assert_eq!(shell.run(Source::Command("x=1".to_string())), 0);
        assert_eq!(shell.state.vars.get("x"), Some(&["1".to_string()][..]));
        let mut shell = fresh(ShellFlags::default());
        assert_eq!(shell.run(Source::Command("exit 3".to_string())), 3);
    }

    #[test]
    fn test_syntax_error_is_fatal_noninteractive() {
        let mut shell = fresh(ShellFlags::default());
        assert_eq!(shell.run(Source::Command("{oops".to_string())), 1);
    }

    #[test]
    fn test_noexec_parses_only() {
        let mut flags = ShellFlags::default();
        flags.noexec = true;
        let mut shell = fresh(flags);
        assert_eq!(shell.run(Source::Command("x=1".to_string())), 0);
        assert_eq!(shell.state.vars.get("x"), None);
    }

    #[test]
    fn test_missing_script_file() {
        let mut shell = fresh(ShellFlags::default());
        assert_eq!(shell.run(Source::File("/no/such/script".to_string())), 1);
    }

    #[test]
    fn test_needs_more_classification() {
        assert!(needs_more(&ParseError::UnterminatedQuote { line: 1 }));
        assert!(needs_more(&ParseError::Expected {
            line: 1,
            expected: "`}'".to_string()
        }));
        assert!(!needs_more(&ParseError::Unexpected {
            line: 1,
            near: "`|'".to_string()
        }));
    }

    #[test]
    fn test_history_append() {
        let mut shell = fresh(ShellFlags::default());
        let path = std::env::temp_dir().join(format!("rc-history-{}", std::process::id()));
        let _ = std::fs::remove_file(&path);
        shell
            .state
            .assign("history", vec![path.to_string_lossy().into_owned()], false);
        shell.history_append("echo one");
        shell.history_append("echo two");
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "echo one\necho two\n");
        let _ = std::fs::remove_file(&path);
    }
}
