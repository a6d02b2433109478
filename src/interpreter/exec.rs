//! Extended execve
//!
//! `rc_execve` first hands the file to the kernel; if that fails with
//! ENOEXEC it reads the first 256 bytes, parses a `#!` line by hand
//! (interpreter plus at most one argument), and retries with the
//! interpreter prepended. The argv buffer reserves two slots in front so
//! the prepend never reallocates after the fork.

use std::ffi::CString;

use nix::errno::Errno;
use nix::unistd::execve;

/// How much of the script is inspected for a `#!` line; interpreter plus
/// argument must fit.
const SHEBANG_MAX: usize = 256;

/// Head room reserved in front of the visible argv.
const HEADROOM: usize = 2;

/// An argv with two spare slots before the first visible argument.
pub struct Argv {
    items: Vec<CString>,
    start: usize,
}

impl Argv {
    /// Build from argument strings. With `prepend_dash`, the first
    /// argument gets a `-` in front (login-shell convention). Interior
    /// NUL bytes make a word unrepresentable; such words are dropped.
    pub fn new(words: &[String], prepend_dash: bool) -> Self {
        let mut items = Vec::with_capacity(words.len() + HEADROOM);
        for _ in 0..HEADROOM {
            items.push(CString::default());
        }
        for (i, word) in words.iter().enumerate() {
            let text = if i == 0 && prepend_dash {
                format!("-{}", word)
            } else {
                word.clone()
            };
            if let Ok(c) = CString::new(text) {
                items.push(c);
            }
        }
        Self { items, start: HEADROOM }
    }

    pub fn args(&self) -> &[CString] {
        &self.items[self.start..]
    }

    /// Use one of the reserved slots.
    fn push_front(&mut self, arg: CString) {
        assert!(self.start > 0);
        self.start -= 1;
        self.items[self.start] = arg;
    }
}

/// Parse a `#!` line: `#!` then an interpreter path, optionally one
/// argument. A third token is a malformed header.
fn parse_shebang(buf: &[u8]) -> Option<(CString, Option<CString>)> {
    if buf.len() < 2 || buf[0] != b'#' || buf[1] != b'!' {
        return None;
    }
    let line = &buf[2..buf.iter().position(|&b| b == b'\n').unwrap_or(buf.len())];
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < line.len() {
        while i < line.len() && (line[i] == b' ' || line[i] == b'\t') {
            i += 1;
        }
        let start = i;
        while i < line.len() && line[i] != b' ' && line[i] != b'\t' {
            i += 1;
        }
        if i > start {
            tokens.push(&line[start..i]);
        }
    }
    match tokens.len() {
        1 => Some((CString::new(tokens[0]).ok()?, None)),
        2 => Some((
            CString::new(tokens[0]).ok()?,
            Some(CString::new(tokens[1]).ok()?),
        )),
        _ => None,
    }
}

/// execve with `#!` emulation. Only returns on failure, with the errno
/// of the decisive attempt. Does not allocate beyond the head-room slots
/// already reserved in `argv`.
pub fn rc_execve(path: &CString, argv: &mut Argv, envp: &[CString]) -> Errno {
    let err = match execve(path, argv.args(), envp) {
        Err(err) => err,
        Ok(_) => unreachable!(),
    };
    if err != Errno::ENOEXEC {
        return err;
    }
    // The kernel refused; look for a #! header ourselves.
    let fd = unsafe { libc::open(path.as_ptr(), libc::O_RDONLY) };
    if fd < 0 {
        return Errno::last();
    }
    let mut buf = [0u8; SHEBANG_MAX];
    let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, SHEBANG_MAX) };
    unsafe { libc::close(fd) };
    if n <= 0 {
        return Errno::ENOEXEC;
    }
    let Some((interp, arg)) = parse_shebang(&buf[..n as usize]) else {
        return Errno::ENOEXEC;
    };
    if let Some(arg) = arg {
        argv.push_front(arg);
    }
    argv.push_front(interp);
    let args = argv.args();
    match execve(args[0].as_c_str(), args, envp) {
        Err(err) => err,
        Ok(_) => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_argv_basic() {
        let argv = Argv::new(&words(&["ls", "-l"]), false);
        let args: Vec<&str> = argv.args().iter().map(|c| c.to_str().unwrap()).collect();
        assert_eq!(args, vec!["ls", "-l"]);
    }

    #[test]
    fn test_argv_login_dash() {
        let argv = Argv::new(&words(&["rc"]), true);
        assert_eq!(argv.args()[0].to_str().unwrap(), "-rc");
    }

    #[test]
    fn test_argv_head_room() {
        let mut argv = Argv::new(&words(&["script", "a"]), false);
        argv.push_front(CString::new("arg").unwrap());
        argv.push_front(CString::new("/bin/interp").unwrap());
        let args: Vec<&str> = argv.args().iter().map(|c| c.to_str().unwrap()).collect();
        assert_eq!(args, vec!["/bin/interp", "arg", "script", "a"]);
    }

    #[test]
    fn test_parse_shebang_forms() {
        let (interp, arg) = parse_shebang(b"#!/bin/sh\necho hi\n").unwrap();
        assert_eq!(interp.to_str().unwrap(), "/bin/sh");
        assert!(arg.is_none());

        let (interp, arg) = parse_shebang(b"#! /usr/bin/env  python\nprint()\n").unwrap();
        assert_eq!(interp.to_str().unwrap(), "/usr/bin/env");
        assert_eq!(arg.unwrap().to_str().unwrap(), "python");
    }

    #[test]
    fn test_parse_shebang_rejects() {
        assert!(parse_shebang(b"echo hi\n").is_none());
        assert!(parse_shebang(b"#\n").is_none());
        // Two arguments after the interpreter is one too many.
        assert!(parse_shebang(b"#!/bin/sh -e -x\n").is_none());
        // No interpreter at all.
        assert!(parse_shebang(b"#!\n").is_none());
    }

    #[test]
    fn test_parse_shebang_without_newline() {
        let (interp, _) = parse_shebang(b"#!/bin/interp").unwrap();
        assert_eq!(interp.to_str().unwrap(), "/bin/interp");
    }
}
