//! Redirection Queue
//!
//! Staged redirections are expanded in the parent (so a bad target is a
//! plain diagnostic, not a dead child) and applied in order in whichever
//! process ends up running the command. Application is raw fd work:
//! open, dup2, close.

use std::ffi::CString;

use nix::errno::Errno;

use crate::ast::{Node, RedirOp};
use crate::interpreter::errors::{Result, ShellError};
use crate::interpreter::expansion::expand_one;
use crate::interpreter::types::ShellState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenKind {
    Read,
    Write,
    Append,
}

/// A redirection with its target already expanded.
#[derive(Debug, Clone, PartialEq)]
pub enum Redirection {
    Open { fd: i32, path: String, kind: OpenKind },
    Dup { fd: i32, from: i32 },
    Close { fd: i32 },
}

/// Peel the redirection wrappers off a command. The parser nests the
/// first redirection innermost, so the collected list is reversed to
/// recover source order.
pub fn unwrap_redirs(node: &Node) -> (Vec<&RedirOp>, &Node) {
    let mut redirs = Vec::new();
    let mut cmd = node;
    while let Node::Redir { redir, cmd: inner } = cmd {
        redirs.push(redir);
        cmd = inner;
    }
    redirs.reverse();
    (redirs, cmd)
}

/// Expand the targets of a redirection queue.
pub fn expand_redirs(shell: &mut ShellState, ops: &[&RedirOp]) -> Result<Vec<Redirection>> {
    let mut out = Vec::with_capacity(ops.len());
    for op in ops {
        out.push(match op {
            RedirOp::In { fd, target } => Redirection::Open {
                fd: *fd,
                path: expand_one(shell, target, "redirection target")?,
                kind: OpenKind::Read,
            },
            RedirOp::Out { fd, target } => Redirection::Open {
                fd: *fd,
                path: expand_one(shell, target, "redirection target")?,
                kind: OpenKind::Write,
            },
            RedirOp::Append { fd, target } => Redirection::Open {
                fd: *fd,
                path: expand_one(shell, target, "redirection target")?,
                kind: OpenKind::Append,
            },
            RedirOp::Dup { fd, from } => Redirection::Dup { fd: *fd, from: *from },
            RedirOp::Close { fd } => Redirection::Close { fd: *fd },
        });
    }
    Ok(out)
}

/// Apply a queue in order. With `noclobber`, plain `>` refuses to
/// replace an existing file.
pub fn apply(redirs: &[Redirection], noclobber: bool) -> Result<()> {
    for redir in redirs {
        match redir {
            Redirection::Open { fd, path, kind } => {
                let flags = match kind {
                    OpenKind::Read => libc::O_RDONLY,
                    OpenKind::Write => {
                        let mut f = libc::O_WRONLY | libc::O_CREAT;
                        f |= if noclobber { libc::O_EXCL } else { libc::O_TRUNC };
                        f
                    }
                    OpenKind::Append => libc::O_WRONLY | libc::O_CREAT | libc::O_APPEND,
                };
                let cpath = CString::new(path.as_str())
                    .map_err(|_| ShellError::Usage(format!("bad file name `{}'", path)))?;
                let new = unsafe { libc::open(cpath.as_ptr(), flags, 0o666 as libc::c_uint) };
                if new < 0 {
                    return Err(ShellError::sys(path.clone(), Errno::last()));
                }
                if new != *fd {
                    if unsafe { libc::dup2(new, *fd) } < 0 {
                        let errno = Errno::last();
                        unsafe { libc::close(new) };
                        return Err(ShellError::sys(path.clone(), errno));
                    }
                    unsafe { libc::close(new) };
                }
            }
            Redirection::Dup { fd, from } => {
                if unsafe { libc::dup2(*from, *fd) } < 0 {
                    return Err(ShellError::sys(format!("{}={}", fd, from), Errno::last()));
                }
            }
            Redirection::Close { fd } => {
                unsafe { libc::close(*fd) };
            }
        }
    }
    Ok(())
}
