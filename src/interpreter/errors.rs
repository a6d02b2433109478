//! Shell Errors
//!
//! One enum carries both diagnostics and control flow. Diagnostics
//! (syntax, resolution, usage, system, fatal) unwind to the nearest
//! command-reader loop, which prints them prefixed `rc: `; break,
//! continue, and exit unwind only as far as the construct that consumes
//! them. Builtins report failure through `$status` and reserve the error
//! channel for unwinding.

use nix::errno::Errno;
use thiserror::Error;

use crate::parser::ParseError;
use crate::signals;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("{0}")]
    Syntax(#[from] ParseError),
    #[error("cannot find `{0}'")]
    NotFound(String),
    #[error("{0}")]
    Usage(String),
    /// fork/pipe/exec and friends: what failed, and why.
    #[error("{context}: {}", errno.desc())]
    Sys { context: String, errno: Errno },
    /// A signal arrived mid-command.
    #[error("interrupted")]
    Interrupted(i32),
    #[error("{0}")]
    Fatal(String),
    #[error("break outside of loop")]
    Break,
    #[error("continue outside of loop")]
    Continue,
    /// The `exit` builtin, or `-e` tripping on a failed command.
    #[error("exit")]
    Exit(i32),
}

impl ShellError {
    pub fn sys(context: impl Into<String>, errno: Errno) -> Self {
        ShellError::Sys { context: context.into(), errno }
    }

    /// Control flow unwinds silently; everything else is a diagnostic.
    pub fn is_control_flow(&self) -> bool {
        matches!(
            self,
            ShellError::Break | ShellError::Continue | ShellError::Exit(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ShellError>;

/// The deferred signal check run after every slow call (and at the top of
/// the walker loop): a pending signal becomes a shell-level error here,
/// never inside the handler.
pub fn sigchk() -> Result<()> {
    match signals::take_pending() {
        Some(sig) => Err(ShellError::Interrupted(sig)),
        None => Ok(()),
    }
}
