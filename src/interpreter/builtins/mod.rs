//! Builtin Commands
//!
//! Commands implemented inside the shell. The dispatcher resolves names
//! through `lookup`; `exec` and `builtin` are prefixes the dispatcher
//! consumes itself and never appear in the registry, though `is_builtin`
//! admits them for `whatis`.
//!
//! Builtins report failure through `$status` and a diagnostic on stderr;
//! only control flow (break, continue, exit) unwinds.

use std::collections::HashMap;

use crate::interpreter::errors::Result;
use crate::interpreter::status::Status;
use crate::interpreter::types::ShellState;

pub mod break_cmd;
pub mod cd_cmd;
pub mod continue_cmd;
pub mod dot_cmd;
pub mod eval_cmd;
pub mod exit_cmd;
pub mod shift_cmd;
pub mod umask_cmd;
pub mod wait_cmd;
pub mod whatis_cmd;

pub type BuiltinFn = fn(&mut ShellState, &[String]) -> Result<()>;

lazy_static::lazy_static! {
    static ref BUILTINS: HashMap<&'static str, BuiltinFn> = {
        let mut m: HashMap<&'static str, BuiltinFn> = HashMap::new();
        m.insert(".", dot_cmd::run as BuiltinFn);
        m.insert("break", break_cmd::run);
        m.insert("cd", cd_cmd::run);
        m.insert("continue", continue_cmd::run);
        m.insert("eval", eval_cmd::run);
        m.insert("exit", exit_cmd::run);
        m.insert("shift", shift_cmd::run);
        m.insert("umask", umask_cmd::run);
        m.insert("wait", wait_cmd::run);
        m.insert("whatis", whatis_cmd::run);
        m
    };
}

pub fn lookup(name: &str) -> Option<BuiltinFn> {
    BUILTINS.get(name).copied()
}

/// Includes the dispatcher-consumed prefixes.
pub fn is_builtin(name: &str) -> bool {
    name == "exec" || name == "builtin" || BUILTINS.contains_key(name)
}

/// Report a builtin failure: diagnostic on stderr, `$status` false.
pub fn fail(shell: &mut ShellState, msg: impl AsRef<str>) -> Result<()> {
    eprintln!("rc: {}", msg.as_ref());
    shell.set_status(Status::Done(1))
}

/// Builtin succeeded quietly.
pub fn succeed(shell: &mut ShellState) -> Result<()> {
    shell.set_status(Status::Done(0))
}
