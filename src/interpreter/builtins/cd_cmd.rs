//! cd - Change directory
//!
//! `cd` with no argument goes to `$home`; one argument changes there.

use std::path::Path;

use nix::unistd::chdir;

use crate::interpreter::builtins::{fail, succeed};
use crate::interpreter::errors::Result;
use crate::interpreter::types::ShellState;
use crate::which::printable;

pub fn run(shell: &mut ShellState, args: &[String]) -> Result<()> {
    if args.len() > 1 {
        return fail(shell, "too many arguments to cd");
    }
    let target = match args.first() {
        Some(dir) => dir.clone(),
        None => match shell.vars.get("home").map(|v| v.join("")) {
            Some(home) if !home.is_empty() => home,
            _ => return fail(shell, "cd: no home directory"),
        },
    };
    match chdir(Path::new(&target)) {
        Ok(()) => succeed(shell),
        Err(_) => fail(shell, format!("couldn't cd to {}", printable(&target))),
    }
}
