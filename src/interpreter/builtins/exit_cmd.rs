//! exit - Leave the shell
//!
//! Arguments install a status first, so `exit sigterm` and `exit 3` both
//! work; a word that is neither a number nor a signal name means exit 1.

use crate::interpreter::errors::{Result, ShellError};
use crate::interpreter::types::ShellState;

pub fn run(shell: &mut ShellState, args: &[String]) -> Result<()> {
    if !args.is_empty() {
        shell.status.set_from_strings(args);
    }
    Err(ShellError::Exit(shell.status.get()))
}
