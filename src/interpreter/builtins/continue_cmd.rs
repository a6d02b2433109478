//! continue - Start the next iteration of the enclosing loop

use crate::interpreter::builtins::fail;
use crate::interpreter::errors::{Result, ShellError};
use crate::interpreter::types::ShellState;

pub fn run(shell: &mut ShellState, args: &[String]) -> Result<()> {
    if !args.is_empty() {
        return fail(shell, "too many arguments to continue");
    }
    Err(ShellError::Continue)
}
