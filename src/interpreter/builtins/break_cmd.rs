//! break - Leave the enclosing loop

use crate::interpreter::builtins::fail;
use crate::interpreter::errors::{Result, ShellError};
use crate::interpreter::types::ShellState;

pub fn run(shell: &mut ShellState, args: &[String]) -> Result<()> {
    if !args.is_empty() {
        return fail(shell, "too many arguments to break");
    }
    Err(ShellError::Break)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::ShellFlags;

    #[test]
    fn test_break_unwinds() {
        let mut shell = ShellState::new(ShellFlags::default(), "rc", &[], &[]);
        assert!(matches!(run(&mut shell, &[]), Err(ShellError::Break)));
    }

    #[test]
    fn test_break_rejects_arguments() {
        let mut shell = ShellState::new(ShellFlags::default(), "rc", &[], &[]);
        run(&mut shell, &["2".to_string()]).unwrap();
        assert!(!shell.istrue());
    }
}
