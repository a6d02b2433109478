//! eval - Reparse and run the arguments as shell input

use crate::interpreter::builtins::succeed;
use crate::interpreter::errors::Result;
use crate::interpreter::types::ShellState;
use crate::interpreter::walk;
use crate::parser::parse;

pub fn run(shell: &mut ShellState, args: &[String]) -> Result<()> {
    if args.is_empty() {
        return succeed(shell);
    }
    let src = args.join(" ");
    let nodes = parse(&src)?;
    for node in &nodes {
        walk::walk(shell, node)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::ShellFlags;

    fn fresh() -> ShellState {
        ShellState::new(ShellFlags::default(), "rc", &[], &[])
    }

    #[test]
    fn test_eval_runs_assignment() {
        let mut shell = fresh();
        run(&mut shell, &["x=(a".to_string(), "b)".to_string()]).unwrap();
        assert_eq!(
            shell.vars.get("x"),
            Some(&["a".to_string(), "b".to_string()][..])
        );
    }

    #[test]
    fn test_eval_syntax_error_unwinds() {
        let mut shell = fresh();
        assert!(run(&mut shell, &["{oops".to_string()]).is_err());
    }

    #[test]
    fn test_eval_empty_is_true() {
        let mut shell = fresh();
        run(&mut shell, &[]).unwrap();
        assert!(shell.istrue());
    }
}
