//! shift - Drop leading positional parameters
//!
//! shift [n]

use crate::interpreter::builtins::{fail, succeed};
use crate::interpreter::errors::Result;
use crate::interpreter::types::ShellState;

pub fn run(shell: &mut ShellState, args: &[String]) -> Result<()> {
    if args.len() > 1 {
        return fail(shell, "too many arguments to shift");
    }
    let n = match args.first() {
        None => 1,
        Some(arg) => match arg.parse::<usize>() {
            Ok(n) => n,
            Err(_) => return fail(shell, format!("bad number `{}'", arg)),
        },
    };
    let params = shell.vars.get("*").map(|v| v.to_vec()).unwrap_or_default();
    if n > params.len() {
        return fail(shell, "cannot shift");
    }
    shell.vars.set("*", params[n..].to_vec(), false);
    succeed(shell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::ShellFlags;

    fn shell_with_args(args: &[&str]) -> ShellState {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        ShellState::new(ShellFlags::default(), "rc", &args, &[])
    }

    #[test]
    fn test_shift_one() {
        let mut shell = shell_with_args(&["a", "b", "c"]);
        run(&mut shell, &[]).unwrap();
        assert_eq!(
            shell.vars.get("*"),
            Some(&["b".to_string(), "c".to_string()][..])
        );
    }

    #[test]
    fn test_shift_n() {
        let mut shell = shell_with_args(&["a", "b", "c"]);
        run(&mut shell, &["2".to_string()]).unwrap();
        assert_eq!(shell.vars.get("*"), Some(&["c".to_string()][..]));
    }

    #[test]
    fn test_shift_too_far() {
        let mut shell = shell_with_args(&["a"]);
        run(&mut shell, &["5".to_string()]).unwrap();
        assert!(!shell.istrue());
        assert_eq!(shell.vars.get("*"), Some(&["a".to_string()][..]));
    }
}
