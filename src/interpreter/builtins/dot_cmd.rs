//! . - Run commands from a file
//!
//! `. file arg ...` reads the file and runs it with `$0` set to the file
//! name and `$*` to the remaining arguments, both restored afterwards.

use crate::interpreter::builtins::fail;
use crate::interpreter::errors::Result;
use crate::interpreter::types::ShellState;
use crate::interpreter::walk;
use crate::parser::parse;
use crate::which::printable;

pub fn run(shell: &mut ShellState, args: &[String]) -> Result<()> {
    let Some(file) = args.first() else {
        return fail(shell, "not enough arguments to .");
    };
    let src = match std::fs::read_to_string(file) {
        Ok(src) => src,
        Err(err) => return fail(shell, format!("{}: {}", printable(file), err)),
    };
    let nodes = parse(&src)?;
    shell.vars.set("0", vec![file.clone()], true);
    shell.vars.set("*", args[1..].to_vec(), true);
    let mut result = Ok(());
    for node in &nodes {
        result = walk::walk(shell, node);
        if result.is_err() {
            break;
        }
    }
    shell.vars.unset("*", true);
    shell.vars.unset("0", true);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::ShellFlags;
    use std::io::Write;

    fn fresh() -> ShellState {
        ShellState::new(ShellFlags::default(), "rc", &[], &[])
    }

    fn script(tag: &str, body: &str) -> String {
        let path = std::env::temp_dir().join(format!("rc-dot-{}-{}", tag, std::process::id()));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_dot_runs_file() {
        let mut shell = fresh();
        let path = script("assign", "x=sourced\n");
        run(&mut shell, &[path.clone()]).unwrap();
        assert_eq!(shell.vars.get("x"), Some(&["sourced".to_string()][..]));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_dot_binds_positionals() {
        let mut shell = fresh();
        let path = script("args", "seen=$*\n");
        run(&mut shell, &[path.clone(), "a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(
            shell.vars.get("seen"),
            Some(&["a".to_string(), "b".to_string()][..])
        );
        // The caller's parameters come back after the file ends.
        let empty: &[String] = &[];
        assert_eq!(shell.vars.get("*"), Some(empty));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_dot_missing_file() {
        let mut shell = fresh();
        run(&mut shell, &["/no/such/file".to_string()]).unwrap();
        assert!(!shell.istrue());
    }

    #[test]
    fn test_dot_needs_argument() {
        let mut shell = fresh();
        run(&mut shell, &[]).unwrap();
        assert!(!shell.istrue());
    }
}
