//! umask - Get or set the file creation mask
//!
//! umask [octal]

use nix::sys::stat::{umask, Mode};

use crate::interpreter::builtins::{fail, succeed};
use crate::interpreter::errors::Result;
use crate::interpreter::types::ShellState;

pub fn run(shell: &mut ShellState, args: &[String]) -> Result<()> {
    if args.len() > 1 {
        return fail(shell, "too many arguments to umask");
    }
    match args.first() {
        None => {
            // The only way to read the mask is to set it and put it back.
            let current = umask(Mode::empty());
            umask(current);
            println!("{:03o}", current.bits());
            succeed(shell)
        }
        Some(arg) => match parse_octal(arg) {
            Some(mask) => {
                umask(Mode::from_bits_truncate(mask as nix::libc::mode_t));
                succeed(shell)
            }
            None => fail(shell, format!("bad umask `{}'", arg)),
        },
    }
}

fn parse_octal(arg: &str) -> Option<u32> {
    let mask = u32::from_str_radix(arg, 8).ok()?;
    if mask > 0o777 {
        return None;
    }
    Some(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::ShellFlags;

    fn fresh() -> ShellState {
        ShellState::new(ShellFlags::default(), "rc", &[], &[])
    }

    #[test]
    fn test_set_and_restore_mask() {
        let _guard = crate::signals::test_support::exclusive();
        let saved = umask(Mode::empty());
        let mut shell = fresh();
        run(&mut shell, &["027".to_string()]).unwrap();
        assert!(shell.istrue());
        let now = umask(saved);
        assert_eq!(now.bits() & 0o777, 0o027);
    }

    #[test]
    fn test_bad_mask() {
        let _guard = crate::signals::test_support::exclusive();
        let saved = umask(Mode::empty());
        umask(saved);
        let mut shell = fresh();
        run(&mut shell, &["9z".to_string()]).unwrap();
        assert!(!shell.istrue());
        run(&mut shell, &["7777".to_string()]).unwrap();
        assert!(!shell.istrue());
        umask(saved);
    }
}
