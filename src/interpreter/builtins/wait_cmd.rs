//! wait - Collect background children
//!
//! wait [pid ...]
//!
//! Without arguments, waits on everything in `$apids`. Statuses are
//! stored in reverse argument order so left-to-right arguments line up
//! with pipeline member numbering. A malformed pid records a no-result
//! slot and moves on; an interrupted wait stores a false status and
//! returns early, leaving the pending signal for the deferred check.

use crate::interpreter::errors::Result;
use crate::interpreter::status::{print_status, Status};
use crate::interpreter::types::ShellState;
use crate::syscalls::{rc_waitpid, SlowCall};
use crate::which::printable;

pub fn run(shell: &mut ShellState, args: &[String]) -> Result<()> {
    let interactive = shell.flags.interactive;
    let targets: Vec<String> = if args.is_empty() {
        shell
            .vars
            .get("apids")
            .map(|v| v.to_vec())
            .unwrap_or_default()
    } else {
        args.to_vec()
    };
    let mut statuses: Vec<Status> = Vec::new();
    for arg in &targets {
        let pid: i32 = match arg.parse() {
            Ok(pid) if pid > 0 => pid,
            _ => {
                eprintln!("rc: `{}' is a bad number", printable(arg));
                statuses.push(Status::NoResult);
                continue;
            }
        };
        match rc_waitpid(pid) {
            SlowCall::Completed((_, raw)) => {
                let st = Status::from_raw(raw);
                shell.remove_bg_pid(pid);
                print_status(&st, true, interactive);
                statuses.push(st);
            }
            SlowCall::Interrupted => {
                shell.status.set(Status::Done(1));
                return Ok(());
            }
            SlowCall::Failed(errno) => {
                eprintln!("rc: wait: {}", errno.desc());
                shell.remove_bg_pid(pid);
                statuses.push(Status::NoResult);
            }
        }
    }
    statuses.reverse();
    shell.status.set_pipeline(statuses);
    shell.check_errexit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::ShellFlags;

    fn fresh() -> ShellState {
        ShellState::new(ShellFlags::default(), "rc", &[], &[])
    }

    #[test]
    fn test_wait_nothing_outstanding() {
        let mut shell = fresh();
        run(&mut shell, &[]).unwrap();
        assert!(shell.istrue());
    }

    #[test]
    fn test_wait_bad_number_stores_no_result() {
        let mut shell = fresh();
        run(&mut shell, &["banana".to_string(), "0".to_string()]).unwrap();
        assert_eq!(shell.status.members(), &[Status::NoResult, Status::NoResult]);
        assert!(!shell.istrue());
    }

    #[test]
    fn test_wait_unknown_pid_fails() {
        let mut shell = fresh();
        // Not our child; the kernel says ECHILD.
        run(&mut shell, &["99999999".to_string()]).unwrap();
        assert!(!shell.istrue());
    }
}
