//! Slow Syscall Wrappers
//!
//! The shell may block in exactly three places: `read`, `write` against a
//! full pipe, and `wait`. Each is wrapped here so that a delivered signal
//! aborts the call instead of restarting it: the handlers are installed
//! without SA_RESTART, the kernel fails the syscall with EINTR, and the
//! wrapper reports `Interrupted`. Callers run `sigchk` after every wrapper
//! to raise a pending signal into the shell-level error path.

use nix::errno::Errno;

use crate::signals;

/// Outcome of a wrapped blocking call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlowCall<T> {
    Completed(T),
    /// A signal arrived before or during the call.
    Interrupted,
    Failed(Errno),
}

impl<T> SlowCall<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            SlowCall::Completed(v) => Some(v),
            _ => None,
        }
    }
}

/// Blocking read. A pending signal aborts before entering the kernel;
/// EINTR during the call is reported the same way.
pub fn slow_read(fd: i32, buf: &mut [u8]) -> SlowCall<usize> {
    if signals::pending().is_some() {
        return SlowCall::Interrupted;
    }
    signals::enter_slow_call();
    let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
    signals::leave_slow_call();
    if n < 0 {
        let err = Errno::last();
        if err == Errno::EINTR {
            return SlowCall::Interrupted;
        }
        return SlowCall::Failed(err);
    }
    SlowCall::Completed(n as usize)
}

/// Write the whole buffer, looping over short writes. Errors are swallowed:
/// if the other end of a pipe is gone there is nobody left to tell.
pub fn write_all(fd: i32, buf: &[u8]) {
    let mut off = 0;
    while off < buf.len() {
        signals::enter_slow_call();
        let n = unsafe {
            libc::write(
                fd,
                buf[off..].as_ptr() as *const libc::c_void,
                buf.len() - off,
            )
        };
        signals::leave_slow_call();
        if n <= 0 {
            // EINTR included: the handler already recorded the signal,
            // and a gone reader is not worth reporting.
            return;
        }
        off += n as usize;
    }
}

/// Wait for any child. Returns the pid and the raw wait(2) status word.
pub fn rc_wait() -> SlowCall<(i32, i32)> {
    wait_for(-1)
}

/// Wait for one specific child.
pub fn rc_waitpid(pid: i32) -> SlowCall<(i32, i32)> {
    wait_for(pid)
}

fn wait_for(pid: i32) -> SlowCall<(i32, i32)> {
    if signals::pending().is_some() {
        return SlowCall::Interrupted;
    }
    let mut status: libc::c_int = 0;
    signals::enter_slow_call();
    let got = unsafe { libc::waitpid(pid, &mut status, 0) };
    signals::leave_slow_call();
    if got < 0 {
        let err = Errno::last();
        if err == Errno::EINTR {
            return SlowCall::Interrupted;
        }
        return SlowCall::Failed(err);
    }
    SlowCall::Completed((got, status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slow_read_aborts_on_pending_signal() {
        let _guard = signals::test_support::exclusive();
        signals::set_pending(libc::SIGINT);
        let mut buf = [0u8; 8];
        // fd 0 may be a terminal under `cargo test`; the pending signal
        // must short-circuit before the kernel is entered at all.
        assert_eq!(slow_read(0, &mut buf), SlowCall::Interrupted);
        signals::take_pending();
    }

    #[test]
    fn test_wait_with_no_children_fails() {
        let _guard = signals::test_support::exclusive();
        signals::take_pending();
        match rc_waitpid(libc::pid_t::MAX as i32 - 1) {
            SlowCall::Failed(err) => assert_eq!(err, Errno::ECHILD),
            other => panic!("expected ECHILD, got {:?}", other),
        }
    }

    #[test]
    fn test_write_all_to_devnull() {
        let path = std::ffi::CString::new("/dev/null").unwrap();
        let fd = unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) };
        assert!(fd >= 0);
        write_all(fd, b"disappears");
        unsafe { libc::close(fd) };
    }
}
