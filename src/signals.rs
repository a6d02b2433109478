//! Signal Handling
//!
//! The shell's signal discipline is deliberately small: a handler may only
//! record the signal number in an atomic, which `sigchk` later raises into
//! the shell-level error path, or abort a blocking syscall by virtue of
//! being installed without SA_RESTART (the slow-call wrappers map EINTR to
//! an interrupted result). Handlers never touch shell data structures.
//!
//! Also home to the signal name/message table used by the status model and
//! by environment export filtering.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

/// One row of the signal table: lowercase shell-visible name, signal
/// number, and the human message printed when a child dies by it.
pub struct SigEntry {
    pub name: &'static str,
    pub number: i32,
    pub message: &'static str,
}

lazy_static::lazy_static! {
    /// Signals the shell knows by name. Ordering is irrelevant; lookups go
    /// both ways (name -> number for `$status` parsing, number -> name for
    /// `$status` formatting).
    pub static ref SIGNAL_TABLE: Vec<SigEntry> = vec![
        SigEntry { name: "sighup", number: libc::SIGHUP, message: "hangup" },
        SigEntry { name: "sigint", number: libc::SIGINT, message: "" },
        SigEntry { name: "sigquit", number: libc::SIGQUIT, message: "quit" },
        SigEntry { name: "sigill", number: libc::SIGILL, message: "illegal instruction" },
        SigEntry { name: "sigtrap", number: libc::SIGTRAP, message: "trace trap" },
        SigEntry { name: "sigabrt", number: libc::SIGABRT, message: "abort" },
        SigEntry { name: "sigbus", number: libc::SIGBUS, message: "bus error" },
        SigEntry { name: "sigfpe", number: libc::SIGFPE, message: "floating point exception" },
        SigEntry { name: "sigkill", number: libc::SIGKILL, message: "killed" },
        SigEntry { name: "sigusr1", number: libc::SIGUSR1, message: "user signal 1" },
        SigEntry { name: "sigsegv", number: libc::SIGSEGV, message: "segmentation violation" },
        SigEntry { name: "sigusr2", number: libc::SIGUSR2, message: "user signal 2" },
        SigEntry { name: "sigpipe", number: libc::SIGPIPE, message: "broken pipe" },
        SigEntry { name: "sigalrm", number: libc::SIGALRM, message: "alarm clock" },
        SigEntry { name: "sigterm", number: libc::SIGTERM, message: "terminated" },
        SigEntry { name: "sigchld", number: libc::SIGCHLD, message: "child status changed" },
        SigEntry { name: "sigcont", number: libc::SIGCONT, message: "continued" },
        SigEntry { name: "sigstop", number: libc::SIGSTOP, message: "stopped (signal)" },
        SigEntry { name: "sigtstp", number: libc::SIGTSTP, message: "stopped" },
        SigEntry { name: "sigttin", number: libc::SIGTTIN, message: "background tty read" },
        SigEntry { name: "sigttou", number: libc::SIGTTOU, message: "background tty write" },
        SigEntry { name: "sigurg", number: libc::SIGURG, message: "urgent condition" },
        SigEntry { name: "sigxcpu", number: libc::SIGXCPU, message: "cpu time limit exceeded" },
        SigEntry { name: "sigxfsz", number: libc::SIGXFSZ, message: "file size limit exceeded" },
        SigEntry { name: "sigvtalrm", number: libc::SIGVTALRM, message: "virtual alarm clock" },
        SigEntry { name: "sigprof", number: libc::SIGPROF, message: "profiling timer expired" },
        SigEntry { name: "sigwinch", number: libc::SIGWINCH, message: "window size changed" },
        SigEntry { name: "sigio", number: libc::SIGIO, message: "i/o possible" },
        SigEntry { name: "sigsys", number: libc::SIGSYS, message: "bad system call" },
    ];
}

/// Signal delivered but not yet raised into the error path. 0 means none.
static PENDING: AtomicI32 = AtomicI32::new(0);

/// Set while a slow-call wrapper is blocked in the kernel.
static SLOW: AtomicBool = AtomicBool::new(false);

/// Set when the next interactive newline-before-prompt should be skipped
/// (the child consumed the user's ^C itself and exited normally).
static SUPPRESS_NEWLINE: AtomicBool = AtomicBool::new(false);

/// Look up a signal's shell-visible name.
pub fn signal_name(number: i32) -> Option<&'static str> {
    SIGNAL_TABLE.iter().find(|e| e.number == number).map(|e| e.name)
}

/// Look up a signal number by its shell-visible name.
pub fn signal_number(name: &str) -> Option<i32> {
    SIGNAL_TABLE.iter().find(|e| e.name == name).map(|e| e.number)
}

/// The message printed when a child dies by this signal.
pub fn signal_message(number: i32) -> Option<&'static str> {
    SIGNAL_TABLE.iter().find(|e| e.number == number).map(|e| e.message)
}

/// True for function names reserved for signal handlers. Such functions
/// are never exported into the environment.
pub fn is_signal_fn_name(name: &str) -> bool {
    name == "sigexit" || signal_number(name).is_some()
}

extern "C" fn note_signal(sig: libc::c_int) {
    PENDING.store(sig, Ordering::SeqCst);
}

/// Install the shell's handlers. SIGINT is always caught; an interactive
/// shell additionally ignores SIGQUIT and SIGTERM so a stray signal does
/// not kill the prompt. Installed without SA_RESTART: a delivered signal
/// must abort the current slow call with EINTR.
pub fn install_handlers(interactive: bool) {
    let catch = SigAction::new(
        SigHandler::Handler(note_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    unsafe {
        let _ = sigaction(Signal::SIGINT, &catch);
        if interactive {
            let _ = sigaction(Signal::SIGQUIT, &ignore);
            let _ = sigaction(Signal::SIGTERM, &ignore);
        }
    }
}

/// Restore default dispositions in a freshly forked child. Interactive
/// ignores are not preserved; the child is a plain foreground process.
pub fn restore_defaults() {
    let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    unsafe {
        let _ = sigaction(Signal::SIGINT, &default);
        let _ = sigaction(Signal::SIGQUIT, &default);
        let _ = sigaction(Signal::SIGTERM, &default);
    }
}

/// Detach a background child from the keyboard: interrupt and quit are
/// ignored so ^C at the prompt only reaches the foreground job.
pub fn ignore_keyboard() {
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    unsafe {
        let _ = sigaction(Signal::SIGINT, &ignore);
        let _ = sigaction(Signal::SIGQUIT, &ignore);
    }
}

/// Record a pending signal as if delivered. Used by the slow-call wrappers
/// when a syscall reports EINTR, and by tests.
pub fn set_pending(sig: i32) {
    PENDING.store(sig, Ordering::SeqCst);
}

/// Consume and return the pending signal, if any.
pub fn take_pending() -> Option<i32> {
    match PENDING.swap(0, Ordering::SeqCst) {
        0 => None,
        sig => Some(sig),
    }
}

/// Peek without consuming.
pub fn pending() -> Option<i32> {
    match PENDING.load(Ordering::SeqCst) {
        0 => None,
        sig => Some(sig),
    }
}

pub fn enter_slow_call() {
    SLOW.store(true, Ordering::SeqCst);
}

pub fn leave_slow_call() {
    SLOW.store(false, Ordering::SeqCst);
}

pub fn in_slow_call() -> bool {
    SLOW.load(Ordering::SeqCst)
}

/// Suppress the next newline the interactive loop would print after ^C.
pub fn suppress_newline() {
    SUPPRESS_NEWLINE.store(true, Ordering::SeqCst);
}

/// Consume the suppression flag.
pub fn take_suppress_newline() -> bool {
    SUPPRESS_NEWLINE.swap(false, Ordering::SeqCst)
}

/// Tests that fork children, wait, or poke the pending flag share one
/// process-wide flag and one pool of children; they serialize on this.
#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Mutex, MutexGuard};

    static EXCLUSIVE: Mutex<()> = Mutex::new(());

    pub fn exclusive() -> MutexGuard<'static, ()> {
        EXCLUSIVE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_name_lookup() {
        assert_eq!(signal_name(libc::SIGINT), Some("sigint"));
        assert_eq!(signal_name(libc::SIGSEGV), Some("sigsegv"));
        assert_eq!(signal_name(9999), None);
    }

    #[test]
    fn test_signal_number_lookup() {
        assert_eq!(signal_number("sigint"), Some(libc::SIGINT));
        assert_eq!(signal_number("sigkill"), Some(libc::SIGKILL));
        assert_eq!(signal_number("sigbogus"), None);
    }

    #[test]
    fn test_name_number_round_trip() {
        for entry in SIGNAL_TABLE.iter() {
            assert_eq!(signal_number(entry.name), Some(entry.number));
            assert_eq!(signal_name(entry.number), Some(entry.name));
        }
    }

    #[test]
    fn test_signal_fn_names() {
        assert!(is_signal_fn_name("sigint"));
        assert!(is_signal_fn_name("sigexit"));
        assert!(!is_signal_fn_name("sigmund"));
        assert!(!is_signal_fn_name("greet"));
    }

    #[test]
    fn test_pending_take_and_peek() {
        let _guard = test_support::exclusive();
        take_pending();
        assert_eq!(pending(), None);
        set_pending(libc::SIGINT);
        assert_eq!(pending(), Some(libc::SIGINT));
        assert_eq!(take_pending(), Some(libc::SIGINT));
        assert_eq!(take_pending(), None);
    }
}
