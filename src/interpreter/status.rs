//! Status Model
//!
//! The last pipeline's wait statuses, one slot per member. `$status`
//! dereferences read the vector as a list of strings; the single-integer
//! view collapses a pipeline to true-iff-all-zero. "No result" is a
//! distinct variant, not a magic status word.

use crate::signals;

/// Longest pipeline the status vector will record.
pub const MAX_PIPELINE: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Normal exit with this code.
    Done(i32),
    Signaled { sig: i32, core: bool },
    /// No wait result (bad pid handed to `wait`, interrupted wait).
    NoResult,
}

impl Status {
    /// Decode a raw wait(2) status word.
    pub fn from_raw(raw: i32) -> Status {
        if libc::WIFEXITED(raw) {
            Status::Done(libc::WEXITSTATUS(raw))
        } else if libc::WIFSIGNALED(raw) {
            Status::Signaled { sig: libc::WTERMSIG(raw), core: libc::WCOREDUMP(raw) }
        } else {
            Status::NoResult
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Status::Done(0))
    }

    /// Single-integer view: exit code, with any signal collapsing to 1.
    pub fn code(&self) -> i32 {
        match self {
            Status::Done(n) => *n,
            Status::Signaled { .. } => 1,
            Status::NoResult => 1,
        }
    }

    /// The `$status` element for this member: decimal exit code, signal
    /// name, or `-N` for signals outside the table, with `+core` appended
    /// when the child dumped core.
    pub fn to_status_string(&self) -> String {
        match self {
            Status::Done(n) => n.to_string(),
            Status::NoResult => "1".to_string(),
            Status::Signaled { sig, core } => {
                let mut s = match signals::signal_name(*sig) {
                    Some(name) => name.to_string(),
                    None => format!("-{}", sig),
                };
                if *core {
                    s.push_str("+core");
                }
                s
            }
        }
    }

    /// Parse the reverse of `to_status_string`. Unknown strings are
    /// accepted as exit 1 for cross-shell compatibility.
    pub fn parse_status_string(s: &str) -> Status {
        if let Ok(n) = s.parse::<i32>() {
            if n >= 0 {
                return Status::Done(n);
            }
            return Status::Signaled { sig: -n, core: false };
        }
        let (body, core) = match s.strip_suffix("+core") {
            Some(body) => (body, true),
            None => (s, false),
        };
        if let Some(sig) = signals::signal_number(body) {
            return Status::Signaled { sig, core };
        }
        if let Some(stripped) = body.strip_prefix('-') {
            if let Ok(sig) = stripped.parse::<i32>() {
                return Status::Signaled { sig, core };
            }
        }
        Status::Done(1)
    }
}

pub struct StatusModel {
    statuses: Vec<Status>,
}

impl StatusModel {
    pub fn new() -> Self {
        Self { statuses: vec![Status::Done(0)] }
    }

    /// Record a single command's status.
    pub fn set(&mut self, st: Status) {
        self.statuses = vec![st];
    }

    /// Record a whole pipeline, member order.
    pub fn set_pipeline(&mut self, mut sts: Vec<Status>) {
        sts.truncate(MAX_PIPELINE);
        if sts.is_empty() {
            sts.push(Status::Done(0));
        }
        self.statuses = sts;
    }

    pub fn pipelength(&self) -> usize {
        self.statuses.len()
    }

    pub fn members(&self) -> &[Status] {
        &self.statuses
    }

    /// True iff every member of the last pipeline exited zero.
    pub fn istrue(&self) -> bool {
        self.statuses.iter().all(|s| s.is_true())
    }

    /// The integer form used for exit codes: with more than one member,
    /// 1 if any failed; with one, its collapsed code.
    pub fn get(&self) -> i32 {
        if self.statuses.len() > 1 {
            if self.istrue() {
                0
            } else {
                1
            }
        } else {
            self.statuses[0].code()
        }
    }

    /// The `$status` list, one string per member in stored order.
    pub fn strings(&self) -> Vec<String> {
        self.statuses.iter().map(|s| s.to_status_string()).collect()
    }

    /// Install a status from a list of strings (the `exit` builtin).
    pub fn set_from_strings(&mut self, argv: &[String]) {
        if argv.is_empty() {
            return;
        }
        self.set_pipeline(argv.iter().map(|s| Status::parse_status_string(s)).collect());
    }
}

impl Default for StatusModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Print a status line to stderr when the rules ask for one: always for
/// the `wait` builtin in an interactive shell, and for any signalled
/// child unless the signal was a plain SIGINT or SIGPIPE.
pub fn print_status(st: &Status, from_wait: bool, interactive: bool) {
    match st {
        Status::Signaled { sig, core } => {
            let loud = *core || (*sig != libc::SIGINT && *sig != libc::SIGPIPE);
            if !(loud || (from_wait && interactive)) {
                return;
            }
            let suffix = if *core { "--core dumped" } else { "" };
            match signals::signal_message(*sig) {
                Some(msg) => eprintln!("{}{}", msg, suffix),
                None => eprintln!("unknown signal {}{}", sig, suffix),
            }
        }
        done => {
            if from_wait && interactive {
                eprintln!("done ({})", done.code());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_exit(code: i32) -> i32 {
        (code & 0xff) << 8
    }

    #[test]
    fn test_from_raw_exited() {
        assert_eq!(Status::from_raw(raw_exit(0)), Status::Done(0));
        assert_eq!(Status::from_raw(raw_exit(42)), Status::Done(42));
    }

    #[test]
    fn test_from_raw_signaled() {
        assert_eq!(
            Status::from_raw(libc::SIGINT),
            Status::Signaled { sig: libc::SIGINT, core: false }
        );
        assert_eq!(
            Status::from_raw(libc::SIGSEGV | 0x80),
            Status::Signaled { sig: libc::SIGSEGV, core: true }
        );
    }

    #[test]
    fn test_status_truth() {
        let mut model = StatusModel::new();
        assert!(model.istrue());
        model.set_pipeline(vec![Status::Done(0), Status::Done(0), Status::Done(0)]);
        assert!(model.istrue());
        assert_eq!(model.get(), 0);
        model.set_pipeline(vec![Status::Done(0), Status::Done(3), Status::Done(0)]);
        assert!(!model.istrue());
        assert_eq!(model.get(), 1);
    }

    #[test]
    fn test_single_member_code_passthrough() {
        let mut model = StatusModel::new();
        model.set(Status::Done(42));
        assert_eq!(model.get(), 42);
        model.set(Status::Signaled { sig: libc::SIGTERM, core: false });
        assert_eq!(model.get(), 1);
        model.set(Status::NoResult);
        assert_eq!(model.get(), 1);
    }

    #[test]
    fn test_status_strings() {
        let mut model = StatusModel::new();
        model.set_pipeline(vec![
            Status::Done(0),
            Status::Signaled { sig: libc::SIGINT, core: false },
            Status::Signaled { sig: libc::SIGSEGV, core: true },
            Status::Signaled { sig: 77, core: false },
        ]);
        assert_eq!(model.strings(), vec!["0", "sigint", "sigsegv+core", "-77"]);
    }

    #[test]
    fn test_parse_status_strings() {
        assert_eq!(Status::parse_status_string("0"), Status::Done(0));
        assert_eq!(Status::parse_status_string("42"), Status::Done(42));
        assert_eq!(
            Status::parse_status_string("sigint"),
            Status::Signaled { sig: libc::SIGINT, core: false }
        );
        assert_eq!(
            Status::parse_status_string("sigsegv+core"),
            Status::Signaled { sig: libc::SIGSEGV, core: true }
        );
        assert_eq!(
            Status::parse_status_string("-77+core"),
            Status::Signaled { sig: 77, core: true }
        );
        assert_eq!(Status::parse_status_string("banana"), Status::Done(1));
    }

    #[test]
    fn test_string_round_trip() {
        let cases = vec![
            Status::Done(0),
            Status::Done(7),
            Status::Signaled { sig: libc::SIGTERM, core: false },
            Status::Signaled { sig: libc::SIGQUIT, core: true },
            Status::Signaled { sig: 77, core: false },
        ];
        for st in cases {
            assert_eq!(Status::parse_status_string(&st.to_status_string()), st);
        }
    }

    #[test]
    fn test_pipeline_cap() {
        let mut model = StatusModel::new();
        model.set_pipeline(vec![Status::Done(0); MAX_PIPELINE + 40]);
        assert_eq!(model.pipelength(), MAX_PIPELINE);
    }

    #[test]
    fn test_set_from_strings() {
        let mut model = StatusModel::new();
        model.set_from_strings(&["3".to_string(), "sigterm".to_string()]);
        assert_eq!(
            model.members(),
            &[Status::Done(3), Status::Signaled { sig: libc::SIGTERM, core: false }]
        );
        assert_eq!(model.get(), 1);
    }
}
