//! Interpreter Types
//!
//! The shell's runtime state: the three name-resolution tables, the
//! status vector, the flag set, and the bookkeeping the dispatcher and
//! walker share (condition nesting, loop depth, background pids, the
//! `exec` doom marker).

use nix::unistd::getpid;

use crate::interpreter::errors::{Result, ShellError};
use crate::interpreter::status::{Status, StatusModel};
use crate::tables::{Environ, FnTable, VarTable};
use crate::which::{join_path_env, split_path_env, PathCache};

/// Command-line flags, getopt-style, mutually combinable.
#[derive(Debug, Clone, Default)]
pub struct ShellFlags {
    /// -i: interactive (prompts, job messages)
    pub interactive: bool,
    /// -l: login shell (reads ~/.rcrc)
    pub login: bool,
    /// -e: exit on any non-zero status outside a condition
    pub errexit: bool,
    /// -v: echo input as it is read
    pub verbose: bool,
    /// -x: trace commands before running them
    pub xtrace: bool,
    /// -n: parse only, execute nothing
    pub noexec: bool,
    /// -p: do not import functions from the environment
    pub no_fn_import: bool,
    /// -o: `>` refuses to overwrite existing files
    pub noclobber: bool,
    /// -d: dump parse trees (develop builds)
    pub debug: bool,
    /// -s: read commands from stdin
    pub stdin_read: bool,
}

pub struct ShellState {
    pub vars: VarTable,
    pub funcs: FnTable,
    pub path_cache: PathCache,
    pub environ: Environ,
    pub status: StatusModel,
    pub flags: ShellFlags,
    /// argv[0] of the shell itself; `$0` at top level.
    pub shell_name: String,
    /// Set once `exec` has run a command: any later shell-level error
    /// terminates the process instead of returning to the reader.
    pub doomed: bool,
    /// True while an if/while condition runs; -e does not fire there.
    pub in_condition: bool,
    /// Whether the most recent `if` condition held; `if not` reads it.
    pub last_cond: bool,
    /// Nesting depth of for/while loops, for break and continue.
    pub loop_depth: u32,
}

impl ShellState {
    pub fn new(flags: ShellFlags, shell_name: &str, args: &[String], envp: &[String]) -> Self {
        let mut shell = Self {
            vars: VarTable::new(),
            funcs: FnTable::new(),
            path_cache: PathCache::new(),
            environ: Environ::new(),
            status: StatusModel::new(),
            flags,
            shell_name: shell_name.to_string(),
            doomed: false,
            in_condition: false,
            last_cond: true,
            loop_depth: 0,
        };
        let import_fns = !shell.flags.no_fn_import;
        shell
            .environ
            .init_env(envp, import_fns, &mut shell.vars, &mut shell.funcs);
        // path mirrors PATH; an inherited PATH wins, otherwise a spartan
        // default. Either way the mirror starts consistent.
        match shell.vars.get("PATH").map(|v| v.join("")) {
            Some(path_env) => {
                shell.vars.set("path", split_path_env(&path_env), false);
            }
            None => {
                let default: Vec<String> =
                    ["", "/usr/bin", "/bin"].iter().map(|s| s.to_string()).collect();
                shell.vars.set("PATH", vec![join_path_env(&default)], false);
                shell.vars.set("path", default, false);
            }
        }
        if let Some(home) = shell.vars.get("HOME").map(|v| v.join("")) {
            shell.vars.set("home", vec![home], false);
        }
        shell.environ.mark_defaulted("prompt");
        shell
            .vars
            .set("prompt", vec!["; ".to_string(), "".to_string()], false);
        shell.environ.mark_defaulted("version");
        shell.vars.set(
            "version",
            vec![format!("rc-shell {}", env!("CARGO_PKG_VERSION"))],
            false,
        );
        shell.vars.set("pid", vec![getpid().as_raw().to_string()], false);
        shell.vars.set("*", args.to_vec(), false);
        shell.vars.set("0", vec![shell_name.to_string()], false);
        shell.vars.set("apids", vec![], false);
        shell
    }

    /// Assign through the shell so the coupled names stay consistent:
    /// any write to `path` or `PATH` updates its mirror and flushes the
    /// command-path cache; `home` mirrors `HOME`; a defaulted name
    /// becomes exportable once the user assigns it.
    pub fn assign(&mut self, name: &str, values: Vec<String>, stack: bool) {
        self.environ.clear_defaulted(name);
        match name {
            "path" => {
                self.path_cache.reset();
                self.vars.set("PATH", vec![join_path_env(&values)], stack);
                self.vars.set("path", values, stack);
            }
            "PATH" => {
                self.path_cache.reset();
                let joined = values.join("");
                self.vars.set("path", split_path_env(&joined), stack);
                self.vars.set("PATH", values, stack);
            }
            "home" => {
                self.vars.set("HOME", values.clone(), stack);
                self.vars.set("home", values, stack);
            }
            "HOME" => {
                self.vars.set("home", values.clone(), stack);
                self.vars.set("HOME", values, stack);
            }
            _ => self.vars.set(name, values, stack),
        }
    }

    /// Mirror of `assign` for scope exit and the unset form of delete.
    pub fn unassign(&mut self, name: &str, stack: bool) {
        match name {
            "path" | "PATH" => {
                self.path_cache.reset();
                self.vars.unset("path", stack);
                self.vars.unset("PATH", stack);
            }
            "home" | "HOME" => {
                self.vars.unset("home", stack);
                self.vars.unset("HOME", stack);
            }
            _ => self.vars.unset(name, stack),
        }
    }

    pub fn istrue(&self) -> bool {
        self.status.istrue()
    }

    /// Record one command's status and run the -e discipline.
    pub fn set_status(&mut self, st: Status) -> Result<()> {
        self.status.set(st);
        self.check_errexit()
    }

    pub fn check_errexit(&mut self) -> Result<()> {
        if self.flags.errexit && !self.in_condition && !self.status.istrue() {
            return Err(ShellError::Exit(self.status.get()));
        }
        Ok(())
    }

    /// Remember a background child: `$apid` is the latest, `$apids` all
    /// outstanding ones.
    pub fn add_bg_pid(&mut self, pid: i32) {
        let mut apids = self
            .vars
            .get("apids")
            .map(|v| v.to_vec())
            .unwrap_or_default();
        apids.push(pid.to_string());
        self.vars.set("apids", apids, false);
        self.vars.set("apid", vec![pid.to_string()], false);
    }

    /// A child was reaped; it is no longer waitable.
    pub fn remove_bg_pid(&mut self, pid: i32) {
        let text = pid.to_string();
        let apids: Vec<String> = self
            .vars
            .get("apids")
            .map(|v| v.iter().filter(|p| **p != text).cloned().collect())
            .unwrap_or_default();
        self.vars.set("apids", apids, false);
    }

    pub fn bg_pids(&self) -> Vec<i32> {
        self.vars
            .get("apids")
            .map(|v| v.iter().filter_map(|p| p.parse().ok()).collect())
            .unwrap_or_default()
    }
}
