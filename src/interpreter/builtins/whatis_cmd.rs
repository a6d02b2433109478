//! whatis - Say how a name would resolve
//!
//! Variables print as assignments, functions as definitions, builtins
//! and externals by where they live. Unresolvable names fail.

use crate::ast::quote_word;
use crate::interpreter::builtins::{self, succeed};
use crate::interpreter::errors::Result;
use crate::interpreter::status::Status;
use crate::interpreter::types::ShellState;
use crate::which::{printable, which};

pub fn run(shell: &mut ShellState, args: &[String]) -> Result<()> {
    let mut all_found = true;
    for name in args {
        if let Some(values) = shell.vars.get(name) {
            if values.len() == 1 {
                println!("{}={}", quote_word(name), quote_word(&values[0]));
            } else {
                let quoted: Vec<String> = values.iter().map(|v| quote_word(v)).collect();
                println!("{}=({})", quote_word(name), quoted.join(" "));
            }
            continue;
        }
        if let Some(body) = shell.funcs.get(name) {
            println!("fn {} {}", quote_word(name), body);
            continue;
        }
        if builtins::is_builtin(name) {
            println!("builtin {}", name);
            continue;
        }
        if let Some(path) = which(Some(name), false, &shell.vars, &mut shell.path_cache) {
            println!("{}", path);
            continue;
        }
        eprintln!("rc: {} not found", printable(name));
        all_found = false;
    }
    if all_found {
        succeed(shell)
    } else {
        shell.set_status(Status::Done(1))
    }
}
