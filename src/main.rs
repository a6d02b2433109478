use clap::Parser;
use std::io::IsTerminal;

use rc_shell::shell::{Shell, Source};
use rc_shell::ShellFlags;

#[derive(Parser)]
#[command(name = "rc")]
#[command(about = "A Plan 9 style command shell")]
#[command(version)]
struct Cli {
    /// Run this command and exit
    #[arg(short = 'c')]
    command: Option<String>,

    /// Interactive: prompts and job messages
    #[arg(short = 'i')]
    interactive: bool,

    /// Login shell (reads ~/.rcrc)
    #[arg(short = 'l')]
    login: bool,

    /// Read commands from standard input
    #[arg(short = 's')]
    stdin: bool,

    /// Parse input but execute nothing
    #[arg(short = 'n')]
    noexec: bool,

    /// Do not import functions from the environment
    #[arg(short = 'p')]
    no_fn_import: bool,

    /// Exit when any command returns a non-zero status
    #[arg(short = 'e')]
    errexit: bool,

    /// Echo input as it is read
    #[arg(short = 'v')]
    verbose: bool,

    /// Trace commands before running them
    #[arg(short = 'x')]
    xtrace: bool,

    /// Dump parse trees (debugging)
    #[arg(short = 'd')]
    debug: bool,

    /// Do not overwrite existing files with `>`
    #[arg(short = 'o')]
    noclobber: bool,

    /// Script file and its arguments, or arguments to `-c`
    #[arg()]
    operands: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    let argv0 = std::env::args().next().unwrap_or_else(|| "rc".to_string());
    let envp: Vec<String> = std::env::vars()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();

    // Operands after -c become $1..$n with $0 still the shell itself; a
    // bare operand is the script to run and takes over $0.
    let (source, name, args) = if let Some(cmd) = cli.command.clone() {
        (Source::Command(cmd), argv0.clone(), cli.operands.clone())
    } else if cli.stdin || cli.operands.is_empty() {
        (Source::Stdin, argv0.clone(), cli.operands.clone())
    } else {
        (
            Source::File(cli.operands[0].clone()),
            cli.operands[0].clone(),
            cli.operands[1..].to_vec(),
        )
    };

    let reads_tty = matches!(source, Source::Stdin) && !cli.stdin;
    let flags = ShellFlags {
        interactive: cli.interactive || (reads_tty && std::io::stdin().is_terminal()),
        login: cli.login || argv0.starts_with('-'),
        errexit: cli.errexit,
        verbose: cli.verbose,
        xtrace: cli.xtrace,
        noexec: cli.noexec,
        no_fn_import: cli.no_fn_import,
        noclobber: cli.noclobber,
        debug: cli.debug,
        stdin_read: cli.stdin,
    };

    let mut shell = Shell::new(flags, &name, &args, &envp);
    std::process::exit(shell.run(source));
}
