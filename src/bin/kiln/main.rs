//! Kiln CLI - a declarative build-target runner

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Cli;
use kiln::ops::kiln_build::{diagnose, execute};
use kiln::util::diagnostic::emit;
use kiln::util::exit::exit_code_for;
use kiln::util::Shell;

fn main() {
    let cli = Cli::parse();
    let shell = Shell::from_flags(cli.quiet, cli.verbose, cli.color);

    // Set up logging
    let filter = EnvFilter::try_from_env("KILN_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("kiln=debug")
        } else if cli.quiet {
            EnvFilter::new("kiln=warn")
        } else {
            EnvFilter::new("kiln=info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli, &shell) {
        emit(&diagnose(&e), shell.use_color());
        std::process::exit(exit_code_for(&e));
    }
}

fn run(cli: &Cli, shell: &Shell) -> Result<()> {
    let cwd = std::env::current_dir().context("failed to determine the current directory")?;

    let mut out = String::new();
    let result = execute(&cli.build_options(), &cwd, shell, &mut out);
    print!("{}", out);
    result
}
