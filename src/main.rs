use std::io::Write;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;
use viking::cli::Cli;
use viking::commands::{self, OpenError};

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        // Help goes to stdout; missing a subcommand is still a usage error.
        let _ = Cli::command().print_help();
        return ExitCode::FAILURE;
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let result = commands::run(command, &cli.data_dir, &mut out);
    let _ = out.flush();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<OpenError>() {
                Some(open) => {
                    eprintln!("ERROR: {open}");
                    if let Some(hint) = open.hint() {
                        eprintln!("{hint}");
                    }
                }
                None => eprintln!("ERROR: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
