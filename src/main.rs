mod cli;

use std::process::ExitCode;

use colored::Colorize;
use schema_unify::Diagnostics;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "schema_unify=debug,info",
        _ => "schema_unify=trace,debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Prints every collected schema error at once, grouped under one header.
fn report(error: &anyhow::Error) {
    let Some(diagnostics) = error.downcast_ref::<Diagnostics>() else {
        eprintln!("{} {error:#}", "error:".red().bold());
        return;
    };
    let count = diagnostics.len();
    let header = format!("{count} schema error{}", if count == 1 { "" } else { "s" });
    eprintln!("{} {header}", "error:".red().bold());
    for diagnostic in diagnostics.iter() {
        let location = diagnostic.location().to_string();
        let full = diagnostic.to_string();
        let message = full.strip_prefix(&format!("{location}: ")).unwrap_or(&full);
        eprintln!("  {} {}", location.cyan(), message);
    }
}

fn main() -> ExitCode {
    let command_line_interface = cli::CommandLineInterface::load();
    init_tracing(command_line_interface.verbose);
    match command_line_interface.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report(&error);
            ExitCode::FAILURE
        }
    }
}
