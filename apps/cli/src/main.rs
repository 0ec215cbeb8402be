//! memsync CLI: one-way sync of Markdown memory files into a Notion database.
//!
//! Exit codes: 0 on full success, 1 when the run completed with per-entry
//! failures, 2 on a fatal startup error.

mod commands;

use std::process::ExitCode;

use clap::Parser;

use commands::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error reporter: {e}");
        return commands::fatal_exit();
    }
    let cli = Cli::parse();
    commands::init_tracing(&cli);

    match commands::run(cli).await {
        Ok(outcome) => outcome.exit_code(),
        Err(report) => {
            eprintln!("Error: {report:?}");
            commands::fatal_exit()
        }
    }
}
