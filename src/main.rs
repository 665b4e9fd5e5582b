//! # roster-sync
//!
//! Keeps the user directory of one or more access-control devices in line
//! with an authoritative personnel roster.
//!
//! Each pass fetches the roster and the primary device's user list,
//! normalizes both into canonical user records, computes the
//! create/update/delete sets, applies them to every target device and
//! publishes a tally of what happened.
//!
//! See `roster-sync --help` for the available commands.

use clap::Parser;
use roster_sync::cli::Cli;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.execute().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
