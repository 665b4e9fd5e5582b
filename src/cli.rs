//! # Command Line
//!
//! ```bash
//! # Run as a service: scheduled passes, HTTP trigger, metrics
//! roster-sync run
//!
//! # One pass, print the tally, exit non-zero if anything failed
//! roster-sync --config /etc/roster-sync.yaml once
//!
//! # Show what the next pass would do without touching the devices
//! roster-sync plan
//! ```

use crate::config::SyncConfig;
use crate::controller::reconciler::Plan;
use crate::runtime;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

/// Keeps access-control devices in sync with the personnel roster
#[derive(Debug, Parser)]
#[command(name = "roster-sync", version, about, long_about = None)]
pub struct Cli {
    /// YAML configuration file. Environment variables override its values.
    #[arg(short, long, global = true, env = "ROSTER_SYNC_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run scheduled passes until interrupted
    Run,
    /// Run a single pass and print the tally
    Once,
    /// Print the operations the next pass would apply
    Plan,
}

impl Cli {
    /// Load configuration and execute the selected command
    ///
    /// # Errors
    /// Returns an error on invalid configuration or when a command cannot start
    pub async fn execute(self) -> Result<ExitCode> {
        let config = SyncConfig::load(self.config.as_deref())?;
        runtime::initialize(&config)?;

        match self.command {
            Command::Run => {
                runtime::run_service(config).await?;
                Ok(ExitCode::SUCCESS)
            }
            Command::Once => {
                let report = runtime::run_once(config).await?;
                println!("{report}");
                if report.has_errors() {
                    Ok(ExitCode::FAILURE)
                } else {
                    Ok(ExitCode::SUCCESS)
                }
            }
            Command::Plan => {
                let plan = runtime::run_plan(config).await?;
                print!("{}", render_plan(&plan));
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

/// Human-readable plan, one operation per line
pub fn render_plan(plan: &Plan) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "roster users: {}, device users: {}",
        plan.roster_users, plan.device_users
    );

    for user in &plan.diff.to_create {
        let state = if user.enabled { "enabled" } else { "disabled" };
        let _ = writeln!(out, "+ create {} {:?} ({state})", user.id, user.display_name);
    }
    for user in &plan.diff.to_update {
        let state = if user.enabled { "enabled" } else { "disabled" };
        let _ = writeln!(out, "~ update {} {:?} ({state})", user.id, user.display_name);
    }
    for id in &plan.diff.to_delete {
        let _ = writeln!(out, "- delete {id}");
    }
    for rejected in &plan.rejected {
        let _ = writeln!(out, "! skipped {rejected}");
    }

    let planned = plan.diff.planned();
    let _ = writeln!(
        out,
        "planned: create={} update={} delete={} malformed={}",
        planned.create,
        planned.update,
        planned.delete,
        plan.rejected.len()
    );
    out
}
