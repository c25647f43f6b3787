// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Nudge - user engagement lifecycle engine.
//!
//! Binary entry point: the scheduler daemon plus one-shot job and
//! operator commands.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod app;
mod commands;
mod scheduler;
mod serve;
mod shutdown;
mod status;

use clap::{Parser, Subcommand};

use crate::app::JobKind;

/// Nudge - user engagement lifecycle engine.
#[derive(Parser, Debug)]
#[command(name = "nudge", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the built-in scheduler until SIGINT/SIGTERM.
    Serve,
    /// Run one job now and exit.
    Run {
        /// Job to run.
        #[arg(value_enum)]
        job: JobKind,
        /// Print the job result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Record activity for a user, re-engaging them if needed.
    Activity {
        user_id: String,
        /// Answer to the goodbye message ("1", "2" or "3").
        #[arg(long)]
        reply: Option<String>,
    },
    /// Signal that a user completed an onboarding tier.
    Tier {
        user_id: String,
        #[arg(value_parser = clap::value_parser!(u8).range(1..=3))]
        tier: u8,
    },
    /// Show lifecycle and queue counts plus adapter health.
    Status {
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match nudge_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            nudge_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    serve::init_tracing(&config.engine.log_level);

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Run { job, json } => commands::run_job(config, job, json).await,
        Commands::Activity { user_id, reply } => {
            commands::record_activity(config, &user_id, reply.as_deref()).await
        }
        Commands::Tier { user_id, tier } => commands::complete_tier(config, &user_id, tier).await,
        Commands::Status { json, plain } => status::run_status(config, json, plain).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
