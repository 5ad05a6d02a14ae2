// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! shmbench CLI
//!
//! Both sides of the bounded-buffer throughput benchmark and of the
//! request/reply event statistics mailbox, each run as its own process.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod settings;
mod shutdown;

/// shmbench - shared memory IPC throughput benchmark
#[derive(Parser)]
#[command(name = "shmbench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (shmbench.yaml is used if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides shared by every command that touches a region.
#[derive(clap::Args, Debug, Default)]
pub struct RunArgs {
    /// Microseconds to sleep between polls (0 = spin)
    #[arg(long)]
    pub sleep_us: Option<u64>,

    /// Directory to write a JSON run report into
    #[arg(long)]
    pub report_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a ring buffer region and drain it (consumer)
    BbServer {
        /// Shared memory region name
        region: Option<String>,

        /// Ring slot count
        #[arg(long)]
        capacity: Option<usize>,

        /// Stop after this many items instead of waiting for Ctrl+C
        #[arg(long)]
        budget: Option<u64>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Attach to a ring buffer region and fill it (producer)
    BbClient {
        /// Shared memory region name
        region: Option<String>,

        /// Items to transfer
        count: Option<u64>,

        /// Ring slot count; must match the server
        #[arg(long)]
        capacity: Option<usize>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Create a mailbox region and serve event statistics requests
    ShmemServer {
        /// Shared memory region name
        region: Option<String>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Attach to a mailbox region and send requests
    ShmemClient {
        /// Shared memory region name
        region: String,

        #[command(flatten)]
        run: RunArgs,

        #[command(subcommand)]
        action: MailboxAction,
    },

    /// Remove a region left behind by a killed server
    Destroy {
        /// Shared memory region name
        region: String,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum MailboxAction {
    /// Register an event type
    Register {
        id: i64,
        /// One-word event name
        name: String,
        /// Event description
        description: String,
    },

    /// Report one occurrence of an event type
    Report { id: i64 },

    /// Print the statistics table and zero an event type's counter
    Reset { id: i64 },

    /// Time `count` report round trips
    Experiment {
        /// Round trips (defaults to the configured count)
        count: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    // Dispatch to command handlers
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::BbServer {
            region,
            capacity,
            budget,
            run,
        } => {
            let config = settings::load(config_path)?;
            let options = settings::RunOptions::resolve(&config, region, None, capacity, &run)?;
            commands::bb_server::execute(options, budget).await
        }
        Commands::BbClient {
            region,
            count,
            capacity,
            run,
        } => {
            let config = settings::load(config_path)?;
            let options = settings::RunOptions::resolve(&config, region, count, capacity, &run)?;
            commands::bb_client::execute(options).await
        }
        Commands::ShmemServer { region, run } => {
            let config = settings::load(config_path)?;
            let options = settings::RunOptions::resolve(&config, region, None, None, &run)?;
            commands::shmem_server::execute(options).await
        }
        Commands::ShmemClient {
            region,
            run,
            action,
        } => {
            let config = settings::load(config_path)?;
            let count = match &action {
                MailboxAction::Experiment { count } => *count,
                _ => None,
            };
            let options =
                settings::RunOptions::resolve(&config, Some(region), count, None, &run)?;
            commands::shmem_client::execute(options, action).await
        }
        Commands::Destroy { region } => commands::destroy::execute(&region).await,
        Commands::Validate { file } => commands::validate::execute(&file).await,
    }
}
