// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MyPortal integration core.
//!
//! Binary entry point: loads configuration, then runs the requested
//! subcommand.

use clap::{Parser, Subcommand};

mod serve;
mod shutdown;

/// MyPortal integration core: module dispatch, webhook events, email tracking.
#[derive(Parser, Debug)]
#[command(name = "myportal", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the integration core server.
    Serve,
    /// Load and validate configuration, then exit.
    CheckConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match myportal_config::load_and_validate() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("myportal: configuration error: {err}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(err) = serve::run_serve(config).await {
                eprintln!("myportal serve: {err}");
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig) => {
            println!(
                "myportal: config ok (server={}:{}, database={})",
                config.server.host, config.server.port, config.storage.database_path
            );
        }
        None => {
            println!("myportal: use --help for available commands");
        }
    }
}
