// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mensager - realtime inbox for WhatsApp conversations.
//!
//! This is the binary entry point.

mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mensager_config::MensagerConfig;

/// Mensager - realtime inbox for WhatsApp conversations.
#[derive(Parser, Debug)]
#[command(name = "mensager", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server.
    Serve,
    /// Load and validate configuration, then exit.
    CheckConfig,
}

fn load(path: Option<&PathBuf>) -> MensagerConfig {
    let loaded = match path {
        Some(path) => mensager_config::load_and_validate_path(path),
        None => mensager_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            mensager_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve) => {
            let config = load(cli.config.as_ref());
            if let Err(errors) = mensager_config::validation::validate_for_serve(&config) {
                mensager_config::render_errors(&errors);
                std::process::exit(1);
            }
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("mensager: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig) => {
            let config = load(cli.config.as_ref());
            println!(
                "mensager: config OK (listen={}:{}, database={})",
                config.server.host, config.server.port, config.storage.database_path
            );
        }
        None => {
            println!("mensager: use --help for available commands");
        }
    }
}
