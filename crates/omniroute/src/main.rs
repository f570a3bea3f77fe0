// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Omniroute - omnichannel conversation routing and dispatch for CRM messaging.
//!
//! This is the binary entry point for the Omniroute gateway.

mod serve;

use clap::{Parser, Subcommand};

/// Omniroute - omnichannel messaging gateway.
#[derive(Parser, Debug)]
#[command(name = "omniroute", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gateway server.
    Serve,
    /// Print the effective merged configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup
    let config = match omniroute_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            omniroute_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run(config).await {
                eprintln!("omniroute serve: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => match toml::to_string_pretty(&config) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => {
                eprintln!("omniroute config: failed to render: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("omniroute: use --help for available commands");
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn binary_loads_config_defaults() {
        // Verify config loads with defaults (no config file needed)
        let config = omniroute_config::load_and_validate_str("")
            .expect("default config should be valid");
        assert_eq!(config.gateway.port, 8975);
    }
}
