// SPDX-FileCopyrightText: 2026 Chatportal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chatportal - a real-time chat portal between testers and developers.
//!
//! This is the binary entry point for the chatportal server.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};

mod create_admin;
mod serve;

/// Chatportal - a real-time chat portal between testers and developers.
#[derive(Parser, Debug)]
#[command(name = "chatportal", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the chatportal server.
    Serve,
    /// Provision (or update) an admin account.
    CreateAdmin {
        /// Display name for the admin account.
        #[arg(long)]
        name: String,
        /// Login email, unique across accounts.
        #[arg(long)]
        email: String,
        /// Employee id, unique across accounts.
        #[arg(long)]
        employee_id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup.
    let config = match chatportal_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            chatportal_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::CreateAdmin {
            name,
            email,
            employee_id,
        }) => create_admin::run_create_admin(config, name, email, employee_id).await,
        None => {
            println!("chatportal: use --help for available commands");
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("chatportal: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Verify jemalloc is the global allocator by advancing the epoch.
        // Only jemalloc supports this -- the system allocator would fail.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn binary_loads_config_defaults() {
        // Verify config loads with defaults (no config file needed).
        let config =
            chatportal_config::load_and_validate().expect("default config should be valid");
        assert_eq!(config.server.port, 5000);
    }
}
