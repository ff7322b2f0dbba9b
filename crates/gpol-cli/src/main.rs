//! # gpol CLI entry point
//!
//! Parses command-line arguments, resolves the configuration, and dispatches
//! to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gpol_cli::inspect::{run_applied, run_last_update, AppliedArgs, LastUpdateArgs};
use gpol_cli::load_config;
use gpol_cli::rules::{run_rules, RulesArgs};

/// Inspect the group policies applied on this host.
#[derive(Parser, Debug)]
#[command(name = "gpol", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root cache directory, overriding the configuration.
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Local machine identity, overriding the configuration and hostname.
    #[arg(long, global = true)]
    machine_name: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Merge a policy file and print the effective rules.
    Rules(RulesArgs),

    /// Show the policies applied to a user or to the machine.
    Applied(AppliedArgs),

    /// Print when policies were last applied to a user or to the machine.
    LastUpdate(LastUpdateArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = load_config(cli.config.as_deref(), cli.cache_dir, cli.machine_name).and_then(
        |config| match &cli.command {
            Commands::Rules(args) => run_rules(args),
            Commands::Applied(args) => run_applied(args, &config),
            Commands::LastUpdate(args) => run_last_update(args, &config),
        },
    );

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
