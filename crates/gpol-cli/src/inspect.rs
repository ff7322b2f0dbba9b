//! # Applied Policy Subcommands
//!
//! `gpol applied` and `gpol last-update` read the policy cache written by the
//! agent's apply cycles.

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use clap::Args;

use gpol_policies::{CacheStore, Inspector, ManagerConfig};

/// Arguments for the `gpol applied` subcommand.
#[derive(Args, Debug)]
pub struct AppliedArgs {
    /// User or machine to report on. Defaults to the local machine.
    #[arg(value_name = "TARGET")]
    pub target: Option<String>,

    /// Show the rules of each GPO, not only its name.
    #[arg(long)]
    pub details: bool,

    /// Also show rules overridden by a closer GPO. Implies --details.
    #[arg(long)]
    pub all: bool,
}

/// Arguments for the `gpol last-update` subcommand.
#[derive(Args, Debug)]
pub struct LastUpdateArgs {
    /// User whose last update to print.
    #[arg(value_name = "TARGET", required_unless_present = "machine")]
    pub target: Option<String>,

    /// Print the local machine's last update instead.
    #[arg(long, conflicts_with = "target")]
    pub machine: bool,
}

/// Open the cache of `config` for reading. Nothing is created: a host that
/// never applied policies has no cache directory.
pub fn inspector(config: &ManagerConfig) -> Result<Inspector> {
    let dir = config.policies_cache_dir();
    let cache = CacheStore::open_existing(&dir).with_context(|| {
        format!("no policy cache at {}; were policies ever applied?", dir.display())
    })?;
    let machine_name = config
        .resolve_machine_name()
        .context("failed to determine the machine name")?;
    Ok(Inspector::new(cache, machine_name))
}

/// Execute the applied subcommand.
pub fn run_applied(args: &AppliedArgs, config: &ManagerConfig) -> Result<u8> {
    let inspector = inspector(config)?;
    print!("{}", render_applied(&inspector, args)?);
    Ok(0)
}

/// Report of the policies applying to the requested target.
pub fn render_applied(inspector: &Inspector, args: &AppliedArgs) -> Result<String> {
    let target = args
        .target
        .as_deref()
        .unwrap_or_else(|| inspector.machine_name());
    let report = inspector.dump_policies(target, args.details || args.all, args.all)?;
    Ok(report)
}

/// Execute the last-update subcommand.
pub fn run_last_update(args: &LastUpdateArgs, config: &ManagerConfig) -> Result<u8> {
    let inspector = inspector(config)?;
    println!("{}", render_last_update(&inspector, args)?);
    Ok(0)
}

/// RFC 3339 timestamp of the requested target's last update.
pub fn render_last_update(inspector: &Inspector, args: &LastUpdateArgs) -> Result<String> {
    let target = args.target.as_deref().unwrap_or_default();
    let updated = inspector.last_update_for(target, args.machine)?;
    Ok(updated.to_rfc3339_opts(SecondsFormat::Secs, true))
}
