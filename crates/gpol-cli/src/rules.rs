//! # Rules Subcommand
//!
//! Merges the GPOs of a serialized policy set (a cache entry or an export in
//! the same format) and prints the effective rules per domain as YAML.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

use gpol_core::{PolicyDomain, RuleMap};
use gpol_policies::cache::read_policies;

/// Arguments for the `gpol rules` subcommand.
#[derive(Args, Debug)]
pub struct RulesArgs {
    /// Policy file to merge.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Only print this domain (e.g. "dconf", "privilege", "gdm").
    #[arg(long)]
    pub domain: Option<String>,
}

/// Execute the rules subcommand.
pub fn run_rules(args: &RulesArgs) -> Result<u8> {
    print!("{}", render_rules(&args.file, args.domain.as_deref())?);
    Ok(0)
}

/// Merged rules of `file` as YAML, optionally restricted to one domain.
pub fn render_rules(file: &Path, domain: Option<&str>) -> Result<String> {
    let policies = read_policies(file)
        .with_context(|| format!("failed to read policies: {}", file.display()))?;
    let mut rules = policies.unique_rules();
    tracing::debug!(gpos = policies.gpos.len(), domains = rules.len(), "policies merged");

    if let Some(domain) = domain {
        if PolicyDomain::from_key(domain).is_none() && !rules.contains_key(domain) {
            bail!("unknown domain: {domain}");
        }
        let selected = rules.remove(domain).unwrap_or_default();
        rules = RuleMap::from([(domain.to_string(), selected)]);
    }

    serde_yaml::to_string(&rules).context("failed to encode rules")
}
