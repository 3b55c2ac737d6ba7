//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use zone_harvest_toolbox::CheckKind;

#[derive(Parser, Debug)]
#[command(name = "zone-harvest")]
#[command(version)]
#[command(about = "DNSSEC chain-of-trust and DNS health checks", long_about = None)]
pub struct Cli {
    /// Domains to check
    #[arg(value_name = "DOMAIN", required = true)]
    pub domains: Vec<String>,

    /// Starting nameserver, IP address or hostname (default: 8.8.8.8)
    #[arg(short, long, value_name = "SERVER")]
    pub nameserver: Option<String>,

    /// Check to run; repeat for several (default: dnssec)
    #[arg(short = 'c', long = "check", value_enum, value_name = "CHECK")]
    pub checks: Vec<CheckSelection>,

    /// Configuration file (default: <config dir>/zone-harvest/config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write output to file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Single-line JSON output
    #[arg(long)]
    pub compact: bool,

    /// Per-attempt query timeout in seconds, at least 1
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// DKIM selector for the dkim check
    #[arg(long, value_name = "SELECTOR")]
    pub dkim_selector: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// A check name as accepted on the command line and in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckSelection {
    Dnssec,
    Nsec,
    Ns,
    Soa,
    Axfr,
    Mx,
    Spf,
    Dmarc,
    Dkim,
    Tlsa,
    /// Every check
    All,
}

/// Expand `all` and drop duplicates, keeping first-seen order.
pub fn expand_checks(selections: &[CheckSelection]) -> Vec<CheckKind> {
    let mut kinds = Vec::new();
    for selection in selections {
        let expanded: &[CheckKind] = match selection {
            CheckSelection::Dnssec => &[CheckKind::Dnssec],
            CheckSelection::Nsec => &[CheckKind::Nsec],
            CheckSelection::Ns => &[CheckKind::Ns],
            CheckSelection::Soa => &[CheckKind::Soa],
            CheckSelection::Axfr => &[CheckKind::Axfr],
            CheckSelection::Mx => &[CheckKind::Mx],
            CheckSelection::Spf => &[CheckKind::Spf],
            CheckSelection::Dmarc => &[CheckKind::Dmarc],
            CheckSelection::Dkim => &[CheckKind::Dkim],
            CheckSelection::Tlsa => &[CheckKind::Tlsa],
            CheckSelection::All => &CheckKind::ALL,
        };
        for kind in expanded {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
    }
    kinds
}
