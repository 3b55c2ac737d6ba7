//! TOML configuration and its merge with command-line flags.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use zone_harvest_toolbox::{CheckKind, CheckOptions, CheckRequest};

use crate::cli::{CheckSelection, Cli, expand_checks};

/// Nameserver used when neither the command line nor the file names one.
pub const DEFAULT_NAMESERVER: &str = "8.8.8.8";

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct HarvestConfig {
    pub nameserver: String,
    pub checks: Vec<CheckSelection>,
    pub compact: bool,
    /// `[options]` table.
    pub options: CheckOptions,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            nameserver: DEFAULT_NAMESERVER.to_string(),
            checks: Vec::new(),
            compact: false,
            options: CheckOptions::default(),
        }
    }
}

impl HarvestConfig {
    /// Read a config file from `path`.
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    fn from_toml(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text)?;
        anyhow::ensure!(
            config.options.timeout_secs >= 1,
            "options.timeout-secs must be at least 1"
        );
        Ok(config)
    }
}

/// `<config dir>/zone-harvest/config.toml`, when the platform has a config
/// directory.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("zone-harvest").join("config.toml"))
}

/// Load the explicitly requested file, else the default file if present,
/// else built-in defaults.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<HarvestConfig> {
    if let Some(path) = explicit {
        return HarvestConfig::read(path);
    }
    match default_path() {
        Some(path) if path.is_file() => {
            tracing::debug!("Using config file {}", path.display());
            HarvestConfig::read(&path)
        }
        _ => Ok(HarvestConfig::default()),
    }
}

/// Effective settings after command-line flags override the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub nameserver: String,
    pub checks: Vec<CheckKind>,
    pub compact: bool,
    pub output: Option<PathBuf>,
    pub options: CheckOptions,
}

impl Settings {
    pub fn resolve(cli: &Cli, config: HarvestConfig) -> Self {
        let selections = if cli.checks.is_empty() {
            config.checks
        } else {
            cli.checks.clone()
        };
        let mut checks = expand_checks(&selections);
        if checks.is_empty() {
            checks.push(CheckKind::Dnssec);
        }

        let mut options = config.options;
        if let Some(timeout) = cli.timeout {
            options.timeout_secs = timeout;
        }
        if let Some(selector) = &cli.dkim_selector {
            options.dkim_selector = Some(selector.clone());
        }

        Self {
            nameserver: cli.nameserver.clone().unwrap_or(config.nameserver),
            checks,
            compact: cli.compact || config.compact,
            output: cli.output.clone(),
            options,
        }
    }

    /// One request per domain and check, domain-major.
    pub fn requests(&self, domains: &[String]) -> Vec<CheckRequest> {
        domains
            .iter()
            .flat_map(|domain| {
                self.checks
                    .iter()
                    .map(move |kind| CheckRequest::new(domain.as_str(), *kind))
            })
            .collect()
    }
}
