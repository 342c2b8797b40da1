//! Configuration loading and resolution
//!
//! Analysis settings come from a TOML file resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. `LTA_CONFIG` environment variable
//! 3. Platform config file (`~/.config/lta/config.toml` on Linux)
//! 4. Compiled defaults (fallback)
//!
//! A missing file at tiers 2–3 is not an error: a warning is logged and the
//! defaults are used. A file named explicitly on the command line must exist.
//! `LTA_MIN_TRIAL_SECONDS` overrides the threshold from any tier.

use crate::normalize::CodecMap;
use crate::stats::DEFAULT_ALPHA;
use crate::tabulate::ReferencePolicy;
use crate::validate::{ValidityRules, DEFAULT_MIN_PLAYS, DEFAULT_MIN_TRIAL_SECONDS};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "LTA_CONFIG";

/// Environment variable overriding the minimum trial duration
pub const MIN_TRIAL_SECONDS_ENV: &str = "LTA_MIN_TRIAL_SECONDS";

/// Analysis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Minimum seconds a subject must spend on a trial
    pub min_trial_seconds: f64,
    /// Minimum plays of every test file in a trial
    pub min_plays: u32,
    /// Significance level of confidence intervals
    pub alpha: f64,
    /// Reference row handling for differential (BS-1116) tables
    pub reference_policy: ReferencePolicy,
    /// Search the input directory recursively
    pub recursive: bool,
    /// Optional file mapping extracted names to canonical codec labels
    pub codec_map: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_trial_seconds: DEFAULT_MIN_TRIAL_SECONDS,
            min_plays: DEFAULT_MIN_PLAYS,
            alpha: DEFAULT_ALPHA,
            reference_policy: ReferencePolicy::default(),
            recursive: false,
            codec_map: None,
        }
    }
}

impl AnalysisConfig {
    pub fn validity_rules(&self) -> ValidityRules {
        ValidityRules {
            min_trial_seconds: self.min_trial_seconds,
            min_plays: self.min_plays,
        }
    }

    /// Reject settings no analysis can run with
    pub fn validate(&self) -> Result<()> {
        if !self.min_trial_seconds.is_finite() || self.min_trial_seconds < 0.0 {
            return Err(Error::Config(format!(
                "min_trial_seconds must be a non-negative number, got {}",
                self.min_trial_seconds
            )));
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(Error::Config(format!(
                "alpha must be in (0, 1), got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

/// Parse a TOML config file
pub fn load_config(path: &Path) -> Result<AnalysisConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AnalysisConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Platform config file location, if the platform has a config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lta").join("config.toml"))
}

/// Resolve the analysis config following the 4-tier priority order
pub fn resolve_config(cli_path: Option<&Path>) -> Result<AnalysisConfig> {
    // Priority 1: Command-line argument
    let mut config = if let Some(path) = cli_path {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        info!("Loading config from {}", path.display());
        load_config(path)?
    } else {
        load_optional(
            std::env::var(CONFIG_ENV)
                .ok()
                .map(PathBuf::from)
                .or_else(default_config_path),
        )?
    };

    if let Ok(value) = std::env::var(MIN_TRIAL_SECONDS_ENV) {
        config.min_trial_seconds = value.trim().parse().map_err(|_| {
            Error::Config(format!("{} is not a number: {}", MIN_TRIAL_SECONDS_ENV, value))
        })?;
        info!(
            "Minimum trial duration overridden by {}: {}",
            MIN_TRIAL_SECONDS_ENV, config.min_trial_seconds
        );
    }

    config.validate()?;
    Ok(config)
}

// Priority 2-4: file from environment or platform default, else compiled defaults
fn load_optional(path: Option<PathBuf>) -> Result<AnalysisConfig> {
    match path {
        Some(path) if path.exists() => {
            info!("Loading config from {}", path.display());
            load_config(&path)
        }
        Some(path) => {
            warn!(
                "Config file {} not found, using default settings",
                path.display()
            );
            Ok(AnalysisConfig::default())
        }
        None => {
            warn!("No config directory available, using default settings");
            Ok(AnalysisConfig::default())
        }
    }
}

/// Load a codec map: JSON for `.json` files, TOML otherwise
pub fn load_codec_map(path: &Path) -> Result<CodecMap> {
    let content = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let map: CodecMap = if is_json {
        serde_json::from_str(&content)?
    } else {
        toml::from_str(&content)?
    };

    info!(entries = map.len(), "Loaded codec map from {}", path.display());
    Ok(map)
}
