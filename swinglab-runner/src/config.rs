//! Run configuration — `swinglab.toml` plus per-report filter parameters.
//!
//! The file is optional and every section defaults. CLI flags are applied on
//! top of the loaded file by the binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use swinglab_core::normalize::{parse_label_filter, NULL_LABEL};
use swinglab_core::DecisionPolicy;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("store kind 'http' requires store.base_url")]
    MissingBaseUrl,

    #[error("--days must be at least 1 (got {0})")]
    InvalidDays(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Json,
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// Export directory for the JSON store.
    pub path: PathBuf,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Json,
            path: PathBuf::from("exports"),
            base_url: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("artifacts/phase1"),
        }
    }
}

/// Top-level `swinglab.toml`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SwingLabConfig {
    pub store: StoreConfig,
    pub output: OutputConfig,
    pub policy: DecisionPolicy,
}

impl SwingLabConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        if config.store.kind == StoreKind::Http && config.store.base_url.is_none() {
            return Err(ConfigError::MissingBaseUrl);
        }
        Ok(config)
    }
}

/// Resolved report filters, echoed into every report's `params`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFilter {
    pub days: i64,
    /// Lowercased asset ids. Empty means all assets.
    pub assets: Vec<String>,
    pub timeframes: Vec<String>,
    pub labels: Vec<String>,
    pub min_closed: u64,
    pub allow_derived_playbook_fallback: bool,
    pub include_open_only: bool,
}

impl Default for ReportFilter {
    fn default() -> Self {
        Self {
            days: 30,
            assets: Vec::new(),
            timeframes: vec!["1d".to_string(), "1w".to_string()],
            labels: vec![
                "eod".to_string(),
                "us_open".to_string(),
                "morning".to_string(),
                NULL_LABEL.to_string(),
            ],
            min_closed: 20,
            allow_derived_playbook_fallback: false,
            include_open_only: false,
        }
    }
}

impl ReportFilter {
    /// Normalize user-supplied lists so they compare against normalized records.
    pub fn normalized(mut self) -> Result<Self, ConfigError> {
        if self.days < 1 {
            return Err(ConfigError::InvalidDays(self.days));
        }
        self.assets = dedup(self.assets.iter().map(|a| a.trim().to_lowercase()));
        self.timeframes = dedup(self.timeframes.iter().map(|t| t.trim().to_lowercase()));
        self.labels = dedup(self.labels.iter().map(|l| parse_label_filter(l)));
        Ok(self)
    }

    pub fn accepts_asset(&self, asset: &str) -> bool {
        self.assets.is_empty() || self.assets.iter().any(|a| a == asset)
    }

    pub fn accepts_timeframe(&self, timeframe: &str) -> bool {
        self.timeframes.iter().any(|t| t == timeframe)
    }

    pub fn accepts_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
