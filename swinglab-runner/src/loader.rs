//! Record Loader — snapshots, outcomes, and snapshot items for one lookback window.
//!
//! The external store is reached through [`RecordStore`]. Three backends exist:
//! - [`JsonExportStore`]: a directory holding `snapshots.json`, `outcomes.json`
//!   and `snapshot_items.json`
//! - [`HttpStore`]: an export API queried with a blocking client and a timeout
//! - [`MemoryStore`]: rows held in memory
//!
//! [`load_window`] issues the three queries concurrently, then fingerprints
//! the loaded rows so two runs can prove they saw the same window. Any store
//! failure (including a timeout) fails the whole load; there is no partial
//! result.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use swinglab_core::{Outcome, Snapshot, SnapshotItem};
use thiserror::Error;
use tracing::{debug, info};

pub const SNAPSHOTS_FILE: &str = "snapshots.json";
pub const OUTCOMES_FILE: &str = "outcomes.json";
pub const SNAPSHOT_ITEMS_FILE: &str = "snapshot_items.json";

/// Errors from the record loading layer. All are fatal for a run.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed export {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("store request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    #[error("store unreachable at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("store returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("failed to decode store response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("failed to fingerprint loaded rows: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// Read-only access to the external record store.
///
/// `outcomes_since` returns outcomes inner-joined to snapshots with
/// `snapshotTime >= from`; each returned outcome carries its snapshot's label.
pub trait RecordStore: Send + Sync {
    fn snapshots_since(&self, from: DateTime<Utc>) -> Result<Vec<Snapshot>, LoadError>;
    fn outcomes_since(&self, from: DateTime<Utc>) -> Result<Vec<Outcome>, LoadError>;
    fn snapshot_items(&self) -> Result<Vec<SnapshotItem>, LoadError>;
}

/// Everything one report run reads.
#[derive(Debug, Clone)]
pub struct LoadedRecords {
    pub window_start: DateTime<Utc>,
    pub snapshots: Vec<Snapshot>,
    pub outcomes: Vec<Outcome>,
    pub snapshot_items: Vec<SnapshotItem>,
    /// BLAKE3 over all loaded rows, independent of row order.
    pub dataset_hash: String,
}

impl LoadedRecords {
    pub fn from_parts(
        window_start: DateTime<Utc>,
        snapshots: Vec<Snapshot>,
        outcomes: Vec<Outcome>,
        snapshot_items: Vec<SnapshotItem>,
    ) -> Result<Self, LoadError> {
        let dataset_hash = compute_dataset_hash(&snapshots, &outcomes, &snapshot_items)?;
        Ok(Self {
            window_start,
            snapshots,
            outcomes,
            snapshot_items,
            dataset_hash,
        })
    }
}

/// Start of the lookback window.
pub fn window_start(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - chrono::Duration::days(days)
}

/// Load all rows for `[now - days, now]`.
pub fn load_window(
    store: &dyn RecordStore,
    now: DateTime<Utc>,
    days: i64,
) -> Result<LoadedRecords, LoadError> {
    let from = window_start(now, days);
    info!(%from, days, "loading records");

    let (snapshots, (outcomes, items)) = rayon::join(
        || store.snapshots_since(from),
        || rayon::join(|| store.outcomes_since(from), || store.snapshot_items()),
    );
    let snapshots = snapshots?;
    let outcomes = outcomes?;
    let items = items?;

    info!(
        snapshots = snapshots.len(),
        setups = snapshots.iter().map(|s| s.setups.len()).sum::<usize>(),
        outcomes = outcomes.len(),
        snapshot_items = items.len(),
        "records loaded"
    );
    LoadedRecords::from_parts(from, snapshots, outcomes, items)
}

/// Deterministic BLAKE3 hash over snapshots, outcomes and snapshot items.
///
/// Rows are hashed in sorted order so store row order does not change it.
fn compute_dataset_hash(
    snapshots: &[Snapshot],
    outcomes: &[Outcome],
    items: &[SnapshotItem],
) -> Result<String, serde_json::Error> {
    let mut hasher = blake3::Hasher::new();
    hash_section(&mut hasher, "snapshots", snapshots)?;
    hash_section(&mut hasher, "outcomes", outcomes)?;
    hash_section(&mut hasher, "snapshot_items", items)?;
    Ok(hasher.finalize().to_hex().to_string())
}

fn hash_section<T: Serialize>(
    hasher: &mut blake3::Hasher,
    tag: &str,
    rows: &[T],
) -> Result<(), serde_json::Error> {
    let mut encoded = rows
        .iter()
        .map(serde_json::to_vec)
        .collect::<Result<Vec<_>, _>>()?;
    encoded.sort();
    hasher.update(tag.as_bytes());
    hasher.update(&(encoded.len() as u64).to_le_bytes());
    for row in &encoded {
        hasher.update(&(row.len() as u64).to_le_bytes());
        hasher.update(row);
    }
    Ok(())
}

// ── In-memory store ──────────────────────────────────────────────────

/// Rows held in memory. Applies the same window semantics as the SQL store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub snapshots: Vec<Snapshot>,
    pub outcomes: Vec<Outcome>,
    pub snapshot_items: Vec<SnapshotItem>,
}

impl MemoryStore {
    pub fn new(
        snapshots: Vec<Snapshot>,
        outcomes: Vec<Outcome>,
        snapshot_items: Vec<SnapshotItem>,
    ) -> Self {
        Self {
            snapshots,
            outcomes,
            snapshot_items,
        }
    }
}

impl RecordStore for MemoryStore {
    fn snapshots_since(&self, from: DateTime<Utc>) -> Result<Vec<Snapshot>, LoadError> {
        Ok(snapshots_in_window(&self.snapshots, from))
    }

    fn outcomes_since(&self, from: DateTime<Utc>) -> Result<Vec<Outcome>, LoadError> {
        Ok(join_outcomes_to_window(&self.snapshots, &self.outcomes, from))
    }

    fn snapshot_items(&self) -> Result<Vec<SnapshotItem>, LoadError> {
        Ok(self.snapshot_items.clone())
    }
}

fn snapshots_in_window(snapshots: &[Snapshot], from: DateTime<Utc>) -> Vec<Snapshot> {
    snapshots
        .iter()
        .filter(|s| s.snapshot_time >= from)
        .cloned()
        .collect()
}

/// Inner join of outcomes to in-window snapshots, stamping the snapshot label.
fn join_outcomes_to_window(
    snapshots: &[Snapshot],
    outcomes: &[Outcome],
    from: DateTime<Utc>,
) -> Vec<Outcome> {
    let labels: HashMap<&str, Option<&String>> = snapshots
        .iter()
        .filter(|s| s.snapshot_time >= from)
        .map(|s| (s.id.as_str(), s.label.as_ref()))
        .collect();

    outcomes
        .iter()
        .filter_map(|o| {
            let label = labels.get(o.snapshot_id.as_str())?;
            let mut row = o.clone();
            row.label = label.cloned();
            Some(row)
        })
        .collect()
}

// ── JSON export store ────────────────────────────────────────────────

/// A directory export of the three tables as JSON arrays.
#[derive(Debug, Clone)]
pub struct JsonExportStore {
    dir: PathBuf,
}

impl JsonExportStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_array<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>, LoadError> {
        let path = self.dir.join(file);
        let content = std::fs::read_to_string(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        let rows: Vec<T> = serde_json::from_str(&content)
            .map_err(|source| LoadError::Malformed { path: path.clone(), source })?;
        debug!(path = %path.display(), rows = rows.len(), "read export file");
        Ok(rows)
    }
}

impl RecordStore for JsonExportStore {
    fn snapshots_since(&self, from: DateTime<Utc>) -> Result<Vec<Snapshot>, LoadError> {
        let all: Vec<Snapshot> = self.read_array(SNAPSHOTS_FILE)?;
        Ok(snapshots_in_window(&all, from))
    }

    fn outcomes_since(&self, from: DateTime<Utc>) -> Result<Vec<Outcome>, LoadError> {
        let snapshots: Vec<Snapshot> = self.read_array(SNAPSHOTS_FILE)?;
        let outcomes: Vec<Outcome> = self.read_array(OUTCOMES_FILE)?;
        Ok(join_outcomes_to_window(&snapshots, &outcomes, from))
    }

    fn snapshot_items(&self) -> Result<Vec<SnapshotItem>, LoadError> {
        self.read_array(SNAPSHOT_ITEMS_FILE)
    }
}

// ── HTTP store ───────────────────────────────────────────────────────

/// Export API over HTTP.
///
/// Endpoints (relative to `base_url`): `snapshots?from=<iso>`,
/// `outcomes?from=<iso>` (already joined and labelled server-side), and
/// `snapshot-items`. Each returns a JSON array.
pub struct HttpStore {
    client: reqwest::blocking::Client,
    base_url: String,
    timeout_secs: u64,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, LoadError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("swinglab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LoadError::Client(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_secs,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn get_array<T: DeserializeOwned>(&self, url: String) -> Result<Vec<T>, LoadError> {
        debug!(%url, "store request");
        let resp = self.client.get(&url).send().map_err(|e| {
            if e.is_timeout() {
                LoadError::Timeout {
                    url: url.clone(),
                    timeout_secs: self.timeout_secs,
                }
            } else {
                LoadError::Unreachable {
                    url: url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                url,
                status: status.as_u16(),
            });
        }

        resp.json::<Vec<T>>().map_err(|e| {
            if e.is_timeout() {
                LoadError::Timeout {
                    url: url.clone(),
                    timeout_secs: self.timeout_secs,
                }
            } else {
                LoadError::Decode {
                    url: url.clone(),
                    reason: e.to_string(),
                }
            }
        })
    }
}

impl RecordStore for HttpStore {
    fn snapshots_since(&self, from: DateTime<Utc>) -> Result<Vec<Snapshot>, LoadError> {
        self.get_array(self.url(&format!("snapshots?from={}", iso(from))))
    }

    fn outcomes_since(&self, from: DateTime<Utc>) -> Result<Vec<Outcome>, LoadError> {
        self.get_array(self.url(&format!("outcomes?from={}", iso(from))))
    }

    fn snapshot_items(&self) -> Result<Vec<SnapshotItem>, LoadError> {
        self.get_array(self.url("snapshot-items"))
    }
}

fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
