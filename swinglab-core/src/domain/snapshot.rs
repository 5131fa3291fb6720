//! Snapshots and the snapshot-item existence index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::setup::Setup;

/// The batch of setups produced together at one evaluation timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: String,
    pub snapshot_time: DateTime<Utc>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub setups: Vec<Setup>,
}

/// One row of the snapshot-item table: proof that a setup was written for a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotItem {
    pub snapshot_id: String,
    pub setup_id: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Setup>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<Vec<Setup>> = Option::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}
