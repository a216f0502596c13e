//! Snapshot persistence for confirmed and qualified proxy sets

use crate::proxy::models::{ConfirmedProxy, ProxyType, QualifiedProxy};
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Snapshot file listing all geo-confirmed proxies
pub const CONFIRMED_FILE: &str = "confirmed_proxies.jsonl";

/// Snapshot file listing proxies that opened the target login page
pub const QUALIFIED_FILE: &str = "qualified_proxies.jsonl";

/// One line of a snapshot file.
///
/// The `qualified` marker lets a reader filter either snapshot without
/// re-running validation; latency and timestamp are present only on
/// qualified records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub proxy: String,
    pub protocol: ProxyType,
    pub country: String,
    pub qualified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

impl From<&ConfirmedProxy> for SnapshotRecord {
    fn from(confirmed: &ConfirmedProxy) -> Self {
        Self {
            proxy: confirmed.proxy.address(),
            protocol: confirmed.proxy.protocol.clone(),
            country: confirmed.country.clone(),
            qualified: false,
            latency_secs: None,
            verified_at: None,
        }
    }
}

impl From<&QualifiedProxy> for SnapshotRecord {
    fn from(qualified: &QualifiedProxy) -> Self {
        Self {
            proxy: qualified.proxy.address(),
            protocol: qualified.proxy.protocol.clone(),
            country: qualified.country.clone(),
            qualified: true,
            latency_secs: Some(qualified.latency_secs),
            verified_at: Some(qualified.verified_at),
        }
    }
}

/// Writes JSON-Lines snapshots, one file per result kind.
///
/// Each write fully replaces the prior snapshot: content is staged to a
/// temporary file and renamed into place. A failed write leaves the previous
/// snapshot untouched.
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Overwrite the confirmed-proxies snapshot
    pub fn write_confirmed(&self, confirmed: &[ConfirmedProxy]) -> Result<()> {
        let records: Vec<SnapshotRecord> = confirmed.iter().map(SnapshotRecord::from).collect();
        self.write_snapshot(CONFIRMED_FILE, &records)
    }

    /// Overwrite the qualified-proxies snapshot
    pub fn write_qualified(&self, qualified: &[QualifiedProxy]) -> Result<()> {
        let records: Vec<SnapshotRecord> = qualified.iter().map(SnapshotRecord::from).collect();
        self.write_snapshot(QUALIFIED_FILE, &records)
    }

    /// Path of a snapshot file inside the store directory
    pub fn path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    fn write_snapshot(&self, file_name: &str, records: &[SnapshotRecord]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating snapshot directory {:?}", self.dir))?;

        let mut content = String::new();
        for record in records {
            content.push_str(&serde_json::to_string(record)?);
            content.push('\n');
        }

        let path = self.path(file_name);
        let tmp = self.path(&format!("{file_name}.tmp"));
        fs::write(&tmp, content).with_context(|| format!("writing snapshot {tmp:?}"))?;
        fs::rename(&tmp, &path).with_context(|| format!("replacing snapshot {path:?}"))?;
        Ok(())
    }
}
