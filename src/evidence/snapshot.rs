//! JSON run snapshot: `{ metrics, permanent, staleEligibilities, longActivations }`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::EvidenceError;
use crate::pim::AuditReport;

/// Snapshot file for a run timestamp.
pub fn snapshot_path(dir: &Path, timestamp: &str) -> PathBuf {
    dir.join(format!("pim-snapshot-{}.json", timestamp))
}

/// Write `report` as pretty JSON, named after its run timestamp.
pub fn write_snapshot(dir: &Path, report: &AuditReport) -> Result<PathBuf, EvidenceError> {
    fs::create_dir_all(dir)?;

    let path = snapshot_path(dir, &report.metrics.timestamp);
    let content = serde_json::to_string_pretty(report)?;
    fs::write(&path, content)?;

    debug!("Saved snapshot to {:?}", path);
    Ok(path)
}

/// Newest snapshot in `dir`, if any. Run timestamps sort lexicographically.
pub fn latest_snapshot(dir: &Path) -> Result<Option<PathBuf>, EvidenceError> {
    if !dir.exists() {
        return Ok(None);
    }

    let mut latest: Option<PathBuf> = None;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_snapshot = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("pim-snapshot-") && n.ends_with(".json"));
        if !is_snapshot || latest.as_ref().is_some_and(|current| *current >= path) {
            continue;
        }
        latest = Some(path);
    }

    Ok(latest)
}

/// Read a snapshot written by an earlier run.
pub fn load_snapshot(path: &Path) -> Result<AuditReport, EvidenceError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
