//! Evidence output: one JSON snapshot per run plus a CSV table per finding list.

pub mod snapshot;
pub mod tables;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::EvidenceError;
use crate::pim::AuditReport;

pub use snapshot::{latest_snapshot, load_snapshot};

/// Paths written by one run.
#[derive(Debug, Clone)]
pub struct EvidenceFiles {
    pub snapshot: PathBuf,
    pub tables: Vec<PathBuf>,
}

/// Writes evidence under a root directory (`<root>/` and `<root>/csv/`).
#[derive(Debug, Clone)]
pub struct EvidenceWriter {
    root: PathBuf,
}

impl EvidenceWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn csv_dir(&self) -> PathBuf {
        self.root.join("csv")
    }

    /// Report from the most recent snapshot under the root, if one exists and parses.
    pub fn previous_report(&self) -> Option<AuditReport> {
        let path = match latest_snapshot(&self.root) {
            Ok(Some(path)) => path,
            Ok(None) => return None,
            Err(e) => {
                warn!("Could not scan {}: {}", self.root.display(), e);
                return None;
            }
        };

        match load_snapshot(&path) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("Ignoring unreadable snapshot {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Write the snapshot and all three tables. Tables are overwritten every run.
    pub fn write(&self, report: &AuditReport) -> Result<EvidenceFiles, EvidenceError> {
        fs::create_dir_all(self.csv_dir())?;

        let snapshot = snapshot::write_snapshot(&self.root, report)?;
        info!("Wrote {}", snapshot.display());

        let tables = tables::write_tables(&self.csv_dir(), report)?;
        info!("Wrote CSVs to {}", self.csv_dir().display());

        Ok(EvidenceFiles { snapshot, tables })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pim::audit::tests::{
        assignment, eligibility, instance, now, StubLookup, GA_ID, SECADMIN_ID,
    };
    use crate::pim::{classify, AuditInput, Policy};
    use chrono::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_creates_layout() {
        let temp_dir = TempDir::new().unwrap();
        let writer = EvidenceWriter::new(temp_dir.path().join("evidence"));

        let input = AuditInput {
            assignments: vec![assignment("a-1", "p-alice", GA_ID)],
            eligibilities: vec![eligibility("e-1", "p-bob", SECADMIN_ID)],
            instances: vec![instance("i-1", "p-carol", GA_ID, now() - Duration::days(2), 10)],
        };
        let mut names = StubLookup::standard();
        let report = classify(&input, &Policy::default(), now(), &mut names).await;

        let files = writer.write(&report).unwrap();

        assert!(files.snapshot.ends_with("pim-snapshot-2024-03-31T120000Z.json"));
        assert_eq!(files.tables.len(), 3);
        assert!(files.tables.iter().all(|p| p.exists()));

        let loaded = load_snapshot(&files.snapshot).unwrap();
        assert_eq!(loaded, report);
    }

    #[tokio::test]
    async fn test_previous_report() {
        let temp_dir = TempDir::new().unwrap();
        let writer = EvidenceWriter::new(temp_dir.path());
        assert!(writer.previous_report().is_none());

        let input = AuditInput {
            assignments: vec![assignment("a-1", "p-alice", GA_ID)],
            ..Default::default()
        };
        let mut names = StubLookup::standard();
        let report = classify(&input, &Policy::default(), now(), &mut names).await;
        writer.write(&report).unwrap();

        let previous = writer.previous_report().unwrap();
        assert_eq!(previous.metrics.permanent_privileged_assignments, 1);
    }

    #[tokio::test]
    async fn test_empty_run_writes_header_only_tables() {
        let temp_dir = TempDir::new().unwrap();
        let writer = EvidenceWriter::new(temp_dir.path());

        let mut names = StubLookup::standard();
        let report = classify(&AuditInput::default(), &Policy::default(), now(), &mut names).await;

        let files = writer.write(&report).unwrap();
        for table in &files.tables {
            let content = fs::read_to_string(table).unwrap();
            assert_eq!(content.lines().count(), 1, "{}", table.display());
        }
    }
}
