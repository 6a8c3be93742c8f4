//! CSV exports, one table per finding list.

use std::path::{Path, PathBuf};

use crate::error::EvidenceError;
use crate::pim::{AuditReport, LongActivation, PermanentAssignment, StaleEligibility};

pub const PERMANENT_CSV: &str = "permanent_privileged.csv";
pub const STALE_CSV: &str = "stale_eligibilities.csv";
pub const LONG_ACTIVATIONS_CSV: &str = "long_activations.csv";

/// A finding that renders as one CSV row.
pub trait TableRow {
    /// Column headers, matching the snapshot field names.
    const HEADERS: &'static [&'static str];

    fn cells(&self) -> Vec<String>;
}

impl TableRow for PermanentAssignment {
    const HEADERS: &'static [&'static str] = &[
        "principalId",
        "principalUPN",
        "role",
        "assignmentId",
        "createdDateTime",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.principal_id.clone().unwrap_or_default(),
            self.principal_upn.clone(),
            self.role.clone(),
            self.assignment_id.clone().unwrap_or_default(),
            self.created_date_time.clone().unwrap_or_default(),
        ]
    }
}

impl TableRow for StaleEligibility {
    const HEADERS: &'static [&'static str] = &[
        "principalId",
        "principalUPN",
        "role",
        "eligibilityId",
        "eligibleSince",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.principal_id.clone().unwrap_or_default(),
            self.principal_upn.clone(),
            self.role.clone(),
            self.eligibility_id.clone().unwrap_or_default(),
            self.eligible_since.clone().unwrap_or_default(),
        ]
    }
}

impl TableRow for LongActivation {
    const HEADERS: &'static [&'static str] = &[
        "principalId",
        "principalUPN",
        "role",
        "instanceId",
        "start",
        "end",
        "hours",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.principal_id.clone().unwrap_or_default(),
            self.principal_upn.clone(),
            self.role.clone(),
            self.instance_id.clone().unwrap_or_default(),
            self.start.clone(),
            self.end.clone(),
            format!("{:?}", self.hours),
        ]
    }
}

/// Write `rows` to `path`, replacing any previous file. The header is always written.
pub fn write_table<R: TableRow>(path: &Path, rows: &[R]) -> Result<(), EvidenceError> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(R::HEADERS)?;
    for row in rows {
        writer.write_record(row.cells())?;
    }

    writer.flush()?;
    Ok(())
}

/// Write all three tables into `dir`.
pub fn write_tables(dir: &Path, report: &AuditReport) -> Result<Vec<PathBuf>, EvidenceError> {
    let permanent = dir.join(PERMANENT_CSV);
    write_table(&permanent, &report.permanent)?;

    let stale = dir.join(STALE_CSV);
    write_table(&stale, &report.stale_eligibilities)?;

    let long = dir.join(LONG_ACTIVATIONS_CSV);
    write_table(&long, &report.long_activations)?;

    Ok(vec![permanent, stale, long])
}
