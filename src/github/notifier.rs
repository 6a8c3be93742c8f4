//! Issue rendering and delivery for audit findings.

use serde::Serialize;
use tracing::info;

use super::client::GitHubClient;
use crate::error::TicketError;
use crate::pim::{AuditReport, LongActivation, PermanentAssignment, Policy, StaleEligibility};

/// Issue payload for `POST /repos/{owner}/{repo}/issues`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

impl NewIssue {
    fn for_finding<T: Serialize>(
        title: String,
        heading: &str,
        finding: &T,
        labels: [&str; 2],
    ) -> Result<Self, TicketError> {
        let json = serde_json::to_string_pretty(finding)?;
        Ok(Self {
            title,
            body: format!("{}:\n\n```json\n{}\n```", heading, json),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        })
    }
}

pub fn permanent_issue(finding: &PermanentAssignment) -> Result<NewIssue, TicketError> {
    NewIssue::for_finding(
        format!(
            "Permanent privileged assignment: {} → {}",
            finding.principal_upn, finding.role
        ),
        "Detected permanent privileged assignment",
        finding,
        ["pim", "sticky-admin"],
    )
}

pub fn stale_issue(finding: &StaleEligibility, policy: &Policy) -> Result<NewIssue, TicketError> {
    NewIssue::for_finding(
        format!(
            "Stale PIM eligibility: {} → {} (no activation in {}d)",
            finding.principal_upn, finding.role, policy.window_days
        ),
        "Detected stale eligibility",
        finding,
        ["pim", "stale-eligibility"],
    )
}

pub fn long_activation_issue(
    finding: &LongActivation,
    policy: &Policy,
) -> Result<NewIssue, TicketError> {
    NewIssue::for_finding(
        format!(
            "Long activation > {}h: {} → {}",
            policy.max_activation_hours, finding.principal_upn, finding.role
        ),
        "Detected long PIM activation",
        finding,
        ["pim", "long-activation"],
    )
}

/// One issue per finding: permanent assignments, then stale eligibilities, then long activations.
pub fn issues_for(report: &AuditReport, policy: &Policy) -> Result<Vec<NewIssue>, TicketError> {
    let mut issues = Vec::with_capacity(
        report.permanent.len() + report.stale_eligibilities.len() + report.long_activations.len(),
    );

    for finding in &report.permanent {
        issues.push(permanent_issue(finding)?);
    }
    for finding in &report.stale_eligibilities {
        issues.push(stale_issue(finding, policy)?);
    }
    for finding in &report.long_activations {
        issues.push(long_activation_issue(finding, policy)?);
    }

    Ok(issues)
}

/// Files issues when the preflight passed, otherwise logs them as a dry run.
pub struct TicketNotifier {
    client: Option<GitHubClient>,
    enabled: bool,
}

impl TicketNotifier {
    /// `enabled` comes from the preflight; without a client the notifier is always a dry run.
    pub fn new(client: Option<GitHubClient>, enabled: bool) -> Self {
        let enabled = enabled && client.is_some();
        Self { client, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Deliver `issues` in order. Returns how many were created.
    pub async fn notify(&self, issues: &[NewIssue]) -> Result<usize, TicketError> {
        let client = match (&self.client, self.enabled) {
            (Some(client), true) => client,
            _ => {
                for issue in issues {
                    info!("[DRY RUN] Would create issue: {}", issue.title);
                }
                return Ok(0);
            }
        };

        let mut created = 0;
        for issue in issues {
            client.create_issue(issue).await?;
            created += 1;
        }

        info!("Created {} issue(s) in {}", created, client.target().slug());
        Ok(created)
    }
}
