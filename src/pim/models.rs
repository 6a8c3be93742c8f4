//! PIM data models: raw directory records and the derived audit findings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::policy::Policy;

/// A directory role assignment (`/roleManagement/directory/roleAssignments`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub principal_id: Option<String>,
    #[serde(default)]
    pub role_definition_id: Option<String>,
    #[serde(default)]
    pub created_date_time: Option<String>,
}

/// A principal's right to activate a role (`roleEligibilitySchedules`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleEligibilitySchedule {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub principal_id: Option<String>,
    #[serde(default)]
    pub role_definition_id: Option<String>,
    #[serde(default)]
    pub start_date_time: Option<String>,
}

/// One concrete activation window (`roleAssignmentScheduleInstances`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignmentScheduleInstance {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub principal_id: Option<String>,
    #[serde(default)]
    pub role_definition_id: Option<String>,
    #[serde(default)]
    pub start_date_time: Option<String>,
    #[serde(default)]
    pub end_date_time: Option<String>,
}

impl RoleAssignmentScheduleInstance {
    /// Parsed start, if present and well-formed.
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start_date_time.as_deref().and_then(parse_timestamp)
    }

    /// Activation length in fractional hours, if both ends parse.
    pub fn duration_hours(&self) -> Option<f64> {
        let start = self.start()?;
        let end = self.end_date_time.as_deref().and_then(parse_timestamp)?;
        Some((end - start).num_milliseconds() as f64 / 3_600_000.0)
    }
}

/// Role definition lookup entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDefinition {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// The slice of a Graph user we need.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub user_principal_name: Option<String>,
}

/// Join key correlating the three collections.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoleKey {
    pub principal_id: String,
    pub role_definition_id: String,
}

impl RoleKey {
    pub fn new(principal_id: Option<&str>, role_definition_id: Option<&str>) -> Self {
        Self {
            principal_id: principal_id.unwrap_or_default().to_string(),
            role_definition_id: role_definition_id.unwrap_or_default().to_string(),
        }
    }
}

/// Records that carry a principal and a role definition.
pub trait RoleScoped {
    fn principal_id(&self) -> Option<&str>;
    fn role_definition_id(&self) -> Option<&str>;

    fn key(&self) -> RoleKey {
        RoleKey::new(self.principal_id(), self.role_definition_id())
    }
}

macro_rules! impl_role_scoped {
    ($($ty:ty),*) => {
        $(impl RoleScoped for $ty {
            fn principal_id(&self) -> Option<&str> {
                self.principal_id.as_deref()
            }

            fn role_definition_id(&self) -> Option<&str> {
                self.role_definition_id.as_deref()
            }
        })*
    };
}

impl_role_scoped!(
    RoleAssignment,
    RoleEligibilitySchedule,
    RoleAssignmentScheduleInstance
);

/// Parse an ISO-8601 timestamp with an explicit offset; a trailing `Z` means `+00:00`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let normalized = match raw.strip_suffix(['Z', 'z']) {
        Some(head) => format!("{}+00:00", head),
        None => raw.to_string(),
    };
    DateTime::parse_from_rfc3339(&normalized)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Privileged assignment with no activation in the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermanentAssignment {
    #[serde(rename = "principalId")]
    pub principal_id: Option<String>,
    #[serde(rename = "principalUPN")]
    pub principal_upn: String,
    pub role: String,
    #[serde(rename = "assignmentId")]
    pub assignment_id: Option<String>,
    #[serde(rename = "createdDateTime")]
    pub created_date_time: Option<String>,
}

/// Privileged eligibility that was not activated in the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaleEligibility {
    #[serde(rename = "principalId")]
    pub principal_id: Option<String>,
    #[serde(rename = "principalUPN")]
    pub principal_upn: String,
    pub role: String,
    #[serde(rename = "eligibilityId")]
    pub eligibility_id: Option<String>,
    #[serde(rename = "eligibleSince")]
    pub eligible_since: Option<String>,
}

/// Privileged activation that ran past the ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongActivation {
    #[serde(rename = "principalId")]
    pub principal_id: Option<String>,
    #[serde(rename = "principalUPN")]
    pub principal_upn: String,
    pub role: String,
    #[serde(rename = "instanceId")]
    pub instance_id: Option<String>,
    pub start: String,
    pub end: String,
    pub hours: f64,
}

/// Run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// UTC run timestamp, `%Y-%m-%dT%H%M%SZ`.
    pub timestamp: String,
    pub privileged_roles_tracked: Vec<String>,
    pub active_privileged_assignments: usize,
    pub eligible_privileged_users: usize,
    #[serde(alias = "activations_last_30d")]
    pub activations_in_window: usize,
    pub permanent_privileged_assignments: usize,
    #[serde(alias = "stale_eligibilities_90d")]
    pub stale_eligibilities: usize,
    #[serde(alias = "long_activations_over_8h")]
    pub long_activations: usize,
    /// Absent from snapshots written before thresholds were recorded.
    #[serde(default)]
    pub policy: Policy,
}

/// Everything one audit run produces. Serializes to the snapshot document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub metrics: Metrics,
    pub permanent: Vec<PermanentAssignment>,
    pub stale_eligibilities: Vec<StaleEligibility>,
    pub long_activations: Vec<LongActivation>,
}

/// Run timestamp format used in metrics and file names.
pub fn run_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H%M%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn instance(start: Option<&str>, end: Option<&str>) -> RoleAssignmentScheduleInstance {
        RoleAssignmentScheduleInstance {
            id: Some("inst-1".into()),
            principal_id: Some("p-1".into()),
            role_definition_id: Some("r-1".into()),
            start_date_time: start.map(String::from),
            end_date_time: end.map(String::from),
        }
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-01T00:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01T00:00:00+00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01T02:00:00+02:00"), Some(expected));
        assert!(parse_timestamp("2024-01-01T00:00:00.1234567Z").is_some());
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_duration_hours() {
        let inst = instance(Some("2024-01-01T00:00:00Z"), Some("2024-01-01T09:30:00Z"));
        assert_eq!(inst.duration_hours(), Some(9.5));

        assert_eq!(instance(Some("2024-01-01T00:00:00Z"), None).duration_hours(), None);
        assert_eq!(instance(Some("garbage"), Some("2024-01-01T09:30:00Z")).duration_hours(), None);
    }

    #[test]
    fn test_graph_payload_deserializes() {
        let json = r#"{
            "id": "lAPpYvVpN0KRkAEhdxReEJC2sEqbR_9Hr48lds9SGHI-1",
            "principalId": "4ab0b690-479b-4ff4-a3e7-c9cfa0b29b6d",
            "roleDefinitionId": "62e90394-69f5-4237-9190-012177145e10",
            "directoryScopeId": "/"
        }"#;

        let assignment: RoleAssignment = serde_json::from_str(json).unwrap();
        assert_eq!(
            assignment.key(),
            RoleKey::new(
                Some("4ab0b690-479b-4ff4-a3e7-c9cfa0b29b6d"),
                Some("62e90394-69f5-4237-9190-012177145e10")
            )
        );
        assert!(assignment.created_date_time.is_none());
    }

    #[test]
    fn test_finding_field_names() {
        let finding = PermanentAssignment {
            principal_id: Some("p-1".into()),
            principal_upn: "alice@contoso.com".into(),
            role: "Global Administrator".into(),
            assignment_id: Some("a-1".into()),
            created_date_time: None,
        };

        let value = serde_json::to_value(&finding).unwrap();
        assert_eq!(value["principalUPN"], "alice@contoso.com");
        assert_eq!(value["assignmentId"], "a-1");
        assert!(value["createdDateTime"].is_null());
    }

    #[test]
    fn test_metrics_accept_suffixed_keys() {
        let metrics: Metrics = serde_json::from_value(serde_json::json!({
            "timestamp": "2024-01-02T030405Z",
            "privileged_roles_tracked": ["Global Administrator"],
            "active_privileged_assignments": 4,
            "eligible_privileged_users": 6,
            "activations_last_30d": 12,
            "permanent_privileged_assignments": 1,
            "stale_eligibilities_90d": 2,
            "long_activations_over_8h": 3
        }))
        .unwrap();

        assert_eq!(metrics.activations_in_window, 12);
        assert_eq!(metrics.stale_eligibilities, 2);
        assert_eq!(metrics.long_activations, 3);
        assert_eq!(metrics.policy, Policy::default());

        let value = serde_json::to_value(&metrics).unwrap();
        assert_eq!(value["activations_in_window"], 12);
    }

    #[test]
    fn test_run_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(run_timestamp(now), "2024-05-06T070809Z");
    }
}
