//! Audit policy: which roles count as privileged and the time thresholds.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Directory roles tracked by the audit. Matching is exact on the display name.
pub const PRIVILEGED_ROLES: [&str; 8] = [
    "Global Administrator",
    "Privileged Role Administrator",
    "Security Administrator",
    "Conditional Access Administrator",
    "Application Administrator",
    "Cloud Application Administrator",
    "Exchange Administrator",
    "SharePoint Administrator",
];

/// Returns true if `role_name` is one of the tracked privileged roles.
pub fn is_privileged(role_name: &str) -> bool {
    PRIVILEGED_ROLES.contains(&role_name)
}

/// Tracked role names in sorted order.
pub fn tracked_roles() -> Vec<String> {
    let mut roles: Vec<String> = PRIVILEGED_ROLES.iter().map(|r| r.to_string()).collect();
    roles.sort();
    roles
}

/// Policy thresholds, fixed for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Activations longer than this many hours are reported.
    pub max_activation_hours: u32,

    /// How far back activations are considered.
    pub window_days: u32,

    /// Label for eligibility staleness in reports and tickets.
    pub stale_eligibility_days: u32,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_activation_hours: 8,
            window_days: 30,
            stale_eligibility_days: 90,
        }
    }
}

impl Policy {
    /// Earliest activation start that still falls inside the window.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.window_days))
    }

    /// Returns true if an activation of `hours` breaches the ceiling.
    pub fn exceeds_activation_ceiling(&self, hours: f64) -> bool {
        hours > f64::from(self.max_activation_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_privileged_roles_exact_match() {
        assert!(is_privileged("Global Administrator"));
        assert!(is_privileged("SharePoint Administrator"));
        assert!(!is_privileged("global administrator"));
        assert!(!is_privileged("Global Reader"));
        assert!(!is_privileged(""));
    }

    #[test]
    fn test_tracked_roles_sorted() {
        let roles = tracked_roles();
        assert_eq!(roles.len(), 8);
        assert_eq!(roles[0], "Application Administrator");
        assert!(roles.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_window_and_ceiling() {
        let policy = Policy::default();
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();

        assert_eq!(
            policy.window_start(now),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
        );
        assert!(policy.exceeds_activation_ceiling(8.01));
        assert!(!policy.exceeds_activation_ceiling(8.0));
    }
}
