//! Classification of PIM role state into policy findings.
//!
//! Assignments, eligibilities and activation instances are correlated on the
//! (principal, role definition) key. Only instances that started inside the
//! policy window take part in any join or threshold check.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::info;

use super::models::{
    run_timestamp, AuditReport, LongActivation, Metrics, PermanentAssignment, RoleAssignment,
    RoleAssignmentScheduleInstance, RoleEligibilitySchedule, RoleKey, RoleScoped,
    StaleEligibility,
};
use super::policy::{is_privileged, tracked_roles, Policy};
use super::resolver::NameLookup;

/// The three raw collections one run works from.
#[derive(Debug, Clone, Default)]
pub struct AuditInput {
    pub assignments: Vec<RoleAssignment>,
    pub eligibilities: Vec<RoleEligibilitySchedule>,
    pub instances: Vec<RoleAssignmentScheduleInstance>,
}

/// Instances whose start is at or after the window start. Unparsable starts are dropped.
pub fn instances_in_window<'a>(
    instances: &'a [RoleAssignmentScheduleInstance],
    policy: &Policy,
    now: DateTime<Utc>,
) -> Vec<&'a RoleAssignmentScheduleInstance> {
    let since = policy.window_start(now);
    instances
        .iter()
        .filter(|i| i.start().is_some_and(|start| start >= since))
        .collect()
}

/// Keys with at least one in-window activation.
pub fn activation_keys(in_window: &[&RoleAssignmentScheduleInstance]) -> HashSet<RoleKey> {
    in_window.iter().map(|i| i.key()).collect()
}

/// Run all three classifications and the summary metrics.
pub async fn classify<L: NameLookup>(
    input: &AuditInput,
    policy: &Policy,
    now: DateTime<Utc>,
    names: &mut L,
) -> AuditReport {
    let in_window = instances_in_window(&input.instances, policy, now);
    info!(
        "Got {} instances; {} in the last {} days",
        input.instances.len(),
        in_window.len(),
        policy.window_days
    );

    let keys = activation_keys(&in_window);

    let permanent = permanent_assignments(&input.assignments, &keys, names).await;
    let stale_eligibilities = stale_eligibilities(&input.eligibilities, &keys, names).await;
    let long_activations = long_activations(&in_window, policy, names).await;

    let metrics = Metrics {
        timestamp: run_timestamp(now),
        privileged_roles_tracked: tracked_roles(),
        active_privileged_assignments: count_privileged(&input.assignments, names).await,
        eligible_privileged_users: count_privileged(&input.eligibilities, names).await,
        activations_in_window: in_window.len(),
        permanent_privileged_assignments: permanent.len(),
        stale_eligibilities: stale_eligibilities.len(),
        long_activations: long_activations.len(),
        policy: *policy,
    };

    AuditReport {
        metrics,
        permanent,
        stale_eligibilities,
        long_activations,
    }
}

/// Privileged assignments with no in-window activation for the same key.
pub async fn permanent_assignments<L: NameLookup>(
    assignments: &[RoleAssignment],
    activation_keys: &HashSet<RoleKey>,
    names: &mut L,
) -> Vec<PermanentAssignment> {
    let mut found = Vec::new();

    for assignment in assignments {
        let role = names.role_name(assignment.role_definition_id()).await;
        if !is_privileged(&role) || activation_keys.contains(&assignment.key()) {
            continue;
        }

        found.push(PermanentAssignment {
            principal_id: assignment.principal_id.clone(),
            principal_upn: names.principal_upn(assignment.principal_id()).await,
            role,
            assignment_id: assignment.id.clone(),
            created_date_time: assignment.created_date_time.clone(),
        });
    }

    found
}

/// Privileged eligibilities that were never activated inside the window.
pub async fn stale_eligibilities<L: NameLookup>(
    eligibilities: &[RoleEligibilitySchedule],
    activation_keys: &HashSet<RoleKey>,
    names: &mut L,
) -> Vec<StaleEligibility> {
    let mut found = Vec::new();

    for eligibility in eligibilities {
        let role = names.role_name(eligibility.role_definition_id()).await;
        if !is_privileged(&role) || activation_keys.contains(&eligibility.key()) {
            continue;
        }

        found.push(StaleEligibility {
            principal_id: eligibility.principal_id.clone(),
            principal_upn: names.principal_upn(eligibility.principal_id()).await,
            role,
            eligibility_id: eligibility.id.clone(),
            eligible_since: eligibility.start_date_time.clone(),
        });
    }

    found
}

/// In-window privileged activations longer than the policy ceiling.
///
/// Instances missing either timestamp, or with one that does not parse, are skipped.
pub async fn long_activations<L: NameLookup>(
    in_window: &[&RoleAssignmentScheduleInstance],
    policy: &Policy,
    names: &mut L,
) -> Vec<LongActivation> {
    let mut found = Vec::new();

    for instance in in_window {
        let role = names.role_name(instance.role_definition_id()).await;
        if !is_privileged(&role) {
            continue;
        }

        let (Some(start), Some(end)) = (&instance.start_date_time, &instance.end_date_time)
        else {
            continue;
        };
        let Some(hours) = instance.duration_hours() else {
            continue;
        };
        if !policy.exceeds_activation_ceiling(hours) {
            continue;
        }

        found.push(LongActivation {
            principal_id: instance.principal_id.clone(),
            principal_upn: names.principal_upn(instance.principal_id()).await,
            role,
            instance_id: instance.id.clone(),
            start: start.clone(),
            end: end.clone(),
            hours: round2(hours),
        });
    }

    found
}

/// Records whose role resolves to a privileged name.
async fn count_privileged<T: RoleScoped, L: NameLookup>(records: &[T], names: &mut L) -> usize {
    let mut count = 0;
    for record in records {
        if is_privileged(&names.role_name(record.role_definition_id()).await) {
            count += 1;
        }
    }
    count
}

/// Two decimal places, ties to even.
fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
