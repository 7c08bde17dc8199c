use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::lifecycle::{acceptance_deadline, auto_decline_on_timeout};
use crate::error::AppError;
use crate::models::assignment::AssignmentStatus;
use crate::state::AppState;

/// Recurring enforcement of the acceptance deadline. The sweep itself holds
/// no state: every decline goes through the lifecycle's conditional update,
/// so a provider responding mid-sweep simply wins the race.
pub async fn run_timeout_sweeper(state: Arc<AppState>, interval_secs: u64) {
    info!(interval_secs, "timeout sweeper started");

    let mut ticker = interval(Duration::from_secs(interval_secs));
    loop {
        ticker.tick().await;
        sweep_once(&state);
    }
}

/// One pass: auto-decline every pending assignment whose deadline elapsed.
/// Returns the number of assignments declined in this pass.
pub fn sweep_once(state: &AppState) -> usize {
    let now = Utc::now();

    // Collect ids first; the decline path takes entry locks of its own.
    let expired: Vec<Uuid> = state
        .assignments
        .iter()
        .filter_map(|entry| {
            let assignment = entry.value();
            (assignment.status == AssignmentStatus::Pending
                && acceptance_deadline(assignment.assigned_at, assignment.scheduled_for) <= now)
                .then_some(assignment.id)
        })
        .collect();

    let mut declined = 0usize;
    for assignment_id in expired {
        match auto_decline_on_timeout(state, assignment_id) {
            Ok(assignment) => {
                declined += 1;
                info!(
                    assignment_id = %assignment.id,
                    job_id = %assignment.job_id,
                    provider_id = %assignment.provider_id,
                    "assignment auto-declined after deadline"
                );
            }
            // Someone else resolved it between the scan and the write.
            Err(AppError::AlreadyResolved(_)) | Err(AppError::NotFound(_)) => {
                debug!(assignment_id = %assignment_id, "timeout sweep lost the race");
            }
            Err(err) => {
                warn!(assignment_id = %assignment_id, error = %err, "timeout sweep failed");
            }
        }
    }

    declined
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::sweep_once;
    use crate::config::Config;
    use crate::engine::lifecycle::{accept, create_assignment, AUTO_DECLINE_NOTE};
    use crate::engine::reliability;
    use crate::models::assignment::AssignmentStatus;
    use crate::models::job::{Address, Job, JobStatus};
    use crate::models::provider::{GeoPoint, Provider};
    use crate::state::AppState;

    fn test_state() -> AppState {
        AppState::new(&Config::from_env().unwrap())
    }

    fn seed_provider(state: &AppState, id_seed: u128) -> Uuid {
        let id = Uuid::from_u128(id_seed);
        state.providers.insert(
            id,
            Provider {
                id,
                name: format!("provider-{id_seed}"),
                home: Some(GeoPoint {
                    lat: 52.52,
                    lng: 13.405,
                }),
                service_radius_km: 50,
                availability: BTreeMap::new(),
                active: true,
                updated_at: Utc::now(),
            },
        );
        id
    }

    fn seed_job(state: &AppState) -> Uuid {
        let id = Uuid::new_v4();
        state.jobs.insert(
            id,
            Job {
                id,
                address: Address {
                    street: "Speicherstadt 3".to_string(),
                    postal_code: "20457".to_string(),
                    city: "Hamburg".to_string(),
                    country: String::new(),
                },
                requested_for: None,
                status: JobStatus::Open,
                total_cents: 0,
                location: Some(GeoPoint {
                    lat: 53.544,
                    lng: 9.988,
                }),
                geocoded_at: Some(Utc::now()),
                created_at: Utc::now(),
            },
        );
        id
    }

    fn backdate(state: &AppState, assignment_id: Uuid, hours: i64) {
        state.assignments.get_mut(&assignment_id).unwrap().assigned_at =
            Utc::now() - Duration::hours(hours);
    }

    #[test]
    fn expired_pending_assignments_are_auto_declined() {
        let state = test_state();
        let provider = seed_provider(&state, 1);
        let job = seed_job(&state);

        let a = create_assignment(&state, job, provider, None).unwrap();
        backdate(&state, a.id, 25);

        assert_eq!(sweep_once(&state), 1);

        let stored = state.assignments.get(&a.id).unwrap().clone();
        assert_eq!(stored.status, AssignmentStatus::Declined);
        assert_eq!(stored.notes.as_deref(), Some(AUTO_DECLINE_NOTE));
        assert_eq!(state.jobs.get(&job).unwrap().status, JobStatus::Open);

        let report = reliability::score(&state, provider);
        assert_eq!(report.auto_declined, 1);
        assert_eq!(report.manually_declined, 0);
    }

    #[test]
    fn fresh_and_resolved_assignments_are_left_alone() {
        let state = test_state();
        let provider = seed_provider(&state, 1);

        let fresh_job = seed_job(&state);
        create_assignment(&state, fresh_job, provider, None).unwrap();

        let accepted_job = seed_job(&state);
        let accepted = create_assignment(&state, accepted_job, provider, None).unwrap();
        accept(&state, accepted.id, provider).unwrap();
        backdate(&state, accepted.id, 48);

        assert_eq!(sweep_once(&state), 0);
        assert_eq!(
            state.assignments.get(&accepted.id).unwrap().status,
            AssignmentStatus::Accepted
        );
    }

    #[test]
    fn repeated_sweeps_change_state_at_most_once() {
        let state = test_state();
        let provider = seed_provider(&state, 1);
        let job = seed_job(&state);

        let a = create_assignment(&state, job, provider, None).unwrap();
        backdate(&state, a.id, 30);

        assert_eq!(sweep_once(&state), 1);
        let after_first = state.assignments.get(&a.id).unwrap().clone();

        assert_eq!(sweep_once(&state), 0);
        let after_second = state.assignments.get(&a.id).unwrap().clone();
        assert_eq!(after_first.responded_at, after_second.responded_at);
        assert_eq!(after_first.status, after_second.status);
    }
}
