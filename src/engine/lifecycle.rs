use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::assignment::{Assignment, AssignmentStatus};
use crate::models::job::JobStatus;
use crate::models::notification::{Notification, NotificationKind};
use crate::state::AppState;

/// Sentinel note for timeout-driven declines. Scoring relies on this string
/// to tell automatic declines apart from human ones.
pub const AUTO_DECLINE_NOTE: &str = "auto-declined: acceptance deadline expired";

const ACCEPT_WINDOW_HOURS: i64 = 24;
const SHORT_ACCEPT_WINDOW_HOURS: i64 = 6;
const NEAR_SCHEDULE_CUTOFF_HOURS: i64 = 48;
const URGENT_THRESHOLD_MINUTES: i64 = 120;

/// How long the provider has to respond. A job scheduled for tomorrow cannot
/// tolerate the full window, so near-term schedules shrink it, and the
/// deadline never lands after the scheduled start itself.
pub fn acceptance_deadline(
    assigned_at: DateTime<Utc>,
    scheduled_for: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    let window = match scheduled_for {
        Some(start) if start - assigned_at < Duration::hours(NEAR_SCHEDULE_CUTOFF_HOURS) => {
            Duration::hours(SHORT_ACCEPT_WINDOW_HOURS)
        }
        _ => Duration::hours(ACCEPT_WINDOW_HOURS),
    };

    let deadline = assigned_at + window;
    match scheduled_for {
        Some(start) if start > assigned_at && start < deadline => start,
        _ => deadline,
    }
}

/// UI prioritization flag only; never feeds the state machine.
pub fn is_urgent(assignment: &Assignment, now: DateTime<Utc>) -> bool {
    assignment.status == AssignmentStatus::Pending
        && acceptance_deadline(assignment.assigned_at, assignment.scheduled_for) - now
            < Duration::minutes(URGENT_THRESHOLD_MINUTES)
}

/// Offer a job to a provider. The job entry lock makes the open-check and
/// the assigned-mark atomic against concurrent creates for the same job,
/// which is what keeps the at-most-one-active-assignment invariant.
pub fn create_assignment(
    state: &AppState,
    job_id: Uuid,
    provider_id: Uuid,
    scheduled_for: Option<DateTime<Utc>>,
) -> Result<Assignment, AppError> {
    let provider_name = {
        let provider = state
            .providers
            .get(&provider_id)
            .ok_or_else(|| AppError::NotFound(format!("provider {provider_id} not found")))?;

        if !provider.active {
            return Err(AppError::BadRequest(format!(
                "provider {provider_id} is disabled"
            )));
        }

        provider.name.clone()
    };

    let assignment = {
        let mut job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))?;

        match job.status {
            JobStatus::Open => {}
            JobStatus::Assigned => return Err(AppError::DuplicateActiveAssignment(job_id)),
            status => return Err(AppError::JobNotOpen(job_id, status)),
        }

        job.status = JobStatus::Assigned;

        Assignment {
            id: Uuid::new_v4(),
            job_id,
            provider_id,
            status: AssignmentStatus::Pending,
            assigned_at: Utc::now(),
            responded_at: None,
            scheduled_for: scheduled_for.or(job.requested_for),
            notes: None,
        }
    };

    // Inserted after the job guard drops; entry locks are never nested.
    state.assignments.insert(assignment.id, assignment.clone());

    state.metrics.pending_assignments.inc();
    record_transition(state, "created");

    info!(
        assignment_id = %assignment.id,
        job_id = %job_id,
        provider_id = %provider_id,
        "assignment created"
    );

    notify(
        state,
        NotificationKind::AssignmentCreated,
        "New assignment",
        format!("Job {job_id} offered to {provider_name}"),
        assignment.id,
    );

    Ok(assignment)
}

/// Provider accepts a pending offer. The status re-check under the entry
/// lock is the conditional update: a losing concurrent writer gets
/// `AlreadyResolved` and must refetch.
pub fn accept(
    state: &AppState,
    assignment_id: Uuid,
    acting_provider: Uuid,
) -> Result<Assignment, AppError> {
    let updated = {
        let mut entry = assignment_entry(state, assignment_id)?;

        if entry.provider_id != acting_provider {
            return Err(AppError::Forbidden(
                "assignment belongs to a different provider".to_string(),
            ));
        }

        if entry.status != AssignmentStatus::Pending {
            return Err(AppError::AlreadyResolved(entry.status));
        }

        entry.status = AssignmentStatus::Accepted;
        entry.responded_at = Some(Utc::now());
        entry.clone()
    };

    state.metrics.pending_assignments.dec();
    record_transition(state, "accepted");

    info!(
        assignment_id = %updated.id,
        job_id = %updated.job_id,
        provider_id = %updated.provider_id,
        "assignment accepted"
    );

    notify(
        state,
        NotificationKind::AssignmentAccepted,
        "Assignment accepted",
        format!("Provider accepted job {}", updated.job_id),
        updated.id,
    );

    Ok(updated)
}

/// Provider declines a pending offer; the reason lands in notes verbatim.
pub fn decline(
    state: &AppState,
    assignment_id: Uuid,
    acting_provider: Uuid,
    reason: String,
) -> Result<Assignment, AppError> {
    resolve_decline(state, assignment_id, Some(acting_provider), reason)
}

/// System-triggered decline once the acceptance deadline has elapsed.
/// Idempotent at the caller: losing to any earlier resolution yields
/// `AlreadyResolved`, which the sweeper treats as a no-op.
pub fn auto_decline_on_timeout(
    state: &AppState,
    assignment_id: Uuid,
) -> Result<Assignment, AppError> {
    resolve_decline(state, assignment_id, None, AUTO_DECLINE_NOTE.to_string())
}

fn resolve_decline(
    state: &AppState,
    assignment_id: Uuid,
    acting_provider: Option<Uuid>,
    reason: String,
) -> Result<Assignment, AppError> {
    let automatic = acting_provider.is_none();

    let updated = {
        let mut entry = assignment_entry(state, assignment_id)?;

        if let Some(acting) = acting_provider {
            if entry.provider_id != acting {
                return Err(AppError::Forbidden(
                    "assignment belongs to a different provider".to_string(),
                ));
            }
        }

        if entry.status != AssignmentStatus::Pending {
            return Err(AppError::AlreadyResolved(entry.status));
        }

        entry.status = AssignmentStatus::Declined;
        entry.responded_at = Some(Utc::now());
        entry.notes = Some(reason);
        entry.clone()
    };

    // History stays; the job goes back into the pool for re-assignment.
    reopen_job(state, updated.job_id);

    state.metrics.pending_assignments.dec();
    record_transition(state, if automatic { "auto_declined" } else { "declined" });

    info!(
        assignment_id = %updated.id,
        job_id = %updated.job_id,
        provider_id = %updated.provider_id,
        automatic,
        "assignment declined"
    );

    let (kind, title) = if automatic {
        (NotificationKind::AssignmentTimedOut, "Assignment timed out")
    } else {
        (NotificationKind::AssignmentDeclined, "Assignment declined")
    };

    let reason_text = updated.notes.clone().unwrap_or_default();
    notify(
        state,
        kind,
        title,
        format!("Job {} declined: {reason_text}", updated.job_id),
        updated.id,
    );

    Ok(updated)
}

/// Mark accepted work as done.
pub fn complete(
    state: &AppState,
    assignment_id: Uuid,
    acting_provider: Uuid,
) -> Result<Assignment, AppError> {
    let updated = {
        let mut entry = assignment_entry(state, assignment_id)?;

        if entry.provider_id != acting_provider {
            return Err(AppError::Forbidden(
                "assignment belongs to a different provider".to_string(),
            ));
        }

        if entry.status != AssignmentStatus::Accepted {
            return Err(AppError::InvalidTransition(entry.status));
        }

        entry.status = AssignmentStatus::Completed;
        entry.clone()
    };

    if let Some(mut job) = state.jobs.get_mut(&updated.job_id) {
        job.status = JobStatus::Completed;
    }

    record_transition(state, "completed");

    info!(
        assignment_id = %updated.id,
        job_id = %updated.job_id,
        provider_id = %updated.provider_id,
        "assignment completed"
    );

    notify(
        state,
        NotificationKind::AssignmentCompleted,
        "Assignment completed",
        format!("Job {} completed", updated.job_id),
        updated.id,
    );

    Ok(updated)
}

/// Operator withdraws a pending offer.
pub fn cancel(state: &AppState, assignment_id: Uuid) -> Result<Assignment, AppError> {
    let updated = {
        let mut entry = assignment_entry(state, assignment_id)?;

        if entry.status != AssignmentStatus::Pending {
            return Err(AppError::InvalidTransition(entry.status));
        }

        entry.status = AssignmentStatus::Cancelled;
        entry.responded_at = Some(Utc::now());
        entry.clone()
    };

    reopen_job(state, updated.job_id);

    state.metrics.pending_assignments.dec();
    record_transition(state, "cancelled");

    info!(
        assignment_id = %updated.id,
        job_id = %updated.job_id,
        "assignment cancelled"
    );

    notify(
        state,
        NotificationKind::AssignmentCancelled,
        "Assignment cancelled",
        format!("Offer for job {} withdrawn", updated.job_id),
        updated.id,
    );

    Ok(updated)
}

fn assignment_entry<'a>(
    state: &'a AppState,
    assignment_id: Uuid,
) -> Result<dashmap::mapref::one::RefMut<'a, Uuid, Assignment>, AppError> {
    state
        .assignments
        .get_mut(&assignment_id)
        .ok_or_else(|| AppError::NotFound(format!("assignment {assignment_id} not found")))
}

fn reopen_job(state: &AppState, job_id: Uuid) {
    if let Some(mut job) = state.jobs.get_mut(&job_id) {
        if job.status == JobStatus::Assigned {
            job.status = JobStatus::Open;
        }
    }
}

fn record_transition(state: &AppState, transition: &str) {
    state
        .metrics
        .assignment_transitions_total
        .with_label_values(&[transition])
        .inc();
}

// Notifications are best-effort; a send with no subscribers is not a
// failure, and delivery never rolls back the committed transition.
fn notify(
    state: &AppState,
    kind: NotificationKind,
    title: &str,
    body: String,
    assignment_id: Uuid,
) {
    let _ = state.notifications_tx.send(Notification {
        kind,
        title: title.to_string(),
        body,
        target_route: format!("/assignments/{assignment_id}"),
    });
}
