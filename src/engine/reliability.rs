use serde::Serialize;
use uuid::Uuid;

use crate::engine::lifecycle::AUTO_DECLINE_NOTE;
use crate::models::assignment::AssignmentStatus;
use crate::state::AppState;

const ACCEPTANCE_WEIGHT: f64 = 0.4;
const COMPLETION_WEIGHT: f64 = 0.4;
const TIMEOUT_WEIGHT: f64 = 0.2;

/// Derived trust metric over the full assignment history of one provider.
/// Recomputed on demand, never stored, so it cannot go stale.
#[derive(Debug, Clone, Serialize)]
pub struct ReliabilityReport {
    pub provider_id: Uuid,
    pub total: usize,
    pub accepted: usize,
    pub completed: usize,
    /// Explicit refusals; silent timeouts are counted separately because
    /// operators treat the two failure modes differently.
    pub manually_declined: usize,
    pub auto_declined: usize,
    pub cancelled: usize,
    pub acceptance_rate: f64,
    pub timeout_rate: f64,
    pub completion_rate: f64,
    pub score: f64,
    pub label: &'static str,
}

pub fn score(state: &AppState, provider_id: Uuid) -> ReliabilityReport {
    let mut total = 0usize;
    let mut accepted_now = 0usize;
    let mut completed = 0usize;
    let mut declined_total = 0usize;
    let mut auto_declined = 0usize;
    let mut cancelled = 0usize;

    for entry in state.assignments.iter() {
        let assignment = entry.value();
        if assignment.provider_id != provider_id {
            continue;
        }

        total += 1;
        match assignment.status {
            AssignmentStatus::Accepted => accepted_now += 1,
            AssignmentStatus::Completed => completed += 1,
            AssignmentStatus::Declined => {
                declined_total += 1;
                if assignment.notes.as_deref() == Some(AUTO_DECLINE_NOTE) {
                    auto_declined += 1;
                }
            }
            AssignmentStatus::Cancelled => cancelled += 1,
            AssignmentStatus::Pending => {}
        }
    }

    // Completed assignments passed through accepted first.
    let accepted_ever = accepted_now + completed;
    let manually_declined = declined_total - auto_declined;

    let (acceptance_rate, timeout_rate) = if total == 0 {
        (0.0, 0.0)
    } else {
        (
            accepted_ever as f64 / total as f64,
            auto_declined as f64 / total as f64,
        )
    };

    let completion_rate = if accepted_ever == 0 {
        0.0
    } else {
        completed as f64 / accepted_ever as f64
    };

    let score = if total == 0 {
        0.0
    } else {
        ((ACCEPTANCE_WEIGHT * acceptance_rate
            + COMPLETION_WEIGHT * completion_rate
            + TIMEOUT_WEIGHT * (1.0 - timeout_rate))
            * 100.0)
            .clamp(0.0, 100.0)
    };

    ReliabilityReport {
        provider_id,
        total,
        accepted: accepted_ever,
        completed,
        manually_declined,
        auto_declined,
        cancelled,
        acceptance_rate,
        timeout_rate,
        completion_rate,
        score,
        label: label(score),
    }
}

/// Display bands only; nothing branches on these.
pub fn label(score: f64) -> &'static str {
    if score >= 80.0 {
        "very reliable"
    } else if score >= 60.0 {
        "reliable"
    } else if score >= 40.0 {
        "moderately reliable"
    } else {
        "unreliable"
    }
}
