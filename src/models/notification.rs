use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AssignmentCreated,
    AssignmentAccepted,
    AssignmentDeclined,
    AssignmentTimedOut,
    AssignmentCompleted,
    AssignmentCancelled,
}

/// Event pushed to connected clients on every lifecycle transition.
/// Delivery is best-effort; the stored assignment state is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub target_route: String,
}
