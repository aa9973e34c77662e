use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Assigned,
    Approved,
    Rejected,
    Deleted,
    NewRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub emitted_at: DateTime<Utc>,
}

impl Notification {
    pub fn assigned(space_name: &str) -> Self {
        Self::now(
            NotificationKind::Assigned,
            "📅 New Assignment",
            format!("An administrator assigned you: {space_name}"),
        )
    }

    pub fn approved(space_name: &str) -> Self {
        Self::now(
            NotificationKind::Approved,
            "✅ Reservation Approved",
            format!("Your request for {space_name} was accepted."),
        )
    }

    pub fn rejected(reason: &str) -> Self {
        Self::now(
            NotificationKind::Rejected,
            "❌ Reservation Rejected",
            format!("Reason: {reason}"),
        )
    }

    pub fn deleted(space_name: &str) -> Self {
        Self::now(
            NotificationKind::Deleted,
            "🗑️ Reservation Deleted",
            format!("Your reservation in {space_name} was deleted by an administrator."),
        )
    }

    pub fn new_request(space_name: &str) -> Self {
        Self::now(
            NotificationKind::NewRequest,
            "🔔 New Request",
            format!("Pending request for: {space_name}"),
        )
    }

    fn now(kind: NotificationKind, title: &str, body: String) -> Self {
        Self {
            kind,
            title: title.to_string(),
            body,
            emitted_at: Utc::now(),
        }
    }
}

/// Platform-specific notification adapters will implement this trait.
///
/// Presentation is fire-and-forget: nothing is returned and failures stay
/// inside the adapter.
pub trait NotificationSink: Send + Sync {
    fn present(&self, notification: Notification);
}
