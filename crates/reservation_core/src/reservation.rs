use std::fmt;

use serde::{Deserialize, Serialize};

/// A reservation row as read from the store. This crate never writes it back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reservation {
    pub id: String,
    pub owner_id: String,
    pub space_name: String,
    pub status: ReservationStatus,
    #[serde(default)]
    pub rejection_reason: String,
}

impl Reservation {
    pub fn new(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        space_name: impl Into<String>,
        status: ReservationStatus,
    ) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            space_name: space_name.into(),
            status,
            rejection_reason: String::new(),
        }
    }

    pub fn with_rejection_reason(mut self, reason: impl Into<String>) -> Self {
        self.rejection_reason = reason.into();
        self
    }

    pub fn is_rejection(&self) -> bool {
        self.status == ReservationStatus::Cancelled && !self.rejection_reason.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Approved,
    Cancelled,
    Completed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// One change delivered by a feed. Consumed once, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub reservation: Reservation,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn added(reservation: Reservation) -> Self {
        Self {
            reservation,
            kind: ChangeKind::Added,
        }
    }

    pub fn modified(reservation: Reservation) -> Self {
        Self {
            reservation,
            kind: ChangeKind::Modified,
        }
    }

    pub fn removed(reservation: Reservation) -> Self {
        Self {
            reservation,
            kind: ChangeKind::Removed,
        }
    }
}

/// Who a listener is started for. The variant decides which listener applies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Viewer {
    User { id: String },
    Admin { id: String },
}

impl Viewer {
    pub fn user(id: impl Into<String>) -> Self {
        Viewer::User { id: id.into() }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Viewer::Admin { id: id.into() }
    }

    pub fn id(&self) -> &str {
        match self {
            Viewer::User { id } | Viewer::Admin { id } => id,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Viewer::Admin { .. })
    }
}

impl fmt::Display for Viewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Viewer::User { id } => write!(f, "user:{id}"),
            Viewer::Admin { id } => write!(f, "admin:{id}"),
        }
    }
}
