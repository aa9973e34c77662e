use std::collections::BTreeMap;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::reservation::{ChangeEvent, ChangeKind, Reservation, ReservationStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    Change(ChangeEvent),
    /// Everything delivered before this marker was pre-existing state.
    SnapshotComplete,
}

pub type FeedReceiver = mpsc::UnboundedReceiver<FeedMessage>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("reservation feed is closed")]
    Closed,
    #[error("unknown reservation `{0}`")]
    UnknownReservation(String),
}

/// Source of reservation change streams.
///
/// A returned stream first replays the rows already in scope as `Added`
/// changes, then delivers live changes in order. Implementations that can
/// tell where the replay ends send [`FeedMessage::SnapshotComplete`] there.
/// The stream ends when the receiver yields `None`.
pub trait ReservationFeed: Send + Sync {
    /// Changes to reservations owned by `user_id`.
    fn watch_owned_by(&self, user_id: &str) -> Result<FeedReceiver, FeedError>;

    /// Reservations entering the pending state. Only `Added` changes are
    /// delivered on this stream.
    fn watch_pending_requests(&self) -> Result<FeedReceiver, FeedError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedScope {
    OwnedBy(String),
    PendingRequests,
}

impl FeedScope {
    pub fn matches(&self, reservation: &Reservation) -> bool {
        match self {
            FeedScope::OwnedBy(owner) => reservation.owner_id == *owner,
            FeedScope::PendingRequests => reservation.status == ReservationStatus::Pending,
        }
    }

    /// How a row moving from `before` to `after` looks to a subscriber of this scope.
    pub fn transition(
        &self,
        before: Option<&Reservation>,
        after: Option<&Reservation>,
    ) -> Option<ChangeKind> {
        let was_in = before.is_some_and(|row| self.matches(row));
        let is_in = after.is_some_and(|row| self.matches(row));
        match (self, was_in, is_in) {
            (_, false, true) => Some(ChangeKind::Added),
            (FeedScope::OwnedBy(_), true, true) if before != after => Some(ChangeKind::Modified),
            (FeedScope::OwnedBy(_), true, false) => Some(ChangeKind::Removed),
            _ => None,
        }
    }
}

struct Subscription {
    scope: FeedScope,
    sender: mpsc::UnboundedSender<FeedMessage>,
}

#[derive(Default)]
struct FeedState {
    rows: BTreeMap<String, Reservation>,
    subscriptions: Vec<Subscription>,
    closed: bool,
}

/// Process-local feed over a reservation table.
#[derive(Default)]
pub struct InMemoryFeed {
    state: Mutex<FeedState>,
}

impl InMemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, scope: FeedScope) -> Result<FeedReceiver, FeedError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(FeedError::Closed);
        }
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut replayed = 0usize;
        for row in state.rows.values().filter(|row| scope.matches(row)) {
            let _ = sender.send(FeedMessage::Change(ChangeEvent::added(row.clone())));
            replayed += 1;
        }
        let _ = sender.send(FeedMessage::SnapshotComplete);
        debug!(?scope, replayed, "feed subscription opened");
        state.subscriptions.push(Subscription { scope, sender });
        Ok(receiver)
    }

    pub fn upsert(&self, reservation: Reservation) -> Result<(), FeedError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(FeedError::Closed);
        }
        let before = state.rows.insert(reservation.id.clone(), reservation.clone());
        Self::publish(&mut state, before.as_ref(), Some(&reservation));
        Ok(())
    }

    pub fn remove(&self, id: &str) -> Result<Reservation, FeedError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(FeedError::Closed);
        }
        let removed = state
            .rows
            .remove(id)
            .ok_or_else(|| FeedError::UnknownReservation(id.to_string()))?;
        Self::publish(&mut state, Some(&removed), None);
        Ok(removed)
    }

    pub fn get(&self, id: &str) -> Option<Reservation> {
        self.state.lock().rows.get(id).cloned()
    }

    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock();
        state.subscriptions.retain(|sub| !sub.sender.is_closed());
        state.subscriptions.len()
    }

    /// Ends every open stream. Later subscriptions and writes fail with [`FeedError::Closed`].
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.subscriptions.clear();
    }

    fn publish(state: &mut FeedState, before: Option<&Reservation>, after: Option<&Reservation>) {
        state.subscriptions.retain(|sub| !sub.sender.is_closed());
        for sub in &state.subscriptions {
            let Some(kind) = sub.scope.transition(before, after) else {
                continue;
            };
            let row = match kind {
                ChangeKind::Removed => before,
                ChangeKind::Added | ChangeKind::Modified => after,
            };
            if let Some(row) = row {
                let _ = sub.sender.send(FeedMessage::Change(ChangeEvent {
                    reservation: row.clone(),
                    kind,
                }));
            }
        }
    }
}

impl ReservationFeed for InMemoryFeed {
    fn watch_owned_by(&self, user_id: &str) -> Result<FeedReceiver, FeedError> {
        self.subscribe(FeedScope::OwnedBy(user_id.to_string()))
    }

    fn watch_pending_requests(&self) -> Result<FeedReceiver, FeedError> {
        self.subscribe(FeedScope::PendingRequests)
    }
}
