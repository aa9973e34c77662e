//! Initial-load suppression.
//!
//! A change feed replays existing rows as ordinary additions when a listener
//! subscribes. The gate starts out suppressing and opens once, either after a
//! fixed delay or when the feed reports the end of its initial snapshot.
//! Neither signal is a guarantee under [`SuppressionPolicy::FixedDelay`]: a
//! backlog slower than the window still leaks through.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

pub const DEFAULT_SUPPRESSION_WINDOW: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SuppressionPolicy {
    /// Open the gate a fixed time after subscription. Snapshot markers are ignored.
    FixedDelay(Duration),
    /// Open the gate on the feed's first end-of-snapshot marker.
    SnapshotMarker,
}

impl Default for SuppressionPolicy {
    fn default() -> Self {
        SuppressionPolicy::FixedDelay(DEFAULT_SUPPRESSION_WINDOW)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Suppressing,
    Active,
}

/// Per-listener suppression flag. Owned by exactly one listener task.
#[derive(Debug)]
pub struct InitialLoadGate {
    state: GateState,
    policy: SuppressionPolicy,
    opens_at: Option<Instant>,
}

impl InitialLoadGate {
    pub fn new(policy: SuppressionPolicy, subscribed_at: Instant) -> Self {
        let opens_at = match policy {
            SuppressionPolicy::FixedDelay(window) => Some(subscribed_at + window),
            SuppressionPolicy::SnapshotMarker => None,
        };
        Self {
            state: GateState::Suppressing,
            policy,
            opens_at,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_suppressing(&self) -> bool {
        self.state == GateState::Suppressing
    }

    pub fn policy(&self) -> SuppressionPolicy {
        self.policy
    }

    /// Deadline of the pending timed transition, if one is still outstanding.
    pub fn pending_deadline(&self) -> Option<Instant> {
        match self.state {
            GateState::Suppressing => self.opens_at,
            GateState::Active => None,
        }
    }

    /// Fires the timed transition. Returns `true` if the gate opened.
    pub fn on_deadline(&mut self) -> bool {
        match self.policy {
            SuppressionPolicy::FixedDelay(_) => self.open(),
            SuppressionPolicy::SnapshotMarker => false,
        }
    }

    /// Handles an end-of-snapshot marker. Returns `true` if the gate opened.
    pub fn on_snapshot_complete(&mut self) -> bool {
        match self.policy {
            SuppressionPolicy::SnapshotMarker => self.open(),
            SuppressionPolicy::FixedDelay(_) => false,
        }
    }

    fn open(&mut self) -> bool {
        if self.state == GateState::Active {
            return false;
        }
        self.state = GateState::Active;
        true
    }
}
