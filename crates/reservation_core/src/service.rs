use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, info_span, instrument, Instrument};

use crate::{
    feed::{FeedMessage, FeedReceiver, ReservationFeed},
    gate::{InitialLoadGate, SuppressionPolicy},
    notifications::NotificationSink,
    rules::{AdminRules, ListenerRules, UserRules},
    reservation::{ChangeEvent, Viewer},
};

/// Starts per-viewer listeners that turn feed changes into notifications.
pub struct ReservationNotifier {
    feed: Arc<dyn ReservationFeed>,
    sink: Arc<dyn NotificationSink>,
    policy: SuppressionPolicy,
}

pub struct ReservationNotifierBuilder {
    feed: Option<Arc<dyn ReservationFeed>>,
    sink: Option<Arc<dyn NotificationSink>>,
    policy: SuppressionPolicy,
}

impl ReservationNotifierBuilder {
    pub fn new() -> Self {
        Self {
            feed: None,
            sink: None,
            policy: SuppressionPolicy::default(),
        }
    }

    pub fn with_feed(mut self, feed: Arc<dyn ReservationFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn with_notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_suppression(mut self, policy: SuppressionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> Result<ReservationNotifier> {
        let feed = self
            .feed
            .ok_or_else(|| anyhow!("a reservation feed is required"))?;
        let sink = self
            .sink
            .ok_or_else(|| anyhow!("a notification sink is required"))?;
        Ok(ReservationNotifier {
            feed,
            sink,
            policy: self.policy,
        })
    }
}

impl Default for ReservationNotifierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReservationNotifier {
    pub fn builder() -> ReservationNotifierBuilder {
        ReservationNotifierBuilder::new()
    }

    pub fn policy(&self) -> SuppressionPolicy {
        self.policy
    }

    /// Listens to the user's own reservations. Returns `Ok(None)` for an admin.
    ///
    /// Must be called from within a Tokio runtime.
    #[instrument(skip_all, fields(viewer = %viewer))]
    pub fn start_user_listening(&self, viewer: &Viewer) -> Result<Option<ListenerHandle>> {
        let Viewer::User { id } = viewer else {
            debug!("viewer is not a user; user listener not started");
            return Ok(None);
        };
        self.listen_owned(viewer, id).map(Some)
    }

    /// Listens to incoming pending requests. Returns `Ok(None)` for a user.
    ///
    /// Must be called from within a Tokio runtime.
    #[instrument(skip_all, fields(viewer = %viewer))]
    pub fn start_admin_listening(&self, viewer: &Viewer) -> Result<Option<ListenerHandle>> {
        if !viewer.is_admin() {
            debug!("viewer is not an admin; admin listener not started");
            return Ok(None);
        }
        self.listen_pending(viewer).map(Some)
    }

    /// Starts whichever listener matches the viewer's role.
    pub fn start_listening(&self, viewer: &Viewer) -> Result<ListenerHandle> {
        match viewer {
            Viewer::User { id } => self.listen_owned(viewer, id),
            Viewer::Admin { .. } => self.listen_pending(viewer),
        }
    }

    fn listen_owned(&self, viewer: &Viewer, user_id: &str) -> Result<ListenerHandle> {
        let runtime = current_runtime()?;
        let subscribed_at = Instant::now();
        let receiver = self
            .feed
            .watch_owned_by(user_id)
            .with_context(|| format!("failed to watch reservations owned by `{user_id}`"))?;
        Ok(self.spawn(&runtime, viewer, receiver, UserRules, subscribed_at))
    }

    fn listen_pending(&self, viewer: &Viewer) -> Result<ListenerHandle> {
        let runtime = current_runtime()?;
        let subscribed_at = Instant::now();
        let receiver = self
            .feed
            .watch_pending_requests()
            .context("failed to watch pending requests")?;
        Ok(self.spawn(&runtime, viewer, receiver, AdminRules, subscribed_at))
    }

    fn spawn<R: ListenerRules>(
        &self,
        runtime: &Handle,
        viewer: &Viewer,
        receiver: FeedReceiver,
        rules: R,
        subscribed_at: Instant,
    ) -> ListenerHandle {
        let span = info_span!("listener", viewer = %viewer, rules = rules.name());
        let listener = Listener {
            rules,
            gate: InitialLoadGate::new(self.policy, subscribed_at),
            sink: Arc::clone(&self.sink),
            stats: ListenerStats::default(),
        };
        info!(viewer = %viewer, policy = ?self.policy, "listener started");
        let task = runtime.spawn(listener.run(receiver).instrument(span));
        ListenerHandle {
            viewer: viewer.clone(),
            task,
        }
    }
}

fn current_runtime() -> Result<Handle> {
    Handle::try_current().context("listeners must be started inside a Tokio runtime")
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListenerStats {
    pub received: u64,
    pub presented: u64,
    pub dropped: u64,
}

/// A running listener. It stops on its own once the feed ends its stream;
/// dropping the handle leaves it running.
#[derive(Debug)]
pub struct ListenerHandle {
    viewer: Viewer,
    task: JoinHandle<ListenerStats>,
}

impl ListenerHandle {
    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the feed to close the stream and returns what the listener saw.
    pub async fn closed(self) -> Result<ListenerStats> {
        self.task
            .await
            .with_context(|| format!("listener for {} terminated abnormally", self.viewer))
    }
}

struct Listener<R> {
    rules: R,
    gate: InitialLoadGate,
    sink: Arc<dyn NotificationSink>,
    stats: ListenerStats,
}

impl<R: ListenerRules> Listener<R> {
    async fn run(mut self, mut receiver: FeedReceiver) -> ListenerStats {
        let timer = sleep_until(self.gate.pending_deadline().unwrap_or_else(Instant::now));
        tokio::pin!(timer);

        loop {
            tokio::select! {
                () = &mut timer, if self.gate.pending_deadline().is_some() => {
                    if self.gate.on_deadline() {
                        debug!("suppression window elapsed");
                    }
                }
                message = receiver.recv() => match message {
                    Some(FeedMessage::Change(event)) => self.handle(event),
                    Some(FeedMessage::SnapshotComplete) => {
                        if self.gate.on_snapshot_complete() {
                            debug!("initial snapshot complete");
                        }
                    }
                    None => break,
                },
            }
        }

        info!(
            received = self.stats.received,
            presented = self.stats.presented,
            dropped = self.stats.dropped,
            "feed closed; listener stopped"
        );
        self.stats
    }

    fn handle(&mut self, event: ChangeEvent) {
        self.stats.received += 1;
        let gate = self.gate.state();
        match self.rules.evaluate(&event, gate) {
            Some(notification) => {
                debug!(
                    kind = ?notification.kind,
                    reservation_id = %event.reservation.id,
                    space = %event.reservation.space_name,
                    "presenting notification"
                );
                self.sink.present(notification);
                self.stats.presented += 1;
            }
            None => {
                debug!(
                    change = ?event.kind,
                    status = ?event.reservation.status,
                    reservation_id = %event.reservation.id,
                    ?gate,
                    "change produced no notification"
                );
                self.stats.dropped += 1;
            }
        }
    }
}
