use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reservation_core::{
    InMemoryFeed, Notification, NotificationSink, ReservationNotifier, SuppressionPolicy, Viewer,
    DEFAULT_SUPPRESSION_WINDOW,
};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::script::ReplayScript;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub(crate) viewer: Viewer,
    pub(crate) script: Option<PathBuf>,
    pub(crate) suppression: SuppressionPolicy,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        let id = lookup("RESERVATION_VIEWER_ID")
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| config.viewer.id().to_string());
        config.viewer = match lookup("RESERVATION_VIEWER_ROLE")
            .as_deref()
            .map(str::trim)
            .unwrap_or("user")
        {
            role if role.eq_ignore_ascii_case("user") => Viewer::user(id),
            role if role.eq_ignore_ascii_case("admin") => Viewer::admin(id),
            other => bail!("unknown RESERVATION_VIEWER_ROLE `{other}` (expected user or admin)"),
        };

        if let Some(path) = lookup("RESERVATION_FEED_SCRIPT") {
            if !path.trim().is_empty() {
                config.script = Some(PathBuf::from(path.trim()));
            }
        }

        let window = lookup("RESERVATION_SUPPRESSION_MS")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SUPPRESSION_WINDOW);
        config.suppression = match lookup("RESERVATION_SUPPRESSION_MODE")
            .as_deref()
            .map(str::trim)
            .unwrap_or("delay")
        {
            mode if mode.eq_ignore_ascii_case("delay") => SuppressionPolicy::FixedDelay(window),
            mode if mode.eq_ignore_ascii_case("snapshot") => SuppressionPolicy::SnapshotMarker,
            other => {
                bail!("unknown RESERVATION_SUPPRESSION_MODE `{other}` (expected delay or snapshot)")
            }
        };

        Ok(config)
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            viewer: Viewer::user("demo-user"),
            script: None,
            suppression: SuppressionPolicy::default(),
        }
    }
}

/// Presents notifications on stdout and in the log.
#[derive(Debug, Default)]
pub struct LoggingSink;

impl NotificationSink for LoggingSink {
    fn present(&self, notification: Notification) {
        info!(
            kind = ?notification.kind,
            title = %notification.title,
            body = %notification.body,
            "notification"
        );
        println!("{}\n  {}", notification.title, notification.body);
    }
}

pub fn run(config: AppConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(replay(config, Arc::new(LoggingSink)))
}

pub(crate) async fn replay(config: AppConfig, sink: Arc<dyn NotificationSink>) -> Result<()> {
    let script = match &config.script {
        Some(path) => ReplayScript::load(path)?,
        None => ReplayScript::default(),
    };
    info!(
        viewer = %config.viewer,
        seed = script.seed_steps().len(),
        steps = script.timed_steps().len(),
        "starting replay"
    );

    let feed = Arc::new(InMemoryFeed::new());
    for step in script.seed_steps() {
        step.apply(&feed)?;
    }

    let notifier = ReservationNotifier::builder()
        .with_feed(feed.clone())
        .with_notification_sink(sink)
        .with_suppression(config.suppression)
        .build()?;
    let handle = notifier.start_listening(&config.viewer)?;

    let started = Instant::now();
    for step in script.timed_steps() {
        sleep_until(started + step.offset()).await;
        debug!(at_ms = step.at_ms, op = ?step.op, "applying step");
        step.apply(&feed)?;
    }

    feed.close();
    let stats = handle.closed().await?;
    info!(
        received = stats.received,
        presented = stats.presented,
        dropped = stats.dropped,
        "replay finished"
    );
    Ok(())
}
