//! JSON-lines replay scripts that drive the in-memory feed.
//!
//! ```text
//! {"op":"upsert","seed":true,"reservation":{"id":"r1","owner_id":"u1","space_name":"Lab 1","status":"approved"}}
//! {"at_ms":2500,"op":"remove","id":"r1"}
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reservation_core::{InMemoryFeed, Reservation};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptOp {
    Upsert {
        reservation: Reservation,
        #[serde(default)]
        seed: bool,
    },
    Remove {
        id: String,
    },
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ScriptStep {
    #[serde(default)]
    pub at_ms: u64,
    #[serde(flatten)]
    pub op: ScriptOp,
}

impl ScriptStep {
    pub fn is_seed(&self) -> bool {
        matches!(self.op, ScriptOp::Upsert { seed: true, .. })
    }

    pub fn offset(&self) -> Duration {
        Duration::from_millis(self.at_ms)
    }

    pub fn apply(&self, feed: &InMemoryFeed) -> Result<()> {
        match &self.op {
            ScriptOp::Upsert { reservation, .. } => feed
                .upsert(reservation.clone())
                .with_context(|| format!("failed to upsert `{}`", reservation.id)),
            ScriptOp::Remove { id } => feed
                .remove(id)
                .map(|_| ())
                .with_context(|| format!("failed to remove `{id}`")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayScript {
    seed: Vec<ScriptStep>,
    timed: Vec<ScriptStep>,
}

impl ReplayScript {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read replay script {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("invalid replay script {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let mut script = Self::default();
        let mut last_offset = 0u64;
        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let step: ScriptStep = serde_json::from_str(line)
                .with_context(|| format!("line {}: malformed step", index + 1))?;
            if step.is_seed() {
                script.seed.push(step);
                continue;
            }
            if step.at_ms < last_offset {
                bail!(
                    "line {}: at_ms {} goes back in time (previous step at {})",
                    index + 1,
                    step.at_ms,
                    last_offset
                );
            }
            last_offset = step.at_ms;
            script.timed.push(step);
        }
        Ok(script)
    }

    /// Rows present before any listener subscribes.
    pub fn seed_steps(&self) -> &[ScriptStep] {
        &self.seed
    }

    pub fn timed_steps(&self) -> &[ScriptStep] {
        &self.timed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reservation_core::ReservationStatus;

    const SCRIPT: &str = r#"
# backlog
{"op":"upsert","seed":true,"reservation":{"id":"r1","owner_id":"u1","space_name":"Lab 1","status":"approved"}}

{"at_ms":500,"op":"upsert","reservation":{"id":"r2","owner_id":"u1","space_name":"Lab 2","status":"pending"}}
{"at_ms":2500,"op":"remove","id":"r1"}
"#;

    #[test]
    fn parse_splits_seed_and_timed_steps() {
        let script = ReplayScript::parse(SCRIPT).unwrap();
        assert_eq!(script.seed_steps().len(), 1);
        assert_eq!(script.timed_steps().len(), 2);
        assert_eq!(script.timed_steps()[1].offset(), Duration::from_millis(2500));
        assert_eq!(
            script.timed_steps()[1].op,
            ScriptOp::Remove { id: "r1".into() }
        );
    }

    #[test]
    fn parse_rejects_steps_out_of_order() {
        let script = r#"{"at_ms":900,"op":"remove","id":"a"}
{"at_ms":100,"op":"remove","id":"b"}"#;
        let err = ReplayScript::parse(script).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn apply_writes_through_to_the_feed() {
        let script = ReplayScript::parse(SCRIPT).unwrap();
        let feed = InMemoryFeed::new();
        script.seed_steps()[0].apply(&feed).unwrap();
        assert_eq!(
            feed.get("r1").map(|row| row.status),
            Some(ReservationStatus::Approved)
        );
        script.timed_steps()[1].apply(&feed).unwrap();
        assert!(feed.get("r1").is_none());
        assert!(script.timed_steps()[1].apply(&feed).is_err());
    }

    #[test]
    fn load_reads_script_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("feed.jsonl");
        fs::write(&path, SCRIPT).expect("write script");
        let script = ReplayScript::load(&path).unwrap();
        assert_eq!(script.timed_steps().len(), 2);

        assert!(ReplayScript::load(dir.path().join("missing.jsonl")).is_err());
    }
}
