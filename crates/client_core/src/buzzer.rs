use std::{str::FromStr, sync::Arc};

use shared::domain::{GameState, ParseKindError};
use tracing::{info, warn};

use crate::{host::BuzzerSink, snapshot::SnapshotReader};

/// Whether the first snapshot a client sees may sound the buzzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuzzerPolicy {
    /// Remember the first value without sounding; only later changes buzz.
    #[default]
    SkipInitial,
    /// Sound once for the first snapshot, whatever it holds.
    FireOnInitial,
}

impl FromStr for BuzzerPolicy {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip-initial" | "skip_initial" | "skip" => Ok(Self::SkipInitial),
            "fire-on-initial" | "fire_on_initial" | "fire" => Ok(Self::FireOnInitial),
            other => Err(ParseKindError {
                kind: "buzzer policy",
                value: other.to_string(),
            }),
        }
    }
}

/// Sounds the buzzer whenever `lastBuzzer` changes.
pub struct BuzzerListener {
    snapshot: SnapshotReader,
    sink: Arc<dyn BuzzerSink>,
    policy: BuzzerPolicy,
    last_seen: Option<Option<i64>>,
}

impl BuzzerListener {
    pub fn new(snapshot: SnapshotReader, sink: Arc<dyn BuzzerSink>, policy: BuzzerPolicy) -> Self {
        Self {
            snapshot,
            sink,
            policy,
            last_seen: None,
        }
    }

    /// Feeds one snapshot; returns whether the buzzer sounded. A signal that
    /// disappears (e.g. after a reseed) is remembered but does not buzz.
    pub fn observe(&mut self, state: &GameState) -> bool {
        let current = state.last_buzzer;
        let fire = match self.last_seen {
            None => self.policy == BuzzerPolicy::FireOnInitial,
            Some(previous) => current.is_some() && current != previous,
        };
        self.last_seen = Some(current);

        if fire {
            info!(stamp = ?current, "buzzer");
            if let Err(err) = self.sink.buzz() {
                warn!(error = %err, "buzzer playback failed");
            }
        }
        fire
    }

    pub async fn run(mut self) {
        while let Some(state) = self.snapshot.next().await {
            self.observe(&state);
        }
    }
}

#[cfg(test)]
#[path = "tests/buzzer_tests.rs"]
mod tests;
