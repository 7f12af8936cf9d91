use std::{sync::Arc, time::Duration};

use shared::{
    domain::{next_buzzer_stamp, GameState, Role},
    protocol::{Patch, PatchReceipt, LAST_BUZZER, TIMER_RUNNING, TIMER_SECONDS},
};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{
    shared_state::{PatchError, SharedState},
    snapshot::SnapshotReader,
};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// Timer stopped or no snapshot; the last-tick reference was reset.
    Idle,
    /// Running, but a full period has not elapsed yet.
    Waiting,
    Advance { next: u32 },
}

/// Patches sent by one advancing tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub next: u32,
    pub countdown: Result<PatchReceipt, PatchError>,
    /// Only present when the countdown reached zero.
    pub buzzer: Option<Result<PatchReceipt, PatchError>>,
}

/// Advances the shared countdown. Exactly one client, the controller, may
/// run this; see [`TimerAuthority::for_role`].
pub struct TimerAuthority {
    store: Arc<dyn SharedState>,
    snapshot: SnapshotReader,
    tick_interval: Duration,
    tick_period: Duration,
    last_tick: Instant,
}

impl TimerAuthority {
    /// `None` unless `role` is allowed to write the countdown.
    pub fn for_role(
        role: Role,
        store: Arc<dyn SharedState>,
        snapshot: SnapshotReader,
        tick_interval: Duration,
        tick_period: Duration,
    ) -> Option<Self> {
        if !role.is_timer_authority() {
            return None;
        }
        Some(Self {
            store,
            snapshot,
            tick_interval,
            tick_period,
            last_tick: Instant::now(),
        })
    }

    /// Decides what the poll at `now` does. A stopped timer keeps moving the
    /// reference forward so resuming never catches up missed seconds.
    pub fn poll(&mut self, state: Option<&GameState>, now: Instant) -> TickDecision {
        let Some(timer) = state.map(|state| state.timer).filter(|timer| timer.running) else {
            self.last_tick = now;
            return TickDecision::Idle;
        };

        if now.saturating_duration_since(self.last_tick) < self.tick_period {
            return TickDecision::Waiting;
        }

        self.last_tick = now;
        TickDecision::Advance {
            next: timer.seconds.saturating_sub(1),
        }
    }

    /// Polls against the latest snapshot and sends the resulting patches.
    /// The buzzer patch is only sent after the zero-setting patch succeeded.
    pub async fn tick(&mut self) -> Option<TickReport> {
        let state = self.snapshot.latest();
        let TickDecision::Advance { next } = self.poll(state.as_deref(), Instant::now()) else {
            return None;
        };

        let countdown = self
            .store
            .patch(
                Patch::new()
                    .with(TIMER_SECONDS, next)
                    .with(TIMER_RUNNING, next > 0),
            )
            .await;
        if let Err(err) = &countdown {
            warn!(next, error = %err, "countdown patch failed");
        } else {
            debug!(next, "countdown advanced");
        }

        let buzzer = if next == 0 && countdown.is_ok() {
            let previous = state.as_ref().and_then(|state| state.last_buzzer);
            let stamp = next_buzzer_stamp(previous);
            let result = self.store.patch(Patch::new().with(LAST_BUZZER, stamp)).await;
            match &result {
                Ok(_) => info!(stamp, "countdown finished; buzzer signalled"),
                Err(err) => warn!(error = %err, "buzzer patch failed"),
            }
            Some(result)
        } else {
            None
        };

        Some(TickReport {
            next,
            countdown,
            buzzer,
        })
    }

    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_ms = self.tick_interval.as_millis() as u64,
            period_ms = self.tick_period.as_millis() as u64,
            "timer authority started"
        );
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }
}

#[cfg(test)]
#[path = "tests/timer_tests.rs"]
mod tests;
