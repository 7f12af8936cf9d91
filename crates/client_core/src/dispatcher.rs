use std::sync::Arc;

use shared::{
    domain::{GameState, Side, TeamId},
    protocol::{
        team_field, Action, Patch, PatchReceipt, SIDES_SWITCHED, TIMER_INITIAL_SECONDS,
        TIMER_RUNNING, TIMER_SECONDS,
    },
};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    shared_state::{PatchError, SharedState},
    snapshot::SnapshotReader,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No snapshot has been observed yet.
    NoSnapshot,
    /// A score or foul action was sent without a team.
    MissingTeam,
}

/// What happened to a command. Callers are free to ignore it; failures have
/// already been logged.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Applied {
        patch: Patch,
        receipt: PatchReceipt,
    },
    Skipped(SkipReason),
    Failed {
        patch: Patch,
        error: PatchError,
    },
}

impl CommandOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub fn patch(&self) -> Option<&Patch> {
        match self {
            Self::Applied { patch, .. } | Self::Failed { patch, .. } => Some(patch),
            Self::Skipped(_) => None,
        }
    }
}

/// Turns an action into the patch it sends, computed against `state`.
///
/// Score and foul changes are relative to the snapshot: two clients acting
/// on the same stale snapshot both write the same value.
pub fn plan_command(
    state: &GameState,
    action: Action,
    team: Option<TeamId>,
) -> Result<Patch, SkipReason> {
    let patch = match action {
        Action::IncScore | Action::DecScore | Action::IncFoul | Action::DecFoul => {
            let team = team.ok_or(SkipReason::MissingTeam)?;
            let current = state.team(team);
            let (field, value) = match action {
                Action::IncScore => ("score", current.score.saturating_add(1)),
                Action::DecScore => ("score", current.score.saturating_sub(1)),
                Action::IncFoul => ("fouls", current.fouls.saturating_add(1)),
                _ => ("fouls", current.fouls.saturating_sub(1)),
            };
            Patch::new().with(team_field(team, field), value)
        }
        Action::StartTimer => Patch::new().with(TIMER_RUNNING, true),
        Action::StopTimer => Patch::new().with(TIMER_RUNNING, false),
        Action::ResetTimer => Patch::new()
            .with(TIMER_SECONDS, state.timer.initial_seconds)
            .with(TIMER_RUNNING, false),
        Action::SwitchSides => Patch::new().with(SIDES_SWITCHED, !state.sides_switched),
    };
    Ok(patch)
}

/// Parses a free-form duration field: leading digits count, anything else is 0.
pub fn parse_duration_input(raw: &str) -> u32 {
    let digits: String = raw
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(0)
}

/// Sends user commands as partial patches against the shared document.
#[derive(Clone)]
pub struct CommandDispatcher {
    store: Arc<dyn SharedState>,
    snapshot: SnapshotReader,
}

impl CommandDispatcher {
    pub fn new(store: Arc<dyn SharedState>, snapshot: SnapshotReader) -> Self {
        Self { store, snapshot }
    }

    /// `team` names a logical team and is used as is, whatever the current
    /// side mapping.
    pub async fn send_command(&self, action: Action, team: Option<TeamId>) -> CommandOutcome {
        let Some(state) = self.snapshot.latest() else {
            return skipped(action.as_str(), SkipReason::NoSnapshot);
        };
        match plan_command(&state, action, team) {
            Ok(patch) => self.submit(action.as_str(), patch).await,
            Err(reason) => skipped(action.as_str(), reason),
        }
    }

    /// For controls bound to a screen position: the side is resolved to the
    /// team currently shown there before the action is planned.
    pub async fn send_command_for_side(&self, action: Action, side: Side) -> CommandOutcome {
        let Some(state) = self.snapshot.latest() else {
            return skipped(action.as_str(), SkipReason::NoSnapshot);
        };
        let team = state.team_for_side(side);
        match plan_command(&state, action, Some(team)) {
            Ok(patch) => self.submit(action.as_str(), patch).await,
            Err(reason) => skipped(action.as_str(), reason),
        }
    }

    /// Fire-and-forget variant of [`Self::send_command`].
    pub fn spawn_command(&self, action: Action, team: Option<TeamId>) -> JoinHandle<CommandOutcome> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.send_command(action, team).await })
    }

    /// Starts the timer when stopped and stops it when running.
    pub async fn toggle_timer(&self) -> CommandOutcome {
        let running = self
            .snapshot
            .latest()
            .map(|state| state.timer.running)
            .unwrap_or(false);
        let action = if running {
            Action::StopTimer
        } else {
            Action::StartTimer
        };
        self.send_command(action, None).await
    }

    /// Sets both the reset target and the remaining time, and stops the clock.
    pub async fn set_timer_duration(&self, minutes: u32, seconds: u32) -> CommandOutcome {
        let total = minutes.saturating_mul(60).saturating_add(seconds);
        let patch = Patch::new()
            .with(TIMER_INITIAL_SECONDS, total)
            .with(TIMER_SECONDS, total)
            .with(TIMER_RUNNING, false);
        self.submit("setTimerDuration", patch).await
    }

    /// Renames and recolors the team shown on `side`.
    pub async fn set_team(&self, side: Side, name: &str, color: &str) -> CommandOutcome {
        let Some(state) = self.snapshot.latest() else {
            return skipped("setTeam", SkipReason::NoSnapshot);
        };
        let team = state.team_for_side(side);
        let patch = Patch::new()
            .with(team_field(team, "name"), name)
            .with(team_field(team, "color"), color);
        self.submit("setTeam", patch).await
    }

    async fn submit(&self, command: &str, patch: Patch) -> CommandOutcome {
        match self.store.patch(patch.clone()).await {
            Ok(receipt) => {
                debug!(command, version = receipt.version, "command applied");
                CommandOutcome::Applied { patch, receipt }
            }
            Err(error) => {
                warn!(command, error = %error, "command patch failed");
                CommandOutcome::Failed { patch, error }
            }
        }
    }
}

fn skipped(command: &str, reason: SkipReason) -> CommandOutcome {
    warn!(command, ?reason, "command ignored");
    CommandOutcome::Skipped(reason)
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
