use std::{fmt, str::FromStr};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default countdown for a freshly seeded game (ten minutes).
pub const DEFAULT_INITIAL_SECONDS: u32 = 600;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseKindError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseKindError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Logical team slot inside the shared document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamId {
    Team1,
    Team2,
}

impl TeamId {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Team1 => "team1",
            Self::Team2 => "team2",
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::Team1 => Self::Team2,
            Self::Team2 => Self::Team1,
        }
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TeamId {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "team1" | "1" => Ok(Self::Team1),
            "team2" | "2" => Ok(Self::Team2),
            other => Err(ParseKindError::new("team", other)),
        }
    }
}

/// Visual position on a display. Which team sits where depends on
/// `GameState::sides_switched`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl FromStr for Side {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(ParseKindError::new("side", other)),
        }
    }
}

/// Capability assigned to a client at startup. Only the controller advances
/// the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Controller,
    #[default]
    Viewer,
}

impl Role {
    pub fn is_timer_authority(self) -> bool {
        matches!(self, Self::Controller)
    }
}

impl FromStr for Role {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "controller" => Ok(Self::Controller),
            "viewer" | "display" => Ok(Self::Viewer),
            other => Err(ParseKindError::new("role", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamState {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub fouls: u32,
}

impl TeamState {
    pub fn named(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            score: 0,
            fouls: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub seconds: u32,
    pub initial_seconds: u32,
    pub running: bool,
}

/// The single shared document every client reads and patches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub team1: TeamState,
    pub team2: TeamState,
    pub timer: TimerState,
    #[serde(default)]
    pub sides_switched: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_buzzer: Option<i64>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(
            TeamState::named("Home", "#ffffff"),
            TeamState::named("Away", "#ffcc00"),
            DEFAULT_INITIAL_SECONDS,
        )
    }
}

impl GameState {
    pub fn new(team1: TeamState, team2: TeamState, initial_seconds: u32) -> Self {
        Self {
            team1,
            team2,
            timer: TimerState {
                seconds: initial_seconds,
                initial_seconds,
                running: false,
            },
            sides_switched: false,
            last_buzzer: None,
        }
    }

    pub fn team(&self, team: TeamId) -> &TeamState {
        match team {
            TeamId::Team1 => &self.team1,
            TeamId::Team2 => &self.team2,
        }
    }

    /// Logical team currently shown on `side`.
    pub fn team_for_side(&self, side: Side) -> TeamId {
        let unswitched = match side {
            Side::Left => TeamId::Team1,
            Side::Right => TeamId::Team2,
        };
        if self.sides_switched {
            unswitched.other()
        } else {
            unswitched
        }
    }

    pub fn team_on(&self, side: Side) -> &TeamState {
        self.team(self.team_for_side(side))
    }

    pub fn clock(&self) -> String {
        format_clock(self.timer.seconds)
    }
}

/// Formats remaining seconds as `MM:SS`. Minutes are not wrapped into hours.
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Timestamp for a new buzzer signal. Never returns a value at or below
/// `previous` so observers always see a change.
pub fn next_buzzer_stamp(previous: Option<i64>) -> i64 {
    let now = Utc::now().timestamp_millis();
    match previous {
        Some(previous) if previous >= now => previous + 1,
        _ => now,
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
