use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    domain::{ParseKindError, TeamId},
    error::ApiError,
};

pub const TIMER_SECONDS: &str = "timer/seconds";
pub const TIMER_INITIAL_SECONDS: &str = "timer/initialSeconds";
pub const TIMER_RUNNING: &str = "timer/running";
pub const SIDES_SWITCHED: &str = "sidesSwitched";
pub const LAST_BUZZER: &str = "lastBuzzer";

/// Path of a per-team field, e.g. `team1/score`.
pub fn team_field(team: TeamId, field: &str) -> String {
    format!("{}/{field}", team.as_str())
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchPathError {
    #[error("patch path '{0}' is empty or has an empty segment")]
    EmptySegment(String),
    #[error("patch path '{path}' walks through non-object value at '{segment}'")]
    NotAnObject { path: String, segment: String },
}

/// A partial update: `/`-separated field paths mapped to their new values.
/// All fields of one patch are applied together as a single version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(Map<String, Value>);

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(path, value);
        self
    }

    pub fn set(&mut self, path: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(path.into(), value.into());
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.0.get(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Writes every field into `document`, creating intermediate objects as
    /// needed. A `null` value removes the field. On error `document` may be
    /// partially updated, so callers apply to a copy.
    pub fn apply_to(&self, document: &mut Value) -> Result<(), PatchPathError> {
        for (path, value) in &self.0 {
            let segments: Vec<&str> = path.split('/').collect();
            if segments.iter().any(|segment| segment.is_empty()) {
                return Err(PatchPathError::EmptySegment(path.clone()));
            }
            let (leaf, parents) = segments
                .split_last()
                .ok_or_else(|| PatchPathError::EmptySegment(path.clone()))?;

            let mut cursor = &mut *document;
            if cursor.is_null() {
                *cursor = Value::Object(Map::new());
            }
            for segment in parents {
                let object = cursor
                    .as_object_mut()
                    .ok_or_else(|| PatchPathError::NotAnObject {
                        path: path.clone(),
                        segment: (*segment).to_string(),
                    })?;
                cursor = object
                    .entry(*segment)
                    .or_insert_with(|| Value::Object(Map::new()));
                if cursor.is_null() {
                    *cursor = Value::Object(Map::new());
                }
            }

            let object = cursor
                .as_object_mut()
                .ok_or_else(|| PatchPathError::NotAnObject {
                    path: path.clone(),
                    segment: (*leaf).to_string(),
                })?;
            if value.is_null() {
                object.remove(*leaf);
            } else {
                object.insert((*leaf).to_string(), value.clone());
            }
        }
        Ok(())
    }
}

/// User intents understood by the command dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    IncScore,
    DecScore,
    IncFoul,
    DecFoul,
    StartTimer,
    StopTimer,
    ResetTimer,
    SwitchSides,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::IncScore,
        Action::DecScore,
        Action::IncFoul,
        Action::DecFoul,
        Action::StartTimer,
        Action::StopTimer,
        Action::ResetTimer,
        Action::SwitchSides,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::IncScore => "incScore",
            Self::DecScore => "decScore",
            Self::IncFoul => "incFoul",
            Self::DecFoul => "decFoul",
            Self::StartTimer => "startTimer",
            Self::StopTimer => "stopTimer",
            Self::ResetTimer => "resetTimer",
            Self::SwitchSides => "switchSides",
        }
    }

    /// Whether the action needs a team argument.
    pub fn is_team_scoped(self) -> bool {
        matches!(
            self,
            Self::IncScore | Self::DecScore | Self::IncFoul | Self::DecFoul
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ParseKindError;

    /// Accepts the camelCase wire name (`incScore`) or a kebab-case spelling
    /// (`inc-score`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|action| action.as_str().to_ascii_lowercase() == folded)
            .ok_or_else(|| ParseKindError {
                kind: "action",
                value: s.trim().to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchReceipt {
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub version: u64,
    pub document: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientRequest {
    Patch(Patch),
    /// Ask the server to resend the current snapshot.
    Resync,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    Snapshot(DocumentSnapshot),
    PatchApplied(PatchReceipt),
    Error(ApiError),
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
