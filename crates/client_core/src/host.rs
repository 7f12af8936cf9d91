//! Collaborators supplied by the environment a session runs in: how state is
//! drawn, how the buzzer sounds, and how the screen is kept awake.

use anyhow::Result;
use shared::domain::GameState;

/// Called with every decoded snapshot. Display variants provide their own.
pub trait RenderHook: Send + Sync {
    fn on_state_change(&self, snapshot: &GameState);
}

/// One-shot audio cue. Each call rewinds the cue to its start and plays it.
pub trait BuzzerSink: Send + Sync {
    fn buzz(&self) -> Result<()>;
}

pub trait WakeLock: Send + Sync {
    fn request(&self) -> Result<()>;
    fn release(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Space,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

pub struct NoopRender;

impl RenderHook for NoopRender {
    fn on_state_change(&self, _snapshot: &GameState) {}
}

pub struct SilentBuzzer;

impl BuzzerSink for SilentBuzzer {
    fn buzz(&self) -> Result<()> {
        Ok(())
    }
}

pub struct NoWakeLock;

impl WakeLock for NoWakeLock {
    fn request(&self) -> Result<()> {
        Ok(())
    }

    fn release(&self) -> Result<()> {
        Ok(())
    }
}
