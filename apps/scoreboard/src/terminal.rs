use std::io::{self, Write};

use anyhow::Result;
use client_core::{BuzzerSink, RenderHook, WakeLock};
use shared::domain::{GameState, Side};
use tracing::info;

/// Prints one status line per snapshot, left team first.
pub struct TerminalRender;

impl RenderHook for TerminalRender {
    fn on_state_change(&self, snapshot: &GameState) {
        println!("{}", status_line(snapshot));
    }
}

pub fn status_line(state: &GameState) -> String {
    let left = state.team_on(Side::Left);
    let right = state.team_on(Side::Right);
    let clock = if state.timer.running {
        format!("{} >", state.clock())
    } else {
        format!("{} ||", state.clock())
    };
    format!(
        "{} {} (F{})  [{}]  (F{}) {} {}",
        left.name, left.score, left.fouls, clock, right.fouls, right.score, right.name
    )
}

/// Rings the terminal bell.
pub struct TerminalBell;

impl BuzzerSink for TerminalBell {
    fn buzz(&self) -> Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(b"\x07")?;
        stdout.flush()?;
        Ok(())
    }
}

/// A terminal cannot keep the screen on; the request is only logged.
pub struct LoggedWakeLock;

impl WakeLock for LoggedWakeLock {
    fn request(&self) -> Result<()> {
        info!("wake lock requested");
        Ok(())
    }

    fn release(&self) -> Result<()> {
        info!("wake lock released");
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/terminal_tests.rs"]
mod tests;
