use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::host::{Visibility, WakeLock};

/// Holds the screen awake while the clock runs and the display is visible.
pub struct WakeLockController {
    lock: Arc<dyn WakeLock>,
    state: Mutex<WakeState>,
}

#[derive(Debug, Clone, Copy)]
struct WakeState {
    held: bool,
    visible: bool,
    running: bool,
}

impl WakeLockController {
    pub fn new(lock: Arc<dyn WakeLock>) -> Self {
        Self {
            lock,
            state: Mutex::new(WakeState {
                held: false,
                visible: true,
                running: false,
            }),
        }
    }

    pub fn is_held(&self) -> bool {
        self.state.lock().map(|state| state.held).unwrap_or(false)
    }

    /// Called from the render path with the latest `timer.running`.
    pub fn on_timer_state(&self, running: bool) {
        self.update(|state| state.running = running);
    }

    pub fn on_visibility_change(&self, visibility: Visibility) {
        self.update(|state| state.visible = visibility == Visibility::Visible);
    }

    fn update(&self, change: impl FnOnce(&mut WakeState)) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        change(&mut *state);

        let want = state.running && state.visible;
        if want == state.held {
            return;
        }

        let result = if want {
            self.lock.request()
        } else {
            self.lock.release()
        };
        match result {
            Ok(()) => {
                state.held = want;
                info!(held = want, "screen wake lock updated");
            }
            Err(err) => warn!(error = %err, acquire = want, "screen wake lock request failed"),
        }
    }
}

#[cfg(test)]
#[path = "tests/wake_tests.rs"]
mod tests;
