use std::{sync::Arc, time::Duration};

use shared::domain::{GameState, Role};
use tokio::task::JoinHandle;
use tracing::info;

use crate::{
    buzzer::{BuzzerListener, BuzzerPolicy},
    dispatcher::{CommandDispatcher, CommandOutcome},
    host::{BuzzerSink, Key, NoWakeLock, NoopRender, RenderHook, SilentBuzzer, Visibility, WakeLock},
    shared_state::SharedState,
    snapshot::{snapshot_channel, SnapshotReader},
    synchronizer::{Synchronizer, DEFAULT_SUBSCRIBE_RETRY},
    timer::{TimerAuthority, DEFAULT_TICK_INTERVAL, DEFAULT_TICK_PERIOD},
    wake::WakeLockController,
};

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub role: Role,
    pub tick_interval: Duration,
    pub tick_period: Duration,
    pub subscribe_retry: Duration,
    pub buzzer_policy: BuzzerPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            role: Role::Viewer,
            tick_interval: DEFAULT_TICK_INTERVAL,
            tick_period: DEFAULT_TICK_PERIOD,
            subscribe_retry: DEFAULT_SUBSCRIBE_RETRY,
            buzzer_policy: BuzzerPolicy::default(),
        }
    }
}

impl SessionOptions {
    pub fn for_role(role: Role) -> Self {
        Self {
            role,
            ..Self::default()
        }
    }
}

pub struct SessionHooks {
    pub render: Arc<dyn RenderHook>,
    pub buzzer: Arc<dyn BuzzerSink>,
    pub wake_lock: Arc<dyn WakeLock>,
}

impl Default for SessionHooks {
    fn default() -> Self {
        Self {
            render: Arc::new(NoopRender),
            buzzer: Arc::new(SilentBuzzer),
            wake_lock: Arc::new(NoWakeLock),
        }
    }
}

/// Render hook wrapper that keeps the wake lock in step with the clock.
struct SessionRender {
    inner: Arc<dyn RenderHook>,
    wake: Arc<WakeLockController>,
}

impl RenderHook for SessionRender {
    fn on_state_change(&self, snapshot: &GameState) {
        self.wake.on_timer_state(snapshot.timer.running);
        self.inner.on_state_change(snapshot);
    }
}

/// One client's view of the scoreboard: the synchronizer owns the snapshot,
/// everything else reads it. Background tasks stop when the session drops.
pub struct Session {
    role: Role,
    dispatcher: CommandDispatcher,
    snapshot: SnapshotReader,
    wake: Arc<WakeLockController>,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Spawns the session's tasks on the current runtime. The timer
    /// authority only runs for [`Role::Controller`].
    pub fn start(store: Arc<dyn SharedState>, options: SessionOptions, hooks: SessionHooks) -> Self {
        let (writer, snapshot) = snapshot_channel();
        let wake = Arc::new(WakeLockController::new(hooks.wake_lock));
        let render = Arc::new(SessionRender {
            inner: hooks.render,
            wake: Arc::clone(&wake),
        });

        let buzzer = BuzzerListener::new(writer.reader(), hooks.buzzer, options.buzzer_policy);
        let timer = TimerAuthority::for_role(
            options.role,
            Arc::clone(&store),
            writer.reader(),
            options.tick_interval,
            options.tick_period,
        );
        let synchronizer = Synchronizer::new(
            Arc::clone(&store),
            writer,
            render,
            options.subscribe_retry,
        );

        let mut tasks = vec![
            tokio::spawn(synchronizer.run()),
            tokio::spawn(buzzer.run()),
        ];
        if let Some(timer) = timer {
            tasks.push(tokio::spawn(timer.run()));
        }
        info!(role = ?options.role, "scoreboard session started");

        Self {
            role: options.role,
            dispatcher: CommandDispatcher::new(store, snapshot.clone()),
            snapshot,
            wake,
            tasks,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn snapshot(&self) -> SnapshotReader {
        self.snapshot.clone()
    }

    pub fn latest(&self) -> Option<Arc<GameState>> {
        self.snapshot.latest()
    }

    pub fn wake_lock_held(&self) -> bool {
        self.wake.is_held()
    }

    /// Space toggles the clock; other keys are ignored.
    pub async fn on_key(&self, key: Key) -> Option<CommandOutcome> {
        match key {
            Key::Space => Some(self.dispatcher.toggle_timer().await),
            Key::Char(_) => None,
        }
    }

    pub fn on_visibility_change(&self, visibility: Visibility) {
        self.wake.on_visibility_change(visibility);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
