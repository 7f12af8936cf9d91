use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use anyhow::anyhow;
use async_trait::async_trait;
use server_api::DocumentStore;
use shared::{
    domain::{GameState, TeamState},
    protocol::{Patch, PatchReceipt},
};

use crate::{
    host::{BuzzerSink, RenderHook, WakeLock},
    memory::LocalSharedState,
    shared_state::{DocumentStream, PatchError, SharedState},
};

/// `{team1:{score:0,fouls:0},team2:{..},timer:{seconds:0,initialSeconds:600,running:false}}`
pub(crate) fn scenario_state() -> GameState {
    let mut state = GameState::new(
        TeamState::named("Lions", "#ff0000"),
        TeamState::named("Tigers", "#0000ff"),
        600,
    );
    state.timer.seconds = 0;
    state
}

/// In-process store that remembers every patch it was asked to apply, in
/// order, and can be switched into a failing mode.
pub(crate) struct RecordingSharedState {
    inner: LocalSharedState,
    patches: Mutex<Vec<Patch>>,
    failure: Mutex<Option<PatchError>>,
}

impl RecordingSharedState {
    pub(crate) fn seeded(state: &GameState) -> Arc<Self> {
        Arc::new(Self {
            inner: LocalSharedState::new(DocumentStore::seeded(state).expect("seeded store")),
            patches: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        })
    }

    pub(crate) fn unseeded() -> Arc<Self> {
        Arc::new(Self {
            inner: LocalSharedState::default(),
            patches: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        })
    }

    pub(crate) fn store(&self) -> &DocumentStore {
        self.inner.store()
    }

    pub(crate) fn patches(&self) -> Vec<Patch> {
        self.patches.lock().expect("patch log").clone()
    }

    pub(crate) fn fail_with(&self, error: PatchError) {
        *self.failure.lock().expect("failure slot") = Some(error);
    }

    pub(crate) async fn current(&self) -> GameState {
        let snapshot = self.inner.store().snapshot().await;
        serde_json::from_value(snapshot.document.expect("seeded document")).expect("game state")
    }
}

#[async_trait]
impl SharedState for RecordingSharedState {
    async fn subscribe(&self) -> anyhow::Result<DocumentStream> {
        self.inner.subscribe().await
    }

    async fn patch(&self, patch: Patch) -> Result<PatchReceipt, PatchError> {
        self.patches.lock().expect("patch log").push(patch.clone());
        let failure = self.failure.lock().expect("failure slot").clone();
        if let Some(error) = failure {
            return Err(error);
        }
        self.inner.patch(patch).await
    }
}

/// Store whose subscription fails a fixed number of times before working.
pub(crate) struct FlakySubscribe {
    pub(crate) inner: Arc<RecordingSharedState>,
    pub(crate) failures_left: AtomicUsize,
    pub(crate) attempts: AtomicUsize,
}

#[async_trait]
impl SharedState for FlakySubscribe {
    async fn subscribe(&self) -> anyhow::Result<DocumentStream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(anyhow!("document not ready"));
        }
        self.inner.subscribe().await
    }

    async fn patch(&self, patch: Patch) -> Result<PatchReceipt, PatchError> {
        self.inner.patch(patch).await
    }
}

#[derive(Default)]
pub(crate) struct RecordingRender {
    pub(crate) states: Mutex<Vec<GameState>>,
}

impl RecordingRender {
    pub(crate) fn count(&self) -> usize {
        self.states.lock().expect("render log").len()
    }
}

impl RenderHook for RecordingRender {
    fn on_state_change(&self, snapshot: &GameState) {
        self.states
            .lock()
            .expect("render log")
            .push(snapshot.clone());
    }
}

#[derive(Default)]
pub(crate) struct CountingBuzzer {
    pub(crate) plays: AtomicUsize,
}

impl CountingBuzzer {
    pub(crate) fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

impl BuzzerSink for CountingBuzzer {
    fn buzz(&self) -> anyhow::Result<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingWakeLock {
    pub(crate) requests: AtomicUsize,
    pub(crate) releases: AtomicUsize,
}

impl WakeLock for RecordingWakeLock {
    fn request(&self) -> anyhow::Result<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) -> anyhow::Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
