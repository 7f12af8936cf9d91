use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use serde_json::Value;
use shared::domain::GameState;
use tracing::{debug, info, warn};

use crate::{
    host::RenderHook,
    shared_state::SharedState,
    snapshot::{SnapshotReader, SnapshotWriter},
};

pub const DEFAULT_SUBSCRIBE_RETRY: Duration = Duration::from_millis(500);

/// Keeps the session's snapshot in step with the shared document and hands
/// every decoded state to the render hook.
pub struct Synchronizer {
    store: Arc<dyn SharedState>,
    writer: SnapshotWriter,
    render: Arc<dyn RenderHook>,
    retry_delay: Duration,
}

impl Synchronizer {
    pub fn new(
        store: Arc<dyn SharedState>,
        writer: SnapshotWriter,
        render: Arc<dyn RenderHook>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            store,
            writer,
            render,
            retry_delay,
        }
    }

    pub fn reader(&self) -> SnapshotReader {
        self.writer.reader()
    }

    /// Runs for the lifetime of the session. Failed or ended subscriptions
    /// are set up again after `retry_delay`.
    pub async fn run(self) {
        loop {
            match self.store.subscribe().await {
                Ok(mut documents) => {
                    while let Some(document) = documents.next().await {
                        self.handle_document(document);
                    }
                    warn!("shared state subscription ended; resubscribing");
                }
                Err(err) => {
                    warn!(error = %err, retry_ms = self.retry_delay.as_millis() as u64, "shared state not ready; retrying subscription");
                }
            }
            tokio::time::sleep(self.retry_delay).await;
        }
    }

    /// Returns whether the document produced a new snapshot.
    pub fn handle_document(&self, document: Option<Value>) -> bool {
        let Some(document) = document else {
            debug!("shared document absent; waiting for it to be seeded");
            return false;
        };

        match serde_json::from_value::<GameState>(document) {
            Ok(state) => {
                if !self.writer.has_snapshot() {
                    info!(
                        team1 = %state.team1.name,
                        team2 = %state.team2.name,
                        clock = %state.clock(),
                        "initial game state received"
                    );
                }
                let state = Arc::new(state);
                self.writer.publish(Arc::clone(&state));
                self.render.on_state_change(&state);
                true
            }
            Err(err) => {
                warn!(error = %err, "skipping malformed game state");
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/synchronizer_tests.rs"]
mod tests;
