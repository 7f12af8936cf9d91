use async_trait::async_trait;
use futures::{stream, StreamExt};
use server_api::DocumentStore;
use shared::protocol::{Patch, PatchReceipt};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::warn;

use crate::shared_state::{DocumentStream, PatchError, SharedState};

/// Shared state hosted inside this process. Used for single-machine setups
/// where the controller and the displays share one runtime, and in tests.
#[derive(Clone, Default)]
pub struct LocalSharedState {
    store: DocumentStore,
}

impl LocalSharedState {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }
}

#[async_trait]
impl SharedState for LocalSharedState {
    async fn subscribe(&self) -> anyhow::Result<DocumentStream> {
        let (initial, receiver) = self.store.subscribe().await;
        let store = self.store.clone();
        let changes = BroadcastStream::new(receiver).then(move |item| {
            let store = store.clone();
            async move {
                match item {
                    Ok(snapshot) => snapshot.document,
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped, "local subscriber lagged; reading latest document");
                        store.snapshot().await.document
                    }
                }
            }
        });
        Ok(stream::once(async move { initial.document })
            .chain(changes)
            .boxed())
    }

    async fn patch(&self, patch: Patch) -> Result<PatchReceipt, PatchError> {
        self.store
            .apply(&patch)
            .await
            .map(|snapshot| PatchReceipt {
                version: snapshot.version,
            })
            .map_err(|err| PatchError::Rejected(err.into()))
    }
}
