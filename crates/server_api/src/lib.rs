use shared::{
    domain::GameState,
    error::{ApiError, ErrorCode},
    protocol::{DocumentSnapshot, Patch, PatchReceipt},
};
use storage::{Storage, GAME_DOCUMENT};
use tracing::{error, info};

mod store;

pub use store::DocumentStore;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub documents: DocumentStore,
}

impl ApiContext {
    /// Builds the context from whatever game document the database holds.
    /// An empty database yields an unseeded store.
    pub async fn load(storage: Storage) -> anyhow::Result<Self> {
        let documents = match storage.load_document(GAME_DOCUMENT).await? {
            Some(stored) => {
                info!(
                    version = stored.version,
                    updated_at = %stored.updated_at,
                    "loaded game document"
                );
                DocumentStore::with_document(stored.version, Some(stored.body))
            }
            None => {
                info!("no game document stored yet; waiting for seed");
                DocumentStore::new()
            }
        };
        Ok(Self { storage, documents })
    }
}

pub fn state_route() -> &'static str {
    "/state"
}

pub fn state_patch_route() -> &'static str {
    "/state/patch"
}

pub async fn current_snapshot(ctx: &ApiContext) -> DocumentSnapshot {
    ctx.documents.snapshot().await
}

pub async fn apply_patch(ctx: &ApiContext, patch: &Patch) -> Result<PatchReceipt, ApiError> {
    let snapshot = ctx.documents.apply(patch).await?;
    persist(ctx, &snapshot).await;
    Ok(PatchReceipt {
        version: snapshot.version,
    })
}

pub async fn replace_state(ctx: &ApiContext, state: &GameState) -> Result<PatchReceipt, ApiError> {
    let snapshot = ctx.documents.replace(state).await?;
    persist(ctx, &snapshot).await;
    info!(version = snapshot.version, "game document replaced");
    Ok(PatchReceipt {
        version: snapshot.version,
    })
}

/// The in-memory store is authoritative once a write is accepted; a failed
/// durable write is logged and the next successful one catches up.
async fn persist(ctx: &ApiContext, snapshot: &DocumentSnapshot) {
    let Some(document) = snapshot.document.as_ref() else {
        return;
    };
    if let Err(err) = ctx
        .storage
        .save_document(GAME_DOCUMENT, snapshot.version, document)
        .await
    {
        error!(version = snapshot.version, error = %err, "failed to persist game document");
    }
}

pub fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
