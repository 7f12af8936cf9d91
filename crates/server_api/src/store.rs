use std::sync::Arc;

use serde_json::Value;
use shared::{
    domain::GameState,
    error::{ApiException, ErrorCode},
    protocol::{DocumentSnapshot, Patch},
};
use tokio::sync::{broadcast, RwLock};

const EVENT_BUFFER: usize = 256;

/// In-memory authoritative copy of the shared game document.
///
/// Every accepted write bumps the version and is broadcast to subscribers
/// while the write lock is held, so subscribers observe versions in order.
#[derive(Clone)]
pub struct DocumentStore {
    inner: Arc<RwLock<DocumentState>>,
    events: broadcast::Sender<DocumentSnapshot>,
}

struct DocumentState {
    version: u64,
    document: Option<Value>,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    /// A store with no document yet. Patches are rejected until it is seeded.
    pub fn new() -> Self {
        Self::with_document(0, None)
    }

    pub fn seeded(state: &GameState) -> Result<Self, ApiException> {
        let document = encode(state)?;
        Ok(Self::with_document(1, Some(document)))
    }

    pub fn with_document(version: u64, document: Option<Value>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(RwLock::new(DocumentState { version, document })),
            events,
        }
    }

    pub async fn snapshot(&self) -> DocumentSnapshot {
        let guard = self.inner.read().await;
        DocumentSnapshot {
            version: guard.version,
            document: guard.document.clone(),
        }
    }

    /// Current snapshot plus a receiver for every later change, with no gap
    /// between the two.
    pub async fn subscribe(&self) -> (DocumentSnapshot, broadcast::Receiver<DocumentSnapshot>) {
        let guard = self.inner.read().await;
        let receiver = self.events.subscribe();
        let snapshot = DocumentSnapshot {
            version: guard.version,
            document: guard.document.clone(),
        };
        (snapshot, receiver)
    }

    /// Applies all fields of `patch` as one new version. The result must
    /// still decode as a [`GameState`]; otherwise nothing changes.
    pub async fn apply(&self, patch: &Patch) -> Result<DocumentSnapshot, ApiException> {
        if patch.is_empty() {
            return Err(ApiException::new(ErrorCode::Validation, "patch is empty"));
        }

        let mut guard = self.inner.write().await;
        let Some(current) = guard.document.as_ref() else {
            return Err(ApiException::not_initialized());
        };

        let mut candidate = current.clone();
        patch
            .apply_to(&mut candidate)
            .map_err(|err| ApiException::new(ErrorCode::Validation, err.to_string()))?;
        validate(&candidate)?;

        Ok(commit(&mut guard, &self.events, candidate))
    }

    /// Replaces the whole document, e.g. when an operator seeds a new game.
    pub async fn replace(&self, state: &GameState) -> Result<DocumentSnapshot, ApiException> {
        let document = encode(state)?;
        let mut guard = self.inner.write().await;
        Ok(commit(&mut guard, &self.events, document))
    }
}

fn encode(state: &GameState) -> Result<Value, ApiException> {
    serde_json::to_value(state)
        .map_err(|err| ApiException::new(ErrorCode::Internal, err.to_string()))
}

fn validate(candidate: &Value) -> Result<(), ApiException> {
    serde_json::from_value::<GameState>(candidate.clone())
        .map(|_| ())
        .map_err(|err| {
            ApiException::new(
                ErrorCode::Validation,
                format!("patch would leave an invalid game state: {err}"),
            )
        })
}

fn commit(
    state: &mut DocumentState,
    events: &broadcast::Sender<DocumentSnapshot>,
    document: Value,
) -> DocumentSnapshot {
    state.version += 1;
    state.document = Some(document);
    let snapshot = DocumentSnapshot {
        version: state.version,
        document: state.document.clone(),
    };
    // no subscribers is fine
    let _ = events.send(snapshot.clone());
    snapshot
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
