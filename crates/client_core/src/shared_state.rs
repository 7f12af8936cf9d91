use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use shared::{
    error::ApiError,
    protocol::{Patch, PatchReceipt},
};
use thiserror::Error;

/// Every change of the shared document, starting with its current value.
/// `None` means the document does not exist (yet).
pub type DocumentStream = BoxStream<'static, Option<Value>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("patch rejected: {0:?}")]
    Rejected(ApiError),
    #[error("shared state unavailable: {0}")]
    Unavailable(String),
}

/// A subscribable document that accepts partial patches.
#[async_trait]
pub trait SharedState: Send + Sync {
    async fn subscribe(&self) -> anyhow::Result<DocumentStream>;
    async fn patch(&self, patch: Patch) -> Result<PatchReceipt, PatchError>;
}
