use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{Patch, PatchReceipt, ServerEvent},
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::shared_state::{DocumentStream, PatchError, SharedState};

/// Upper bound for one patch round trip. The timer awaits its patches
/// inline, so a hung request must not stall the countdown for long.
pub const DEFAULT_PATCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state hosted by the `server` binary: snapshots are pushed over a
/// websocket, patches go through `POST /state/patch`.
#[derive(Clone)]
pub struct RemoteSharedState {
    http: Client,
    base_url: Url,
}

impl RemoteSharedState {
    pub fn new(server_url: &str) -> Result<Self> {
        Self::with_timeout(server_url, DEFAULT_PATCH_TIMEOUT)
    }

    pub fn with_timeout(server_url: &str, patch_timeout: Duration) -> Result<Self> {
        let base_url =
            Url::parse(server_url).with_context(|| format!("invalid server url: {server_url}"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(anyhow!("server_url must start with http:// or https://"));
        }
        let http = Client::builder()
            .timeout(patch_timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self { http, base_url })
    }

    pub fn ws_url(&self) -> Result<Url> {
        let mut url = self.base_url.join("/ws")?;
        let scheme = if self.base_url.scheme() == "https" {
            "wss"
        } else {
            "ws"
        };
        url.set_scheme(scheme)
            .map_err(|_| anyhow!("cannot derive websocket url from {}", self.base_url))?;
        Ok(url)
    }

    fn patch_url(&self) -> Result<Url> {
        Ok(self.base_url.join(server_api::state_patch_route())?)
    }
}

#[async_trait]
impl SharedState for RemoteSharedState {
    async fn subscribe(&self) -> Result<DocumentStream> {
        let ws_url = self.ws_url()?;
        let (ws_stream, _) = connect_async(ws_url.as_str())
            .await
            .with_context(|| format!("failed to connect websocket: {ws_url}"))?;
        info!(%ws_url, "subscribed to shared state");

        let documents = ws_stream.filter_map(|msg| async move {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(ServerEvent::Snapshot(snapshot)) => Some(snapshot.document),
                    Ok(ServerEvent::PatchApplied(receipt)) => {
                        debug!(version = receipt.version, "server acknowledged patch");
                        None
                    }
                    Ok(ServerEvent::Error(error)) => {
                        warn!(code = ?error.code, message = %error.message, "server reported error");
                        None
                    }
                    Err(err) => {
                        warn!(error = %err, "invalid server event");
                        None
                    }
                },
                Ok(_) => None,
                Err(err) => {
                    warn!(error = %err, "websocket receive failed");
                    None
                }
            }
        });
        Ok(documents.boxed())
    }

    async fn patch(&self, patch: Patch) -> Result<PatchReceipt, PatchError> {
        let url = self
            .patch_url()
            .map_err(|err| PatchError::Unavailable(err.to_string()))?;
        let response = self
            .http
            .post(url)
            .json(&patch)
            .send()
            .await
            .map_err(|err| PatchError::Unavailable(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<PatchReceipt>()
                .await
                .map_err(|err| PatchError::Unavailable(format!("invalid patch receipt: {err}")));
        }

        match response.json::<ApiError>().await {
            Ok(error) => Err(PatchError::Rejected(error)),
            Err(_) if status == StatusCode::PAYLOAD_TOO_LARGE => Err(PatchError::Rejected(
                ApiError::new(ErrorCode::PayloadTooLarge, "patch body too large"),
            )),
            Err(_) => Err(PatchError::Unavailable(format!(
                "server answered {status} without an error body"
            ))),
        }
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
