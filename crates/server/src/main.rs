use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use server_api::{apply_patch, current_snapshot, internal, replace_state, ApiContext};
use shared::{
    domain::GameState,
    error::{ApiError, ErrorCode},
    protocol::{ClientRequest, DocumentSnapshot, Patch, PatchReceipt, ServerEvent},
};
use storage::Storage;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, prepare_database_url};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext::load(storage).await?;

    let state = AppState {
        api,
        max_patch_bytes: settings.max_patch_bytes,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let max_patch_bytes = state.max_patch_bytes;
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            server_api::state_route(),
            get(http_get_state).put(http_replace_state),
        )
        .route(server_api::state_patch_route(), post(http_patch_state))
        .route("/ws", get(ws_handler))
        .layer(RequestBodyLimitLayer::new(max_patch_bytes))
        .layer(middleware::map_response_with_state(
            Arc::clone(&state),
            payload_too_large_as_api_error,
        ))
        .with_state(state)
}

fn patch_too_large(max_patch_bytes: usize) -> ApiError {
    ApiError::new(
        ErrorCode::PayloadTooLarge,
        format!("patch exceeds the {max_patch_bytes} byte limit"),
    )
}

/// The body limit layer and the JSON extractor answer 413 in plain text;
/// clients expect an `ApiError` body.
async fn payload_too_large_as_api_error(
    State(state): State<Arc<AppState>>,
    response: Response,
) -> Response {
    if response.status() != StatusCode::PAYLOAD_TOO_LARGE {
        return response;
    }
    error_response(patch_too_large(state.max_patch_bytes)).into_response()
}

async fn healthz(
    State(state): State<Arc<AppState>>,
) -> Result<&'static str, (StatusCode, Json<ApiError>)> {
    state
        .api
        .storage
        .health_check()
        .await
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, Json(internal(e))))?;
    Ok("ok")
}

async fn http_get_state(State(state): State<Arc<AppState>>) -> Json<DocumentSnapshot> {
    Json(current_snapshot(&state.api).await)
}

async fn http_replace_state(
    State(state): State<Arc<AppState>>,
    Json(game): Json<GameState>,
) -> Result<Json<PatchReceipt>, (StatusCode, Json<ApiError>)> {
    let receipt = replace_state(&state.api, &game)
        .await
        .map_err(error_response)?;
    Ok(Json(receipt))
}

async fn http_patch_state(
    State(state): State<Arc<AppState>>,
    Json(patch): Json<Patch>,
) -> Result<Json<PatchReceipt>, (StatusCode, Json<ApiError>)> {
    let receipt = apply_patch(&state.api, &patch)
        .await
        .map_err(error_response)?;
    debug!(version = receipt.version, fields = patch.len(), "patch applied");
    Ok(Json(receipt))
}

fn error_response(error: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match error.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(error))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket, Uuid::new_v4()))
}

async fn ws_connection(state: Arc<AppState>, socket: WebSocket, connection_id: Uuid) {
    use futures::{SinkExt, StreamExt};

    let (mut sender, mut receiver) = socket.split();
    let (initial, mut changes) = state.api.documents.subscribe().await;
    let (replies_tx, mut replies_rx) = mpsc::channel::<ServerEvent>(16);
    info!(%connection_id, version = initial.version, "subscriber connected");

    let documents = state.api.documents.clone();
    let send_task = tokio::spawn(async move {
        let mut next = Some(ServerEvent::Snapshot(initial));
        loop {
            if let Some(event) = next.take() {
                let text = match serde_json::to_string(&event) {
                    Ok(v) => v,
                    Err(_) => continue,
                };
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }

            next = tokio::select! {
                change = changes.recv() => match change {
                    Ok(snapshot) => Some(ServerEvent::Snapshot(snapshot)),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(%connection_id, skipped, "subscriber lagged; resending latest snapshot");
                        Some(ServerEvent::Snapshot(documents.snapshot().await))
                    }
                    Err(RecvError::Closed) => break,
                },
                reply = replies_rx.recv() => match reply {
                    Some(event) => Some(event),
                    None => break,
                },
            };
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let reply = handle_client_request(&state, &text).await;
        if replies_tx.send(reply).await.is_err() {
            break;
        }
    }

    info!(%connection_id, "subscriber disconnected");
    send_task.abort();
}

async fn handle_client_request(state: &AppState, text: &str) -> ServerEvent {
    if text.len() > state.max_patch_bytes {
        warn!(bytes = text.len(), limit = state.max_patch_bytes, "websocket message too large");
        return ServerEvent::Error(patch_too_large(state.max_patch_bytes));
    }

    let api = &state.api;
    let request = match serde_json::from_str::<ClientRequest>(text) {
        Ok(request) => request,
        Err(err) => {
            return ServerEvent::Error(ApiError::new(
                ErrorCode::Validation,
                format!("invalid client request: {err}"),
            ))
        }
    };

    match request {
        ClientRequest::Patch(fields) => match apply_patch(api, &fields).await {
            Ok(receipt) => ServerEvent::PatchApplied(receipt),
            Err(error) => {
                warn!(code = ?error.code, message = %error.message, "websocket patch rejected");
                ServerEvent::Error(error)
            }
        },
        ClientRequest::Resync => ServerEvent::Snapshot(current_snapshot(api).await),
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
