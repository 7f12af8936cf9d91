use super::*;
use axum::{body, body::Body, http::Request};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use shared::protocol::{SIDES_SWITCHED, TIMER_RUNNING};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tower::ServiceExt;

async fn test_app() -> (Router, ApiContext) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let api = ApiContext::load(storage).await.expect("context");
    let app = build_router(Arc::new(AppState {
        api: api.clone(),
        max_patch_bytes: 4096,
    }));
    (app, api)
}

async fn read_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

fn json_request(method: &str, uri: &str, value: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(value.to_string()))
        .expect("request")
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let (app, _api) = test_app().await;
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn unseeded_state_reads_null_and_rejects_patches() {
    let (app, _api) = test_app().await;

    let response = app
        .clone()
        .oneshot(Request::get("/state").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let snapshot: DocumentSnapshot = read_json(response).await;
    assert_eq!(snapshot.version, 0);
    assert!(snapshot.document.is_none());

    let response = app
        .oneshot(json_request(
            "POST",
            "/state/patch",
            json!({ "timer/running": true }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let error: ApiError = read_json(response).await;
    assert_eq!(error.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn seed_then_patch_bumps_version() {
    let (app, api) = test_app().await;
    let seed = serde_json::to_value(GameState::default()).expect("seed json");

    let response = app
        .clone()
        .oneshot(json_request("PUT", "/state", seed))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let receipt: PatchReceipt = read_json(response).await;
    assert_eq!(receipt.version, 1);

    let response = app
        .oneshot(json_request(
            "POST",
            "/state/patch",
            json!({ "timer/seconds": 590, "timer/running": true }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let receipt: PatchReceipt = read_json(response).await;
    assert_eq!(receipt.version, 2);

    let snapshot = current_snapshot(&api).await;
    let document = snapshot.document.expect("document");
    assert_eq!(document["timer"]["seconds"], json!(590));
    assert_eq!(document["timer"]["running"], json!(true));
}

#[tokio::test]
async fn patch_producing_invalid_state_is_bad_request() {
    let (app, api) = test_app().await;
    replace_state(&api, &GameState::default())
        .await
        .expect("seed");

    let response = app
        .oneshot(json_request(
            "POST",
            "/state/patch",
            json!({ "team1/fouls": "many" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(current_snapshot(&api).await.version, 1);
}

#[tokio::test]
async fn oversized_patch_body_is_rejected() {
    let (app, api) = test_app().await;
    replace_state(&api, &GameState::default())
        .await
        .expect("seed");

    let huge_name = "x".repeat(8192);
    let response = app
        .oneshot(json_request(
            "POST",
            "/state/patch",
            json!({ "team1/name": huge_name }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let error: ApiError = read_json(response).await;
    assert_eq!(error.code, ErrorCode::PayloadTooLarge);
    assert_eq!(current_snapshot(&api).await.version, 1);
}

#[tokio::test]
async fn oversized_websocket_patch_is_rejected() {
    let (app, api) = test_app().await;
    replace_state(&api, &GameState::default())
        .await
        .expect("seed");
    let addr = serve(app).await;

    let (mut socket, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("connect");
    assert!(matches!(
        next_event(&mut socket).await,
        ServerEvent::Snapshot(_)
    ));

    let request = ClientRequest::Patch(Patch::new().with("team1/name", "x".repeat(200_000)));
    socket
        .send(WsMessage::Text(
            serde_json::to_string(&request).expect("encode"),
        ))
        .await
        .expect("send");

    match next_event(&mut socket).await {
        ServerEvent::Error(error) => assert_eq!(error.code, ErrorCode::PayloadTooLarge),
        other => panic!("expected error, got {other:?}"),
    }
    let snapshot = current_snapshot(&api).await;
    assert_eq!(snapshot.version, 1);
    assert_eq!(
        snapshot.document.expect("document")["team1"]["name"],
        json!("Home")
    );
}

#[tokio::test]
async fn websocket_pushes_initial_snapshot_and_applies_patches() {
    let (app, api) = test_app().await;
    replace_state(&api, &GameState::default())
        .await
        .expect("seed");

    let addr = serve(app).await;

    let (mut socket, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("connect");

    let first = next_event(&mut socket).await;
    match first {
        ServerEvent::Snapshot(snapshot) => {
            assert_eq!(snapshot.version, 1);
            assert!(snapshot.document.is_some());
        }
        other => panic!("expected initial snapshot, got {other:?}"),
    }

    let request = ClientRequest::Patch(
        Patch::new()
            .with(SIDES_SWITCHED, true)
            .with(TIMER_RUNNING, true),
    );
    socket
        .send(WsMessage::Text(
            serde_json::to_string(&request).expect("encode"),
        ))
        .await
        .expect("send");

    let mut saw_ack = false;
    let mut saw_snapshot = false;
    for _ in 0..2 {
        match next_event(&mut socket).await {
            ServerEvent::PatchApplied(receipt) => {
                assert_eq!(receipt.version, 2);
                saw_ack = true;
            }
            ServerEvent::Snapshot(snapshot) => {
                assert_eq!(snapshot.version, 2);
                let document = snapshot.document.expect("document");
                assert_eq!(document["sidesSwitched"], json!(true));
                saw_snapshot = true;
            }
            ServerEvent::Error(error) => panic!("unexpected error: {error:?}"),
        }
    }
    assert!(saw_ack && saw_snapshot);

    socket
        .send(WsMessage::Text("not json".to_string()))
        .await
        .expect("send garbage");
    match next_event(&mut socket).await {
        ServerEvent::Error(error) => assert_eq!(error.code, ErrorCode::Validation),
        other => panic!("expected error, got {other:?}"),
    }
}

async fn serve(app: Router) -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

async fn next_event<S>(socket: &mut S) -> ServerEvent
where
    S: StreamExt<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = tokio::time::timeout(std::time::Duration::from_secs(5), socket.next())
            .await
            .expect("timely message")
            .expect("stream open")
            .expect("message");
        if let WsMessage::Text(text) = message {
            return serde_json::from_str(&text).expect("server event");
        }
    }
}
