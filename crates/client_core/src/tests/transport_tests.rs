use axum::{http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use shared::{error::ErrorCode, protocol::TIMER_RUNNING};
use tokio::net::TcpListener;

use super::*;

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    format!("http://{addr}")
}

#[test]
fn websocket_url_follows_http_scheme() {
    let plain = RemoteSharedState::new("http://scoreboard.local:8080").expect("valid url");
    assert_eq!(
        plain.ws_url().expect("ws url").as_str(),
        "ws://scoreboard.local:8080/ws"
    );

    let secure = RemoteSharedState::new("https://scoreboard.example.com/").expect("valid url");
    assert_eq!(
        secure.ws_url().expect("ws url").as_str(),
        "wss://scoreboard.example.com/ws"
    );
}

#[test]
fn rejects_non_http_server_urls() {
    assert!(RemoteSharedState::new("ws://scoreboard.local").is_err());
    assert!(RemoteSharedState::new("not a url").is_err());
}

#[tokio::test]
async fn accepted_patch_returns_receipt() {
    let router = Router::new().route(
        server_api::state_patch_route(),
        post(|Json(patch): Json<Patch>| async move {
            assert_eq!(patch.get(TIMER_RUNNING), Some(&serde_json::json!(true)));
            Json(PatchReceipt { version: 7 })
        }),
    );
    let remote = RemoteSharedState::new(&serve(router).await).expect("valid url");

    let receipt = remote
        .patch(Patch::new().with(TIMER_RUNNING, true))
        .await
        .expect("patch accepted");
    assert_eq!(receipt.version, 7);
}

#[tokio::test]
async fn rejected_patch_carries_server_error() {
    let router = Router::new().route(
        server_api::state_patch_route(),
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(ApiError::new(ErrorCode::Validation, "patch is empty")),
            )
                .into_response()
        }),
    );
    let remote = RemoteSharedState::new(&serve(router).await).expect("valid url");

    let err = remote
        .patch(Patch::new().with(TIMER_RUNNING, true))
        .await
        .expect_err("patch rejected");
    assert_eq!(
        err,
        PatchError::Rejected(ApiError::new(ErrorCode::Validation, "patch is empty"))
    );
}

#[tokio::test]
async fn error_without_body_is_unavailable() {
    let router = Router::new().route(
        server_api::state_patch_route(),
        post(|| async { StatusCode::BAD_GATEWAY }),
    );
    let remote = RemoteSharedState::new(&serve(router).await).expect("valid url");

    let err = remote
        .patch(Patch::new().with(TIMER_RUNNING, true))
        .await
        .expect_err("patch failed");
    assert!(matches!(err, PatchError::Unavailable(_)));
}

#[tokio::test]
async fn unreachable_server_is_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let remote = RemoteSharedState::new(&format!("http://{addr}")).expect("valid url");
    let err = remote
        .patch(Patch::new().with(TIMER_RUNNING, false))
        .await
        .expect_err("nothing listening");
    assert!(matches!(err, PatchError::Unavailable(_)));
}

#[tokio::test]
async fn oversized_patch_is_rejected_not_unavailable() {
    let router = Router::new().route(
        server_api::state_patch_route(),
        post(|| async {
            (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(ApiError::new(
                    ErrorCode::PayloadTooLarge,
                    "patch exceeds the 4096 byte limit",
                )),
            )
                .into_response()
        }),
    );
    let remote = RemoteSharedState::new(&serve(router).await).expect("valid url");

    let err = remote
        .patch(Patch::new().with("team1/name", "x".repeat(8192)))
        .await
        .expect_err("patch too large");
    assert!(matches!(
        err,
        PatchError::Rejected(ApiError {
            code: ErrorCode::PayloadTooLarge,
            ..
        })
    ));
}

#[tokio::test]
async fn plain_text_413_still_counts_as_rejected() {
    let router = Router::new().route(
        server_api::state_patch_route(),
        post(|| async { (StatusCode::PAYLOAD_TOO_LARGE, "length limit exceeded") }),
    );
    let remote = RemoteSharedState::new(&serve(router).await).expect("valid url");

    let err = remote
        .patch(Patch::new().with(TIMER_RUNNING, true))
        .await
        .expect_err("patch too large");
    assert!(matches!(
        err,
        PatchError::Rejected(ApiError {
            code: ErrorCode::PayloadTooLarge,
            ..
        })
    ));
}

#[tokio::test]
async fn hung_server_times_out_as_unavailable() {
    let router = Router::new().route(
        server_api::state_patch_route(),
        post(|| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            StatusCode::OK
        }),
    );
    let remote =
        RemoteSharedState::with_timeout(&serve(router).await, Duration::from_millis(200))
            .expect("valid url");

    let started = std::time::Instant::now();
    let err = remote
        .patch(Patch::new().with(TIMER_RUNNING, true))
        .await
        .expect_err("request timed out");
    assert!(matches!(err, PatchError::Unavailable(_)));
    assert!(started.elapsed() < Duration::from_secs(5));
}
