//! Tests for the HTTP tracker transport against a local axum server.

use std::collections::HashMap;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::Query,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::auth::Credential;
use crate::remote::{HttpTrackerApi, RemoteError, RemoteRequest, TrackerApi};

async fn work_item(headers: HeaderMap, Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!({
        "id": 42,
        "authorization": headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()),
        "api_version": query.get("api-version"),
        "expand": query.get("$expand"),
    }))
}

async fn echo_content_type(headers: HeaderMap, body: String) -> Json<Value> {
    Json(json!({
        "content_type": headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        "body": serde_json::from_str::<Value>(&body).unwrap_or(Value::Null),
    }))
}

async fn throttled() -> impl IntoResponse {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, "5")],
        Json(json!({"message": "Request was blocked, token=abc123"})),
    )
}

async fn missing() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"message": "TF401232: Work item 99 does not exist"})),
    )
}

async fn plain_failure() -> impl IntoResponse {
    (StatusCode::SERVICE_UNAVAILABLE, "")
}

async fn no_content() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

/// Spawn a stand-in tracker on an ephemeral port.
async fn spawn_test_server() -> (String, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/acme/Alpha/_apis/wit/workitems/42", get(work_item))
        .route(
            "/acme/_apis/wit/workitems/42",
            axum::routing::patch(echo_content_type).post(echo_content_type),
        )
        .route("/acme/throttled", get(throttled))
        .route("/acme/missing", get(missing))
        .route("/acme/unavailable", get(plain_failure))
        .route("/acme/empty", get(no_content));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/acme/"), handle)
}

fn api(base_url: &str) -> HttpTrackerApi {
    let _ = rustls::crypto::ring::default_provider().install_default();
    HttpTrackerApi::new(base_url).expect("client builds")
}

#[tokio::test]
async fn test_get_sends_credential_and_api_version() {
    let (url, _handle) = spawn_test_server().await;
    let api = api(&url);
    let credential = Credential::basic_from_pat("secret");

    let value = api
        .send(
            &credential,
            RemoteRequest::get("Alpha/_apis/wit/workitems/42").query("$expand", "Relations"),
        )
        .await
        .unwrap();

    assert_eq!(value["id"], 42);
    assert_eq!(value["authorization"], "Basic OnNlY3JldA==");
    assert_eq!(value["api_version"], "7.1");
    assert_eq!(value["expand"], "Relations");
}

#[tokio::test]
async fn test_patch_uses_json_patch_content_type() {
    let (url, _handle) = spawn_test_server().await;
    let api = api(&url);
    let credential = Credential::basic_from_pat("secret");
    let ops = json!([{"op": "add", "path": "/fields/System.State", "value": "Active"}]);

    let value = api
        .send(
            &credential,
            RemoteRequest::patch("_apis/wit/workitems/42", ops.clone()),
        )
        .await
        .unwrap();
    assert_eq!(value["content_type"], "application/json-patch+json");
    assert_eq!(value["body"], ops);

    let value = api
        .send(
            &credential,
            RemoteRequest::post("_apis/wit/workitems/42", json!({"ids": [1]})),
        )
        .await
        .unwrap();
    assert_eq!(value["content_type"], "application/json");
}

#[tokio::test]
async fn test_throttling_carries_retry_after_and_redacts() {
    let (url, _handle) = spawn_test_server().await;
    let api = api(&url);

    let error = api
        .send(&Credential::basic_from_pat("secret"), RemoteRequest::get("throttled"))
        .await
        .unwrap_err();

    match error {
        RemoteError::Status {
            status,
            message,
            retry_after,
        } => {
            assert_eq!(status, 429);
            assert_eq!(retry_after, Some(Duration::from_secs(5)));
            assert!(!message.contains("abc123"), "secret leaked: {message}");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_error_body_message_is_extracted() {
    let (url, _handle) = spawn_test_server().await;
    let api = api(&url);
    let credential = Credential::basic_from_pat("secret");

    let error = api
        .send(&credential, RemoteRequest::get("missing"))
        .await
        .unwrap_err();
    assert_eq!(
        error,
        RemoteError::Status {
            status: 404,
            message: "TF401232: Work item 99 does not exist".to_string(),
            retry_after: None,
        }
    );

    let error = api
        .send(&credential, RemoteRequest::get("unavailable"))
        .await
        .unwrap_err();
    assert_eq!(error.status(), Some(503));
    assert_eq!(error.to_string(), "Remote returned HTTP 503: Service Unavailable");
}

#[tokio::test]
async fn test_empty_success_body_is_null() {
    let (url, _handle) = spawn_test_server().await;
    let api = api(&url);

    let value = api
        .send(&Credential::basic_from_pat("secret"), RemoteRequest::get("empty"))
        .await
        .unwrap();
    assert_eq!(value, Value::Null);
}

#[tokio::test]
async fn test_unreachable_host_is_connection_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = api(&format!("http://{addr}"));
    let error = api
        .send(&Credential::basic_from_pat("secret"), RemoteRequest::get("anything"))
        .await
        .unwrap_err();

    assert!(matches!(error, RemoteError::Connection { .. }), "got {error:?}");
}
