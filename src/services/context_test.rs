//! Tests for the tenant context: remote calls, credential refresh and caching.

use std::sync::atomic::Ordering;
use std::time::Duration;

use serde_json::json;

use super::ServiceKind;
use crate::error::{ErrorKind, TrackerError};
use crate::remote::{Method, RemoteRequest};
use crate::test_support::{FakeAuthenticator, FakeTrackerApi, context, new_cache};

const PATH: &str = "Alpha/_apis/wit/workitems/42";

#[tokio::test]
async fn test_call_sends_current_credential() {
    let cache = new_cache();
    let api = FakeTrackerApi::new();
    api.ok(Method::Get, PATH, json!({"id": 42}));
    let ctx = context(&cache, ServiceKind::WorkItems, "Alpha", api.clone(), FakeAuthenticator::new());

    let value = ctx.call("get", RemoteRequest::get(PATH)).await.unwrap();

    assert_eq!(value["id"], 42);
    let calls = api.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0.expose(), "Basic initial");
}

#[tokio::test]
async fn test_unauthorized_refreshes_credential_for_later_calls() {
    let cache = new_cache();
    let api = FakeTrackerApi::new();
    api.status(Method::Get, PATH, 401)
        .ok(Method::Get, PATH, json!({"id": 42}));
    let auth = FakeAuthenticator::new();
    let ctx = context(&cache, ServiceKind::WorkItems, "Alpha", api.clone(), auth.clone());

    let err = ctx.call("get", RemoteRequest::get(PATH)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(auth.refresh_calls.load(Ordering::SeqCst), 1);
    // 401 is not retried
    assert_eq!(api.total_calls(), 1);

    ctx.call("get", RemoteRequest::get(PATH)).await.unwrap();
    let calls = api.calls();
    assert_eq!(calls[1].0.expose(), "Basic refreshed-1");
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_is_retried() {
    let cache = new_cache();
    let api = FakeTrackerApi::new();
    api.status(Method::Get, PATH, 503)
        .ok(Method::Get, PATH, json!({"id": 42}));
    let ctx = context(&cache, ServiceKind::WorkItems, "Alpha", api.clone(), FakeAuthenticator::new());

    let start = tokio::time::Instant::now();
    let value = ctx.call("get", RemoteRequest::get(PATH)).await.unwrap();

    assert_eq!(value["id"], 42);
    assert_eq!(api.total_calls(), 2);
    assert_eq!(start.elapsed(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_report_attempts() {
    let cache = new_cache();
    let api = FakeTrackerApi::new();
    api.status(Method::Get, PATH, 503);
    let ctx = context(&cache, ServiceKind::WorkItems, "Alpha", api.clone(), FakeAuthenticator::new());

    let err = ctx.call("get_work_item", RemoteRequest::get(PATH)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transient);
    match err {
        TrackerError::Transient {
            operation,
            attempts,
            ..
        } => {
            assert_eq!(operation, "get_work_item");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected Transient, got {other:?}"),
    }
    assert_eq!(api.total_calls(), 3);
}

#[tokio::test]
async fn test_not_found_keeps_remote_source() {
    let cache = new_cache();
    let api = FakeTrackerApi::new();
    let ctx = context(&cache, ServiceKind::WorkItems, "Alpha", api.clone(), FakeAuthenticator::new());

    let err = ctx
        .call("get", RemoteRequest::get("Alpha/nowhere"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(matches!(err, TrackerError::NotFound { source, .. } if source.status() == Some(404)));
}

#[tokio::test]
async fn test_cached_serves_second_read_from_cache() {
    let cache = new_cache();
    let api = FakeTrackerApi::new();
    api.ok(Method::Get, PATH, json!({"id": 42}));
    let ctx = context(&cache, ServiceKind::WorkItems, "Alpha", api.clone(), FakeAuthenticator::new());

    for _ in 0..3 {
        let value = ctx
            .cached("work_item:42", || ctx.call("get", RemoteRequest::get(PATH)))
            .await
            .unwrap();
        assert_eq!(value["id"], 42);
    }
    assert_eq!(api.total_calls(), 1);
}

#[tokio::test]
async fn test_cached_discards_fill_raced_by_invalidation() {
    let cache = new_cache();
    let api = FakeTrackerApi::new();
    let ctx = context(&cache, ServiceKind::WorkItems, "Alpha", api, FakeAuthenticator::new());

    let value = ctx
        .cached("work_item:42", || async {
            ctx.cache().invalidate_prefix("work_item:42");
            Ok(json!({"title": "stale"}))
        })
        .await
        .unwrap();

    assert_eq!(value["title"], "stale");
    assert!(ctx.cache().get("work_item:42").is_none());
}

#[tokio::test]
async fn test_failed_fetch_is_not_cached() {
    let cache = new_cache();
    let api = FakeTrackerApi::new();
    let ctx = context(&cache, ServiceKind::WorkItems, "Alpha", api.clone(), FakeAuthenticator::new());

    let first = ctx
        .cached("missing", || ctx.call("get", RemoteRequest::get("Alpha/missing")))
        .await;
    assert!(first.is_err());

    api.ok(Method::Get, "Alpha/missing", json!({"found": true}));
    let second = ctx
        .cached("missing", || ctx.call("get", RemoteRequest::get("Alpha/missing")))
        .await
        .unwrap();
    assert_eq!(second["found"], true);
}

#[tokio::test]
async fn test_close_is_idempotent_and_blocks_calls() {
    let cache = new_cache();
    let api = FakeTrackerApi::new();
    let ctx = context(&cache, ServiceKind::WorkItems, "Alpha", api.clone(), FakeAuthenticator::new());
    ctx.cache().set("k", json!(1), None);

    ctx.close().unwrap();
    ctx.close().unwrap();

    assert!(ctx.is_closed());
    assert!(ctx.cache().get("k").is_none());
    let err = ctx.call("get", RemoteRequest::get(PATH)).await.unwrap_err();
    assert!(matches!(err, TrackerError::Closed));
    assert_eq!(api.total_calls(), 0);
}
