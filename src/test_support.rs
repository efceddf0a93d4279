//! Scripted collaborators shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::auth::{AuthError, Authenticator, Credential};
use crate::cache::{CacheConfig, CacheView, Namespace, TtlCache};
use crate::remote::{Method, RemoteError, RemoteRequest, TrackerApi};
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::services::{ServiceKind, SprintService, TenantContext, WorkItemService};

type Reply = Result<Value, RemoteError>;

/// `TrackerApi` answering from per-route queues.
///
/// The last queued reply of a route is repeated forever. Unknown routes
/// answer 404.
#[derive(Default)]
pub struct FakeTrackerApi {
    routes: Mutex<HashMap<(&'static str, String), VecDeque<Reply>>>,
    calls: Mutex<Vec<(Credential, RemoteRequest)>>,
}

impl FakeTrackerApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, method: Method, path: &str, reply: Reply) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry((method.as_str(), path.to_string()))
            .or_default()
            .push_back(reply);
        self
    }

    pub fn ok(&self, method: Method, path: &str, body: Value) -> &Self {
        self.on(method, path, Ok(body))
    }

    pub fn status(&self, method: Method, path: &str, status: u16) -> &Self {
        self.on(
            method,
            path,
            Err(RemoteError::Status {
                status,
                message: format!("status {status}"),
                retry_after: None,
            }),
        )
    }

    pub fn calls(&self) -> Vec<(Credential, RemoteRequest)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn requests(&self, method: Method, path: &str) -> Vec<RemoteRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, r)| r.method == method && r.path == path)
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn call_count(&self, method: Method, path: &str) -> usize {
        self.requests(method, path).len()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn reply(&self, request: &RemoteRequest) -> Reply {
        let mut routes = self.routes.lock().unwrap();
        let Some(queue) = routes.get_mut(&(request.method.as_str(), request.path.clone())) else {
            return Err(RemoteError::Status {
                status: 404,
                message: format!("no route for {} {}", request.method.as_str(), request.path),
                retry_after: None,
            });
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }
}

impl TrackerApi for FakeTrackerApi {
    fn send<'a>(
        &'a self,
        credential: &'a Credential,
        request: RemoteRequest,
    ) -> BoxFuture<'a, Result<Value, RemoteError>> {
        let reply = self.reply(&request);
        self.calls.lock().unwrap().push((credential.clone(), request));
        async move { reply }.boxed()
    }
}

/// Authenticator that counts calls and hands out numbered credentials.
#[derive(Default)]
pub struct FakeAuthenticator {
    pub credential_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub close_calls: AtomicUsize,
    pub fail_close: AtomicBool,
    pub delay: Option<Duration>,
}

impl FakeAuthenticator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }
}

impl Authenticator for FakeAuthenticator {
    fn method(&self) -> &'static str {
        "fake"
    }

    fn credential(&self) -> BoxFuture<'_, Result<Credential, AuthError>> {
        self.credential_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay;
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(Credential::new("Basic initial"))
        }
        .boxed()
    }

    fn refresh(&self) -> BoxFuture<'_, Result<Credential, AuthError>> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move { Ok(Credential::new(format!("Basic refreshed-{n}"))) }.boxed()
    }

    fn close(&self) -> BoxFuture<'_, Result<(), AuthError>> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        let fail = self.fail_close.load(Ordering::SeqCst);
        async move {
            if fail {
                Err(AuthError::Invalid {
                    message: "close failed".to_string(),
                })
            } else {
                Ok(())
            }
        }
        .boxed()
    }
}

/// Three attempts, no jitter, 1s base delay.
pub fn test_executor() -> RetryExecutor {
    let policy = RetryPolicy {
        max_attempts: 3,
        ..RetryPolicy::default()
    }
    .without_jitter();
    RetryExecutor::new(policy, Duration::from_secs(30))
}

pub fn view(cache: &Arc<TtlCache>, kind: ServiceKind, tenant: &str) -> CacheView {
    CacheView::new(cache.clone(), Namespace::from_parts(kind.as_str(), tenant))
}

pub fn context(
    cache: &Arc<TtlCache>,
    kind: ServiceKind,
    tenant: &str,
    api: Arc<FakeTrackerApi>,
    auth: Arc<FakeAuthenticator>,
) -> TenantContext {
    TenantContext::new(
        tenant,
        kind,
        view(cache, kind, tenant),
        test_executor(),
        api,
        auth,
        Credential::new("Basic initial"),
        CancellationToken::new(),
    )
}

pub fn new_cache() -> Arc<TtlCache> {
    Arc::new(TtlCache::new(CacheConfig::default()))
}

pub fn work_item_service(
    cache: &Arc<TtlCache>,
    tenant: &str,
    api: Arc<FakeTrackerApi>,
) -> WorkItemService {
    WorkItemService::new(
        context(cache, ServiceKind::WorkItems, tenant, api, FakeAuthenticator::new()),
        view(cache, ServiceKind::Sprints, tenant),
    )
}

pub fn sprint_service(cache: &Arc<TtlCache>, tenant: &str, api: Arc<FakeTrackerApi>) -> SprintService {
    SprintService::new(context(
        cache,
        ServiceKind::Sprints,
        tenant,
        api,
        FakeAuthenticator::new(),
    ))
}

/// A raw work item as the tracker returns it.
pub fn raw_item(id: u64, title: &str, state: &str) -> Value {
    json!({
        "id": id,
        "rev": 1,
        "url": format!("https://dev.azure.com/acme/_apis/wit/workItems/{id}"),
        "fields": {
            "System.Id": id,
            "System.Title": title,
            "System.State": state,
            "System.WorkItemType": "Task",
        }
    })
}

pub fn wiql_ids(ids: &[u64]) -> Value {
    json!({ "workItems": ids.iter().map(|id| json!({"id": id})).collect::<Vec<_>>() })
}

pub fn batch(items: Vec<Value>) -> Value {
    json!({ "count": items.len(), "value": items })
}

pub fn test_registry(
    api: Arc<FakeTrackerApi>,
    default_tenant: Option<&str>,
) -> Arc<crate::registry::ServiceRegistry> {
    let config = crate::registry::RegistryConfig {
        default_tenant: default_tenant.map(str::to_string),
        request_timeout: Duration::from_secs(5),
        retry: RetryPolicy::default().without_jitter(),
    };
    Arc::new(
        crate::registry::ServiceRegistry::new(
            config,
            new_cache(),
            api,
            FakeAuthenticator::new(),
            CancellationToken::new(),
        )
        .unwrap(),
    )
}

/// The JSON document inside a tool's text result.
pub fn tool_json(result: &rmcp::model::CallToolResult) -> Value {
    match &result.content[0].raw {
        rmcp::model::RawContent::Text(text) => serde_json::from_str(&text.text).unwrap(),
        other => panic!("expected text content, got {other:?}"),
    }
}
