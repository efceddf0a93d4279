use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ServiceKind;
use crate::auth::{Authenticator, Credential};
use crate::cache::{CacheError, CacheView};
use crate::error::{TrackerError, TrackerResult};
use crate::remote::{RemoteRequest, TrackerApi, classify_remote_error};
use crate::retry::{ErrorClass, RetryError, RetryExecutor};

tokio::task_local! {
    static CALLER_CANCEL: CancellationToken;
}

/// Run `fut` with `cancel` as the caller's token.
///
/// Every [`TenantContext::call`] made inside `fut` stops retrying once either
/// `cancel` or the tenant's own token fires. Outside such a scope only the
/// tenant's token applies.
pub async fn with_caller_cancel<F: Future>(cancel: CancellationToken, fut: F) -> F::Output {
    CALLER_CANCEL.scope(cancel, fut).await
}

/// Everything a tenant service needs to reach the tracker.
pub struct TenantContext {
    tenant: String,
    kind: ServiceKind,
    cache: CacheView,
    executor: RetryExecutor,
    api: Arc<dyn TrackerApi>,
    auth: Arc<dyn Authenticator>,
    credential: RwLock<Credential>,
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl fmt::Debug for TenantContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantContext")
            .field("tenant", &self.tenant)
            .field("kind", &self.kind)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl TenantContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant: impl Into<String>,
        kind: ServiceKind,
        cache: CacheView,
        executor: RetryExecutor,
        api: Arc<dyn TrackerApi>,
        auth: Arc<dyn Authenticator>,
        credential: Credential,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            kind,
            cache,
            executor,
            api,
            auth,
            credential: RwLock::new(credential),
            cancel,
            closed: AtomicBool::new(false),
        }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn cache(&self) -> &CacheView {
        &self.cache
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Send `request` through the retry executor.
    ///
    /// A 401 triggers a credential refresh so that later calls use the new
    /// credential; the current call still fails. A caller token installed with
    /// [`with_caller_cancel`] cancels the call like a tenant close does.
    pub async fn call(&self, operation: &str, request: RemoteRequest) -> TrackerResult<Value> {
        if self.is_closed() {
            return Err(TrackerError::Closed);
        }

        let credential = self.credential.read().await.clone();
        let caller = CALLER_CANCEL.try_with(CancellationToken::clone).ok();
        let cancel = self.cancel.child_token();
        let api = &self.api;
        let execute = self
            .executor
            .execute(
                |attempt| {
                    let request = request.clone();
                    let credential = credential.clone();
                    debug!(
                        tenant = %self.tenant,
                        operation,
                        attempt,
                        method = request.method.as_str(),
                        path = %request.path,
                        "calling tracker"
                    );
                    async move { api.send(&credential, request).await }
                },
                &classify_remote_error,
                &cancel,
            );
        let result = match caller {
            Some(caller) => {
                tokio::pin!(execute);
                tokio::select! {
                    biased;
                    _ = caller.cancelled() => {
                        cancel.cancel();
                        execute.await
                    }
                    result = &mut execute => result,
                }
            }
            None => execute.await,
        };

        match result {
            Ok(value) => Ok(value),
            Err(error) => {
                if let RetryError::Rejected {
                    class: ErrorClass::Unauthorized,
                    ..
                } = &error
                {
                    self.refresh_credential().await;
                }
                Err(TrackerError::from_retry(operation, error))
            }
        }
    }

    async fn refresh_credential(&self) {
        match self.auth.refresh().await {
            Ok(credential) => {
                *self.credential.write().await = credential;
                info!(tenant = %self.tenant, "credential refreshed after 401");
            }
            Err(e) => warn!(tenant = %self.tenant, error = %e, "credential refresh failed"),
        }
    }

    /// Serve `key` from the cache, or run `fetch` and store its result.
    ///
    /// The store is skipped if the namespace was invalidated while `fetch`
    /// was in flight, so a racing mutation is never overwritten with stale data.
    pub async fn cached<F, Fut>(&self, key: &str, fetch: F) -> TrackerResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = TrackerResult<Value>>,
    {
        if let Some(value) = self.cache.get(key) {
            debug!(namespace = %self.cache.namespace(), key, "cache hit");
            return Ok(value);
        }

        let ticket = self.cache.ticket();
        let value = fetch().await?;
        if !self.cache.set_with_ticket(ticket, key, value.clone(), None) {
            debug!(namespace = %self.cache.namespace(), key, "discarded fill raced by invalidation");
        }
        Ok(value)
    }

    /// Cancel in-flight calls and drop this tenant's cached entries.
    pub fn close(&self) -> Result<(), CacheError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.cancel.cancel();
        self.cache.close()
    }
}
