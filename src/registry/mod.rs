//! Lazily created per-tenant services.
//!
//! The registry owns one service per `(ServiceKind, tenant)` pair. All of
//! them share the cache, the remote API and the authenticator handed in at
//! construction; each gets its own cache namespace, retry executor and
//! cancellation token (a child of the server's shutdown token).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::{Authenticator, Credential};
use crate::cache::{CacheError, CacheStats, CacheView, Namespace, TtlCache};
use crate::error::{ComponentFailure, ShutdownError, TrackerError, TrackerResult};
use crate::remote::TrackerApi;
use crate::retry::{InvalidPolicy, RetryExecutor, RetryPolicy};
use crate::services::{ServiceKind, SprintService, TenantContext, WorkItemService};
use crate::validation::{ValidationError, validate_tenant_key};


/// Per-attempt deadline for remote calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Tenant used when a caller names none.
    pub default_tenant: Option<String>,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_tenant: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// A service bound to one tenant.
#[derive(Clone)]
pub enum TenantService {
    WorkItems(Arc<WorkItemService>),
    Sprints(Arc<SprintService>),
}

impl TenantService {
    fn context(&self) -> &TenantContext {
        match self {
            TenantService::WorkItems(service) => service.context(),
            TenantService::Sprints(service) => service.context(),
        }
    }

    pub fn kind(&self) -> ServiceKind {
        self.context().kind()
    }

    pub fn tenant(&self) -> &str {
        self.context().tenant()
    }

    pub fn close(&self) -> Result<(), CacheError> {
        self.context().close()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub creations: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub loaded_tenants: Vec<String>,
    pub loaded_services: usize,
    pub default_tenant: Option<String>,
    pub cache: CacheStats,
    pub cache_hit_rate: f64,
}

pub struct ServiceRegistry {
    config: RegistryConfig,
    cache: Arc<TtlCache>,
    api: Arc<dyn TrackerApi>,
    auth: Arc<dyn Authenticator>,
    services: DashMap<(ServiceKind, String), TenantService>,
    shutdown: CancellationToken,
    creations: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    closed: AtomicBool,
}

impl ServiceRegistry {
    pub fn new(
        config: RegistryConfig,
        cache: Arc<TtlCache>,
        api: Arc<dyn TrackerApi>,
        auth: Arc<dyn Authenticator>,
        shutdown: CancellationToken,
    ) -> Result<Self, InvalidPolicy> {
        config.retry.validate()?;
        Ok(Self {
            config,
            cache,
            api,
            auth,
            services: DashMap::new(),
            shutdown,
            creations: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    pub fn default_tenant(&self) -> Option<&str> {
        self.config.default_tenant.as_deref()
    }

    pub fn authenticator(&self) -> &Arc<dyn Authenticator> {
        &self.auth
    }

    pub fn cache(&self) -> &Arc<TtlCache> {
        &self.cache
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn resolve_tenant(&self, tenant: Option<&str>) -> TrackerResult<String> {
        let tenant = tenant
            .filter(|t| !t.trim().is_empty())
            .or(self.default_tenant())
            .ok_or_else(|| ValidationError::Missing {
                field: "project".to_string(),
                hint: "Pass a project or set AZURE_DEVOPS_PROJECT".to_string(),
            })?;
        Ok(validate_tenant_key(tenant)?.to_string())
    }

    /// The service for `(kind, tenant)`, created on first use.
    ///
    /// The credential is fetched before touching the map. If two callers race
    /// on a new pair, both build a service but only the first insert is kept.
    pub async fn get_service(
        &self,
        kind: ServiceKind,
        tenant: Option<&str>,
    ) -> TrackerResult<TenantService> {
        if self.is_closed() {
            return Err(TrackerError::Closed);
        }
        let tenant = self.resolve_tenant(tenant)?;
        let key = (kind, tenant);

        if let Some(service) = self.services.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(service.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let credential = self.auth.credential().await?;
        if self.is_closed() {
            return Err(TrackerError::Closed);
        }
        let candidate = self.build(kind, &key.1, credential);

        let service = match self.services.entry(key) {
            Entry::Occupied(entry) => {
                debug!(%kind, tenant = %entry.key().1, "lost creation race, using stored service");
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                self.creations.fetch_add(1, Ordering::Relaxed);
                info!(%kind, tenant = %entry.key().1, "created tenant service");
                entry.insert(candidate).clone()
            }
        };

        // close() may have drained the map while we were inserting
        if self.is_closed() {
            self.discard(kind, service.tenant());
            return Err(TrackerError::Closed);
        }
        Ok(service)
    }

    /// Remove and close the `(kind, tenant)` service if one is stored.
    fn discard(&self, kind: ServiceKind, tenant: &str) -> bool {
        let Some((_, stale)) = self.services.remove(&(kind, tenant.to_string())) else {
            return false;
        };
        if let Err(e) = stale.close() {
            warn!(%kind, tenant, error = %e, "failed to close discarded service");
        }
        true
    }

    fn view(&self, kind: ServiceKind, tenant: &str) -> CacheView {
        CacheView::new(
            self.cache.clone(),
            Namespace::from_parts(kind.as_str(), tenant),
        )
    }

    fn build(&self, kind: ServiceKind, tenant: &str, credential: Credential) -> TenantService {
        let ctx = TenantContext::new(
            tenant,
            kind,
            self.view(kind, tenant),
            RetryExecutor::new(self.config.retry, self.config.request_timeout),
            self.api.clone(),
            self.auth.clone(),
            credential,
            self.shutdown.child_token(),
        );
        match kind {
            ServiceKind::WorkItems => TenantService::WorkItems(Arc::new(WorkItemService::new(
                ctx,
                self.view(ServiceKind::Sprints, tenant),
            ))),
            ServiceKind::Sprints => TenantService::Sprints(Arc::new(SprintService::new(ctx))),
        }
    }

    pub async fn work_items(&self, tenant: Option<&str>) -> TrackerResult<Arc<WorkItemService>> {
        match self.get_service(ServiceKind::WorkItems, tenant).await? {
            TenantService::WorkItems(service) => Ok(service),
            TenantService::Sprints(_) => Err(kind_mismatch(ServiceKind::WorkItems)),
        }
    }

    pub async fn sprints(&self, tenant: Option<&str>) -> TrackerResult<Arc<SprintService>> {
        match self.get_service(ServiceKind::Sprints, tenant).await? {
            TenantService::Sprints(service) => Ok(service),
            TenantService::WorkItems(_) => Err(kind_mismatch(ServiceKind::Sprints)),
        }
    }

    /// Sorted, de-duplicated tenants with at least one live service.
    pub fn loaded_tenants(&self) -> Vec<String> {
        let mut tenants: Vec<String> = self
            .services
            .iter()
            .map(|entry| entry.key().1.clone())
            .collect();
        tenants.sort();
        tenants.dedup();
        tenants
    }

    pub fn stats(&self) -> RegistryStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let cache = self.cache.stats();
        RegistryStats {
            creations: self.creations.load(Ordering::Relaxed),
            hits,
            misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            loaded_tenants: self.loaded_tenants(),
            loaded_services: self.services.len(),
            default_tenant: self.config.default_tenant.clone(),
            cache_hit_rate: cache.hit_rate(),
            cache,
        }
    }

    /// Close and drop every service of `tenant`. Returns how many were dropped.
    pub fn evict_tenant(&self, tenant: &str) -> usize {
        let mut evicted = 0;
        for kind in ServiceKind::ALL {
            if self.discard(kind, tenant) {
                evicted += 1;
            }
        }
        if evicted > 0 {
            info!(tenant, evicted, "evicted tenant services");
        }
        evicted
    }

    /// Close every service, then the cache, then the authenticator.
    ///
    /// Every step runs even if an earlier one failed. A second call is a
    /// no-op.
    pub async fn close(&self) -> Result<(), ShutdownError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut failures = Vec::new();

        let keys: Vec<(ServiceKind, String)> =
            self.services.iter().map(|entry| entry.key().clone()).collect();
        for key in keys {
            let Some((_, service)) = self.services.remove(&key) else {
                continue;
            };
            if let Err(e) = service.close() {
                failures.push(ComponentFailure {
                    component: format!("service {}:{}", key.0, key.1),
                    message: e.to_string(),
                });
            }
        }

        self.cache.close();

        if let Err(e) = self.auth.close().await {
            failures.push(ComponentFailure {
                component: "authenticator".to_string(),
                message: e.to_string(),
            });
        }

        if failures.is_empty() {
            info!("service registry closed");
            Ok(())
        } else {
            let error = ShutdownError { failures };
            warn!(error = %error, "service registry closed with failures");
            Err(error)
        }
    }
}

fn kind_mismatch(expected: ServiceKind) -> TrackerError {
    TrackerError::invalid_response("registry", format!("stored service is not {expected}"))
}
