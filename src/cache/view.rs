use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::{CacheError, Namespace, TtlCache};

/// Invalidation generation captured before a remote read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTicket(u64);

/// Handle on one namespace of the shared cache.
#[derive(Clone)]
pub struct CacheView {
    cache: Arc<TtlCache>,
    namespace: Namespace,
}

impl fmt::Debug for CacheView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheView")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl CacheView {
    pub fn new(cache: Arc<TtlCache>, namespace: Namespace) -> Self {
        Self { cache, namespace }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.cache.get(&self.namespace, key)
    }

    pub fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        self.cache.set(&self.namespace, key, value, ttl);
    }

    /// Take before fetching; hand back to [`CacheView::set_with_ticket`].
    pub fn ticket(&self) -> CacheTicket {
        CacheTicket(self.cache.generation(&self.namespace))
    }

    /// Store a fetched value unless the namespace was invalidated after
    /// `ticket` was taken.
    pub fn set_with_ticket(
        &self,
        ticket: CacheTicket,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> bool {
        self.cache
            .set_if_generation(&self.namespace, key, value, ttl, ticket.0)
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.cache.invalidate(&self.namespace, key)
    }

    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        self.cache.invalidate_prefix(&self.namespace, prefix)
    }

    pub fn invalidate_all(&self) -> usize {
        self.cache.invalidate_namespace(&self.namespace)
    }

    /// Drop this namespace's entries.
    ///
    /// Fails if the shared cache was closed first; the entries are gone
    /// either way.
    pub fn close(&self) -> Result<(), CacheError> {
        if self.cache.is_closed() {
            return Err(CacheError::Closed);
        }
        self.invalidate_all();
        Ok(())
    }
}
