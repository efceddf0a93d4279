//! TTL cache shared by every tenant service.
//!
//! Entries live in a two-level map `namespace -> key -> entry`, so services of
//! different tenants can never read each other's data even when they use the
//! same keys. Each service gets a [`CacheView`] bound to its own namespace.

mod namespace;
mod store;
mod view;


use miette::Diagnostic;
use thiserror::Error;

pub use namespace::{Namespace, digest_key};
pub use store::{CacheConfig, CacheStats, TtlCache};
pub use view::{CacheTicket, CacheView};

#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache is closed")]
    #[diagnostic(code(sprintgate::cache::closed))]
    Closed,
}
