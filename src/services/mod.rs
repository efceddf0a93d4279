//! Per-tenant business services.
//!
//! Each service owns a [`TenantContext`]: the tenant's cache namespace, the
//! retry executor, the current credential and the remote API. Services are
//! created by the registry and shared as `Arc`s.

mod context;
mod format;
mod queries;
mod sprints;
mod work_items;

#[cfg(test)]
mod context_test;

use std::fmt;

pub use context::{TenantContext, with_caller_cancel};
pub use queries::{BATCH_SIZE, DEFAULT_LIMIT, MAX_LIMIT, SPRINT_LIMIT};
pub use sprints::SprintService;
pub use work_items::{ExpandOption, NewWorkItem, WorkItemFilter, WorkItemService, WorkItemUpdate};

/// The kinds of service the registry can hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceKind {
    WorkItems,
    Sprints,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 2] = [ServiceKind::WorkItems, ServiceKind::Sprints];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::WorkItems => "work-items",
            ServiceKind::Sprints => "sprints",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
