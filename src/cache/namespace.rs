use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Partition of the cache owned by one (service kind, tenant) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// `work-items:Alpha`
    pub fn from_parts(kind: &str, tenant: &str) -> Self {
        Self(format!("{kind}:{tenant}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short stable key for a parameter set: `label:<16 hex chars of sha256>`.
///
/// Used for reads whose parameters are free text (searches) so the key stays
/// bounded and never contains user input verbatim.
pub fn digest_key<T: Serialize>(label: &str, params: &T) -> String {
    let encoded = serde_json::to_vec(params).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    let hash = hasher.finalize();
    let hex: String = hash.iter().take(8).map(|b| format!("{b:02x}")).collect();
    format!("{label}:{hex}")
}
