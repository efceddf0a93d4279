//! Authentication against the remote tracker.
//!
//! The registry holds one [`Authenticator`] shared by every tenant. Services
//! ask it for a [`Credential`] when they are created and ask it to refresh
//! when the remote side answers 401.

use std::fmt;
use std::sync::RwLock;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use futures_util::future::{BoxFuture, FutureExt};
use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("No credential configured")]
    #[diagnostic(
        code(sprintgate::auth::missing),
        help("Set AZURE_DEVOPS_PAT or pass --pat")
    )]
    Missing,

    #[error("Credential rejected: {message}")]
    #[diagnostic(code(sprintgate::auth::invalid))]
    Invalid { message: String },

    #[error("Authenticator is closed")]
    #[diagnostic(code(sprintgate::auth::closed))]
    Closed,
}

/// Value of the `Authorization` header, e.g. `Basic OnRva2Vu`.
///
/// `Debug` and `Display` never print the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(header_value: impl Into<String>) -> Self {
        Self(header_value.into())
    }

    /// Basic credential for a personal access token (empty user name).
    pub fn basic_from_pat(pat: &str) -> Self {
        Self(format!("Basic {}", STANDARD.encode(format!(":{pat}"))))
    }

    /// The header value, for use on the wire only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn scheme(&self) -> &str {
        self.0.split_whitespace().next().unwrap_or("")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({} ***)", self.scheme())
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ***", self.scheme())
    }
}

/// Opaque source of credentials.
pub trait Authenticator: Send + Sync {
    /// Short name of the mechanism, reported by `health_check`.
    fn method(&self) -> &'static str;

    fn credential(&self) -> BoxFuture<'_, Result<Credential, AuthError>>;

    /// Obtain a fresh credential after the remote side rejected the current one.
    fn refresh(&self) -> BoxFuture<'_, Result<Credential, AuthError>>;

    fn close(&self) -> BoxFuture<'_, Result<(), AuthError>> {
        async { Ok(()) }.boxed()
    }
}

/// Personal access token authenticator.
///
/// A PAT cannot be renewed from here, so `refresh` hands back the same
/// credential; the caller still sees the 401 and reports it.
pub struct PatAuthenticator {
    credential: RwLock<Option<Credential>>,
}

impl PatAuthenticator {
    pub fn new(pat: &str) -> Result<Self, AuthError> {
        let pat = pat.trim();
        if pat.is_empty() {
            return Err(AuthError::Missing);
        }
        Ok(Self {
            credential: RwLock::new(Some(Credential::basic_from_pat(pat))),
        })
    }

    fn current(&self) -> Result<Credential, AuthError> {
        self.credential
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
            .ok_or(AuthError::Closed)
    }
}

impl Authenticator for PatAuthenticator {
    fn method(&self) -> &'static str {
        "pat"
    }

    fn credential(&self) -> BoxFuture<'_, Result<Credential, AuthError>> {
        let result = self.current();
        async move { result }.boxed()
    }

    fn refresh(&self) -> BoxFuture<'_, Result<Credential, AuthError>> {
        debug!("personal access tokens cannot be refreshed, reusing current token");
        let result = self.current();
        async move { result }.boxed()
    }

    fn close(&self) -> BoxFuture<'_, Result<(), AuthError>> {
        let taken = self
            .credential
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if taken.is_some() {
            info!("authenticator closed");
        }
        async { Ok(()) }.boxed()
    }
}
