//! Runtime settings.
//!
//! Every value resolves the same way: an explicit value (usually a CLI flag)
//! wins over the environment variable, which wins over the default.

use std::env;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use crate::cache::CacheConfig;
use crate::registry::{DEFAULT_REQUEST_TIMEOUT, RegistryConfig};
use crate::retry::RetryPolicy;

#[cfg(test)]
mod config_test;

pub const ENV_ORG_URL: &str = "AZURE_DEVOPS_ORG_URL";
pub const ENV_PROJECT: &str = "AZURE_DEVOPS_PROJECT";
pub const ENV_PAT: &str = "AZURE_DEVOPS_PAT";
pub const ENV_TRANSPORT: &str = "MCP_TRANSPORT";
pub const ENV_HOST: &str = "HOST";
pub const ENV_PORT: &str = "PORT";
pub const ENV_CACHE_TTL: &str = "SPRINTGATE_CACHE_TTL_SECS";
pub const ENV_MAX_ATTEMPTS: &str = "SPRINTGATE_MAX_ATTEMPTS";
pub const ENV_REQUEST_TIMEOUT: &str = "SPRINTGATE_REQUEST_TIMEOUT_SECS";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;

#[derive(Error, Diagnostic, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is not set")]
    #[diagnostic(
        code(sprintgate::config::missing),
        help("Pass {flag} or set {name}")
    )]
    Missing { name: &'static str, flag: &'static str },

    #[error("Invalid value for {name}: '{value}' ({reason})")]
    #[diagnostic(code(sprintgate::config::invalid))]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// How MCP clients reach the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// JSON-RPC over stdin/stdout, the usual mode for desktop clients.
    #[default]
    Stdio,
    /// Streamable HTTP under `/mcp`.
    Http,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Stdio => "stdio",
            Transport::Http => "http",
        }
    }
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Transport::Stdio),
            "http" | "streamable-http" | "streamable_http" => Ok(Transport::Http),
            other => Err(format!("unknown transport '{other}', expected stdio or http")),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values given explicitly, typically from the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub org_url: Option<String>,
    pub project: Option<String>,
    pub pat: Option<String>,
    pub transport: Option<Transport>,
    pub host: Option<IpAddr>,
    pub port: Option<u16>,
    pub cache_ttl_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub request_timeout_secs: Option<u64>,
}

/// Fully resolved settings.
#[derive(Clone)]
pub struct Settings {
    pub org_url: String,
    pub default_project: Option<String>,
    pub pat: String,
    pub transport: Transport,
    pub host: IpAddr,
    pub port: u16,
    pub cache_ttl: Duration,
    pub max_attempts: u32,
    pub request_timeout: Duration,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("org_url", &self.org_url)
            .field("default_project", &self.default_project)
            .field("pat", &"<redacted>")
            .field("transport", &self.transport)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("cache_ttl", &self.cache_ttl)
            .field("max_attempts", &self.max_attempts)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Settings {
    pub fn resolve(overrides: Overrides) -> Result<Self, ConfigError> {
        let org_url = overrides
            .org_url
            .or_else(|| env_string(ENV_ORG_URL))
            .ok_or(ConfigError::Missing {
                name: ENV_ORG_URL,
                flag: "--org-url",
            })?;
        if !org_url.starts_with("https://") && !org_url.starts_with("http://") {
            return Err(ConfigError::Invalid {
                name: ENV_ORG_URL,
                value: org_url,
                reason: "expected an http(s) URL".to_string(),
            });
        }

        let pat = overrides
            .pat
            .or_else(|| env_string(ENV_PAT))
            .ok_or(ConfigError::Missing {
                name: ENV_PAT,
                flag: "--pat",
            })?;

        let default_project = overrides.project.or_else(|| env_string(ENV_PROJECT));

        let transport = match overrides.transport {
            Some(transport) => transport,
            None => env_parsed(ENV_TRANSPORT)?.unwrap_or_default(),
        };
        let host = match overrides.host {
            Some(host) => host,
            None => match env_parsed(ENV_HOST)? {
                Some(host) => host,
                None => DEFAULT_HOST.parse().map_err(|_| ConfigError::Invalid {
                    name: ENV_HOST,
                    value: DEFAULT_HOST.to_string(),
                    reason: "not an IP address".to_string(),
                })?,
            },
        };
        let port = match overrides.port {
            Some(port) => port,
            None => env_parsed(ENV_PORT)?.unwrap_or(DEFAULT_PORT),
        };

        let cache_ttl = match overrides.cache_ttl_secs {
            Some(secs) => secs,
            None => env_parsed(ENV_CACHE_TTL)?
                .unwrap_or(CacheConfig::default().default_ttl.as_secs()),
        };
        if cache_ttl == 0 {
            return Err(ConfigError::Invalid {
                name: ENV_CACHE_TTL,
                value: "0".to_string(),
                reason: "must be at least 1 second".to_string(),
            });
        }

        let max_attempts = match overrides.max_attempts {
            Some(n) => n,
            None => env_parsed(ENV_MAX_ATTEMPTS)?
                .unwrap_or(RetryPolicy::default().max_attempts),
        };
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: ENV_MAX_ATTEMPTS,
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let request_timeout = match overrides.request_timeout_secs {
            Some(secs) => secs,
            None => env_parsed(ENV_REQUEST_TIMEOUT)?
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT.as_secs()),
        };

        Ok(Self {
            org_url,
            default_project,
            pat,
            transport,
            host,
            port,
            cache_ttl: Duration::from_secs(cache_ttl),
            max_attempts,
            request_timeout: Duration::from_secs(request_timeout),
        })
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            default_ttl: self.cache_ttl,
            ..CacheConfig::default()
        }
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            default_tenant: self.default_project.clone(),
            request_timeout: self.request_timeout,
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                ..RetryPolicy::default()
            },
        }
    }
}

/// A non-blank environment variable.
fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parsed<T>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    env_string(name)
        .map(|value| {
            value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}
