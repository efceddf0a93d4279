//! Tests for settings resolution.

use std::env;
use std::time::Duration;

use serial_test::serial;

use super::*;

const ALL_VARS: [&str; 9] = [
    ENV_ORG_URL,
    ENV_PROJECT,
    ENV_PAT,
    ENV_TRANSPORT,
    ENV_HOST,
    ENV_PORT,
    ENV_CACHE_TTL,
    ENV_MAX_ATTEMPTS,
    ENV_REQUEST_TIMEOUT,
];

fn clear_env() {
    for name in ALL_VARS {
        unsafe {
            env::remove_var(name);
        }
    }
}

fn set_env(name: &str, value: &str) {
    unsafe {
        env::set_var(name, value);
    }
}

fn required() -> Overrides {
    Overrides {
        org_url: Some("https://dev.azure.com/acme".to_string()),
        pat: Some("secret-pat".to_string()),
        ..Overrides::default()
    }
}

#[test]
#[serial]
fn test_defaults() {
    clear_env();

    let settings = Settings::resolve(required()).unwrap();

    assert_eq!(settings.transport, Transport::Stdio);
    assert_eq!(settings.host.to_string(), "127.0.0.1");
    assert_eq!(settings.port, 8000);
    assert_eq!(settings.default_project, None);
    assert_eq!(settings.cache_ttl, Duration::from_secs(300));
    assert_eq!(settings.max_attempts, 4);
    assert_eq!(settings.request_timeout, Duration::from_secs(30));
}

#[test]
#[serial]
fn test_env_fills_missing_values() {
    clear_env();
    set_env(ENV_ORG_URL, "https://dev.azure.com/env-org");
    set_env(ENV_PAT, "env-pat");
    set_env(ENV_PROJECT, "Alpha");
    set_env(ENV_TRANSPORT, "HTTP");
    set_env(ENV_PORT, "9100");
    set_env(ENV_MAX_ATTEMPTS, "2");

    let settings = Settings::resolve(Overrides::default()).unwrap();

    assert_eq!(settings.org_url, "https://dev.azure.com/env-org");
    assert_eq!(settings.pat, "env-pat");
    assert_eq!(settings.default_project.as_deref(), Some("Alpha"));
    assert_eq!(settings.transport, Transport::Http);
    assert_eq!(settings.port, 9100);
    assert_eq!(settings.registry_config().retry.max_attempts, 2);

    clear_env();
}

#[test]
#[serial]
fn test_explicit_values_win_over_env() {
    clear_env();
    set_env(ENV_PROJECT, "FromEnv");
    set_env(ENV_PORT, "9100");
    set_env(ENV_CACHE_TTL, "60");

    let settings = Settings::resolve(Overrides {
        project: Some("FromFlag".to_string()),
        port: Some(7000),
        cache_ttl_secs: Some(15),
        ..required()
    })
    .unwrap();

    assert_eq!(settings.default_project.as_deref(), Some("FromFlag"));
    assert_eq!(settings.port, 7000);
    assert_eq!(settings.cache_config().default_ttl, Duration::from_secs(15));

    clear_env();
}

#[test]
#[serial]
fn test_missing_required_values() {
    clear_env();

    let err = Settings::resolve(Overrides::default()).unwrap_err();
    assert_eq!(
        err,
        ConfigError::Missing {
            name: ENV_ORG_URL,
            flag: "--org-url"
        }
    );

    let err = Settings::resolve(Overrides {
        org_url: Some("https://dev.azure.com/acme".to_string()),
        ..Overrides::default()
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::Missing { name: ENV_PAT, .. }));

    set_env(ENV_PAT, "   ");
    let err = Settings::resolve(Overrides {
        org_url: Some("https://dev.azure.com/acme".to_string()),
        ..Overrides::default()
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::Missing { name: ENV_PAT, .. }));

    clear_env();
}

#[test]
#[serial]
fn test_invalid_values_are_reported() {
    clear_env();

    set_env(ENV_PORT, "eighty");
    let err = Settings::resolve(required()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { name: ENV_PORT, .. }));
    clear_env();

    set_env(ENV_TRANSPORT, "carrier-pigeon");
    let err = Settings::resolve(required()).unwrap_err();
    assert!(err.to_string().contains("carrier-pigeon"));
    clear_env();

    let err = Settings::resolve(Overrides {
        max_attempts: Some(0),
        ..required()
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { name: ENV_MAX_ATTEMPTS, .. }));

    let err = Settings::resolve(Overrides {
        org_url: Some("dev.azure.com/acme".to_string()),
        ..required()
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { name: ENV_ORG_URL, .. }));
}

#[test]
fn test_debug_hides_pat() {
    let settings = Settings {
        org_url: "https://dev.azure.com/acme".to_string(),
        default_project: None,
        pat: "super-secret".to_string(),
        transport: Transport::Http,
        host: "127.0.0.1".parse().unwrap(),
        port: 8000,
        cache_ttl: Duration::from_secs(300),
        max_attempts: 4,
        request_timeout: Duration::from_secs(30),
    };

    let debug = format!("{settings:?}");

    assert!(!debug.contains("super-secret"));
    assert!(debug.contains("<redacted>"));
}

#[test]
fn test_transport_parsing() {
    assert_eq!("stdio".parse::<Transport>(), Ok(Transport::Stdio));
    assert_eq!(" Streamable-HTTP ".parse::<Transport>(), Ok(Transport::Http));
    assert!("ws".parse::<Transport>().is_err());
    assert_eq!(Transport::Http.to_string(), "http");
}
