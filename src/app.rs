//! Process wiring: tracing, the shared components and the MCP transports.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use miette::Diagnostic;
use rmcp::ServiceExt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::auth::{AuthError, PatAuthenticator};
use crate::cache::TtlCache;
use crate::config::{ConfigError, Settings, Transport};
use crate::error::ShutdownError;
use crate::mcp::{McpServer, create_mcp_service};
use crate::registry::ServiceRegistry;
use crate::remote::{HttpTrackerApi, RemoteError};
use crate::retry::InvalidPolicy;

#[derive(Error, Diagnostic, Debug)]
pub enum AppError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Policy(#[from] InvalidPolicy),

    #[error("I/O error: {0}")]
    #[diagnostic(code(sprintgate::app::io))]
    Io(#[from] std::io::Error),

    #[error("MCP transport failed: {message}")]
    #[diagnostic(code(sprintgate::app::transport))]
    Transport { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Shutdown(#[from] ShutdownError),
}

/// Initialize tracing with `RUST_LOG` or the default filter.
///
/// Output goes to stderr; stdout belongs to the stdio transport.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sprintgate=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Build the registry and serve until the client leaves or Ctrl-C.
///
/// The registry is closed on the way out even when serving failed.
pub async fn run(settings: Settings) -> Result<(), AppError> {
    // reqwest is built without a default crypto provider; a second install is harmless
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cache = Arc::new(TtlCache::new(settings.cache_config()));
    cache.start_sweeper();
    let api = Arc::new(HttpTrackerApi::new(&settings.org_url)?);
    let auth = Arc::new(PatAuthenticator::new(&settings.pat)?);
    let shutdown = CancellationToken::new();
    let registry = Arc::new(ServiceRegistry::new(
        settings.registry_config(),
        cache,
        api,
        auth,
        shutdown.clone(),
    )?);

    info!(
        org_url = %settings.org_url,
        default_project = settings.default_project.as_deref().unwrap_or("-"),
        transport = %settings.transport,
        "starting sprintgate"
    );

    let served = match settings.transport {
        Transport::Stdio => serve_stdio(registry.clone()).await,
        Transport::Http => serve_http(&settings, registry.clone(), shutdown.child_token()).await,
    };

    shutdown.cancel();
    let closed = registry.close().await;
    if let Err(e) = &closed {
        warn!(error = %e, "shutdown incomplete");
    }
    served?;
    closed?;
    info!("sprintgate stopped");
    Ok(())
}

async fn serve_stdio(registry: Arc<ServiceRegistry>) -> Result<(), AppError> {
    let service = McpServer::new(registry)
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|e| AppError::Transport {
            message: e.to_string(),
        })?;
    info!("MCP server ready on stdio");

    tokio::select! {
        result = service.waiting() => {
            let reason = result.map_err(|e| AppError::Transport { message: e.to_string() })?;
            info!(?reason, "MCP client disconnected");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }
    Ok(())
}

async fn serve_http(
    settings: &Settings,
    registry: Arc<ServiceRegistry>,
    cancel: CancellationToken,
) -> Result<(), AppError> {
    let app = Router::new()
        .nest_service("/mcp", create_mcp_service(registry, cancel.clone()))
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::new(settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("MCP server listening on http://{}/mcp", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            // open SSE streams only end once their sessions are cancelled
            cancel.cancel();
        })
        .await?;
    Ok(())
}
