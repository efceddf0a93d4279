//! MCP Streamable HTTP service creation
//!
//! This module provides the function that builds the MCP service for
//! nesting into an Axum router.

use std::sync::Arc;

use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use tokio_util::sync::CancellationToken;

use crate::registry::ServiceRegistry;

use super::server::McpServer;

/// Create the MCP Streamable HTTP service.
///
/// Every session gets its own `McpServer` sharing one registry.
///
/// # Example
/// ```no_run
/// # use std::sync::Arc;
/// # use axum::Router;
/// # use tokio_util::sync::CancellationToken;
/// # use sprintgate::mcp::create_mcp_service;
/// # use sprintgate::registry::ServiceRegistry;
/// # fn example(registry: Arc<ServiceRegistry>) {
/// let ct = CancellationToken::new();
/// let app: Router = Router::new().nest_service("/mcp", create_mcp_service(registry, ct));
/// # }
/// ```
pub fn create_mcp_service(
    registry: Arc<ServiceRegistry>,
    cancellation_token: CancellationToken,
) -> StreamableHttpService<McpServer, LocalSessionManager> {
    // rmcp expects the factory to fail with io::Error
    let service_factory = move || -> Result<McpServer, std::io::Error> {
        Ok(McpServer::new(Arc::clone(&registry)))
    };

    // Host validation keeps rmcp's loopback-only default
    let config = StreamableHttpServerConfig::default()
        .with_sse_keep_alive(None)
        .with_sse_retry(None)
        .with_stateful_mode(true)
        .with_cancellation_token(cancellation_token);

    StreamableHttpService::new(
        service_factory,
        LocalSessionManager::default().into(),
        config,
    )
}
