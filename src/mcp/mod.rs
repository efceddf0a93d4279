//! Model Context Protocol (MCP) server implementation
//!
//! This module exposes the tracker operations as MCP tools, served either
//! over stdio or over the Streamable HTTP transport.
//!
//! # Architecture
//!
//! - **server**: `McpServer`, the `ServerHandler` combining every tool router
//! - **resources**: markdown views of sprints and work items
//! - **service**: Streamable HTTP service for mounting under `/mcp`
//! - **tools**: one router per area, each an `impl McpServer` block
//!   - work items: reads, updates, comments, links, searches
//!   - sprints: team iterations, current sprint, sprint summaries
//!   - system: health and registry statistics
//!
//! Every tool resolves its service through the shared `ServiceRegistry`;
//! an omitted `project` falls back to the configured default.

pub mod resources;
pub mod server;
mod service;
pub mod tools;

#[cfg(test)]
mod resources_test;
#[cfg(test)]
mod server_test;

pub use server::McpServer;
pub use service::create_mcp_service;
