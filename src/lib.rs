//! sprintgate: an MCP server for Azure DevOps work items and sprints.
//!
//! Requests from MCP clients flow through a per-project service registry,
//! a shared TTL cache and a retrying remote client.

pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod mcp;
pub mod redact;
pub mod registry;
pub mod remote;
pub mod retry;
pub mod services;
pub mod validation;

#[cfg(test)]
mod test_support;
