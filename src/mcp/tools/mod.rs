//! MCP tool implementations
//!
//! Each submodule adds one tool router to `McpServer`. This module holds the
//! helpers they share: turning a service result into a tool result and a
//! `TrackerError` into a protocol error.

pub mod sprints;
pub mod system;
pub mod work_items;


use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::error::{ErrorKind, TrackerError};

/// Map a service error onto the MCP error space.
///
/// Validation failures are the caller's fault (`invalid_params`), a missing
/// item is `resource_not_found`, everything else is an internal error. The
/// error kind always travels in the data payload.
pub fn map_tracker_error(error: TrackerError) -> McpError {
    let kind = error.kind();
    let data = Some(json!({ "kind": kind.as_str(), "error": error.to_string() }));
    match kind {
        ErrorKind::Validation => McpError::invalid_params(error.to_string(), data),
        ErrorKind::NotFound => McpError::resource_not_found(error.to_string(), data),
        _ => {
            warn!(kind = %kind, error = %error, "tool call failed");
            McpError::internal_error(error.to_string(), data)
        }
    }
}

/// Pretty JSON text content.
pub fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("Failed to encode result: {e}"), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}
