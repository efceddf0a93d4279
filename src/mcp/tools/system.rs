//! Health and statistics tools.

use rmcp::{
    ErrorData as McpError,
    handler::server::wrapper::Parameters,
    model::*,
    schemars,
    schemars::JsonSchema,
    tool, tool_router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::mcp::McpServer;
use crate::mcp::tools::{json_result, map_tracker_error};
use crate::validation::validate_tenant_key;

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ResetProjectParams {
    #[schemars(description = "Project whose services and cached reads are dropped")]
    pub project: String,
}

#[tool_router(router = system_router, vis = "pub(crate)")]
impl McpServer {
    #[tool(
        description = "Report server health: authentication method, default project, loaded projects and cache state."
    )]
    pub async fn health_check(&self) -> Result<CallToolResult, McpError> {
        let registry = &self.registry;
        let cache = registry.cache().stats();
        let status = if registry.is_closed() {
            "closed"
        } else {
            "healthy"
        };

        json_result(&json!({
            "status": status,
            "version": env!("CARGO_PKG_VERSION"),
            "authentication": registry.authenticator().method(),
            "default_project": registry.default_tenant(),
            "loaded_projects": registry.loaded_tenants(),
            "cache": {
                "size": cache.size,
                "max_entries": cache.max_entries,
                "hit_rate": cache.hit_rate(),
            },
        }))
    }

    #[tool(
        description = "Service registry and cache statistics: creations, hits, misses, hit rates and loaded projects."
    )]
    pub async fn get_service_statistics(&self) -> Result<CallToolResult, McpError> {
        json_result(&self.registry.stats())
    }

    #[tool(
        description = "Drop a project's loaded services and cached reads. The next call for the project rebuilds them."
    )]
    pub async fn reset_project(
        &self,
        params: Parameters<ResetProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        let project = validate_tenant_key(&params.0.project)
            .map_err(|e| map_tracker_error(e.into()))?;
        let evicted = self.registry.evict_tenant(project);
        info!(project, evicted, "project reset");

        json_result(&json!({
            "project": project,
            "evicted_services": evicted,
            "loaded_projects": self.registry.loaded_tenants(),
        }))
    }
}
