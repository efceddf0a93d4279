//! MCP tools for sprints and iterations.

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
use tokio_util::sync::CancellationToken;

use crate::mcp::McpServer;
use crate::mcp::tools::{json_result, map_tracker_error};
use crate::services::with_caller_cancel;

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct GetSprintWorkItemsParams {
    #[schemars(description = "Iteration path, e.g. 'Sprint 5' or 'Project\\Sprint 5'")]
    pub iteration_path: String,
    #[schemars(description = "Maximum number of items (default: 500)")]
    pub limit: Option<usize>,
    #[schemars(description = "Project name (optional)")]
    pub project: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct GetTeamIterationsParams {
    #[schemars(description = "Team name (default: the project's first team)")]
    pub team: Option<String>,
    #[schemars(description = "Only 'past', 'current' or 'future' iterations (optional)")]
    pub timeframe: Option<String>,
    #[schemars(description = "Project name (optional)")]
    pub project: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct GetCurrentSprintParams {
    #[schemars(description = "Team name (default: the project's first team)")]
    pub team: Option<String>,
    #[schemars(description = "Project name (optional)")]
    pub project: Option<String>,
}

#[tool_router(router = sprint_router, vis = "pub(crate)")]
impl McpServer {
    #[tool(
        description = "List the work items of one sprint with completed / in-progress / not-started counts and completion percentage."
    )]
    pub async fn get_sprint_work_items(
        &self,
        params: Parameters<GetSprintWorkItemsParams>,
        ct: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let service = self
            .registry
            .sprints(params.project.as_deref())
            .await
            .map_err(map_tracker_error)?;
        let summary = with_caller_cancel(
            ct,
            service.get_sprint_work_items(&params.iteration_path, params.limit),
        )
        .await
        .map_err(map_tracker_error)?;

        json_result(&summary)
    }

    #[tool(description = "List a team's iterations (sprints) with their dates.")]
    pub async fn get_team_iterations(
        &self,
        params: Parameters<GetTeamIterationsParams>,
        ct: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let service = self
            .registry
            .sprints(params.project.as_deref())
            .await
            .map_err(map_tracker_error)?;
        let iterations = with_caller_cancel(
            ct,
            service.get_team_iterations(params.team.as_deref(), params.timeframe.as_deref()),
        )
        .await
        .map_err(map_tracker_error)?;

        json_result(&iterations)
    }

    #[tool(
        description = "Get the team's current sprint with days remaining and progress statistics."
    )]
    pub async fn get_current_sprint(
        &self,
        params: Parameters<GetCurrentSprintParams>,
        ct: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let service = self
            .registry
            .sprints(params.project.as_deref())
            .await
            .map_err(map_tracker_error)?;
        let sprint = with_caller_cancel(ct, service.get_current_sprint(params.team.as_deref()))
            .await
            .map_err(map_tracker_error)?;

        if sprint.is_null() {
            return json_result(&json!({
                "project": service.tenant(),
                "current_sprint": null,
                "message": "No current sprint found",
            }));
        }
        json_result(&sprint)
    }
}
