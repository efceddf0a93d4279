//! MCP tools for work items.

use rmcp::{
    ErrorData as McpError,
    handler::server::wrapper::Parameters,
    model::*,
    schemars,
    schemars::JsonSchema,
    tool, tool_router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;

use crate::mcp::McpServer;
use crate::mcp::tools::{json_result, map_tracker_error};
use crate::services::{
    ExpandOption, NewWorkItem, WorkItemFilter, WorkItemUpdate, with_caller_cancel,
};

// =============================================================================
// Parameter Structs
// =============================================================================

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct GetMyWorkItemsParams {
    #[schemars(description = "Project name. Defaults to the server's configured project.")]
    pub project: Option<String>,
    #[schemars(description = "Filter by state, e.g. 'Active', 'New', 'Resolved', 'Closed'")]
    pub state: Option<String>,
    #[schemars(description = "Filter by type, e.g. 'Bug', 'Task', 'User Story'")]
    pub work_item_type: Option<String>,
    #[schemars(description = "Maximum number of items (default: 100)")]
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct GetWorkItemDetailsParams {
    #[schemars(description = "Work item ID")]
    pub work_item_id: i64,
    #[schemars(description = "Project name (optional)")]
    pub project: Option<String>,
    #[schemars(description = "Include the discussion comments (default: true)")]
    pub include_comments: Option<bool>,
    #[schemars(description = "Expand: 'None', 'Relations' (default), 'Fields', 'Links' or 'All'")]
    pub expand: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct UpdateWorkItemParams {
    #[schemars(description = "Work item ID to update")]
    pub work_item_id: i64,
    #[schemars(description = "Project name (optional)")]
    pub project: Option<String>,
    #[schemars(description = "New state, e.g. 'Active' or 'Closed' (optional)")]
    pub state: Option<String>,
    #[schemars(description = "New title (optional)")]
    pub title: Option<String>,
    #[schemars(description = "Assignee display name or email (optional)")]
    pub assigned_to: Option<String>,
    #[schemars(description = "Remaining work in hours (optional)")]
    pub remaining_work: Option<f64>,
    #[schemars(description = "Priority 1 (highest) to 4 (lowest) (optional)")]
    pub priority: Option<i64>,
    #[schemars(description = "Description, HTML allowed (optional)")]
    pub description: Option<String>,
    #[schemars(
        description = "Other fields by reference name, e.g. {\"Microsoft.VSTS.Scheduling.StoryPoints\": 3} (optional)"
    )]
    pub fields: Option<Map<String, Value>>,
    #[schemars(description = "Comment to add alongside the update (optional)")]
    pub comment: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct AddCommentParams {
    #[schemars(description = "Work item ID")]
    pub work_item_id: i64,
    #[schemars(description = "Comment text, HTML allowed")]
    pub comment: String,
    #[schemars(description = "Project name (optional)")]
    pub project: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct CreateWorkItemParams {
    #[schemars(description = "Title")]
    pub title: String,
    #[schemars(description = "Type, e.g. 'Task', 'Bug', 'User Story'")]
    pub work_item_type: String,
    #[schemars(description = "Description, HTML allowed (optional)")]
    pub description: Option<String>,
    #[schemars(description = "Assignee display name or email (optional)")]
    pub assigned_to: Option<String>,
    #[schemars(description = "Iteration path, e.g. 'Sprint 5' (optional)")]
    pub iteration_path: Option<String>,
    #[schemars(description = "Priority 1 (highest) to 4 (lowest) (optional)")]
    pub priority: Option<i64>,
    #[schemars(description = "Project name (optional)")]
    pub project: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct MoveToSprintParams {
    #[schemars(description = "Work item ID")]
    pub work_item_id: i64,
    #[schemars(description = "Target iteration path, e.g. 'Sprint 6' or 'Project\\Sprint 6'")]
    pub iteration_path: String,
    #[schemars(description = "Project name (optional)")]
    pub project: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct LinkWorkItemsParams {
    #[schemars(description = "Work item the link is added to")]
    pub source_id: i64,
    #[schemars(description = "Work item the link points at")]
    pub target_id: i64,
    #[schemars(
        description = "Link type reference name, e.g. 'System.LinkTypes.Hierarchy-Reverse' (parent), 'System.LinkTypes.Related'"
    )]
    pub link_type: String,
    #[schemars(description = "Comment stored on the link (optional)")]
    pub comment: Option<String>,
    #[schemars(description = "Project name (optional)")]
    pub project: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct SearchWorkItemsParams {
    #[schemars(description = "Words to search for")]
    pub search_text: String,
    #[schemars(description = "Field to search (default: 'System.Title')")]
    pub field: Option<String>,
    #[schemars(description = "Filter by state (optional)")]
    pub state: Option<String>,
    #[schemars(description = "Filter by type (optional)")]
    pub work_item_type: Option<String>,
    #[schemars(description = "Maximum number of items (default: 100)")]
    pub limit: Option<usize>,
    #[schemars(description = "Project name (optional)")]
    pub project: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct GetHistoricalWorkItemsParams {
    #[schemars(description = "State the items were in at some point, e.g. 'Resolved'")]
    pub state: String,
    #[schemars(description = "Filter by type (optional)")]
    pub work_item_type: Option<String>,
    #[schemars(description = "Maximum number of items (default: 100)")]
    pub limit: Option<usize>,
    #[schemars(description = "Project name (optional)")]
    pub project: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct GetWorkItemHierarchyParams {
    #[schemars(description = "Root work item ID")]
    pub work_item_id: i64,
    #[schemars(
        description = "Link type to follow (default: 'System.LinkTypes.Hierarchy-Forward', i.e. children)"
    )]
    pub link_type: Option<String>,
    #[schemars(description = "How many levels to descend (default: 5, max: 10)")]
    pub max_depth: Option<usize>,
    #[schemars(description = "Project name (optional)")]
    pub project: Option<String>,
}

impl UpdateWorkItemParams {
    /// Named convenience fields win over the same names in `fields`.
    fn into_update(self) -> WorkItemUpdate {
        let mut fields = self.fields.unwrap_or_default();
        let named = [
            ("System.State", self.state.map(Value::from)),
            ("System.Title", self.title.map(Value::from)),
            ("System.AssignedTo", self.assigned_to.map(Value::from)),
            (
                "Microsoft.VSTS.Scheduling.RemainingWork",
                self.remaining_work.map(Value::from),
            ),
            ("Microsoft.VSTS.Common.Priority", self.priority.map(Value::from)),
            ("System.Description", self.description.map(Value::from)),
        ];
        for (name, value) in named {
            if let Some(value) = value {
                fields.insert(name.to_string(), value);
            }
        }
        WorkItemUpdate {
            fields,
            comment: self.comment.filter(|c| !c.trim().is_empty()),
        }
    }
}

// =============================================================================
// Work Item Tools
// =============================================================================

#[tool_router(router = work_item_router, vis = "pub(crate)")]
impl McpServer {
    #[tool(
        description = "List work items assigned to the current user, newest changes first. Filter by state and type."
    )]
    pub async fn get_my_work_items(
        &self,
        params: Parameters<GetMyWorkItemsParams>,
        ct: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let service = self
            .registry
            .work_items(params.project.as_deref())
            .await
            .map_err(map_tracker_error)?;
        let filter = WorkItemFilter {
            state: params.state,
            work_item_type: params.work_item_type,
            limit: params.limit,
        };
        let items = with_caller_cancel(ct, service.get_my_work_items(&filter))
            .await
            .map_err(map_tracker_error)?;

        json_result(&json!({
            "project": service.tenant(),
            "count": items.as_array().map_or(0, Vec::len),
            "work_items": items,
        }))
    }

    #[tool(
        description = "Get one work item with its fields, relations and (by default) comments."
    )]
    pub async fn get_work_item_details(
        &self,
        params: Parameters<GetWorkItemDetailsParams>,
        ct: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let expand = match params.expand.as_deref() {
            Some(expand) => ExpandOption::parse(expand)
                .map_err(|e| map_tracker_error(e.into()))?,
            None => ExpandOption::default(),
        };
        let service = self
            .registry
            .work_items(params.project.as_deref())
            .await
            .map_err(map_tracker_error)?;
        let item = with_caller_cancel(
            ct,
            service.get_work_item(
                params.work_item_id,
                params.include_comments.unwrap_or(true),
                expand,
            ),
        )
        .await
        .map_err(map_tracker_error)?;

        json_result(&item)
    }

    #[tool(
        description = "Update fields of a work item (state, title, assignee, remaining work, priority, description or any whitelisted field) and optionally add a comment."
    )]
    pub async fn update_work_item(
        &self,
        params: Parameters<UpdateWorkItemParams>,
        ct: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let service = self
            .registry
            .work_items(params.project.as_deref())
            .await
            .map_err(map_tracker_error)?;
        let id = params.work_item_id;
        let item = with_caller_cancel(ct, service.update_work_item(id, &params.into_update()))
            .await
            .map_err(map_tracker_error)?;

        json_result(&json!({ "updated": true, "work_item": item }))
    }

    #[tool(description = "Add a comment to a work item's discussion.")]
    pub async fn add_comment(
        &self,
        params: Parameters<AddCommentParams>,
        ct: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let service = self
            .registry
            .work_items(params.project.as_deref())
            .await
            .map_err(map_tracker_error)?;
        let comment = with_caller_cancel(
            ct,
            service.add_comment(params.work_item_id, &params.comment),
        )
        .await
        .map_err(map_tracker_error)?;

        json_result(&json!({ "work_item_id": params.work_item_id, "comment": comment }))
    }

    #[tool(description = "Create a new work item.")]
    pub async fn create_work_item(
        &self,
        params: Parameters<CreateWorkItemParams>,
        ct: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let service = self
            .registry
            .work_items(params.project.as_deref())
            .await
            .map_err(map_tracker_error)?;
        let item = with_caller_cancel(
            ct,
            service.create_work_item(&NewWorkItem {
                title: params.title,
                work_item_type: params.work_item_type,
                description: params.description,
                assigned_to: params.assigned_to,
                iteration_path: params.iteration_path,
                priority: params.priority,
            }),
        )
        .await
        .map_err(map_tracker_error)?;

        json_result(&json!({ "created": true, "work_item": item }))
    }

    #[tool(description = "Move a work item to another iteration (sprint).")]
    pub async fn move_to_sprint(
        &self,
        params: Parameters<MoveToSprintParams>,
        ct: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let service = self
            .registry
            .work_items(params.project.as_deref())
            .await
            .map_err(map_tracker_error)?;
        let item = with_caller_cancel(
            ct,
            service.move_to_sprint(params.work_item_id, &params.iteration_path),
        )
        .await
        .map_err(map_tracker_error)?;

        json_result(&json!({ "moved": true, "work_item": item }))
    }

    #[tool(
        description = "Link two work items, e.g. make one the parent of another (Hierarchy-Reverse) or mark them related."
    )]
    pub async fn link_work_items(
        &self,
        params: Parameters<LinkWorkItemsParams>,
        ct: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let service = self
            .registry
            .work_items(params.project.as_deref())
            .await
            .map_err(map_tracker_error)?;
        let link = with_caller_cancel(
            ct,
            service.link_work_items(
                params.source_id,
                params.target_id,
                &params.link_type,
                params.comment.as_deref(),
            ),
        )
        .await
        .map_err(map_tracker_error)?;

        json_result(&link)
    }

    #[tool(
        description = "Search work items whose field (title by default) contains the given words."
    )]
    pub async fn search_work_items(
        &self,
        params: Parameters<SearchWorkItemsParams>,
        ct: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let service = self
            .registry
            .work_items(params.project.as_deref())
            .await
            .map_err(map_tracker_error)?;
        let filter = WorkItemFilter {
            state: params.state,
            work_item_type: params.work_item_type,
            limit: params.limit,
        };
        let items = with_caller_cancel(
            ct,
            service.search_work_items(&params.search_text, params.field.as_deref(), &filter),
        )
        .await
        .map_err(map_tracker_error)?;

        json_result(&json!({
            "search_text": params.search_text,
            "count": items.as_array().map_or(0, Vec::len),
            "work_items": items,
        }))
    }

    #[tool(
        description = "Find work items that were ever in the given state, even if they have moved on since."
    )]
    pub async fn get_historical_work_items(
        &self,
        params: Parameters<GetHistoricalWorkItemsParams>,
        ct: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let service = self
            .registry
            .work_items(params.project.as_deref())
            .await
            .map_err(map_tracker_error)?;
        let items = with_caller_cancel(
            ct,
            service.get_historical_work_items(
                &params.state,
                params.work_item_type.as_deref(),
                params.limit,
            ),
        )
        .await
        .map_err(map_tracker_error)?;

        json_result(&json!({
            "state": params.state,
            "count": items.as_array().map_or(0, Vec::len),
            "work_items": items,
        }))
    }

    #[tool(
        description = "Get the tree of work items below one item (children, grandchildren, ...) following a link type."
    )]
    pub async fn get_work_item_hierarchy(
        &self,
        params: Parameters<GetWorkItemHierarchyParams>,
        ct: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let service = self
            .registry
            .work_items(params.project.as_deref())
            .await
            .map_err(map_tracker_error)?;
        let tree = with_caller_cancel(
            ct,
            service.get_work_item_hierarchy(
                params.work_item_id,
                params.link_type.as_deref(),
                params.max_depth,
            ),
        )
        .await
        .map_err(map_tracker_error)?;

        json_result(&tree)
    }
}
