//! MCP server implementation
//!
//! `McpServer` holds the shared registry and the combined tool router.
//! Cloning is cheap; the HTTP transport creates one per session.

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    handler::server::router::tool::ToolRouter,
    model::{
        ListResourceTemplatesResult, ListResourcesResult, PaginatedRequestParams,
        ReadResourceRequestParams, ReadResourceResult, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    tool_handler,
};

use crate::registry::ServiceRegistry;

const INSTRUCTIONS: &str = "sprintgate - Work items, sprints and iterations of an Azure DevOps \
     organization. Every work tool takes an optional `project`; when omitted the server's \
     default project is used. Reads are cached for a few minutes and refreshed after any \
     change made through these tools. Resources `sprint://current`, \
     `sprint://{iteration_path}` and `workitem://{work_item_id}` render the default \
     project as markdown.";

#[derive(Clone)]
pub struct McpServer {
    pub(crate) registry: Arc<ServiceRegistry>,
    tool_router: ToolRouter<Self>,
}

impl McpServer {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            registry,
            tool_router: Self::work_item_router() + Self::sprint_router() + Self::system_router(),
        }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Names of every registered tool, sorted.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();
        names
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(
            ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
        )
        .with_instructions(INSTRUCTIONS)
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult::with_all_items(self.resources()))
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        Ok(ListResourceTemplatesResult::with_all_items(
            self.resource_templates(),
        ))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        self.read_resource_uri(&request.uri, context.ct).await
    }
}
