//! MCP resources
//!
//! Read-only markdown views over the default project: the current sprint,
//! one sprint by iteration path and one work item by id.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use rmcp::{
    ErrorData as McpError,
    model::{
        AnnotateAble, RawResource, RawResourceTemplate, ReadResourceResult, Resource,
        ResourceContents, ResourceTemplate,
    },
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::mcp::McpServer;
use crate::mcp::tools::map_tracker_error;
use crate::services::{ExpandOption, with_caller_cancel};

pub const CURRENT_SPRINT_URI: &str = "sprint://current";
pub const SPRINT_TEMPLATE: &str = "sprint://{iteration_path}";
pub const WORK_ITEM_TEMPLATE: &str = "workitem://{work_item_id}";

const SPRINT_SCHEME: &str = "sprint://";
const WORK_ITEM_SCHEME: &str = "workitem://";
const MARKDOWN: &str = "text/markdown";

const SPRINT_ITEMS_SHOWN: usize = 20;
const COMMENTS_SHOWN: usize = 5;

/// A parsed resource URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceUri {
    CurrentSprint,
    Sprint(String),
    WorkItem(i64),
}

impl ResourceUri {
    pub fn parse(uri: &str) -> Result<Self, McpError> {
        if uri == CURRENT_SPRINT_URI {
            return Ok(ResourceUri::CurrentSprint);
        }
        if let Some(path) = uri.strip_prefix(SPRINT_SCHEME) {
            if path.trim().is_empty() {
                return Err(invalid_uri(uri, "missing iteration path"));
            }
            return Ok(ResourceUri::Sprint(path.to_string()));
        }
        if let Some(id) = uri.strip_prefix(WORK_ITEM_SCHEME) {
            return id
                .parse::<i64>()
                .map(ResourceUri::WorkItem)
                .map_err(|_| invalid_uri(uri, "work item id must be an integer"));
        }
        Err(McpError::resource_not_found(
            format!("Unknown resource: {uri}"),
            Some(json!({ "uri": uri })),
        ))
    }
}

fn invalid_uri(uri: &str, reason: &str) -> McpError {
    McpError::invalid_params(
        format!("Invalid resource URI '{uri}': {reason}"),
        Some(json!({ "uri": uri })),
    )
}

impl McpServer {
    /// Fixed resources.
    pub fn resources(&self) -> Vec<Resource> {
        vec![
            RawResource::new(CURRENT_SPRINT_URI, "current-sprint")
                .with_description("Overview of the default project's current sprint")
                .with_mime_type(MARKDOWN)
                .no_annotation(),
        ]
    }

    pub fn resource_templates(&self) -> Vec<ResourceTemplate> {
        vec![
            RawResourceTemplate::new(SPRINT_TEMPLATE, "sprint")
                .with_description("Work items of one sprint, grouped by state")
                .with_mime_type(MARKDOWN)
                .no_annotation(),
            RawResourceTemplate::new(WORK_ITEM_TEMPLATE, "work-item")
                .with_description("One work item with its details and recent comments")
                .with_mime_type(MARKDOWN)
                .no_annotation(),
        ]
    }

    /// Render `uri` as markdown. Tracker calls stop when `ct` fires.
    pub async fn read_resource_uri(
        &self,
        uri: &str,
        ct: CancellationToken,
    ) -> Result<ReadResourceResult, McpError> {
        debug!(uri, "reading resource");
        let text = match ResourceUri::parse(uri)? {
            ResourceUri::CurrentSprint => {
                let service = self.registry.sprints(None).await.map_err(map_tracker_error)?;
                let sprint = with_caller_cancel(ct, service.get_current_sprint(None))
                    .await
                    .map_err(map_tracker_error)?;
                current_sprint_markdown(service.tenant(), &sprint)
            }
            ResourceUri::Sprint(path) => {
                let service = self.registry.sprints(None).await.map_err(map_tracker_error)?;
                let summary = with_caller_cancel(ct, service.get_sprint_work_items(&path, None))
                    .await
                    .map_err(map_tracker_error)?;
                sprint_markdown(service.tenant(), &summary)
            }
            ResourceUri::WorkItem(id) => {
                let service = self.registry.work_items(None).await.map_err(map_tracker_error)?;
                let item =
                    with_caller_cancel(ct, service.get_work_item(id, true, ExpandOption::None))
                        .await
                        .map_err(map_tracker_error)?;
                work_item_markdown(service.tenant(), &item)
            }
        };

        Ok(ReadResourceResult::new(vec![
            ResourceContents::text(text, uri).with_mime_type(MARKDOWN),
        ]))
    }
}

/// Display text for a JSON scalar, `fallback` for null or missing.
fn show(value: &Value, fallback: &str) -> String {
    match value {
        Value::Null => fallback.to_string(),
        Value::String(s) if s.is_empty() => fallback.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn current_sprint_markdown(project: &str, sprint: &Value) -> String {
    if sprint.is_null() {
        return format!("# Current Sprint\n**Project:** {project}\n\nNo current sprint found.\n");
    }
    let completion = sprint["completion_percentage"].as_f64().unwrap_or(0.0);
    format!(
        "# Current Sprint: {name}\n\
         **Project:** {project}\n\n\
         **Period:** {start} to {end}\n\
         **Days Remaining:** {days}\n\n\
         ## Work Items Summary\n\
         - Total Items: {total}\n\
         - Completed: {completed}\n\
         - In Progress: {in_progress}\n\
         - Not Started: {not_started}\n\n\
         ## Progress\n\
         {completion:.1}% complete\n",
        name = show(&sprint["name"], "Unnamed"),
        start = show(&sprint["start_date"], "?"),
        end = show(&sprint["end_date"], "?"),
        days = show(&sprint["days_remaining"], "n/a"),
        total = show(&sprint["total_items"], "0"),
        completed = show(&sprint["completed_items"], "0"),
        in_progress = show(&sprint["in_progress_items"], "0"),
        not_started = show(&sprint["not_started_items"], "0"),
    )
}

pub fn sprint_markdown(project: &str, summary: &Value) -> String {
    let items = summary["work_items"].as_array().map(Vec::as_slice).unwrap_or_default();

    let mut by_state: BTreeMap<String, usize> = BTreeMap::new();
    for item in items {
        *by_state.entry(show(&item["state"], "Unknown")).or_default() += 1;
    }

    let mut out = format!(
        "# Sprint: {}\n**Project:** {project}\n\n**Iteration Path:** {}\n\n## Work Items by State\n",
        show(&summary["sprint_name"], "Unnamed"),
        show(&summary["iteration_path"], "?"),
    );
    for (state, count) in &by_state {
        let _ = writeln!(out, "- {state}: {count}");
    }

    let _ = writeln!(
        out,
        "\n## Work Items (showing {} of {})",
        items.len().min(SPRINT_ITEMS_SHOWN),
        items.len()
    );
    for item in items.iter().take(SPRINT_ITEMS_SHOWN) {
        let _ = writeln!(
            out,
            "- [{}] {} ({})",
            show(&item["id"], "?"),
            show(&item["title"], "Untitled"),
            show(&item["state"], "Unknown"),
        );
    }
    out
}

pub fn work_item_markdown(project: &str, item: &Value) -> String {
    let mut out = format!(
        "# [{id}] {title}\n\
         **Project:** {project}\n\n\
         **Type:** {kind}\n\
         **State:** {state}\n\
         **Assigned To:** {assignee}\n\
         **Priority:** {priority}\n\n\
         ## Details\n\
         **Created:** {created}\n\
         **Updated:** {changed}\n\
         **Iteration:** {iteration}\n\n\
         ## Description\n\
         {description}\n\n\
         ## Recent Comments\n",
        id = show(&item["id"], "?"),
        title = show(&item["title"], "Untitled"),
        kind = show(&item["work_item_type"], "Unknown"),
        state = show(&item["state"], "Unknown"),
        assignee = show(&item["assigned_to"], "Unassigned"),
        priority = show(&item["priority"], "Not set"),
        created = show(&item["created_date"], "?"),
        changed = show(&item["changed_date"], "?"),
        iteration = show(&item["iteration_path"], "Not set"),
        description = show(&item["description"], "No description"),
    );

    let comments = item["comments"].as_array().map(Vec::as_slice).unwrap_or_default();
    if comments.is_empty() {
        out.push_str("No comments.\n");
    }
    for comment in comments.iter().take(COMMENTS_SHOWN) {
        let _ = writeln!(
            out,
            "- [{}] {}",
            show(&comment["created_date"], "?"),
            show(&comment["text"], ""),
        );
    }
    out
}
