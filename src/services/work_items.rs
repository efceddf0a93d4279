//! Work item reads and mutations for one tenant.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use super::TenantContext;
use super::format;
use super::queries::{
    DEFAULT_LIMIT, DETAILED_FIELDS, MY_WORK_ITEMS_FIELDS, batch_get, clamp_limit, run_wiql,
    run_wiql_raw, select_clause,
};
use crate::cache::{CacheView, digest_key};
use crate::error::{TrackerError, TrackerResult};
use crate::remote::RemoteRequest;
use crate::validation::whitelist::ALLOWED_FIELD_NAMES;
use crate::validation::{
    ValidationError, sanitize_query_fragment, sanitize_rich_text, validate_enum,
    validate_field_name, validate_field_value, validate_iteration_path, validate_link_type,
    validate_priority, validate_state, validate_work_item_id, validate_work_item_type,
};

/// Comments live on a preview version of the API.
const COMMENTS_API_VERSION: &str = "7.1-preview.4";

const DEFAULT_HIERARCHY_LINK: &str = "System.LinkTypes.Hierarchy-Forward";
const DEFAULT_HIERARCHY_DEPTH: usize = 5;
const MAX_HIERARCHY_DEPTH: usize = 10;

/// Cached list reads that any mutation can make stale.
const LIST_PREFIXES: &[&str] = &["my_work_items:", "search:", "historical:", "hierarchy:"];

/// Sprint summaries embed work items; mutations drop them too.
const SPRINT_SUMMARY_PREFIX: &str = "sprint_work_items:";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ExpandOption {
    None,
    #[default]
    Relations,
    Fields,
    Links,
    All,
}

impl ExpandOption {
    const NAMES: &'static [&'static str] = &["None", "Relations", "Fields", "Links", "All"];

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        Ok(match validate_enum("expand", value, Self::NAMES)? {
            "None" => ExpandOption::None,
            "Fields" => ExpandOption::Fields,
            "Links" => ExpandOption::Links,
            "All" => ExpandOption::All,
            _ => ExpandOption::Relations,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpandOption::None => "None",
            ExpandOption::Relations => "Relations",
            ExpandOption::Fields => "Fields",
            ExpandOption::Links => "Links",
            ExpandOption::All => "All",
        }
    }
}

/// Optional filters shared by the list queries.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkItemFilter {
    pub state: Option<String>,
    pub work_item_type: Option<String>,
    pub limit: Option<usize>,
}

/// Field changes plus an optional comment.
#[derive(Debug, Clone, Default)]
pub struct WorkItemUpdate {
    pub fields: Map<String, Value>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewWorkItem {
    pub title: String,
    pub work_item_type: String,
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    pub iteration_path: Option<String>,
    pub priority: Option<i64>,
}

#[derive(Debug)]
pub struct WorkItemService {
    ctx: TenantContext,
    sprint_cache: CacheView,
}

impl WorkItemService {
    /// `sprint_cache` is the same tenant's sprint namespace.
    pub fn new(ctx: TenantContext, sprint_cache: CacheView) -> Self {
        Self { ctx, sprint_cache }
    }

    pub fn context(&self) -> &TenantContext {
        &self.ctx
    }

    pub fn tenant(&self) -> &str {
        self.ctx.tenant()
    }

    fn project_literal(&self) -> TrackerResult<String> {
        Ok(sanitize_query_fragment(self.tenant())?)
    }

    pub async fn get_my_work_items(&self, filter: &WorkItemFilter) -> TrackerResult<Value> {
        let state = filter.state.as_deref().map(validate_state).transpose()?;
        let work_item_type = filter
            .work_item_type
            .as_deref()
            .map(validate_work_item_type)
            .transpose()?;
        let limit = clamp_limit(filter.limit, DEFAULT_LIMIT);

        let key = format!(
            "my_work_items:{}:{}:{limit}",
            state.unwrap_or("*"),
            work_item_type.unwrap_or("*")
        );
        self.ctx
            .cached(&key, || async {
                let mut query = format!(
                    "SELECT [System.Id], [System.Title], [System.State], [System.WorkItemType] \
                     FROM WorkItems WHERE [System.TeamProject] = '{}' AND [System.AssignedTo] = @Me",
                    self.project_literal()?
                );
                if let Some(state) = state {
                    query.push_str(&format!(" AND [System.State] = '{state}'"));
                }
                if let Some(work_item_type) = work_item_type {
                    query.push_str(&format!(" AND [System.WorkItemType] = '{work_item_type}'"));
                }
                query.push_str(" ORDER BY [System.ChangedDate] DESC");

                self.fetch_list("get_my_work_items", &query, limit, MY_WORK_ITEMS_FIELDS)
                    .await
            })
            .await
    }

    async fn fetch_list(
        &self,
        operation: &str,
        query: &str,
        limit: usize,
        fields: &[&str],
    ) -> TrackerResult<Value> {
        let mut ids = run_wiql(&self.ctx, operation, query, limit).await?;
        ids.truncate(limit);
        if ids.is_empty() {
            return Ok(json!([]));
        }
        let items = batch_get(&self.ctx, operation, &ids, fields).await?;
        Ok(Value::Array(items.iter().map(format::work_item).collect()))
    }

    pub async fn get_work_item(
        &self,
        id: i64,
        include_comments: bool,
        expand: ExpandOption,
    ) -> TrackerResult<Value> {
        let id = validate_work_item_id(id)?;
        let key = format!("work_item:{id}:{include_comments}:{}", expand.as_str());

        self.ctx
            .cached(&key, || async {
                let raw = self
                    .ctx
                    .call(
                        "get_work_item",
                        RemoteRequest::get(format!("{}/_apis/wit/workitems/{id}", self.tenant()))
                            .query("$expand", expand.as_str()),
                    )
                    .await?;

                let mut item = format::work_item(&raw);
                if let Some(relations) = raw.get("relations") {
                    item["relations"] = relations.clone();
                }
                if include_comments {
                    item["comments"] = Value::Array(self.fetch_comments(id).await);
                }
                Ok(item)
            })
            .await
    }

    /// Comments are best effort; a failure yields an empty list.
    async fn fetch_comments(&self, id: u64) -> Vec<Value> {
        let request =
            RemoteRequest::get(format!("{}/_apis/wit/workItems/{id}/comments", self.tenant()))
                .query("api-version", COMMENTS_API_VERSION);
        match self.ctx.call("get_comments", request).await {
            Ok(response) => response
                .get("comments")
                .and_then(Value::as_array)
                .map(|comments| comments.iter().map(format::comment).collect())
                .unwrap_or_default(),
            Err(e) => {
                debug!(work_item = id, error = %e, "comments unavailable");
                Vec::new()
            }
        }
    }

    pub async fn update_work_item(&self, id: i64, update: &WorkItemUpdate) -> TrackerResult<Value> {
        let id = validate_work_item_id(id)?;
        if update.fields.is_empty() && update.comment.is_none() {
            return Err(ValidationError::Missing {
                field: "fields".to_string(),
                hint: "Provide at least one field to change or a comment".to_string(),
            }
            .into());
        }

        let mut operations = Vec::with_capacity(update.fields.len());
        for (name, value) in &update.fields {
            let name = validate_field_name(name, ALLOWED_FIELD_NAMES)?;
            let value = validate_field_value(name, value, self.tenant())?;
            operations.push(json!({"op": "add", "path": format!("/fields/{name}"), "value": value}));
        }
        let comment = update
            .comment
            .as_deref()
            .map(|c| self.prepare_comment(c))
            .transpose()?;

        let item = if operations.is_empty() {
            None
        } else {
            let raw = self
                .ctx
                .call(
                    "update_work_item",
                    RemoteRequest::patch(
                        format!("{}/_apis/wit/workitems/{id}", self.tenant()),
                        Value::Array(operations),
                    ),
                )
                .await;
            self.invalidate_item(id);
            Some(format::work_item(&raw?))
        };

        if let Some(text) = comment {
            self.post_comment(id, text).await?;
        }
        info!(tenant = %self.tenant(), work_item = id, "work item updated");

        match item {
            Some(item) => Ok(item),
            None => self.get_work_item(id as i64, false, ExpandOption::None).await,
        }
    }

    pub async fn move_to_sprint(&self, id: i64, iteration_path: &str) -> TrackerResult<Value> {
        let path = validate_iteration_path(iteration_path, self.tenant())?;
        let mut fields = Map::new();
        fields.insert("System.IterationPath".to_string(), Value::from(path));
        self.update_work_item(
            id,
            &WorkItemUpdate {
                fields,
                comment: None,
            },
        )
        .await
    }

    pub async fn create_work_item(&self, new: &NewWorkItem) -> TrackerResult<Value> {
        let work_item_type = validate_work_item_type(&new.work_item_type)?;
        let project = self.tenant();

        let mut fields: Vec<(&str, Value)> = vec![(
            "System.Title",
            validate_field_value("System.Title", &Value::from(new.title.as_str()), project)?,
        )];
        if let Some(description) = new.description.as_deref().filter(|d| !d.trim().is_empty()) {
            fields.push(("System.Description", Value::from(sanitize_rich_text(description))));
        }
        if let Some(assignee) = new.assigned_to.as_deref().filter(|a| !a.trim().is_empty()) {
            fields.push((
                "System.AssignedTo",
                validate_field_value("System.AssignedTo", &Value::from(assignee.trim()), project)?,
            ));
        }
        if let Some(path) = new.iteration_path.as_deref() {
            fields.push((
                "System.IterationPath",
                Value::from(validate_iteration_path(path, project)?),
            ));
        }
        if let Some(priority) = new.priority {
            fields.push((
                "Microsoft.VSTS.Common.Priority",
                Value::from(validate_priority(priority)?),
            ));
        }

        let operations: Vec<Value> = fields
            .into_iter()
            .map(|(name, value)| json!({"op": "add", "path": format!("/fields/{name}"), "value": value}))
            .collect();

        let raw = self
            .ctx
            .call(
                "create_work_item",
                RemoteRequest::post_patch(
                    format!("{project}/_apis/wit/workitems/${work_item_type}"),
                    Value::Array(operations),
                ),
            )
            .await?;
        self.invalidate_lists();

        let item = format::work_item(&raw);
        let id = &item["id"];
        info!(tenant = %project, work_item = %id, "work item created");
        Ok(item)
    }

    fn prepare_comment(&self, text: &str) -> TrackerResult<String> {
        let text = sanitize_rich_text(text);
        if text.trim().is_empty() {
            return Err(ValidationError::Empty {
                field: "comment".to_string(),
            }
            .into());
        }
        Ok(text)
    }

    async fn post_comment(&self, id: u64, text: String) -> TrackerResult<Value> {
        let result = self
            .ctx
            .call(
                "add_comment",
                RemoteRequest::post(
                    format!("{}/_apis/wit/workItems/{id}/comments", self.tenant()),
                    json!({ "text": text }),
                )
                .query("api-version", COMMENTS_API_VERSION),
            )
            .await;
        self.ctx
            .cache()
            .invalidate_prefix(&format!("work_item:{id}:"));
        Ok(format::comment(&result?))
    }

    pub async fn add_comment(&self, id: i64, text: &str) -> TrackerResult<Value> {
        let id = validate_work_item_id(id)?;
        let text = self.prepare_comment(text)?;
        self.post_comment(id, text).await
    }

    /// Add a `link_type` relation from `source` to `target`.
    pub async fn link_work_items(
        &self,
        source: i64,
        target: i64,
        link_type: &str,
        comment: Option<&str>,
    ) -> TrackerResult<Value> {
        let source = validate_work_item_id(source)?;
        let target = validate_work_item_id(target)?;
        if source == target {
            return Err(ValidationError::malformed("target", "cannot link a work item to itself").into());
        }
        let link_type = validate_link_type(link_type)?;
        let comment = comment
            .filter(|c| !c.trim().is_empty())
            .map(|c| self.prepare_comment(c))
            .transpose()?;

        let target_item = self
            .ctx
            .call(
                "link_work_items",
                RemoteRequest::get(format!("{}/_apis/wit/workitems/{target}", self.tenant())),
            )
            .await?;
        let target_url = target_item
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| TrackerError::invalid_response("link_work_items", "target has no url"))?;

        let mut relation = json!({"rel": link_type, "url": target_url});
        if let Some(comment) = comment {
            relation["attributes"] = json!({ "comment": comment });
        }

        let raw = self
            .ctx
            .call(
                "link_work_items",
                RemoteRequest::patch(
                    format!("{}/_apis/wit/workitems/{source}", self.tenant()),
                    json!([{"op": "add", "path": "/relations/-", "value": relation}]),
                ),
            )
            .await;
        self.invalidate_item(source);
        self.ctx
            .cache()
            .invalidate_prefix(&format!("work_item:{target}:"));
        let raw = raw?;

        info!(tenant = %self.tenant(), source, target, link_type, "work items linked");
        Ok(json!({
            "source": format::work_item(&raw),
            "target_id": target,
            "link_type": link_type,
        }))
    }

    /// Full-text search over one field (`Contains Words`).
    pub async fn search_work_items(
        &self,
        text: &str,
        field: Option<&str>,
        filter: &WorkItemFilter,
    ) -> TrackerResult<Value> {
        let field = validate_field_name(field.unwrap_or("System.Title"), ALLOWED_FIELD_NAMES)?;
        let text = sanitize_query_fragment(text)?;
        let state = filter.state.as_deref().map(validate_state).transpose()?;
        let work_item_type = filter
            .work_item_type
            .as_deref()
            .map(validate_work_item_type)
            .transpose()?;
        let limit = clamp_limit(filter.limit, DEFAULT_LIMIT);

        let key = digest_key(
            "search",
            &(field, &text, state, work_item_type, limit),
        );
        self.ctx
            .cached(&key, || async {
                let mut query = format!(
                    "SELECT {} FROM WorkItems WHERE [System.TeamProject] = '{}' \
                     AND [{field}] Contains Words '{text}'",
                    select_clause(MY_WORK_ITEMS_FIELDS),
                    self.project_literal()?
                );
                if let Some(work_item_type) = work_item_type {
                    query.push_str(&format!(" AND [System.WorkItemType] = '{work_item_type}'"));
                }
                if let Some(state) = state {
                    query.push_str(&format!(" AND [System.State] = '{state}'"));
                }
                query.push_str(" ORDER BY [System.ChangedDate] DESC");

                self.fetch_list("search_work_items", &query, limit, MY_WORK_ITEMS_FIELDS)
                    .await
            })
            .await
    }

    /// Items that were ever in `state` (`Was Ever`).
    pub async fn get_historical_work_items(
        &self,
        state: &str,
        work_item_type: Option<&str>,
        limit: Option<usize>,
    ) -> TrackerResult<Value> {
        let state = validate_state(state)?;
        let work_item_type = work_item_type.map(validate_work_item_type).transpose()?;
        let limit = clamp_limit(limit, DEFAULT_LIMIT);

        let key = digest_key("historical", &(state, work_item_type, limit));
        self.ctx
            .cached(&key, || async {
                let mut query = format!(
                    "SELECT {} FROM WorkItems WHERE [System.TeamProject] = '{}' \
                     AND [System.State] Was Ever '{state}'",
                    select_clause(MY_WORK_ITEMS_FIELDS),
                    self.project_literal()?
                );
                if let Some(work_item_type) = work_item_type {
                    query.push_str(&format!(" AND [System.WorkItemType] = '{work_item_type}'"));
                }
                query.push_str(" ORDER BY [System.ChangedDate] DESC");

                self.fetch_list("get_historical_work_items", &query, limit, MY_WORK_ITEMS_FIELDS)
                    .await
            })
            .await
    }

    /// The item plus everything reachable over `link_type`, as a tree.
    pub async fn get_work_item_hierarchy(
        &self,
        id: i64,
        link_type: Option<&str>,
        max_depth: Option<usize>,
    ) -> TrackerResult<Value> {
        let id = validate_work_item_id(id)?;
        let link_type = validate_link_type(link_type.unwrap_or(DEFAULT_HIERARCHY_LINK))?;
        let max_depth = max_depth
            .unwrap_or(DEFAULT_HIERARCHY_DEPTH)
            .clamp(1, MAX_HIERARCHY_DEPTH);

        let key = format!("hierarchy:{id}:{link_type}:{max_depth}");
        self.ctx
            .cached(&key, || async {
                let query = format!(
                    "SELECT [System.Id] FROM WorkItemLinks \
                     WHERE ([Source].[System.Id] = {id}) \
                     AND ([System.Links.LinkType] = '{link_type}') \
                     AND ([Target].[System.TeamProject] = '{}') \
                     MODE (Recursive)",
                    self.project_literal()?
                );
                let response =
                    run_wiql_raw(&self.ctx, "get_work_item_hierarchy", &query, None).await?;
                let edges = link_edges(&response);

                let mut ids: Vec<u64> = vec![id];
                let mut seen: HashSet<u64> = HashSet::from([id]);
                for (parent, child) in &edges {
                    for node in [parent, child].into_iter().flatten() {
                        if seen.insert(*node) {
                            ids.push(*node);
                        }
                    }
                }

                let items =
                    batch_get(&self.ctx, "get_work_item_hierarchy", &ids, DETAILED_FIELDS).await?;
                let by_id: HashMap<u64, Value> = items
                    .iter()
                    .filter_map(|raw| Some((raw.get("id")?.as_u64()?, format::work_item(raw))))
                    .collect();

                let mut path = HashSet::from([id]);
                let children = build_tree(&edges, &by_id, id, max_depth, &mut path);
                Ok(json!({
                    "root": by_id.get(&id).cloned().unwrap_or(Value::Null),
                    "children": children,
                    "total_count": ids.len(),
                    "link_type": link_type,
                }))
            })
            .await
    }

    fn invalidate_item(&self, id: u64) {
        self.ctx
            .cache()
            .invalidate_prefix(&format!("work_item:{id}:"));
        self.invalidate_lists();
    }

    fn invalidate_lists(&self) {
        for prefix in LIST_PREFIXES {
            self.ctx.cache().invalidate_prefix(prefix);
        }
        self.sprint_cache.invalidate_prefix(SPRINT_SUMMARY_PREFIX);
    }
}

/// `(source, target)` pairs from a WorkItemLinks response. The root row has
/// no source.
fn link_edges(response: &Value) -> Vec<(Option<u64>, Option<u64>)> {
    response
        .get("workItemRelations")
        .and_then(Value::as_array)
        .map(|relations| {
            relations
                .iter()
                .map(|r| {
                    let id = |side: &str| r.get(side).and_then(|s| s.get("id")).and_then(Value::as_u64);
                    (id("source"), id("target"))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn build_tree(
    edges: &[(Option<u64>, Option<u64>)],
    items: &HashMap<u64, Value>,
    root: u64,
    depth_left: usize,
    path: &mut HashSet<u64>,
) -> Vec<Value> {
    if depth_left == 0 {
        return Vec::new();
    }
    let mut children = Vec::new();
    for (source, target) in edges {
        let (Some(source), Some(child)) = (source, target) else {
            continue;
        };
        if *source != root || path.contains(child) {
            continue;
        }
        let Some(item) = items.get(child) else {
            continue;
        };
        path.insert(*child);
        let mut node = item.clone();
        node["children"] = Value::Array(build_tree(edges, items, *child, depth_left - 1, path));
        path.remove(child);
        children.push(node);
    }
    children
}
