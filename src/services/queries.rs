//! WIQL construction and bulk work item retrieval.

use serde_json::{Value, json};

use super::TenantContext;
use crate::error::{TrackerError, TrackerResult};
use crate::remote::RemoteRequest;
use crate::validation::{ValidationError, validate_wiql};

pub const DEFAULT_LIMIT: usize = 100;
pub const SPRINT_LIMIT: usize = 500;
/// Largest result set the tracker returns for one query.
pub const MAX_LIMIT: usize = 20_000;
/// Largest id list accepted by one batch request.
pub const BATCH_SIZE: usize = 200;

pub const MY_WORK_ITEMS_FIELDS: &[&str] = &[
    "System.Id",
    "System.Title",
    "System.State",
    "System.WorkItemType",
    "System.AssignedTo",
    "System.IterationPath",
    "Microsoft.VSTS.Common.Priority",
    "System.ChangedDate",
    "Microsoft.VSTS.Scheduling.RemainingWork",
];

pub const DETAILED_FIELDS: &[&str] = &[
    "System.Id",
    "System.Title",
    "System.State",
    "System.WorkItemType",
    "System.AssignedTo",
    "System.Rev",
    "System.CreatedDate",
    "System.CreatedBy",
    "System.ChangedDate",
    "System.ChangedBy",
    "System.Reason",
    "System.AreaPath",
    "System.IterationPath",
    "System.Tags",
    "System.Description",
    "Microsoft.VSTS.Common.Priority",
    "Microsoft.VSTS.Scheduling.RemainingWork",
    "Microsoft.VSTS.Scheduling.StoryPoints",
    "System.CommentCount",
    "System.RelatedLinkCount",
    "System.AttachedFileCount",
];

/// `[A], [B], ...` for a WIQL SELECT clause.
pub fn select_clause(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|f| format!("[{f}]"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Limits outside `1..=MAX_LIMIT` are clamped.
pub fn clamp_limit(limit: Option<usize>, default: usize) -> usize {
    limit.unwrap_or(default).clamp(1, MAX_LIMIT)
}

/// Work item ids matched by a WIQL query.
pub async fn run_wiql(
    ctx: &TenantContext,
    operation: &str,
    query: &str,
    top: usize,
) -> TrackerResult<Vec<u64>> {
    let response = run_wiql_raw(ctx, operation, query, Some(top)).await?;
    Ok(response
        .get("workItems")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|i| i.get("id")?.as_u64()).collect())
        .unwrap_or_default())
}

/// The raw WIQL response, for link queries that return `workItemRelations`.
pub async fn run_wiql_raw(
    ctx: &TenantContext,
    operation: &str,
    query: &str,
    top: Option<usize>,
) -> TrackerResult<Value> {
    let query = validate_wiql(query)?;
    let mut request = RemoteRequest::post(
        format!("{}/_apis/wit/wiql", ctx.tenant()),
        json!({ "query": query }),
    );
    if let Some(top) = top {
        request = request.query("$top", top);
    }
    ctx.call(operation, request).await
}

/// Fetch `fields` of the work items `ids`, in request order, `BATCH_SIZE`
/// at a time.
pub async fn batch_get(
    ctx: &TenantContext,
    operation: &str,
    ids: &[u64],
    fields: &[&str],
) -> TrackerResult<Vec<Value>> {
    if ids.len() > MAX_LIMIT {
        return Err(ValidationError::OutOfRange {
            field: "result count".to_string(),
            value: ids.len() as f64,
            min: 0.0,
            max: MAX_LIMIT as f64,
        }
        .into());
    }

    let mut items = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(BATCH_SIZE) {
        let body = json!({ "ids": chunk, "fields": fields });
        let response = ctx
            .call(
                operation,
                RemoteRequest::post(format!("{}/_apis/wit/workitemsbatch", ctx.tenant()), body),
            )
            .await?;
        let batch = response
            .get("value")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                TrackerError::invalid_response(operation, "batch response has no 'value' array")
            })?;
        items.extend(batch.iter().cloned());
    }
    Ok(items)
}
