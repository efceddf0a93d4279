//! Shape raw tracker payloads into the flat JSON objects tools return.

use serde::Serialize;
use serde_json::{Map, Value, json};

fn field(fields: &Map<String, Value>, name: &str) -> Value {
    fields.get(name).cloned().unwrap_or(Value::Null)
}

/// Identity fields arrive as `{displayName, uniqueName, ...}` objects or as
/// plain strings.
pub fn identity(value: Option<&Value>) -> Value {
    match value {
        Some(Value::Object(identity)) => identity
            .get("displayName")
            .filter(|v| v.as_str().is_some_and(|s| !s.is_empty()))
            .or_else(|| identity.get("uniqueName"))
            .cloned()
            .unwrap_or(Value::Null),
        Some(Value::String(s)) if !s.is_empty() => Value::from(s.as_str()),
        _ => Value::Null,
    }
}

pub fn work_item(raw: &Value) -> Value {
    let empty = Map::new();
    let fields = raw
        .get("fields")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    json!({
        "id": raw.get("id").cloned().unwrap_or(Value::Null),
        "rev": raw.get("rev").cloned().unwrap_or(Value::Null),
        "title": field(fields, "System.Title"),
        "state": field(fields, "System.State"),
        "work_item_type": field(fields, "System.WorkItemType"),
        "assigned_to": identity(fields.get("System.AssignedTo")),
        "created_date": field(fields, "System.CreatedDate"),
        "changed_date": field(fields, "System.ChangedDate"),
        "iteration_path": field(fields, "System.IterationPath"),
        "area_path": field(fields, "System.AreaPath"),
        "priority": field(fields, "Microsoft.VSTS.Common.Priority"),
        "remaining_work": field(fields, "Microsoft.VSTS.Scheduling.RemainingWork"),
        "description": field(fields, "System.Description"),
        "reason": field(fields, "System.Reason"),
        "url": raw.get("url").cloned().unwrap_or(Value::Null),
    })
}

pub fn comment(raw: &Value) -> Value {
    json!({
        "id": raw.get("id").cloned().unwrap_or(Value::Null),
        "text": raw.get("text").cloned().unwrap_or(Value::Null),
        "created_date": raw.get("createdDate").cloned().unwrap_or(Value::Null),
        "created_by": identity(raw.get("createdBy")),
    })
}

pub fn iteration(raw: &Value) -> Value {
    let attributes = raw.get("attributes");
    let attribute = |name: &str| {
        attributes
            .and_then(|a| a.get(name))
            .cloned()
            .unwrap_or(Value::Null)
    };
    json!({
        "id": raw.get("id").cloned().unwrap_or(Value::Null),
        "name": raw.get("name").cloned().unwrap_or(Value::Null),
        "path": raw.get("path").cloned().unwrap_or(Value::Null),
        "start_date": attribute("startDate"),
        "finish_date": attribute("finishDate"),
        "time_frame": attribute("timeFrame"),
    })
}

/// Progress counts for a set of formatted work items.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SprintProgress {
    pub total_items: usize,
    pub completed_items: usize,
    pub in_progress_items: usize,
    pub not_started_items: usize,
    pub completion_percentage: f64,
}

impl SprintProgress {
    pub fn from_items(items: &[Value], completed: &[&str], in_progress: &[&str]) -> Self {
        let state_in = |item: &Value, states: &[&str]| {
            item.get("state")
                .and_then(Value::as_str)
                .is_some_and(|s| states.contains(&s))
        };
        let total_items = items.len();
        let completed_items = items.iter().filter(|i| state_in(i, completed)).count();
        let in_progress_items = items.iter().filter(|i| state_in(i, in_progress)).count();
        let completion_percentage = if total_items == 0 {
            0.0
        } else {
            completed_items as f64 / total_items as f64 * 100.0
        };
        Self {
            total_items,
            completed_items,
            in_progress_items,
            not_started_items: total_items - completed_items - in_progress_items,
            completion_percentage,
        }
    }
}
