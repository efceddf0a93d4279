//! Team iterations and sprint progress for one tenant.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::debug;

use super::TenantContext;
use super::format::{self, SprintProgress};
use super::queries::{MY_WORK_ITEMS_FIELDS, SPRINT_LIMIT, batch_get, clamp_limit, run_wiql};
use crate::error::TrackerResult;
use crate::remote::RemoteRequest;
use crate::validation::whitelist::{COMPLETED_STATES, IN_PROGRESS_STATES};
use crate::validation::{
    ValidationError, sanitize_query_fragment, validate_enum, validate_iteration_path,
    validate_team_name,
};

const TIMEFRAMES: &[&str] = &["past", "current", "future"];

#[derive(Debug)]
pub struct SprintService {
    ctx: TenantContext,
}

impl SprintService {
    pub fn new(ctx: TenantContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &TenantContext {
        &self.ctx
    }

    pub fn tenant(&self) -> &str {
        self.ctx.tenant()
    }

    pub async fn list_teams(&self) -> TrackerResult<Vec<String>> {
        let teams = self
            .ctx
            .cached("teams", || async {
                let response = self
                    .ctx
                    .call(
                        "list_teams",
                        RemoteRequest::get(format!("_apis/projects/{}/teams", self.tenant())),
                    )
                    .await?;
                let names: Vec<Value> = response
                    .get("value")
                    .and_then(Value::as_array)
                    .map(|teams| teams.iter().filter_map(|t| t.get("name").cloned()).collect())
                    .unwrap_or_default();
                Ok(Value::Array(names))
            })
            .await?;

        Ok(teams
            .as_array()
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| n.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// The given team, or the project's first team.
    async fn resolve_team(&self, team: Option<&str>) -> TrackerResult<String> {
        if let Some(team) = team {
            return Ok(validate_team_name(team)?.to_string());
        }
        let teams = self.list_teams().await?;
        let first = teams.into_iter().next().ok_or_else(|| ValidationError::Missing {
            field: "team".to_string(),
            hint: format!("Project '{}' has no teams; pass a team name", self.tenant()),
        })?;
        debug!(tenant = %self.tenant(), team = %first, "defaulting to first team");
        Ok(first)
    }

    pub async fn get_team_iterations(
        &self,
        team: Option<&str>,
        timeframe: Option<&str>,
    ) -> TrackerResult<Value> {
        let timeframe = timeframe
            .map(|t| validate_enum("timeframe", t, TIMEFRAMES))
            .transpose()?;
        let team = self.resolve_team(team).await?;

        let key = format!("iterations:{team}:{}", timeframe.unwrap_or("*"));
        let iterations = self
            .ctx
            .cached(&key, || async {
                let mut request = RemoteRequest::get(format!(
                    "{}/{team}/_apis/work/teamsettings/iterations",
                    self.tenant()
                ));
                if let Some(timeframe) = timeframe {
                    request = request.query("$timeframe", timeframe);
                }
                let response = self.ctx.call("get_team_iterations", request).await?;
                let iterations = response
                    .get("value")
                    .and_then(Value::as_array)
                    .map(|items| items.iter().map(format::iteration).collect())
                    .unwrap_or_default();
                Ok(Value::Array(iterations))
            })
            .await?;

        Ok(json!({ "team": team, "iterations": iterations }))
    }

    /// The team's current iteration with progress, or `null` when no
    /// iteration is current.
    pub async fn get_current_sprint(&self, team: Option<&str>) -> TrackerResult<Value> {
        let result = self.get_team_iterations(team, Some("current")).await?;
        let Some(sprint) = result["iterations"]
            .as_array()
            .and_then(|iterations| iterations.first())
            .cloned()
        else {
            return Ok(Value::Null);
        };
        let Some(path) = sprint["path"].as_str() else {
            return Ok(Value::Null);
        };

        let summary = self.get_sprint_work_items(path, None).await?;
        let days_remaining = sprint["finish_date"]
            .as_str()
            .and_then(|finish| days_remaining(finish, Utc::now()));

        let mut current = json!({
            "id": sprint["id"],
            "name": sprint["name"],
            "path": path,
            "team": result["team"],
            "start_date": sprint["start_date"],
            "end_date": sprint["finish_date"],
        });
        if let Some(days) = days_remaining {
            current["days_remaining"] = Value::from(days);
        }
        for key in [
            "total_items",
            "completed_items",
            "in_progress_items",
            "not_started_items",
            "completion_percentage",
        ] {
            current[key] = summary[key].clone();
        }
        Ok(current)
    }

    /// Work items in one iteration plus completion counts.
    pub async fn get_sprint_work_items(
        &self,
        iteration_path: &str,
        limit: Option<usize>,
    ) -> TrackerResult<Value> {
        let path = validate_iteration_path(iteration_path, self.tenant())?;
        let limit = clamp_limit(limit, SPRINT_LIMIT);

        let key = format!("sprint_work_items:{path}:{limit}");
        self.ctx
            .cached(&key, || async {
                let query = format!(
                    "SELECT [System.Id], [System.Title], [System.State], [System.WorkItemType] \
                     FROM WorkItems WHERE [System.IterationPath] = '{}' \
                     AND [System.TeamProject] = '{}' ORDER BY [System.CreatedDate] DESC",
                    sanitize_query_fragment(&path)?,
                    sanitize_query_fragment(self.tenant())?
                );
                let mut ids = run_wiql(&self.ctx, "get_sprint_work_items", &query, limit).await?;
                ids.truncate(limit);

                let items: Vec<Value> = if ids.is_empty() {
                    Vec::new()
                } else {
                    batch_get(&self.ctx, "get_sprint_work_items", &ids, MY_WORK_ITEMS_FIELDS)
                        .await?
                        .iter()
                        .map(format::work_item)
                        .collect()
                };

                let progress =
                    SprintProgress::from_items(&items, COMPLETED_STATES, IN_PROGRESS_STATES);
                let mut summary = serde_json::to_value(progress).unwrap_or_else(|_| json!({}));
                summary["sprint_name"] = Value::from(sprint_name(&path));
                summary["iteration_path"] = Value::from(path.as_str());
                summary["work_items"] = Value::Array(items);
                Ok(summary)
            })
            .await
    }
}

/// Last segment of an iteration path.
fn sprint_name(path: &str) -> &str {
    path.rsplit('\\').next().unwrap_or(path)
}

/// Whole days until `finish`, only while it lies in the future.
fn days_remaining(finish: &str, now: DateTime<Utc>) -> Option<i64> {
    let finish = DateTime::parse_from_rfc3339(finish).ok()?.with_timezone(&Utc);
    (finish > now).then(|| (finish - now).num_days())
}
