//! Tests for the markdown resources.

use rmcp::model::{ErrorCode, ReadResourceResult, ResourceContents};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::resources::{CURRENT_SPRINT_URI, ResourceUri};
use crate::mcp::McpServer;
use crate::remote::Method;
use crate::test_support::{FakeTrackerApi, batch, raw_item, test_registry, wiql_ids};

const TEAMS: &str = "_apis/projects/Alpha/teams";
const ITERATIONS: &str = "Alpha/Alpha Team/_apis/work/teamsettings/iterations";
const WIQL: &str = "Alpha/_apis/wit/wiql";
const BATCH: &str = "Alpha/_apis/wit/workitemsbatch";
const ITEM_42: &str = "Alpha/_apis/wit/workitems/42";
const COMMENTS_42: &str = "Alpha/_apis/wit/workItems/42/comments";

fn markdown(result: &ReadResourceResult) -> &str {
    match &result.contents[0] {
        ResourceContents::TextResourceContents { text, mime_type, .. } => {
            assert_eq!(mime_type.as_deref(), Some("text/markdown"));
            text.as_str()
        }
        other => panic!("expected text contents, got {other:?}"),
    }
}

fn sprint_items(api: &FakeTrackerApi) {
    api.ok(Method::Post, WIQL, wiql_ids(&[1, 2, 3])).ok(
        Method::Post,
        BATCH,
        batch(vec![
            raw_item(1, "One", "Done"),
            raw_item(2, "Two", "Active"),
            raw_item(3, "Three", "Active"),
        ]),
    );
}

#[test]
fn test_parse_resource_uris() {
    assert_eq!(ResourceUri::parse("sprint://current").unwrap(), ResourceUri::CurrentSprint);
    assert_eq!(
        ResourceUri::parse("sprint://Sprint 5").unwrap(),
        ResourceUri::Sprint("Sprint 5".to_string())
    );
    assert_eq!(ResourceUri::parse("workitem://42").unwrap(), ResourceUri::WorkItem(42));

    let err = ResourceUri::parse("workitem://abc").unwrap_err();
    assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    let err = ResourceUri::parse("sprint://").unwrap_err();
    assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    let err = ResourceUri::parse("board://1").unwrap_err();
    assert_eq!(err.code, ErrorCode::RESOURCE_NOT_FOUND);
}

#[test]
fn test_resources_and_templates_are_listed() {
    let server = McpServer::new(test_registry(FakeTrackerApi::new(), Some("Alpha")));

    let uris: Vec<String> = server.resources().iter().map(|r| r.uri.clone()).collect();
    assert_eq!(uris, vec![CURRENT_SPRINT_URI.to_string()]);

    let templates: Vec<String> = server
        .resource_templates()
        .iter()
        .map(|t| t.uri_template.clone())
        .collect();
    assert_eq!(templates, vec!["sprint://{iteration_path}", "workitem://{work_item_id}"]);
}

#[tokio::test]
async fn test_current_sprint_markdown() {
    let api = FakeTrackerApi::new();
    api.ok(Method::Get, TEAMS, json!({"value": [{"name": "Alpha Team"}]}));
    api.ok(
        Method::Get,
        ITERATIONS,
        json!({"value": [{
            "id": "it-5",
            "name": "Sprint 5",
            "path": "Alpha\\Sprint 5",
            "attributes": {"startDate": "2026-10-05T00:00:00Z", "finishDate": "2099-10-19T00:00:00Z"}
        }]}),
    );
    sprint_items(&api);
    let server = McpServer::new(test_registry(api, Some("Alpha")));

    let result = server
        .read_resource_uri(CURRENT_SPRINT_URI, CancellationToken::new())
        .await
        .unwrap();
    let text = markdown(&result);

    assert!(text.starts_with("# Current Sprint: Sprint 5\n**Project:** Alpha"));
    assert!(text.contains("**Period:** 2026-10-05T00:00:00Z to 2099-10-19T00:00:00Z"));
    assert!(text.contains("- Total Items: 3"));
    assert!(text.contains("- Completed: 1"));
    assert!(text.contains("- In Progress: 2"));
    assert!(text.contains("33.3% complete"));
}

#[tokio::test]
async fn test_current_sprint_markdown_without_sprint() {
    let api = FakeTrackerApi::new();
    api.ok(Method::Get, TEAMS, json!({"value": [{"name": "Alpha Team"}]}));
    api.ok(Method::Get, ITERATIONS, json!({"value": []}));
    let server = McpServer::new(test_registry(api, Some("Alpha")));

    let result = server
        .read_resource_uri(CURRENT_SPRINT_URI, CancellationToken::new())
        .await
        .unwrap();

    assert!(markdown(&result).contains("No current sprint found."));
}

#[tokio::test]
async fn test_sprint_markdown_groups_by_state() {
    let api = FakeTrackerApi::new();
    sprint_items(&api);
    let server = McpServer::new(test_registry(api.clone(), Some("Alpha")));

    let result = server
        .read_resource_uri("sprint://Sprint 5", CancellationToken::new())
        .await
        .unwrap();
    let text = markdown(&result);

    assert!(text.starts_with("# Sprint: Sprint 5\n"));
    assert!(text.contains("**Iteration Path:** Alpha\\Sprint 5"));
    assert!(text.contains("- Active: 2\n- Done: 1\n"));
    assert!(text.contains("## Work Items (showing 3 of 3)"));
    assert!(text.contains("- [1] One (Done)"));
    assert_eq!(api.call_count(Method::Post, WIQL), 1);
}

#[tokio::test]
async fn test_work_item_markdown_with_comments() {
    let api = FakeTrackerApi::new();
    api.ok(Method::Get, ITEM_42, raw_item(42, "Fix login", "Active"))
        .ok(
            Method::Get,
            COMMENTS_42,
            json!({"comments": [{
                "id": 7,
                "text": "Reproduced on staging",
                "createdDate": "2026-10-01T09:00:00Z",
                "createdBy": {"displayName": "Dana"}
            }]}),
        );
    let server = McpServer::new(test_registry(api, Some("Alpha")));

    let result = server
        .read_resource_uri("workitem://42", CancellationToken::new())
        .await
        .unwrap();
    let text = markdown(&result);

    assert!(text.starts_with("# [42] Fix login\n**Project:** Alpha"));
    assert!(text.contains("**Type:** Task"));
    assert!(text.contains("**State:** Active"));
    assert!(text.contains("**Assigned To:** Unassigned"));
    assert!(text.contains("No description"));
    assert!(text.contains("- [2026-10-01T09:00:00Z] Reproduced on staging"));
}

#[tokio::test]
async fn test_missing_work_item_is_not_found() {
    let api = FakeTrackerApi::new();
    api.status(Method::Get, ITEM_42, 404);
    let server = McpServer::new(test_registry(api, Some("Alpha")));

    let err = server
        .read_resource_uri("workitem://42", CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::RESOURCE_NOT_FOUND);
}

#[tokio::test]
async fn test_resources_need_default_project() {
    let api = FakeTrackerApi::new();
    let server = McpServer::new(test_registry(api.clone(), None));

    let err = server
        .read_resource_uri("workitem://42", CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    assert_eq!(api.total_calls(), 0);
}
