//! Tests for MCP server initialization and tool registration.

use rmcp::ServerHandler;

use super::server::McpServer;
use crate::test_support::{FakeTrackerApi, test_registry};

#[test]
fn test_server_info() {
    let server = McpServer::new(test_registry(FakeTrackerApi::new(), Some("Alpha")));

    let info = server.get_info();

    assert!(info.capabilities.tools.is_some(), "Server should support tools");
    assert!(info.capabilities.resources.is_some(), "Server should support resources");
    let instructions = info.instructions.unwrap();
    assert!(instructions.contains("project"));
    assert!(instructions.contains("workitem://{work_item_id}"));
}

#[test]
fn test_every_tool_is_registered() {
    let server = McpServer::new(test_registry(FakeTrackerApi::new(), None));

    let names = server.tool_names();

    let expected = [
        "add_comment",
        "create_work_item",
        "get_current_sprint",
        "get_historical_work_items",
        "get_my_work_items",
        "get_service_statistics",
        "get_sprint_work_items",
        "get_team_iterations",
        "get_work_item_details",
        "get_work_item_hierarchy",
        "health_check",
        "link_work_items",
        "move_to_sprint",
        "reset_project",
        "search_work_items",
        "update_work_item",
    ];
    assert_eq!(names, expected);
}

#[test]
fn test_server_shares_registry() {
    let registry = test_registry(FakeTrackerApi::new(), Some("Alpha"));
    let a = McpServer::new(registry.clone());
    let b = a.clone();

    assert!(std::sync::Arc::ptr_eq(a.registry(), b.registry()));
    assert!(std::sync::Arc::ptr_eq(a.registry(), &registry));
}
