//! Federated catalog integration tests

use std::sync::Arc;
use std::sync::atomic::Ordering;

use serde_json::json;

use node_federation::catalog::{CatalogNodeScope, CatalogNodeStatus, FederatedCatalog};
use node_federation::nodes::{EMBEDDED_NODE_ID, NodeProfile, NodeRegistry};

mod common;
use common::{MockFederationApi, MockReadiness, agent, catalog, embedded_registry, peer, team};

async fn registry_with_peers(ids: &[(&str, &str)]) -> Arc<dyn NodeRegistry> {
    let registry = embedded_registry();
    registry.initialize().await.unwrap();
    for (id, name) in ids {
        registry.upsert_discovered_node(&peer(id, name)).await.unwrap();
    }
    Arc::new(registry)
}

fn ready_scope(id: &str, name: &str) -> CatalogNodeScope {
    CatalogNodeScope {
        node_id: id.to_string(),
        node_name: name.to_string(),
        base_url: format!("http://{id}.local:29695"),
        status: CatalogNodeStatus::Ready,
        error_message: None,
        agents: Vec::new(),
        teams: Vec::new(),
    }
}

#[tokio::test]
async fn test_not_ready_backend_sends_no_query() {
    let registry = registry_with_peers(&[]).await;
    let api = Arc::new(MockFederationApi::new());
    let catalog = catalog(registry, Arc::new(MockReadiness::new(false)), api.clone());

    let err = catalog.load_catalog().await.unwrap_err();

    assert!(err.to_string().contains("not ready"));
    assert_eq!(api.catalog_query_count(), 0);
    assert!(catalog.snapshot().await.is_none());
    assert!(catalog.last_error().await.is_some());
}

#[tokio::test]
async fn test_every_registered_node_is_queried() {
    let registry = registry_with_peers(&[("node-a", "Node A"), ("node-b", "Node B")]).await;
    let api = Arc::new(MockFederationApi::new());
    let catalog = catalog(registry, Arc::new(MockReadiness::new(true)), api.clone());

    catalog.load_catalog().await.unwrap();

    let requested: Vec<String> = api
        .last_catalog_request
        .lock()
        .unwrap()
        .iter()
        .map(|n| n.node_id.clone())
        .collect();
    assert_eq!(requested.len(), 3);
    assert!(requested.contains(&EMBEDDED_NODE_ID.to_string()));
    assert!(requested.contains(&"node-a".to_string()));
    assert!(requested.contains(&"node-b".to_string()));
}

#[tokio::test]
async fn test_embedded_scope_is_first_then_by_name() {
    let registry = registry_with_peers(&[("node-z", "alpha"), ("node-y", "Zulu")]).await;
    let api = Arc::new(MockFederationApi::new());
    api.set_scopes(vec![
        ready_scope("node-y", "Zulu"),
        ready_scope("node-z", "alpha"),
        ready_scope(EMBEDDED_NODE_ID, "Zeta Local"),
    ]);
    let catalog = catalog(registry, Arc::new(MockReadiness::new(true)), api);

    let snapshot = catalog.load_catalog().await.unwrap();

    let ids: Vec<&str> = snapshot.scopes.iter().map(|s| s.node_id.as_str()).collect();
    assert_eq!(ids, [EMBEDDED_NODE_ID, "node-z", "node-y"]);
}

#[tokio::test]
async fn test_bound_node_overrides_embedded_ordering() {
    let registry = registry_with_peers(&[("node-a", "Alpha"), ("node-b", "Bravo")]).await;
    let api = Arc::new(MockFederationApi::new());
    let catalog = FederatedCatalog::new(registry, Arc::new(MockReadiness::new(true)), api)
        .with_bound_node("node-b");

    let snapshot = catalog.load_catalog().await.unwrap();

    assert_eq!(catalog.preferred_node_id(), "node-b");
    assert_eq!(snapshot.scopes[0].node_id, "node-b");
}

#[tokio::test]
async fn test_loose_payloads_are_normalized() {
    let registry = registry_with_peers(&[("node-a", "Node A")]).await;
    let api = Arc::new(MockFederationApi::new());
    let scope: CatalogNodeScope = serde_json::from_value(json!({
        "nodeId": "node-a",
        "nodeName": null,
        "baseUrl": "http://node-a.local:29695",
        "status": "overloaded",
        "agents": [
            {
                "definitionId": "a1",
                "name": "Researcher",
                "role": null,
                "toolNames": null,
                "skillNames": ["search", 123]
            },
            { "name": "missing id" }
        ],
        "teams": [
            {
                "homeNodeId": "node-a",
                "definitionId": "t1",
                "name": "Crew",
                "memberCount": -2,
                "nestedTeamCount": "two"
            }
        ]
    }))
    .unwrap();
    api.set_scopes(vec![scope, ready_scope(EMBEDDED_NODE_ID, "Local")]);
    let catalog = catalog(registry, Arc::new(MockReadiness::new(true)), api);

    let snapshot = catalog.load_catalog().await.unwrap();
    let scope = snapshot.scope("node-a").unwrap();

    assert_eq!(scope.status, CatalogNodeStatus::Degraded);
    assert_eq!(scope.node_name, "node-a");
    assert_eq!(scope.agents.len(), 1);

    let researcher = &scope.agents[0];
    assert_eq!(researcher.home_node_id, "node-a");
    assert!(researcher.role.is_empty());
    assert!(researcher.tool_names.is_empty());
    assert_eq!(researcher.skill_names, ["search"]);

    let crew = &scope.teams[0];
    assert_eq!(crew.member_count, 0);
    assert_eq!(crew.nested_team_count, 0);
}

#[tokio::test]
async fn test_load_is_cached_and_reload_requeries() {
    let registry = registry_with_peers(&[]).await;
    let api = Arc::new(MockFederationApi::new());
    let catalog = catalog(registry, Arc::new(MockReadiness::new(true)), api.clone());

    let first = catalog.load_catalog().await.unwrap();
    let second = catalog.load_catalog().await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(api.catalog_query_count(), 1);

    let reloaded = catalog.reload_catalog().await.unwrap();
    assert!(!Arc::ptr_eq(&first, &reloaded));
    assert_eq!(api.catalog_query_count(), 2);
}

#[tokio::test]
async fn test_unanswered_node_gets_unreachable_scope() {
    let registry = registry_with_peers(&[("node-a", "Node A")]).await;
    let api = Arc::new(MockFederationApi::new());
    api.set_scopes(vec![ready_scope(EMBEDDED_NODE_ID, "Local")]);
    let catalog = catalog(registry, Arc::new(MockReadiness::new(true)), api);

    let snapshot = catalog.load_catalog().await.unwrap();
    let missing = snapshot.scope("node-a").unwrap();

    assert_eq!(snapshot.scopes.len(), 2);
    assert_eq!(missing.status, CatalogNodeStatus::Unreachable);
    assert!(missing.error_message.is_some());
    assert!(missing.agents.is_empty());
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_snapshot() {
    let registry = registry_with_peers(&[]).await;
    let api = Arc::new(MockFederationApi::new());
    let catalog = catalog(registry, Arc::new(MockReadiness::new(true)), api.clone());

    let good = catalog.load_catalog().await.unwrap();

    api.fail_catalog.store(true, Ordering::SeqCst);
    let err = catalog.reload_catalog().await.unwrap_err();

    assert!(err.to_string().contains("catalog unavailable"));
    let kept = catalog.snapshot().await.unwrap();
    assert!(Arc::ptr_eq(&good, &kept));
    assert!(catalog.last_error().await.is_some());

    api.fail_catalog.store(false, Ordering::SeqCst);
    catalog.reload_catalog().await.unwrap();
    assert!(catalog.last_error().await.is_none());
}

#[tokio::test]
async fn test_duplicates_keep_first_occurrence() {
    let registry = registry_with_peers(&[]).await;
    let api = Arc::new(MockFederationApi::new());

    let mut local = ready_scope(EMBEDDED_NODE_ID, "Local");
    local.agents = vec![
        agent(EMBEDDED_NODE_ID, "a1", "First"),
        agent(EMBEDDED_NODE_ID, "a1", "Second"),
    ];
    local.teams = vec![
        team(EMBEDDED_NODE_ID, "t1", "Crew"),
        team(EMBEDDED_NODE_ID, "t1", "Crew Again"),
    ];
    let mut repeated = ready_scope(EMBEDDED_NODE_ID, "Repeated");
    repeated.agents = vec![agent(EMBEDDED_NODE_ID, "a2", "Other")];
    api.set_scopes(vec![local, repeated]);

    let catalog = catalog(registry, Arc::new(MockReadiness::new(true)), api);
    let snapshot = catalog.load_catalog().await.unwrap();

    assert_eq!(snapshot.scopes.len(), 1);
    let scope = &snapshot.scopes[0];
    assert_eq!(scope.node_name, "Local");
    assert_eq!(scope.agents.len(), 1);
    assert_eq!(scope.agents[0].name, "First");
    assert_eq!(scope.teams.len(), 1);
    assert_eq!(scope.teams[0].name, "Crew");
}

#[tokio::test]
async fn test_lookup_across_scopes() {
    let registry = registry_with_peers(&[("node-a", "Node A")]).await;
    let api = Arc::new(MockFederationApi::new());

    let mut local = ready_scope(EMBEDDED_NODE_ID, "Local");
    local.agents = vec![agent(EMBEDDED_NODE_ID, "shared", "Local Copy")];
    let mut remote = ready_scope("node-a", "Node A");
    remote.agents = vec![agent("node-a", "shared", "Remote Copy")];
    remote.teams = vec![team("node-a", "t1", "Crew")];
    api.set_scopes(vec![remote, local]);

    let catalog = catalog(registry, Arc::new(MockReadiness::new(true)), api);
    let snapshot = catalog.load_catalog().await.unwrap();

    assert_eq!(
        snapshot.find_agent("node-a", "shared").unwrap().name,
        "Remote Copy"
    );
    assert_eq!(
        snapshot.find_agent(EMBEDDED_NODE_ID, "shared").unwrap().name,
        "Local Copy"
    );
    assert!(snapshot.find_agent("node-b", "shared").is_none());
    assert_eq!(snapshot.find_team("node-a", "t1").unwrap().name, "Crew");

    let all = snapshot.all_agents();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].node_id, EMBEDDED_NODE_ID);
    assert_eq!(all[1].node_name, "Node A");
    assert_eq!(snapshot.all_teams()[0].node_status, CatalogNodeStatus::Ready);
}

#[tokio::test]
async fn test_manual_nodes_are_part_of_catalog() {
    let registry = embedded_registry()
        .with_manual_nodes(vec![NodeProfile::manual("lab", "Lab", "http://lab:29695")]);
    let api = Arc::new(MockFederationApi::new());
    let catalog = catalog(Arc::new(registry), Arc::new(MockReadiness::new(true)), api);

    let snapshot = catalog.load_catalog().await.unwrap();

    assert!(snapshot.scope("lab").is_some());
}
