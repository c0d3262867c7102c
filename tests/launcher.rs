//! Run launcher integration tests

use std::sync::Arc;

use node_federation::Error;
use node_federation::commands::{
    CommandKind, DispatchResult, REJECT_HOME_NODE_MISMATCH, is_node_window_command,
};
use node_federation::host::WindowHost;
use node_federation::launcher::{GENERIC_REJECTION, LaunchOutcome, RunKind, RunLauncher};
use node_federation::nodes::EMBEDDED_NODE_ID;

mod common;
use common::{MockLocalRunSurface, MockWindowHost, agent, team};

fn launcher_with(
    local: Arc<MockLocalRunSurface>,
    host: Option<Arc<MockWindowHost>>,
) -> RunLauncher {
    RunLauncher::new(
        None,
        local,
        host.map(|h| h as Arc<dyn WindowHost>),
    )
}

#[tokio::test]
async fn test_local_agent_opens_run_and_caches_definitions() {
    let local = Arc::new(MockLocalRunSurface::with(
        RunKind::Agent,
        &[("a1", "Researcher"), ("a2", "Writer")],
    ));
    let host = Arc::new(MockWindowHost::accepting());
    let launcher = launcher_with(local.clone(), Some(host.clone()));

    let first = launcher
        .launch_agent(&agent(EMBEDDED_NODE_ID, "a1", "Researcher"))
        .await
        .unwrap();
    let second = launcher
        .launch_agent(&agent(EMBEDDED_NODE_ID, "a2", "Writer"))
        .await
        .unwrap();

    assert_eq!(
        first,
        LaunchOutcome::Local {
            definition_id: "a1".to_string()
        }
    );
    assert!(matches!(second, LaunchOutcome::Local { .. }));
    assert_eq!(local.fetch_count(), 1);
    assert_eq!(
        *local.opened.lock().unwrap(),
        vec![
            (RunKind::Agent, "a1".to_string()),
            (RunKind::Agent, "a2".to_string())
        ]
    );
    assert!(host.dispatched.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_stale_local_definition_is_unavailable() {
    let local = Arc::new(MockLocalRunSurface::with(RunKind::Team, &[("t1", "Crew")]));
    let launcher = launcher_with(local.clone(), None);

    let err = launcher
        .launch_team(&team(EMBEDDED_NODE_ID, "gone", "Old Crew"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::DefinitionUnavailable(ref id) if id == "gone"));
    assert!(local.opened.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalidate_refetches_local_definitions() {
    let local = Arc::new(MockLocalRunSurface::with(RunKind::Agent, &[("a1", "Researcher")]));
    let launcher = launcher_with(local.clone(), None);
    let researcher = agent(EMBEDDED_NODE_ID, "a1", "Researcher");

    launcher.launch_agent(&researcher).await.unwrap();
    launcher.invalidate_local_definitions().await;
    launcher.launch_agent(&researcher).await.unwrap();

    assert_eq!(local.fetch_count(), 2);
}

#[tokio::test]
async fn test_remote_agent_is_handed_off() {
    let local = Arc::new(MockLocalRunSurface::default());
    let host = Arc::new(MockWindowHost::accepting());
    let launcher = launcher_with(local.clone(), Some(host.clone()));

    let outcome = launcher
        .launch_agent(&agent("node-a", "a9", "Remote Researcher"))
        .await
        .unwrap();

    let LaunchOutcome::Remote {
        command_id,
        window_id,
        window_created,
        delivered,
        queued,
    } = outcome
    else {
        panic!("expected a remote launch");
    };
    assert_eq!(window_id.as_deref(), Some("window-remote"));
    assert!(window_created);
    assert!(delivered);
    assert!(!queued);

    assert_eq!(*host.ensured.lock().unwrap(), ["node-a"]);
    let dispatched = host.dispatched.lock().unwrap();
    let (node_id, command) = &dispatched[0];
    assert_eq!(node_id, "node-a");
    assert_eq!(command.command_id, command_id);
    assert_eq!(command.home_node_id(), "node-a");
    assert_eq!(command.source_node_id(), EMBEDDED_NODE_ID);
    assert_eq!(command.definition_id(), "a9");
    assert!(uuid::Uuid::parse_str(&command.command_id).is_ok());
    assert!(chrono::DateTime::parse_from_rfc3339(&command.issued_at_iso).is_ok());
    assert!(is_node_window_command(&serde_json::to_value(command).unwrap()));

    assert_eq!(local.fetch_count(), 0);
}

#[tokio::test]
async fn test_remote_team_command_carries_team_payload() {
    let host = Arc::new(MockWindowHost::answering(DispatchResult::queued(None)));
    let launcher = RunLauncher::new(
        Some("node-b".to_string()),
        Arc::new(MockLocalRunSurface::default()),
        Some(host.clone() as Arc<dyn WindowHost>),
    );

    let outcome = launcher
        .launch_team(&team("node-a", "t1", "Crew"))
        .await
        .unwrap();

    let LaunchOutcome::Remote {
        window_id, queued, ..
    } = outcome
    else {
        panic!("expected a remote launch");
    };
    assert!(queued);
    // falls back to the ensured window when dispatch names none
    assert_eq!(window_id.as_deref(), Some("window-remote"));

    let dispatched = host.dispatched.lock().unwrap();
    let CommandKind::StartTeamRun(payload) = &dispatched[0].1.kind else {
        panic!("expected a team command");
    };
    assert_eq!(payload.team_definition_id, "t1");
    assert_eq!(payload.team_name, "Crew");
    assert_eq!(payload.source_node_id, "node-b");
}

#[tokio::test]
async fn test_each_launch_uses_a_fresh_command_id() {
    let host = Arc::new(MockWindowHost::accepting());
    let launcher = launcher_with(Arc::new(MockLocalRunSurface::default()), Some(host.clone()));
    let remote = agent("node-a", "a1", "Researcher");

    launcher.launch_agent(&remote).await.unwrap();
    launcher.launch_agent(&remote).await.unwrap();

    let dispatched = host.dispatched.lock().unwrap();
    assert_ne!(dispatched[0].1.command_id, dispatched[1].1.command_id);
}

#[tokio::test]
async fn test_rejection_reason_is_surfaced_verbatim() {
    let host = Arc::new(MockWindowHost::answering(DispatchResult::rejected(
        REJECT_HOME_NODE_MISMATCH,
    )));
    let launcher = launcher_with(Arc::new(MockLocalRunSurface::default()), Some(host));

    let err = launcher
        .launch_agent(&agent("node-a", "a1", "Researcher"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::HandoffRejected(_)));
    assert_eq!(err.to_string(), "command-home-node-mismatch");
}

#[tokio::test]
async fn test_blank_rejection_uses_generic_message() {
    let host = Arc::new(MockWindowHost::answering(DispatchResult::rejected("  ")));
    let launcher = launcher_with(Arc::new(MockLocalRunSurface::default()), Some(host));

    let err = launcher
        .launch_agent(&agent("node-a", "a1", "Researcher"))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), GENERIC_REJECTION);
}

#[tokio::test]
async fn test_remote_without_host_is_unavailable() {
    let local = Arc::new(MockLocalRunSurface::default());
    let launcher = launcher_with(local.clone(), None);

    let err = launcher
        .launch_team(&team("node-a", "t1", "Crew"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TransportUnavailable));
    assert_eq!(local.fetch_count(), 0);
}
