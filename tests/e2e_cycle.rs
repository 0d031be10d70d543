//! Full patch cycle against an HTTP catalog

mod helper;

use mockito::{Matcher, Server};
use serde_json::json;
use tokio::sync::watch;

use helper::{
    AGENT_ID, TestAgent, mock_latest_patch, mock_no_agent_patch, mock_products, zip_bytes,
};
use patch_agent::agent::{CycleRunner, UpdateOutcome};
use patch_agent::version::store::LocalVersionStore;

#[tokio::test]
async fn stages_newer_patch_and_reports_it() {
    let mut server = Server::new_async().await;
    let url = server.url();
    let agent = TestAgent::new(&server);
    agent.store.write(AGENT_ID, "Editor", "1.2.0").unwrap();

    // 1. Catalog state: Editor 1.2.0 with 1.3.0 published
    mock_no_agent_patch(&mut server).await;
    mock_products(
        &mut server,
        json!([{ "agentId": AGENT_ID, "monitoredProduct": "Editor", "currentVersion": "1.2.0" }]),
    )
    .await;
    mock_latest_patch(
        &mut server,
        "Editor",
        json!({
            "version": "1.3.0",
            "description": "Fixes",
            "downloadUrl": format!("{}/files/editor-1.3.0.zip", url),
            "targetType": "Product"
        }),
    )
    .await;
    let download = server
        .mock("GET", "/files/editor-1.3.0.zip")
        .with_status(200)
        .with_body(zip_bytes(&[("bin/editor.exe", "new build")]))
        .create_async()
        .await;
    let push = server
        .mock("PUT", "/api/AgentMonitoredProducts/updateVersion")
        .match_body(Matcher::Json(json!({
            "agentId": AGENT_ID,
            "monitoredProduct": "Editor",
            "currentVersion": "1.3.0"
        })))
        .with_status(200)
        .create_async()
        .await;
    let applied = server
        .mock("POST", "/api/status/report")
        .match_body(Matcher::PartialJson(json!({
            "productName": "Editor",
            "patchVersion": "1.3.0",
            "targetType": "Product",
            "status": "Applied"
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    // 2. Run one cycle
    let (_stop, shutdown) = watch::channel(false);
    let report = agent.orchestrator.run_cycle(&shutdown).await;

    // 3. Everything landed where the operator expects it
    download.assert_async().await;
    push.assert_async().await;
    applied.assert_async().await;
    assert_eq!(report.agent, UpdateOutcome::UpToDate);
    assert_eq!(report.applied(), 1);
    assert_eq!(agent.store.read(AGENT_ID, "Editor"), "1.3.0");

    let version_dir = agent.version_dir("Editor", "1.3.0");
    assert!(version_dir.join("patch.zip").is_file());
    assert_eq!(
        std::fs::read_to_string(version_dir.join("extracted/bin/editor.exe")).unwrap(),
        "new build"
    );
    assert!(version_dir.join("INSTALL_INSTRUCTIONS.txt").is_file());
    assert!(
        agent
            .notification_dir()
            .join("PATCH_READY_Editor_1.3.0.txt")
            .is_file()
    );

    let activity = agent.finish_activity_log();
    assert!(activity.contains("Update available for Editor: 1.2.0 -> 1.3.0"));
    assert!(activity.contains("Applied patch 1.3.0 for Editor"));
}

#[tokio::test]
async fn empty_download_reports_failure_and_keeps_local_version() {
    let mut server = Server::new_async().await;
    let url = server.url();
    let agent = TestAgent::new(&server);
    agent.store.write(AGENT_ID, "Editor", "1.2.0").unwrap();

    mock_no_agent_patch(&mut server).await;
    mock_products(
        &mut server,
        json!([{ "agentId": AGENT_ID, "monitoredProduct": "Editor", "currentVersion": "1.2.0" }]),
    )
    .await;
    mock_latest_patch(
        &mut server,
        "Editor",
        json!({
            "version": "1.3.0",
            "downloadUrl": format!("{}/files/empty.zip", url),
            "targetType": "Product"
        }),
    )
    .await;
    server
        .mock("GET", "/files/empty.zip")
        .with_status(200)
        .create_async()
        .await;
    let push = server
        .mock("PUT", "/api/AgentMonitoredProducts/updateVersion")
        .expect(0)
        .create_async()
        .await;
    let failed = server
        .mock("POST", "/api/status/report")
        .match_body(Matcher::PartialJson(json!({
            "productName": "Editor",
            "patchVersion": "1.3.0",
            "status": "Failed"
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let (_stop, shutdown) = watch::channel(false);
    let report = agent.orchestrator.run_cycle(&shutdown).await;

    push.assert_async().await;
    failed.assert_async().await;
    assert_eq!(report.failed(), 1);
    assert_eq!(agent.store.read(AGENT_ID, "Editor"), "1.2.0");
    assert!(!agent.version_dir("Editor", "1.3.0").exists());
}

#[tokio::test]
async fn unreachable_product_list_ends_the_cycle_quietly() {
    let mut server = Server::new_async().await;
    let agent = TestAgent::new(&server);

    mock_no_agent_patch(&mut server).await;
    server
        .mock("GET", "/api/AgentMonitoredProducts")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;
    let reports = server
        .mock("POST", "/api/status/report")
        .expect(0)
        .create_async()
        .await;

    let (_stop, shutdown) = watch::channel(false);
    let report = agent.orchestrator.run_cycle(&shutdown).await;

    reports.assert_async().await;
    assert!(report.listing_error.is_some());
}
