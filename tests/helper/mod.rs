//! Shared setup for end-to-end cycle tests

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use mockito::{Matcher, Mock, Server};
use reqwest::Url;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

use patch_agent::activity::ActivityLog;
use patch_agent::agent::Orchestrator;
use patch_agent::catalog::{Catalog, HttpCatalog};
use patch_agent::patch::{DirectoryRetention, PipelineSettings, StagingPipeline};
use patch_agent::version::comparator::{PatchVersionComparator, VersionComparator};
use patch_agent::version::store::FileVersionStore;

pub const AGENT_ID: &str = "agent-1";

/// Temporary agent installation wired to a mockito catalog
pub struct TestAgent {
    pub temp_dir: TempDir,
    pub store: FileVersionStore,
    pub orchestrator: Orchestrator,
}

impl TestAgent {
    pub fn new(server: &Server) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let base_url = Url::parse(&format!("{}/api/", server.url())).unwrap();
        let catalog: Arc<dyn Catalog> = Arc::new(HttpCatalog::new(base_url).unwrap());
        let comparator: Arc<dyn VersionComparator> = Arc::new(PatchVersionComparator);
        let activity = ActivityLog::new(temp_dir.path().join("activity"));
        let store = FileVersionStore::new(temp_dir.path().join("patches"));

        let pipeline = StagingPipeline::new(
            PipelineSettings {
                agent_id: AGENT_ID.to_string(),
                download_base_path: store.base().to_path_buf(),
                notification_dir: temp_dir.path().join("desktop"),
                keep_count: 2,
            },
            Arc::clone(&catalog),
            Arc::new(DirectoryRetention::new(Arc::clone(&comparator))),
            activity.clone(),
        );

        let orchestrator = Orchestrator::new(
            AGENT_ID,
            catalog,
            Arc::new(store.clone()),
            comparator,
            Arc::new(pipeline),
            activity,
        );

        Self {
            temp_dir,
            store,
            orchestrator,
        }
    }

    pub fn version_dir(&self, target: &str, version: &str) -> PathBuf {
        self.store.base().join(AGENT_ID).join(target).join(version)
    }

    pub fn notification_dir(&self) -> PathBuf {
        self.temp_dir.path().join("desktop")
    }

    pub fn activity_dir(&self) -> PathBuf {
        self.temp_dir.path().join("activity")
    }

    /// Drops the agent so the activity writer drains, then returns today's
    /// activity log
    pub fn finish_activity_log(self) -> String {
        let path = self
            .activity_dir()
            .join(format!("PatchLog_{}.txt", Local::now().format("%Y-%m-%d")));
        let Self {
            temp_dir,
            orchestrator,
            ..
        } = self;
        drop(orchestrator);

        let content = std::fs::read_to_string(path).unwrap();
        drop(temp_dir);
        content
    }
}

pub fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in files {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Catalog answers "no patch" for the agent itself
pub async fn mock_no_agent_patch(server: &mut Server) -> Mock {
    server
        .mock("GET", "/api/patch/latest")
        .match_query(Matcher::UrlEncoded("product".into(), "Agent".into()))
        .with_status(204)
        .create_async()
        .await
}

pub async fn mock_products(server: &mut Server, body: serde_json::Value) -> Mock {
    server
        .mock("GET", "/api/AgentMonitoredProducts")
        .match_query(Matcher::UrlEncoded("agentId".into(), AGENT_ID.into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await
}

pub async fn mock_latest_patch(
    server: &mut Server,
    product: &str,
    body: serde_json::Value,
) -> Mock {
    server
        .mock("GET", "/api/patch/latest")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("agentId".into(), AGENT_ID.into()),
            Matcher::UrlEncoded("product".into(), product.into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .expect_at_least(1)
        .create_async()
        .await
}
