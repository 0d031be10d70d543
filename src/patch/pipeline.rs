//! Download, unpack and announce one patch version

use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use tracing::{debug, info, warn};

use crate::activity::ActivityLog;
use crate::catalog::client::Catalog;
use crate::catalog::types::PatchDescriptor;
use crate::config::{self, EXTRACTED_DIR_NAME, INSTRUCTIONS_FILE_NAME, PAYLOAD_FILE_NAME};
use crate::patch::archive;
use crate::patch::error::PipelineError;
use crate::patch::notice;
use crate::patch::retention::{RetentionManager, RetentionReport};

/// Filesystem locations of a staged patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPatch {
    pub version_dir: PathBuf,
    pub payload_path: PathBuf,
    pub extract_dir: PathBuf,
    pub instructions_path: PathBuf,
}

/// Trait for turning a patch descriptor into an installable folder
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait PatchPipeline: Send + Sync {
    /// Stage `patch` for `target` (a product name or "Agent")
    ///
    /// Records nothing about the new version; the caller does that once
    /// this returns successfully.
    async fn stage(
        &self,
        target: &str,
        patch: &PatchDescriptor,
    ) -> Result<StagedPatch, PipelineError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub agent_id: String,
    pub download_base_path: PathBuf,
    pub notification_dir: PathBuf,
    pub keep_count: usize,
}

/// Stages patches under `{download_base}/{agentId}/{target}/{version}/`
pub struct StagingPipeline {
    settings: PipelineSettings,
    catalog: Arc<dyn Catalog>,
    retention: Arc<dyn RetentionManager>,
    activity: ActivityLog,
}

impl StagingPipeline {
    pub fn new(
        settings: PipelineSettings,
        catalog: Arc<dyn Catalog>,
        retention: Arc<dyn RetentionManager>,
        activity: ActivityLog,
    ) -> Self {
        Self {
            settings,
            catalog,
            retention,
            activity,
        }
    }

    pub fn target_dir(&self, target: &str) -> PathBuf {
        self.settings
            .download_base_path
            .join(&self.settings.agent_id)
            .join(target)
    }

    async fn trim_history(&self, target_dir: &Path) -> RetentionReport {
        let retention = Arc::clone(&self.retention);
        let dir = target_dir.to_path_buf();
        let keep = self.settings.keep_count;

        tokio::task::spawn_blocking(move || retention.enforce(&dir, keep))
            .await
            .unwrap_or_else(|e| {
                warn!("Retention task for {:?} failed: {}", target_dir, e);
                RetentionReport::default()
            })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
        let payload = self
            .catalog
            .download_payload(url)
            .await
            .map_err(|source| PipelineError::DownloadFailed {
                url: url.to_string(),
                source,
            })?;

        if payload.is_empty() {
            return Err(PipelineError::EmptyPayload {
                url: url.to_string(),
            });
        }
        Ok(payload)
    }

    fn announce(&self, target: &str, version: &str, version_dir: &Path) {
        match notice::write_ready_notice(
            &self.settings.notification_dir,
            target,
            version,
            version_dir,
        ) {
            Ok(path) => info!("Created patch notification {:?}", path),
            Err(e) => {
                warn!(
                    "Failed to create patch notification in {:?}: {}",
                    self.settings.notification_dir, e
                );
                self.activity.warning(&format!(
                    "IMPORTANT: patch {} for {} is ready for installation",
                    version, target
                ));
                self.activity
                    .warning(&format!("Location: {}", version_dir.display()));
            }
        }
    }
}

#[async_trait::async_trait]
impl PatchPipeline for StagingPipeline {
    async fn stage(
        &self,
        target: &str,
        patch: &PatchDescriptor,
    ) -> Result<StagedPatch, PipelineError> {
        let target = safe_component(target)?;
        let version = safe_component(&patch.version)?;
        info!("Staging patch {} for {}", version, target);
        self.activity
            .info(&format!("Downloading patch {} for {}", version, target));

        let target_dir = self.target_dir(target);
        let report = self.trim_history(&target_dir).await;
        if !report.removed.is_empty() {
            self.activity.info(&format!(
                "Cleaned up {} old patch folder(s) for {}",
                report.removed.len(),
                target
            ));
        }

        let payload = self.download(&patch.download_url).await?;
        let version_dir = target_dir.join(version);
        tokio::fs::create_dir_all(&version_dir)
            .await
            .map_err(PipelineError::io(&version_dir))?;

        let payload_path = version_dir.join(PAYLOAD_FILE_NAME);
        tokio::fs::write(&payload_path, &payload)
            .await
            .map_err(PipelineError::io(&payload_path))?;
        debug!("Saved {} bytes to {:?}", payload.len(), payload_path);

        let extract_dir = version_dir.join(EXTRACTED_DIR_NAME);
        let (archive_path, dest) = (payload_path.clone(), extract_dir.clone());
        let entries =
            tokio::task::spawn_blocking(move || archive::extract_zip(&archive_path, &dest))
                .await
                .map_err(|e| PipelineError::Task(e.to_string()))??;
        info!("Extracted {} entries to {:?}", entries, extract_dir);

        let instructions_path =
            notice::write_instructions(&version_dir, target, version, &extract_dir).map_err(
                |source| PipelineError::Instructions {
                    path: version_dir.join(INSTRUCTIONS_FILE_NAME),
                    source,
                },
            )?;

        self.announce(target, version, &version_dir);
        self.activity.success(&format!(
            "Patch {} for {} is ready at {}",
            version,
            target,
            version_dir.display()
        ));

        Ok(StagedPatch {
            version_dir,
            payload_path,
            extract_dir,
            instructions_path,
        })
    }
}

/// Accept `label` only if it names exactly one entry inside a directory
fn safe_component(label: &str) -> Result<&str, PipelineError> {
    if config::is_single_component(label) {
        Ok(label)
    } else {
        Err(PipelineError::UnsafePathComponent(label.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::client::MockCatalog;
    use crate::catalog::error::CatalogError;
    use crate::catalog::types::TargetType;
    use crate::patch::archive::test_support::zip_bytes;
    use crate::patch::retention::{DirectoryRetention, MockRetentionManager};
    use crate::version::comparator::PatchVersionComparator;
    use rstest::rstest;
    use tempfile::TempDir;

    const URL: &str = "https://catalog.test/patches/Editor/1.3.0.zip";

    fn descriptor(version: &str) -> PatchDescriptor {
        PatchDescriptor {
            version: version.to_string(),
            description: None,
            download_url: URL.to_string(),
            target_type: TargetType::Product,
            product_name: Some("Editor".to_string()),
        }
    }

    fn pipeline(temp_dir: &TempDir, catalog: MockCatalog) -> StagingPipeline {
        pipeline_with_retention(
            temp_dir,
            catalog,
            Arc::new(DirectoryRetention::new(Arc::new(PatchVersionComparator))),
        )
    }

    fn pipeline_with_retention(
        temp_dir: &TempDir,
        catalog: MockCatalog,
        retention: Arc<dyn RetentionManager>,
    ) -> StagingPipeline {
        StagingPipeline::new(
            PipelineSettings {
                agent_id: "agent-1".to_string(),
                download_base_path: temp_dir.path().join("downloads"),
                notification_dir: temp_dir.path().join("desktop"),
                keep_count: 2,
            },
            Arc::new(catalog),
            retention,
            ActivityLog::new(temp_dir.path().join("activity")),
        )
    }

    fn catalog_serving(payloads: Vec<Vec<u8>>) -> MockCatalog {
        let mut catalog = MockCatalog::new();
        let mut payloads = payloads.into_iter();
        catalog
            .expect_download_payload()
            .times(payloads.len())
            .returning(move |_| Ok(payloads.next().unwrap_or_default()));
        catalog
    }

    #[tokio::test]
    async fn stages_payload_extraction_and_instructions() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = catalog_serving(vec![zip_bytes(&[("bin/editor.exe", "v1.3.0")])]);
        let pipeline = pipeline(&temp_dir, catalog);

        let staged = pipeline.stage("Editor", &descriptor("1.3.0")).await.unwrap();

        let version_dir = temp_dir
            .path()
            .join("downloads")
            .join("agent-1")
            .join("Editor")
            .join("1.3.0");
        assert_eq!(staged.version_dir, version_dir);
        assert_eq!(staged.payload_path, version_dir.join("patch.zip"));
        assert!(staged.payload_path.is_file());
        assert_eq!(
            std::fs::read_to_string(staged.extract_dir.join("bin").join("editor.exe")).unwrap(),
            "v1.3.0"
        );
        let instructions = std::fs::read_to_string(&staged.instructions_path).unwrap();
        assert!(instructions.contains("Editor"));
        assert!(instructions.contains("1.3.0"));
        assert!(
            temp_dir
                .path()
                .join("desktop")
                .join("PATCH_READY_Editor_1.3.0.txt")
                .is_file()
        );
    }

    #[tokio::test]
    async fn empty_payload_fails_without_creating_a_version_folder() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir, catalog_serving(vec![Vec::new()]));

        let result = pipeline.stage("Editor", &descriptor("1.3.0")).await;

        assert!(matches!(result, Err(PipelineError::EmptyPayload { .. })));
        assert!(!pipeline.target_dir("Editor").join("1.3.0").exists());
    }

    #[tokio::test]
    async fn unreachable_payload_is_a_download_failure() {
        let temp_dir = TempDir::new().unwrap();
        let mut catalog = MockCatalog::new();
        catalog
            .expect_download_payload()
            .returning(|url| Err(CatalogError::NotFound(url.to_string())));
        let pipeline = pipeline(&temp_dir, catalog);

        let result = pipeline.stage("Editor", &descriptor("1.3.0")).await;

        assert!(matches!(
            result,
            Err(PipelineError::DownloadFailed { ref url, .. }) if url == URL
        ));
    }

    #[tokio::test]
    async fn corrupt_payload_is_an_extraction_failure() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir, catalog_serving(vec![b"not a zip".to_vec()]));

        let result = pipeline.stage("Editor", &descriptor("1.3.0")).await;

        assert!(matches!(result, Err(PipelineError::Extract { .. })));
    }

    #[tokio::test]
    async fn restaging_a_version_replaces_the_extracted_tree() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = catalog_serving(vec![
            zip_bytes(&[("first.txt", "1")]),
            zip_bytes(&[("second.txt", "2")]),
        ]);
        let pipeline = pipeline(&temp_dir, catalog);

        pipeline.stage("Editor", &descriptor("1.3.0")).await.unwrap();
        let staged = pipeline.stage("Editor", &descriptor("1.3.0")).await.unwrap();

        assert!(!staged.extract_dir.join("first.txt").exists());
        assert!(staged.extract_dir.join("second.txt").is_file());
    }

    #[tokio::test]
    async fn trims_history_before_adding_the_new_version() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(
            &temp_dir,
            catalog_serving(vec![zip_bytes(&[("a.txt", "a")])]),
        );
        let target_dir = pipeline.target_dir("Editor");
        for version in ["1.0.0", "1.1.0", "1.2.0"] {
            std::fs::create_dir_all(target_dir.join(version)).unwrap();
        }

        pipeline.stage("Editor", &descriptor("1.3.0")).await.unwrap();

        let mut remaining: Vec<String> = std::fs::read_dir(&target_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        remaining.sort();
        assert_eq!(remaining, vec!["1.1.0", "1.2.0", "1.3.0"]);
    }

    #[tokio::test]
    async fn retention_runs_on_the_target_folder_with_the_configured_limit() {
        let temp_dir = TempDir::new().unwrap();
        let expected_dir = temp_dir
            .path()
            .join("downloads")
            .join("agent-1")
            .join("Editor");
        let mut retention = MockRetentionManager::new();
        retention
            .expect_enforce()
            .withf(move |dir, keep| dir == expected_dir.as_path() && *keep == 2)
            .times(1)
            .returning(|dir, _| RetentionReport {
                removed: vec![dir.join("1.0.0")],
                ..Default::default()
            });
        let pipeline = pipeline_with_retention(
            &temp_dir,
            catalog_serving(vec![zip_bytes(&[("a.txt", "a")])]),
            Arc::new(retention),
        );

        let result = pipeline.stage("Editor", &descriptor("1.3.0")).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn instructions_failure_fails_the_pipeline() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(
            &temp_dir,
            catalog_serving(vec![zip_bytes(&[("a.txt", "a")])]),
        );
        let version_dir = pipeline.target_dir("Editor").join("1.3.0");
        // a folder where the instructions file belongs
        std::fs::create_dir_all(version_dir.join("INSTALL_INSTRUCTIONS.txt")).unwrap();

        let result = pipeline.stage("Editor", &descriptor("1.3.0")).await;

        assert!(matches!(
            result,
            Err(PipelineError::Instructions { ref path, .. })
                if *path == version_dir.join("INSTALL_INSTRUCTIONS.txt")
        ));
        assert!(
            !temp_dir
                .path()
                .join("desktop")
                .join("PATCH_READY_Editor_1.3.0.txt")
                .exists()
        );
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_the_pipeline() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("desktop"), "not a directory").unwrap();
        let pipeline = pipeline(
            &temp_dir,
            catalog_serving(vec![zip_bytes(&[("a.txt", "a")])]),
        );

        let result = pipeline.stage("Editor", &descriptor("1.3.0")).await;

        assert!(result.is_ok());
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("../1.3.0")]
    #[case("1.3.0/extra")]
    #[case("/etc")]
    #[case("1.3.0\\..")]
    #[tokio::test]
    async fn rejects_unsafe_version_labels(#[case] version: &str) {
        let temp_dir = TempDir::new().unwrap();
        let mut catalog = MockCatalog::new();
        catalog.expect_download_payload().never();
        let pipeline = pipeline(&temp_dir, catalog);

        let result = pipeline.stage("Editor", &descriptor(version)).await;

        assert!(matches!(result, Err(PipelineError::UnsafePathComponent(_))));
    }

    #[test]
    fn accepts_plain_labels() {
        assert_eq!(safe_component("Patch-v1.3.0").unwrap(), "Patch-v1.3.0");
        assert_eq!(safe_component("Agent").unwrap(), "Agent");
    }
}
