//! One polling cycle: self-update, then every monitored product in turn

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::activity::ActivityLog;
use crate::agent::error::CycleError;
use crate::agent::report::{CycleReport, ProductReport, UpdateOutcome};
use crate::agent::scheduler::CycleRunner;
use crate::catalog::client::Catalog;
use crate::catalog::types::{MonitoredProduct, PatchDescriptor, PatchStatus, StatusEvent, TargetType};
use crate::config::{AGENT_TARGET, UNKNOWN_PATCH_LABEL, UNKNOWN_VERSION};
use crate::patch::pipeline::PatchPipeline;
use crate::version::comparator::VersionComparator;
use crate::version::semver::CompareResult;
use crate::version::store::LocalVersionStore;

/// Drives one agent's patch cycle against the catalog
///
/// Never fails as a whole: every error is logged, reported to the catalog
/// as a Failed status event where a target is involved, and recorded in
/// the returned [`CycleReport`].
pub struct Orchestrator {
    agent_id: String,
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn LocalVersionStore>,
    comparator: Arc<dyn VersionComparator>,
    pipeline: Arc<dyn PatchPipeline>,
    activity: ActivityLog,
}

impl Orchestrator {
    pub fn new(
        agent_id: impl Into<String>,
        catalog: Arc<dyn Catalog>,
        store: Arc<dyn LocalVersionStore>,
        comparator: Arc<dyn VersionComparator>,
        pipeline: Arc<dyn PatchPipeline>,
        activity: ActivityLog,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            catalog,
            store,
            comparator,
            pipeline,
            activity,
        }
    }

    async fn check_agent(&self) -> UpdateOutcome {
        info!("Checking agent version for {}", self.agent_id);
        self.activity.info("Checking agent version");

        match self.update_agent().await {
            Ok(outcome) => outcome,
            Err(e) => self.fail(AGENT_TARGET, TargetType::Agent, e).await,
        }
    }

    /// Compares against the catalog's agent record, not the local file
    async fn update_agent(&self) -> Result<UpdateOutcome, CycleError> {
        let latest = self
            .catalog
            .get_latest_patch(&self.agent_id, AGENT_TARGET)
            .await?
            .filter(|patch| patch.target_type == TargetType::Agent);
        let Some(patch) = latest else {
            info!("No agent patch published for {}", self.agent_id);
            return Ok(UpdateOutcome::UpToDate);
        };

        let recorded = self
            .catalog
            .get_agent(&self.agent_id)
            .await?
            .map(|agent| agent.current_version().to_string())
            .unwrap_or_else(|| UNKNOWN_VERSION.to_string());

        if !self
            .comparator
            .is_update_available(&recorded, &patch.version)
        {
            return Ok(self.up_to_date(AGENT_TARGET, &recorded, &patch.version));
        }

        self.activity.info(&format!(
            "New agent version available: {} -> {}",
            recorded, patch.version
        ));
        self.apply(AGENT_TARGET, TargetType::Agent, &patch).await?;
        self.activity
            .success(&format!("Agent updated to version {}", patch.version));

        Ok(UpdateOutcome::Applied {
            version: patch.version,
        })
    }

    async fn check_product(
        &self,
        product: &MonitoredProduct,
        shutdown: &watch::Receiver<bool>,
    ) -> ProductReport {
        let name = &product.product_name;
        let outcome = match self.update_product(product, shutdown).await {
            Ok(outcome) => outcome,
            Err(e) => self.fail(name, TargetType::Product, e).await,
        };

        ProductReport {
            product: name.clone(),
            outcome,
        }
    }

    async fn update_product(
        &self,
        product: &MonitoredProduct,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<UpdateOutcome, CycleError> {
        if *shutdown.borrow() {
            return Err(CycleError::Cancelled);
        }

        let name = &product.product_name;
        info!("Checking updates for product: {}", name);
        self.activity
            .info(&format!("Checking updates for product: {}", name));

        self.reconcile(product).await?;
        let local = self.store.read(&self.agent_id, name);

        let Some(patch) = self.catalog.get_latest_patch(&self.agent_id, name).await? else {
            info!("No patch published for product: {} ({})", name, local);
            self.activity.success(&format!("{} is up to date", name));
            return Ok(UpdateOutcome::UpToDate);
        };
        if !self.comparator.is_update_available(&local, &patch.version) {
            return Ok(self.up_to_date(name, &local, &patch.version));
        }

        self.activity.info(&format!(
            "Update available for {}: {} -> {}",
            name, local, patch.version
        ));
        self.apply(name, TargetType::Product, &patch).await?;
        self.activity
            .success(&format!("Applied patch {} for {}", patch.version, name));

        Ok(UpdateOutcome::Applied {
            version: patch.version,
        })
    }

    /// Logs why `latest` is not staged over `current`
    fn up_to_date(&self, target: &str, current: &str, latest: &str) -> UpdateOutcome {
        match self.comparator.compare_to_latest(current, latest) {
            CompareResult::Newer => {
                info!("{} at {} is ahead of published patch {}", target, current, latest)
            }
            CompareResult::Invalid => {
                warn!("Cannot compare {} version {} with patch {}", target, current, latest)
            }
            CompareResult::Latest | CompareResult::Outdated => {
                info!("{} is up to date at {}", target, current)
            }
        }
        self.activity.success(&format!("{} is up to date", target));
        UpdateOutcome::UpToDate
    }

    /// Make the local record and the catalog agree on the higher version
    async fn reconcile(&self, product: &MonitoredProduct) -> Result<(), CycleError> {
        let name = &product.product_name;
        let local = self.store.read(&self.agent_id, name);
        let recorded = product.current_version();
        if local == recorded {
            return Ok(());
        }

        warn!(
            "Version mismatch for {}. Local: {}, catalog: {}",
            name, local, recorded
        );
        self.activity.warning(&format!(
            "Version mismatch for {}. Local: {}, catalog: {}",
            name, local, recorded
        ));

        let resolved = self.comparator.higher_of(&local, recorded);
        self.store.write(&self.agent_id, name, &resolved)?;
        let _ = self
            .catalog
            .update_product_version(&self.agent_id, name, &resolved)
            .await
            .inspect_err(|e| warn!("Failed to push {} version {} to catalog: {}", name, resolved, e));

        self.activity
            .success(&format!("Synced {} version to {}", name, resolved));
        Ok(())
    }

    /// Stage the patch, then record and announce the new version
    async fn apply(
        &self,
        target: &str,
        target_type: TargetType,
        patch: &PatchDescriptor,
    ) -> Result<(), CycleError> {
        let staged = self.pipeline.stage(target, patch).await?;
        self.store.write(&self.agent_id, target, &patch.version)?;

        let pushed = match target_type {
            TargetType::Agent => {
                self.catalog
                    .update_agent_version(&self.agent_id, &patch.version)
                    .await
            }
            TargetType::Product => {
                self.catalog
                    .update_product_version(&self.agent_id, target, &patch.version)
                    .await
            }
        };
        if let Err(e) = pushed {
            warn!(
                "Failed to push {} version {} to catalog: {}",
                target, patch.version, e
            );
        }

        self.report(StatusEvent::new(
            &self.agent_id,
            target,
            &patch.version,
            target_type,
            PatchStatus::Applied,
        ))
        .await;

        info!(
            "Successfully applied patch {} for {} at {:?}",
            patch.version, target, staged.version_dir
        );
        Ok(())
    }

    async fn fail(&self, target: &str, target_type: TargetType, err: CycleError) -> UpdateOutcome {
        if err.is_cancellation() {
            warn!("Update of {} interrupted by shutdown", target);
        } else {
            error!("Failed to update {}: {}", target, err);
        }
        self.activity
            .error(&format!("Error updating {}: {}", target, err));

        let reported_version = self
            .catalog
            .get_latest_patch(&self.agent_id, target)
            .await
            .inspect_err(|e| warn!("Failed to fetch patch label for {}: {}", target, e))
            .ok()
            .flatten()
            .map(|patch| patch.version)
            .unwrap_or_else(|| UNKNOWN_PATCH_LABEL.to_string());

        self.report(StatusEvent::new(
            &self.agent_id,
            target,
            &reported_version,
            target_type,
            PatchStatus::Failed,
        ))
        .await;

        UpdateOutcome::Failed {
            reported_version,
            error: err.to_string(),
            cancelled: err.is_cancellation(),
        }
    }

    async fn report(&self, event: StatusEvent) {
        let _ = self.catalog.report_status(&event).await.inspect_err(|e| {
            warn!(
                "Failed to report {:?} status for {} {}: {}",
                event.status, event.product_name, event.patch_version, e
            )
        });
    }
}

#[async_trait::async_trait]
impl CycleRunner for Orchestrator {
    async fn run_cycle(&self, shutdown: &watch::Receiver<bool>) -> CycleReport {
        let agent = self.check_agent().await;

        let products = match self.catalog.list_monitored_products(&self.agent_id).await {
            Ok(products) => products,
            Err(e) => {
                error!("Failed to fetch monitored products for {}: {}", self.agent_id, e);
                self.activity
                    .error(&format!("Could not fetch monitored products: {}", e));
                self.activity.separator();
                return CycleReport {
                    agent,
                    products: Vec::new(),
                    listing_error: Some(e.to_string()),
                };
            }
        };

        info!("Starting patch check for {} products", products.len());
        self.activity.info(&format!(
            "Starting patch check for {} products",
            products.len()
        ));

        let mut reports = Vec::with_capacity(products.len());
        for product in &products {
            reports.push(self.check_product(product, shutdown).await);
        }

        self.activity.info("Patch check completed for all products");
        self.activity.separator();

        CycleReport {
            agent,
            products: reports,
            listing_error: None,
        }
    }
}
