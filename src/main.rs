use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};

use patch_agent::activity::ActivityLog;
use patch_agent::agent::{CycleRunner, Orchestrator, Scheduler};
use patch_agent::catalog::{Catalog, HttpCatalog};
use patch_agent::config::{self, AgentConfig, AgentSettings};
use patch_agent::patch::{DirectoryRetention, PipelineSettings, StagingPipeline};
use patch_agent::version::comparator::{PatchVersionComparator, VersionComparator};
use patch_agent::version::store::FileVersionStore;

#[derive(Parser)]
#[command(name = "patch-agent")]
#[command(version, about = "Polls a patch catalog and stages product updates")]
struct Cli {
    /// Configuration file, defaults to agent.json in the data directory
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides agent.agentId
    #[arg(long)]
    agent_id: Option<String>,

    /// Overrides agent.catalogUrl
    #[arg(long)]
    catalog_url: Option<String>,

    /// Seconds to wait after a cycle before starting the next one
    #[arg(long)]
    interval: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the catalog until interrupted (the default)
    Run,
    /// Run a single cycle and print what happened
    Once,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    let _guard = patch_agent::logging::init(&config::log_dir())?;
    let command = cli.command.unwrap_or(Command::Run);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async move {
            match command {
                Command::Run => run(settings).await,
                Command::Once => once(settings).await,
            }
        })
}

fn load_settings(cli: &Cli) -> anyhow::Result<AgentSettings> {
    let path = cli.config.clone().unwrap_or_else(config::config_path);
    let mut agent_config = AgentConfig::load(&path)?;

    if let Some(agent_id) = &cli.agent_id {
        agent_config.agent.agent_id = agent_id.clone();
    }
    if let Some(catalog_url) = &cli.catalog_url {
        agent_config.agent.catalog_url = catalog_url.clone();
    }
    if let Some(interval) = cli.interval {
        agent_config.agent.poll_interval_seconds = interval;
    }

    agent_config
        .validate()
        .with_context(|| format!("Invalid configuration (from {:?})", path))
}

fn build_orchestrator(settings: &AgentSettings) -> anyhow::Result<Orchestrator> {
    let identity = &settings.identity;
    let catalog: Arc<dyn Catalog> = Arc::new(HttpCatalog::new(identity.catalog_base_url.clone())?);
    let comparator: Arc<dyn VersionComparator> = Arc::new(PatchVersionComparator);
    let activity = ActivityLog::new(&settings.activity_log_dir);

    let pipeline = StagingPipeline::new(
        PipelineSettings {
            agent_id: identity.agent_id.clone(),
            download_base_path: settings.download_base_path.clone(),
            notification_dir: settings.notification_dir.clone(),
            keep_count: settings.keep_count,
        },
        Arc::clone(&catalog),
        Arc::new(DirectoryRetention::new(Arc::clone(&comparator))),
        activity.clone(),
    );

    Ok(Orchestrator::new(
        identity.agent_id.clone(),
        catalog,
        Arc::new(FileVersionStore::new(&settings.download_base_path)),
        comparator,
        Arc::new(pipeline),
        activity,
    ))
}

async fn run(settings: AgentSettings) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(&settings)?;
    info!(
        "Patch agent {} using catalog {}",
        settings.identity.agent_id, settings.identity.catalog_base_url
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    Scheduler::new(Arc::new(orchestrator), settings.identity.poll_interval())
        .run(shutdown_rx)
        .await;
    Ok(())
}

async fn once(settings: AgentSettings) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(&settings)?;
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let report = orchestrator.run_cycle(&shutdown_rx).await;

    println!("Agent: {}", report.agent);
    if let Some(e) = &report.listing_error {
        println!("Products: unavailable ({})", e);
    }
    for product in &report.products {
        println!("{}: {}", product.product, product.outcome);
    }
    Ok(())
}
