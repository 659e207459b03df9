//! simon: capacity planning by simulated placement.
//!
//! Copies a cluster snapshot into an in-memory store, optionally adds
//! synthetic nodes cloned from a node template, expands the given
//! workloads into pods and lets the built-in decision engine place them.
//! Prints a capacity report and writes the placement plan.
//!
//! # Usage
//!
//! ```text
//! simon --snapshot cluster.yaml --manifests apps/ --fake-nodes 3
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{info, warn};

use simon_core::{DefaultValidator, ManifestSet, SimonConfig};
use simon_engine::FitEngine;
use simon_report::{CapacityReport, format_report, write_plan};
use simon_sim::{ClusterSource, EmptySource, Simulator, SnapshotSource};

#[derive(Parser)]
#[command(name = "simon", about = "Simulate workload placement on a cluster")]
struct Cli {
    /// Configuration file (TOML).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Manifest files or directories (.yaml/.yml). May be repeated.
    #[arg(long = "manifests", short = 'f')]
    manifests: Vec<PathBuf>,

    /// Cluster snapshot to start from (JSON or YAML).
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Synthetic nodes to add, cloned from the manifest node template.
    #[arg(long)]
    fake_nodes: Option<u32>,

    /// Where to write the placement plan.
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    #[arg(long)]
    scheduler_name: Option<String>,

    /// Do not copy live nodes and pods from the snapshot.
    #[arg(long)]
    no_live_pods: bool,

    /// Give up on a stalled run after this many seconds.
    #[arg(long)]
    timeout: Option<u64>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<SimonConfig> {
        let mut config = match &self.config {
            Some(path) => SimonConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => SimonConfig::default(),
        };
        if !self.manifests.is_empty() {
            config.manifests = self.manifests;
        }
        if self.snapshot.is_some() {
            config.cluster_snapshot = self.snapshot;
        }
        if let Some(count) = self.fake_nodes {
            config.fake_nodes = count;
        }
        if let Some(output) = self.output {
            config.plan_output = output;
        }
        if let Some(name) = self.scheduler_name {
            config.scheduler_name = name;
        }
        if self.no_live_pods {
            config.include_live_pods_and_nodes = false;
        }
        if self.timeout.is_some() {
            config.run_timeout_secs = self.timeout;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,simon=debug")),
        )
        .init();

    let config = Cli::parse().into_config()?;
    simulate(config).await
}

async fn simulate(config: SimonConfig) -> anyhow::Result<()> {
    info!(scheduler = %config.scheduler_name, "simon starting");

    let manifests = ManifestSet::load(&config.manifests).context("loading manifests")?;
    info!(
        workloads = manifests.workloads.len(),
        node_template = manifests.node.is_some(),
        "manifests loaded"
    );

    let engine = Arc::new(FitEngine::new(config.engine.clone().into()));
    let validator = Arc::new(DefaultValidator::new()?);
    let simulator = Arc::new(Simulator::new(&config, engine, validator)?);

    // ── Populate the synthetic cluster ─────────────────────────

    let source: Box<dyn ClusterSource> = match &config.cluster_snapshot {
        Some(path) => Box::new(
            SnapshotSource::from_file(path)
                .with_context(|| format!("reading snapshot {}", path.display()))?,
        ),
        None => Box::new(EmptySource),
    };
    let summary =
        simulator.sync_fake_cluster(source.as_ref(), config.include_live_pods_and_nodes)?;
    info!(objects = summary.total(), "cluster copied");

    if config.fake_nodes > 0 {
        match &manifests.node {
            Some(template) => {
                let added = simulator.add_fake_nodes(config.fake_nodes as usize, template)?;
                info!(
                    nodes = added.nodes.len(),
                    daemon_pods = added.daemon_pods.len(),
                    "synthetic nodes added"
                );
            }
            None => warn!(
                requested = config.fake_nodes,
                "no node template in manifests, skipping synthetic nodes"
            ),
        }
    }

    // ── Run ────────────────────────────────────────────────────

    let pods = simulator
        .materializer()
        .from_documents(&manifests.workloads)?;

    let interrupt = {
        let simulator = simulator.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, cancelling run");
                simulator.cancel();
            }
        })
    };
    let outcome = simulator.run(pods).await?;
    interrupt.abort();

    // ── Report ─────────────────────────────────────────────────

    let report = CapacityReport::collect(simulator.store())?;
    println!("{}", format_report(&report));

    let plan = write_plan(
        simulator.store(),
        &config.plan_output,
        simulator.fake_node_prefix(),
    )?;
    info!(
        path = %config.plan_output.display(),
        workloads = plan.placements.deployments.len() + plan.placements.stateful_sets.len(),
        "simon finished"
    );

    if !outcome.is_success() {
        bail!("simulation did not succeed: {}", outcome.stop_reason);
    }
    Ok(())
}
