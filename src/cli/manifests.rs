//! Manifest volume and deploy commands

use crate::cli::display::TableRenderer;
use crate::domain::cluster::{Cluster, ClusterBootstrapper, ClusterCreateOpts, Manifest};
use crate::domain::config::ProvisionerConf;
use crate::domain::manifest::ManifestLayout;
use crate::infrastructure::constants::{DEFAULT_DEPLOY_RETRIES, LABEL_CLUSTER_NAME};
use crate::infrastructure::runtime::{ContainerRuntime, DockerRuntime, MemoryRuntime};
use crate::shared::error::ManifestError;
use backon::{ExponentialBuilder, Retryable};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug, Clone)]
pub struct VolumeNameCommand {
    /// Cluster name
    pub cluster: String,
}

impl VolumeNameCommand {
    pub fn execute(&self, conf: &ProvisionerConf) -> anyhow::Result<()> {
        let layout = ManifestLayout::from(conf);
        println!("{}", layout.volume_name(&self.cluster));
        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
pub struct PrepareCommand {
    /// Cluster description (YAML, or JSON with a .json extension)
    #[arg(long, short = 'f', value_name = "PATH")]
    pub cluster_file: PathBuf,

    /// Write the updated cluster description here instead of stdout
    #[arg(long, short = 'o', value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Run against an in-memory runtime; nothing is created
    #[arg(long)]
    pub dry_run: bool,
}

impl PrepareCommand {
    pub async fn execute(
        &self,
        conf: &ProvisionerConf,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        let mut cluster = Cluster::from_file(&self.cluster_file).map_err(|e| {
            anyhow::anyhow!(
                "Failed to load cluster from {}: {}",
                self.cluster_file.display(),
                e
            )
        })?;

        let runtime = select_runtime(conf, self.dry_run);
        let bootstrapper = ClusterBootstrapper::new(runtime, conf.clone());
        let ctx = bootstrapper.context(cancel);

        let mut create_opts = ClusterCreateOpts::default();
        let volume = bootstrapper
            .prepare(&ctx, &mut cluster, &mut create_opts)
            .await?;
        info!(volume = %volume, labels = ?create_opts.global_labels, "Manifest volume ready");

        let yaml = cluster.to_yaml()?;
        match &self.out {
            Some(path) => {
                std::fs::write(path, yaml)?;
                println!("{}", TableRenderer::new().render_cluster_nodes(&cluster));
                println!("✓ Cluster written to {}", path.display());
            }
            None => {
                eprintln!("{}", TableRenderer::new().render_cluster_nodes(&cluster));
                print!("{}", yaml);
            }
        }

        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
pub struct DeployCommand {
    /// Prepared cluster description (YAML, or JSON with a .json extension)
    #[arg(long, short = 'f', value_name = "PATH")]
    pub cluster_file: PathBuf,

    /// Extra manifest files or directories, appended after the cluster's own
    /// manifests in the given order
    #[arg(long = "manifest", short = 'm', value_name = "PATH")]
    pub manifests: Vec<PathBuf>,

    /// Target node; defaults to the first running server node
    #[arg(long)]
    pub node: Option<String>,

    /// Retry the whole deploy this many times on transient runtime failures
    #[arg(long, default_value_t = DEFAULT_DEPLOY_RETRIES)]
    pub retries: usize,

    /// Run against an in-memory runtime seeded with the cluster's volume
    #[arg(long)]
    pub dry_run: bool,
}

impl DeployCommand {
    pub async fn execute(
        &self,
        conf: &ProvisionerConf,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        let mut cluster = Cluster::from_file(&self.cluster_file).map_err(|e| {
            anyhow::anyhow!(
                "Failed to load cluster from {}: {}",
                self.cluster_file.display(),
                e
            )
        })?;
        cluster.manifests.extend(Manifest::load_all(&self.manifests)?);

        let runtime = if self.dry_run {
            seeded_memory_runtime(&cluster).await?
        } else {
            select_runtime(conf, false)
        };
        let bootstrapper = ClusterBootstrapper::new(runtime, conf.clone());
        let ctx = bootstrapper.context(cancel);

        let bootstrapper = &bootstrapper;
        let ctx = &ctx;
        let cluster = &cluster;
        let node = self.node.as_deref();
        let report = (move || async move { bootstrapper.deploy(ctx, cluster, node).await })
            .retry(ExponentialBuilder::default().with_max_times(self.retries))
            .when(is_transient)
            .notify(|err: &ManifestError, after: Duration| {
                warn!(error = %err, retry_in_ms = after.as_millis() as u64, "Deploy failed, retrying");
            })
            .await?;

        println!("{}", TableRenderer::new().render_deploy_report(&report));
        Ok(())
    }
}

/// Failures worth retrying. Validation problems, cancellation and timeouts
/// are final.
fn is_transient(err: &ManifestError) -> bool {
    matches!(
        err,
        ManifestError::CopyToNode { .. } | ManifestError::DeployFailed { .. } | ManifestError::Runtime(_)
    )
}

fn select_runtime(conf: &ProvisionerConf, dry_run: bool) -> Arc<dyn ContainerRuntime> {
    if dry_run {
        Arc::new(MemoryRuntime::new())
    } else {
        Arc::new(DockerRuntime::new(conf.runtime.docker_bin.clone()))
    }
}

async fn seeded_memory_runtime(cluster: &Cluster) -> anyhow::Result<Arc<dyn ContainerRuntime>> {
    let runtime = MemoryRuntime::new();
    if let Some(volume) = &cluster.manifest_volume {
        let labels = BTreeMap::from([(LABEL_CLUSTER_NAME.to_string(), cluster.name.clone())]);
        runtime.create_volume(volume, &labels).await?;
    }
    Ok(Arc::new(runtime))
}
