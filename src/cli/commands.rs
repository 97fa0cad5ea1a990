// CLI command definitions

use super::manifests::{DeployCommand, PrepareCommand, VolumeNameCommand};
use crate::domain::config::{apply_to_conf, parse_dynamic_configs, ProvisionerConf};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "k3d-manifests",
    version,
    about = "Bootstrap-manifest delivery for k3d clusters",
    long_about = "Creates the shared manifest volume of a k3d cluster, attaches it to the \
                  server nodes and copies bootstrap manifests into a running node"
)]
pub struct CliArgs {
    /// Path to the provisioner configuration file (TOML).
    /// Falls back to K3D_MANIFESTS_CONF_FILE, then to built-in defaults.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<String>,

    /// Dynamic configuration properties (-D key=value)
    ///
    /// Naming: k3d.naming.prefix
    /// K3s: k3d.k3s.manifests-path, k3d.k3s.server-selector
    /// Runtime: k3d.runtime.docker-bin, k3d.runtime.timeout (seconds), k3d.runtime.temp-dir
    /// Deploy: k3d.deploy.concurrency
    ///
    /// Example: -Dk3d.naming.prefix=lab -Dk3d.runtime.timeout=30
    #[arg(short = 'D', global = true, value_name = "KEY=VALUE")]
    pub properties: Vec<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

impl CliArgs {
    /// Resolve configuration: config file > env file > defaults, then -D
    /// overrides.
    pub fn load_conf(&self) -> anyhow::Result<ProvisionerConf> {
        let mut conf = match &self.config {
            Some(path) => ProvisionerConf::from(path)?,
            None => match std::env::var("K3D_MANIFESTS_CONF_FILE") {
                Ok(path) => ProvisionerConf::from(&path)?,
                Err(_) => ProvisionerConf::default(),
            },
        };

        if !self.properties.is_empty() {
            let dynamic = parse_dynamic_configs(&self.properties)
                .map_err(|e| anyhow::anyhow!("Failed to parse dynamic configs: {}", e))?;
            apply_to_conf(&dynamic, &mut conf)?;
        }

        Ok(conf)
    }
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Print the manifest volume name of a cluster
    VolumeName(VolumeNameCommand),

    /// Create the manifest volume and attach it to server nodes
    Prepare(PrepareCommand),

    /// Copy manifests into a running node
    Deploy(DeployCommand),
}
