// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::types::{Cluster, ClusterCreateOpts, Node, NodeRole};
use super::validator::ClusterValidator;
use crate::domain::config::ProvisionerConf;
use crate::domain::manifest::{DeployReport, ManifestDeployer, ManifestLayout, VolumeProvisioner};
use crate::infrastructure::runtime::{ContainerRuntime, RuntimeContext};
use crate::shared::error::{ManifestError, Result};
use std::sync::Arc;
use tracing::{info, info_span, Span};

/// Wires the volume provisioner and the manifest deployer to one runtime and
/// one configuration.
pub struct ClusterBootstrapper {
    runtime: Arc<dyn ContainerRuntime>,
    conf: ProvisionerConf,
    span: Span,
}

impl ClusterBootstrapper {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, conf: ProvisionerConf) -> Self {
        let span = info_span!("bootstrap", runtime = runtime.name());
        Self::with_span(runtime, conf, span)
    }

    pub fn with_span(runtime: Arc<dyn ContainerRuntime>, conf: ProvisionerConf, span: Span) -> Self {
        Self {
            runtime,
            conf,
            span,
        }
    }

    pub fn conf(&self) -> &ProvisionerConf {
        &self.conf
    }

    /// Context carrying the configured per-call timeout.
    pub fn context(&self, cancel: tokio_util::sync::CancellationToken) -> RuntimeContext {
        RuntimeContext::new(cancel).with_timeout(self.conf.runtime.operation_timeout())
    }

    pub fn volume_provisioner(&self) -> VolumeProvisioner {
        VolumeProvisioner::new(
            self.runtime.clone(),
            ManifestLayout::from(&self.conf),
            self.span.clone(),
        )
    }

    pub fn manifest_deployer(&self) -> ManifestDeployer {
        ManifestDeployer::new(
            self.runtime.clone(),
            ManifestLayout::from(&self.conf),
            self.span.clone(),
        )
        .with_concurrency(self.conf.deploy.concurrency)
        .with_temp_dir(self.conf.runtime.temp_dir.clone())
    }

    /// Validate the cluster, then create and attach its manifest volume.
    pub async fn prepare(
        &self,
        ctx: &RuntimeContext,
        cluster: &mut Cluster,
        create_opts: &mut ClusterCreateOpts,
    ) -> Result<String> {
        ClusterValidator::new(self.runtime.clone()).validate_prepare(cluster)?;

        let volume = self
            .volume_provisioner()
            .prepare_manifest_volume(ctx, cluster, create_opts)
            .await?;
        info!(parent: &self.span, cluster = %cluster.name, volume = %volume, "Cluster prepared");
        Ok(volume)
    }

    /// Copy the cluster's manifests into `node_name`, or into the first
    /// running server node when no node is given.
    pub async fn deploy(
        &self,
        ctx: &RuntimeContext,
        cluster: &Cluster,
        node_name: Option<&str>,
    ) -> Result<DeployReport> {
        let target = select_deploy_target(cluster, node_name)?;
        ClusterValidator::new(self.runtime.clone())
            .validate_deploy(ctx, cluster, target)
            .await?;

        self.manifest_deployer()
            .deploy_manifests(ctx, cluster, target)
            .await
    }
}

pub fn select_deploy_target<'a>(cluster: &'a Cluster, node_name: Option<&str>) -> Result<&'a Node> {
    match node_name {
        Some(name) => cluster
            .node(name)
            .ok_or_else(|| ManifestError::not_found("node", name)),
        None => cluster
            .nodes
            .iter()
            .find(|n| n.role == NodeRole::Server && n.running)
            .ok_or_else(|| {
                ManifestError::ValidationError(format!(
                    "Cluster '{}' has no running server node to deploy manifests into",
                    cluster.name
                ))
            }),
    }
}
