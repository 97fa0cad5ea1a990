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

use super::ManifestLayout;
use crate::domain::cluster::{
    filter_node_indices, parse_server_selector, Cluster, ClusterCreateOpts,
};
use crate::infrastructure::constants::{
    LABEL_CLUSTER_NAME, LABEL_MANIFEST_VOLUME, MANIFEST_VOLUME_SUFFIX,
};
use crate::infrastructure::runtime::{ContainerRuntime, RuntimeContext};
use crate::shared::error::{ManifestError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, Span};

/// Name of the manifest volume of a cluster. Pure function of its inputs.
pub fn manifest_volume_name(prefix: &str, cluster_name: &str) -> String {
    format!("{}-{}-{}", prefix, cluster_name, MANIFEST_VOLUME_SUFFIX)
}

/// Creates the shared manifest volume and attaches it to control-plane
/// nodes. Must run before the node containers are created.
pub struct VolumeProvisioner {
    runtime: Arc<dyn ContainerRuntime>,
    layout: ManifestLayout,
    span: Span,
}

impl VolumeProvisioner {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, layout: ManifestLayout, span: Span) -> Self {
        Self {
            runtime,
            layout,
            span,
        }
    }

    pub fn layout(&self) -> &ManifestLayout {
        &self.layout
    }

    /// Create the volume, record it on the cluster and the create options, and
    /// append the mount spec to every node matched by the server selector.
    ///
    /// The selector is resolved before anything is created, so a bad selector
    /// or a volume creation failure leaves the cluster and the runtime
    /// untouched.
    pub async fn prepare_manifest_volume(
        &self,
        ctx: &RuntimeContext,
        cluster: &mut Cluster,
        create_opts: &mut ClusterCreateOpts,
    ) -> Result<String> {
        let volume_name = self.layout.volume_name(&cluster.name);
        let labels = BTreeMap::from([(LABEL_CLUSTER_NAME.to_string(), cluster.name.clone())]);

        parse_server_selector(&self.layout.server_selector)?;
        let matched = filter_node_indices(&cluster.nodes, &[self.layout.server_selector.as_str()])?;

        ctx.run(
            "create manifest volume",
            self.runtime.create_volume(&volume_name, &labels),
        )
        .await
        .map_err(|e| match e {
            ManifestError::Cancelled(_) | ManifestError::Timeout(_) => e,
            other => ManifestError::VolumeCreate {
                volume: volume_name.clone(),
                cluster: cluster.name.clone(),
                message: other.to_string(),
            },
        })?;
        info!(parent: &self.span, volume = %volume_name, cluster = %cluster.name, "Created manifest volume");

        create_opts
            .global_labels
            .insert(LABEL_MANIFEST_VOLUME.to_string(), volume_name.clone());
        cluster.manifest_volume = Some(volume_name.clone());
        cluster.volumes.push(volume_name.clone());

        let mount = self.layout.mount_spec(&volume_name);
        for &idx in &matched {
            cluster.nodes[idx].volumes.push(mount.clone());
        }
        debug!(
            parent: &self.span,
            volume = %volume_name,
            nodes = matched.len(),
            "Attached manifest volume to server nodes"
        );

        Ok(volume_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cluster::{Node, NodeRole};
    use crate::infrastructure::runtime::MemoryRuntime;

    fn demo_cluster() -> Cluster {
        Cluster::new("demo")
            .with_node(Node::new("k3d-demo-server-0", NodeRole::Server))
            .with_node(Node::new("k3d-demo-agent-0", NodeRole::Agent))
    }

    fn provisioner(runtime: Arc<MemoryRuntime>) -> VolumeProvisioner {
        VolumeProvisioner::new(runtime, ManifestLayout::default(), Span::none())
    }

    #[test]
    fn test_volume_name_is_stable() {
        assert_eq!(manifest_volume_name("k3d", "demo"), "k3d-demo-manifests");
        assert_eq!(
            manifest_volume_name("k3d", "demo"),
            manifest_volume_name("k3d", "demo")
        );
        assert_eq!(manifest_volume_name("lab", "x-1"), "lab-x-1-manifests");
    }

    #[tokio::test]
    async fn test_prepare_attaches_only_server_nodes() {
        let runtime = Arc::new(MemoryRuntime::new());
        let mut cluster = demo_cluster();
        let mut opts = ClusterCreateOpts::default();

        let volume = provisioner(runtime.clone())
            .prepare_manifest_volume(&RuntimeContext::default(), &mut cluster, &mut opts)
            .await
            .unwrap();

        assert_eq!(volume, "k3d-demo-manifests");
        assert_eq!(cluster.manifest_volume.as_deref(), Some("k3d-demo-manifests"));
        assert_eq!(cluster.volumes, vec!["k3d-demo-manifests".to_string()]);
        assert_eq!(
            opts.global_labels.get(LABEL_MANIFEST_VOLUME).map(String::as_str),
            Some("k3d-demo-manifests")
        );
        assert_eq!(
            cluster.nodes[0].volumes,
            vec!["k3d-demo-manifests:/var/lib/rancher/k3s/server/manifests".to_string()]
        );
        assert!(cluster.nodes[1].volumes.is_empty());

        let labels = runtime.volume_labels(&volume).await.unwrap().unwrap();
        assert_eq!(labels.get(LABEL_CLUSTER_NAME).map(String::as_str), Some("demo"));
    }

    #[tokio::test]
    async fn test_volume_failure_leaves_cluster_untouched() {
        let runtime = Arc::new(MemoryRuntime::new());
        runtime.fail_volume_creation("disk full");
        let mut cluster = demo_cluster();
        let before = cluster.clone();
        let mut opts = ClusterCreateOpts::default();

        let err = provisioner(runtime)
            .prepare_manifest_volume(&RuntimeContext::default(), &mut cluster, &mut opts)
            .await
            .unwrap_err();

        assert!(matches!(err, ManifestError::VolumeCreate { .. }));
        assert!(err.to_string().contains("disk full"));
        assert_eq!(cluster, before);
        assert!(opts.global_labels.is_empty());
    }

    #[tokio::test]
    async fn test_bad_selector_creates_nothing() {
        // malformed, worker-mounting, and out-of-range selectors
        for selector in ["server", "all:*", "agent:*", "server:5"] {
            let runtime = Arc::new(MemoryRuntime::new());
            let layout = ManifestLayout {
                server_selector: selector.to_string(),
                ..Default::default()
            };
            let provisioner = VolumeProvisioner::new(runtime.clone(), layout, Span::none());
            let mut cluster = demo_cluster();
            let before = cluster.clone();
            let mut opts = ClusterCreateOpts::default();

            let err = provisioner
                .prepare_manifest_volume(&RuntimeContext::default(), &mut cluster, &mut opts)
                .await
                .unwrap_err();

            assert!(matches!(err, ManifestError::NodeFilter(_)), "{}", selector);
            assert_eq!(cluster, before);
            assert!(opts.global_labels.is_empty());
            assert!(runtime.volumes().is_empty(), "{}", selector);
        }
    }

    #[tokio::test]
    async fn test_cancelled_context_creates_nothing() {
        let runtime = Arc::new(MemoryRuntime::new());
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();
        let mut cluster = demo_cluster();
        let mut opts = ClusterCreateOpts::default();

        let err = provisioner(runtime.clone())
            .prepare_manifest_volume(&RuntimeContext::new(token), &mut cluster, &mut opts)
            .await
            .unwrap_err();

        assert!(err.is_interrupted());
        assert!(runtime.volumes().is_empty());
        assert!(cluster.manifest_volume.is_none());
    }
}
