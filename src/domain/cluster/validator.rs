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

use super::types::{Cluster, Node};
use crate::infrastructure::constants::LABEL_CLUSTER_NAME;
use crate::infrastructure::runtime::{ContainerRuntime, RuntimeContext};
use crate::shared::error::ManifestError;
use std::collections::HashSet;
use std::sync::Arc;

pub struct ClusterValidator {
    runtime: Arc<dyn ContainerRuntime>,
}

impl ClusterValidator {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    pub fn validate_prepare(&self, cluster: &Cluster) -> Result<(), ManifestError> {
        if !is_valid_cluster_name(&cluster.name) {
            return Err(ManifestError::ValidationError(format!(
                "Invalid cluster name: '{}' (lowercase letters, digits and '-' only, max 63 chars)",
                cluster.name
            )));
        }

        let mut seen = HashSet::new();
        for node in &cluster.nodes {
            if !seen.insert(node.name.as_str()) {
                return Err(ManifestError::ValidationError(format!(
                    "Duplicate node name: '{}'",
                    node.name
                )));
            }
        }

        Ok(())
    }

    pub async fn validate_deploy(
        &self,
        ctx: &RuntimeContext,
        cluster: &Cluster,
        target: &Node,
    ) -> Result<(), ManifestError> {
        let volume = cluster.manifest_volume.as_deref().ok_or_else(|| {
            ManifestError::ValidationError(format!(
                "Cluster '{}' has no manifest volume; run 'prepare' before deploying manifests",
                cluster.name
            ))
        })?;

        for manifest in &cluster.manifests {
            validate_manifest_name(&manifest.name)?;
        }

        if !target.running {
            return Err(ManifestError::ValidationError(format!(
                "Target node '{}' is not running",
                target.name
            )));
        }

        if !target.has_mount_source(volume) {
            return Err(ManifestError::ValidationError(format!(
                "Target node '{}' does not mount manifest volume '{}'",
                target.name, volume
            )));
        }

        self.validate_manifest_volume(ctx, cluster, volume).await
    }

    async fn validate_manifest_volume(
        &self,
        ctx: &RuntimeContext,
        cluster: &Cluster,
        volume: &str,
    ) -> Result<(), ManifestError> {
        let labels = ctx
            .run("inspect manifest volume", self.runtime.volume_labels(volume))
            .await?
            .ok_or_else(|| ManifestError::not_found("volume", volume))?;

        match labels.get(LABEL_CLUSTER_NAME) {
            Some(owner) if owner == &cluster.name => Ok(()),
            Some(owner) => Err(ManifestError::ValidationError(format!(
                "Volume '{}' belongs to cluster '{}', not '{}'",
                volume, owner, cluster.name
            ))),
            None => Err(ManifestError::ValidationError(format!(
                "Volume '{}' is missing the '{}' label",
                volume, LABEL_CLUSTER_NAME
            ))),
        }
    }
}

/// Manifest names become file names inside the node, so they must be a
/// single path component.
pub fn validate_manifest_name(name: &str) -> Result<(), ManifestError> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\0')
    {
        return Err(ManifestError::ValidationError(format!(
            "Invalid manifest name: '{}' (must be a plain file name)",
            name
        )));
    }
    Ok(())
}

pub(crate) fn is_valid_cluster_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 63 {
        return false;
    }

    if !name.chars().next().unwrap_or(' ').is_ascii_alphanumeric() {
        return false;
    }
    if !name.chars().last().unwrap_or(' ').is_ascii_alphanumeric() {
        return false;
    }

    name.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
