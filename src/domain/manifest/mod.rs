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

//! Manifest delivery: volume provisioning and manifest deployment

pub mod deployer;
pub mod volume;

pub use self::deployer::{DeployReport, DeployedManifest, ManifestDeployer};
pub use self::volume::{manifest_volume_name, VolumeProvisioner};

use crate::domain::config::ProvisionerConf;
use crate::infrastructure::constants::{
    DEFAULT_OBJECT_NAME_PREFIX, K3S_PATH_MANIFESTS_EMBEDDED, SERVER_NODE_SELECTOR,
};

/// Naming and placement rules shared by both components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestLayout {
    pub prefix: String,
    pub manifests_path: String,
    pub server_selector: String,
}

impl Default for ManifestLayout {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_OBJECT_NAME_PREFIX.to_string(),
            manifests_path: K3S_PATH_MANIFESTS_EMBEDDED.to_string(),
            server_selector: SERVER_NODE_SELECTOR.to_string(),
        }
    }
}

impl From<&ProvisionerConf> for ManifestLayout {
    fn from(conf: &ProvisionerConf) -> Self {
        Self {
            prefix: conf.naming.prefix.clone(),
            manifests_path: conf.k3s.manifests_path.clone(),
            server_selector: conf.k3s.server_selector.clone(),
        }
    }
}

impl ManifestLayout {
    pub fn volume_name(&self, cluster_name: &str) -> String {
        manifest_volume_name(&self.prefix, cluster_name)
    }

    /// Mount spec attached to control-plane nodes.
    pub fn mount_spec(&self, volume_name: &str) -> String {
        format!("{}:{}", volume_name, self.manifests_path)
    }

    /// In-container path of a manifest file.
    pub fn destination(&self, manifest_name: &str) -> String {
        format!(
            "{}/{}",
            self.manifests_path.trim_end_matches('/'),
            manifest_name
        )
    }
}
