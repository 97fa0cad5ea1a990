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

use crate::domain::cluster::parse_server_selector;
use crate::infrastructure::constants::{
    DEFAULT_DEPLOY_CONCURRENCY, DEFAULT_DOCKER_BIN, DEFAULT_OBJECT_NAME_PREFIX,
    K3S_PATH_MANIFESTS_EMBEDDED, SERVER_NODE_SELECTOR,
};
use crate::shared::error::{ManifestError, Result};
use serde::{Deserialize, Serialize};
use std::fs::read_to_string;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvisionerConf {
    #[serde(default)]
    pub naming: NamingConf,
    #[serde(default)]
    pub k3s: K3sConf,
    #[serde(default)]
    pub runtime: RuntimeConf,
    #[serde(default)]
    pub deploy: DeployConf,
}

impl ProvisionerConf {
    pub fn from<T: AsRef<str>>(path: T) -> Result<Self> {
        let content = read_to_string(path.as_ref()).map_err(|e| {
            ManifestError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.as_ref(),
                e
            ))
        })?;

        let conf: Self = toml::from_str(&content)?;
        conf.validate()?;
        Ok(conf)
    }

    pub fn validate(&self) -> Result<()> {
        if self.naming.prefix.is_empty() {
            return Err(ManifestError::config_error("naming.prefix must not be empty"));
        }
        if !self.k3s.manifests_path.starts_with('/') {
            return Err(ManifestError::ConfigError(format!(
                "k3s.manifests_path must be absolute: {}",
                self.k3s.manifests_path
            )));
        }
        parse_server_selector(&self.k3s.server_selector).map_err(|e| {
            ManifestError::ConfigError(format!("invalid k3s.server_selector: {}", e))
        })?;
        if self.deploy.concurrency == 0 {
            return Err(ManifestError::config_error("deploy.concurrency must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamingConf {
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for NamingConf {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct K3sConf {
    #[serde(default = "default_manifests_path")]
    pub manifests_path: String,
    #[serde(default = "default_server_selector")]
    pub server_selector: String,
}

impl Default for K3sConf {
    fn default() -> Self {
        Self {
            manifests_path: default_manifests_path(),
            server_selector: default_server_selector(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConf {
    #[serde(default = "default_docker_bin")]
    pub docker_bin: String,
    #[serde(default)]
    pub operation_timeout_secs: Option<u64>,
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

impl Default for RuntimeConf {
    fn default() -> Self {
        Self {
            docker_bin: default_docker_bin(),
            operation_timeout_secs: None,
            temp_dir: None,
        }
    }
}

impl RuntimeConf {
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployConf {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for DeployConf {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_prefix() -> String {
    DEFAULT_OBJECT_NAME_PREFIX.to_string()
}

fn default_manifests_path() -> String {
    K3S_PATH_MANIFESTS_EMBEDDED.to_string()
}

fn default_server_selector() -> String {
    SERVER_NODE_SELECTOR.to_string()
}

fn default_docker_bin() -> String {
    DEFAULT_DOCKER_BIN.to_string()
}

fn default_concurrency() -> usize {
    DEFAULT_DEPLOY_CONCURRENCY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_k3s_layout() {
        let conf = ProvisionerConf::default();
        assert_eq!(conf.naming.prefix, "k3d");
        assert_eq!(conf.k3s.manifests_path, "/var/lib/rancher/k3s/server/manifests");
        assert_eq!(conf.k3s.server_selector, "server:*");
        assert_eq!(conf.deploy.concurrency, 1);
        assert!(conf.runtime.operation_timeout().is_none());
        assert!(conf.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let conf: ProvisionerConf = toml::from_str(
            r#"
[naming]
prefix = "lab"

[runtime]
operation_timeout_secs = 30
"#,
        )
        .unwrap();
        assert_eq!(conf.naming.prefix, "lab");
        assert_eq!(conf.runtime.docker_bin, "docker");
        assert_eq!(conf.runtime.operation_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(conf.k3s, K3sConf::default());
    }

    #[test]
    fn test_from_file_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k3d-manifests.toml");
        std::fs::write(&path, "[deploy]\nconcurrency = 0\n").unwrap();

        let err = ProvisionerConf::from(path.to_string_lossy()).unwrap_err();
        assert!(matches!(err, ManifestError::ConfigError(_)));

        assert!(ProvisionerConf::from("/nonexistent/k3d-manifests.toml").is_err());
    }

    #[test]
    fn test_server_selector_must_be_control_plane_only() {
        for bad in ["all:*", "agent:*", "agents:0", "server", "server:0-x"] {
            let mut conf = ProvisionerConf::default();
            conf.k3s.server_selector = bad.to_string();
            let err = conf.validate().unwrap_err();
            assert!(matches!(err, ManifestError::ConfigError(_)), "{}", bad);
        }

        let mut conf = ProvisionerConf::default();
        conf.k3s.server_selector = "server:0".to_string();
        assert!(conf.validate().is_ok());
    }

    #[test]
    fn test_relative_manifests_path_is_rejected() {
        let mut conf = ProvisionerConf::default();
        conf.k3s.manifests_path = "manifests".to_string();
        assert!(conf.validate().is_err());
    }
}
