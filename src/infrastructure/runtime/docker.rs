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

//! Docker runtime driven through the `docker` CLI.

use super::ContainerRuntime;
use crate::domain::cluster::Node;
use crate::infrastructure::constants::{DEFAULT_DOCKER_BIN, REMOTE_FILE_MODE};
use crate::shared::error::{ManifestError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct VolumeInspect {
    #[serde(rename = "Labels", default)]
    labels: Option<BTreeMap<String, String>>,
}

pub struct DockerRuntime {
    docker_bin: String,
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new(DEFAULT_DOCKER_BIN)
    }
}

impl DockerRuntime {
    pub fn new(docker_bin: impl Into<String>) -> Self {
        Self {
            docker_bin: docker_bin.into(),
        }
    }

    async fn exec(&self, args: &[&str]) -> Result<Output> {
        debug!(bin = %self.docker_bin, args = ?args, "Running docker command");
        Command::new(&self.docker_bin)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ManifestError::Runtime(format!(
                    "failed to run '{} {}': {}",
                    self.docker_bin,
                    args.join(" "),
                    e
                ))
            })
    }

    async fn docker(&self, args: &[&str]) -> Result<String> {
        let output = self.exec(args).await?;
        if !output.status.success() {
            return Err(ManifestError::Runtime(format!(
                "'{} {}' exited with {}: {}",
                self.docker_bin,
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

pub(crate) fn label_args(labels: &BTreeMap<String, String>) -> Vec<String> {
    labels
        .iter()
        .flat_map(|(k, v)| ["--label".to_string(), format!("{}={}", k, v)])
        .collect()
}

pub(crate) fn parse_volume_inspect(stdout: &str) -> Result<Option<BTreeMap<String, String>>> {
    let volumes: Vec<VolumeInspect> = serde_json::from_str(stdout)?;
    Ok(volumes
        .into_iter()
        .next()
        .map(|v| v.labels.unwrap_or_default()))
}

#[async_trait::async_trait]
impl ContainerRuntime for DockerRuntime {
    fn name(&self) -> &str {
        "docker"
    }

    async fn create_volume(&self, name: &str, labels: &BTreeMap<String, String>) -> Result<()> {
        if let Some(existing) = self.volume_labels(name).await? {
            let matches = labels.iter().all(|(k, v)| existing.get(k) == Some(v));
            if matches {
                debug!(volume = %name, "Volume already exists with matching labels");
                return Ok(());
            }
            return Err(ManifestError::Runtime(format!(
                "volume '{}' already exists with different labels",
                name
            )));
        }

        let mut args = vec!["volume".to_string(), "create".to_string()];
        args.extend(label_args(labels));
        args.push(name.to_string());
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        self.docker(&args).await?;
        Ok(())
    }

    async fn volume_labels(&self, name: &str) -> Result<Option<BTreeMap<String, String>>> {
        let output = self.exec(&["volume", "inspect", name]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.to_lowercase().contains("no such volume") {
                return Ok(None);
            }
            return Err(ManifestError::Runtime(format!(
                "failed to inspect volume '{}': {}",
                name,
                stderr.trim()
            )));
        }
        parse_volume_inspect(&String::from_utf8_lossy(&output.stdout))
    }

    async fn copy_to_node(&self, local_path: &Path, remote_path: &str, node: &Node) -> Result<()> {
        let local = local_path.to_string_lossy().into_owned();
        let target = format!("{}:{}", node.name, remote_path);
        self.docker(&["cp", local.as_str(), target.as_str()]).await?;
        self.docker(&[
            "exec",
            node.name.as_str(),
            "chmod",
            REMOTE_FILE_MODE,
            remote_path,
        ])
        .await?;
        Ok(())
    }
}
