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

//! In-memory runtime with failure injection, for tests and dry runs.

use super::ContainerRuntime;
use crate::domain::cluster::Node;
use crate::shared::error::{ManifestError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    volumes: BTreeMap<String, BTreeMap<String, String>>,
    files: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
    copy_attempts: usize,
    staged_paths: Vec<PathBuf>,
    fail_volume_create: Option<String>,
    fail_copy_attempt: Option<usize>,
    hang_copy_attempt: Option<usize>,
}

#[derive(Debug, Default)]
pub struct MemoryRuntime {
    state: Mutex<MemoryState>,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every `create_volume` call fail with `message`.
    pub fn fail_volume_creation(&self, message: impl Into<String>) {
        self.state().fail_volume_create = Some(message.into());
    }

    /// Make the `attempt`-th `copy_to_node` call (1-based) fail.
    pub fn fail_copy_attempt(&self, attempt: usize) {
        self.state().fail_copy_attempt = Some(attempt);
    }

    /// Make the `attempt`-th `copy_to_node` call (1-based) never complete,
    /// so callers can cancel it mid-copy.
    pub fn hang_copy_attempt(&self, attempt: usize) {
        self.state().hang_copy_attempt = Some(attempt);
    }

    pub fn copy_attempts(&self) -> usize {
        self.state().copy_attempts
    }

    /// Local paths handed to `copy_to_node`, in call order.
    pub fn staged_paths(&self) -> Vec<PathBuf> {
        self.state().staged_paths.clone()
    }

    pub fn volumes(&self) -> Vec<String> {
        self.state().volumes.keys().cloned().collect()
    }

    /// Files copied into `node`, keyed by remote path.
    pub fn files_on(&self, node: &str) -> BTreeMap<String, Vec<u8>> {
        self.state().files.get(node).cloned().unwrap_or_default()
    }

    pub fn file(&self, node: &str, remote_path: &str) -> Option<Vec<u8>> {
        self.state()
            .files
            .get(node)
            .and_then(|files| files.get(remote_path))
            .cloned()
    }
}

#[async_trait::async_trait]
impl ContainerRuntime for MemoryRuntime {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_volume(&self, name: &str, labels: &BTreeMap<String, String>) -> Result<()> {
        let mut state = self.state();
        if let Some(message) = &state.fail_volume_create {
            return Err(ManifestError::runtime(message.clone()));
        }

        // same rule as docker: an existing volume is reused when it carries
        // every requested label
        match state.volumes.get(name) {
            Some(existing) if labels.iter().all(|(k, v)| existing.get(k) == Some(v)) => Ok(()),
            Some(_) => Err(ManifestError::runtime(format!(
                "volume '{}' already exists with different labels",
                name
            ))),
            None => {
                state.volumes.insert(name.to_string(), labels.clone());
                Ok(())
            }
        }
    }

    async fn volume_labels(&self, name: &str) -> Result<Option<BTreeMap<String, String>>> {
        Ok(self.state().volumes.get(name).cloned())
    }

    async fn copy_to_node(&self, local_path: &Path, remote_path: &str, node: &Node) -> Result<()> {
        let content = tokio::fs::read(local_path).await?;

        let hang = {
            let mut state = self.state();
            state.copy_attempts += 1;
            state.staged_paths.push(local_path.to_path_buf());
            if state.fail_copy_attempt == Some(state.copy_attempts) {
                return Err(ManifestError::runtime(format!(
                    "injected copy failure on attempt {}",
                    state.copy_attempts
                )));
            }
            state.hang_copy_attempt == Some(state.copy_attempts)
        };
        if hang {
            std::future::pending::<()>().await;
        }

        self.state()
            .files
            .entry(node.name.clone())
            .or_default()
            .insert(remote_path.to_string(), content);
        Ok(())
    }
}
