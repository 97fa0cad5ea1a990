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
use crate::domain::cluster::{Cluster, Manifest, Node};
use crate::infrastructure::constants::DEFAULT_DEPLOY_CONCURRENCY;
use crate::infrastructure::runtime::{ContainerRuntime, RuntimeContext};
use crate::shared::error::{ManifestError, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, Span};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedManifest {
    pub name: String,
    pub destination: String,
    pub bytes: usize,
}

#[derive(Debug, Clone)]
pub struct DeployReport {
    pub node: String,
    pub deployed: Vec<DeployedManifest>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Copies manifest documents into a running node through temporary local
/// files.
pub struct ManifestDeployer {
    runtime: Arc<dyn ContainerRuntime>,
    layout: ManifestLayout,
    concurrency: usize,
    temp_dir: Option<PathBuf>,
    span: Span,
}

impl ManifestDeployer {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, layout: ManifestLayout, span: Span) -> Self {
        Self {
            runtime,
            layout,
            concurrency: DEFAULT_DEPLOY_CONCURRENCY,
            temp_dir: None,
            span,
        }
    }

    /// Number of manifests in flight at once. `1` keeps strict source order
    /// and stops at the first failure.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Stage temporary files in `dir` instead of the system temp directory.
    pub fn with_temp_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.temp_dir = dir;
        self
    }

    /// Copy every manifest of `cluster` into `target`.
    ///
    /// Sequential mode aborts on the first failure; manifests copied before
    /// it stay in place. Concurrent mode attempts every manifest and reports
    /// all failures together, except that a cancellation or timeout is
    /// returned as is.
    pub async fn deploy_manifests(
        &self,
        ctx: &RuntimeContext,
        cluster: &Cluster,
        target: &Node,
    ) -> Result<DeployReport> {
        let started_at = Utc::now();
        let mut deployed = Vec::with_capacity(cluster.manifests.len());

        if self.concurrency <= 1 {
            for manifest in &cluster.manifests {
                deployed.push(self.deploy_one(ctx, manifest, target).await?);
            }
        } else {
            let results: Vec<Result<DeployedManifest>> = stream::iter(&cluster.manifests)
                .map(|manifest| self.deploy_one(ctx, manifest, target))
                .buffered(self.concurrency)
                .collect()
                .await;

            let mut failures = Vec::new();
            for result in results {
                match result {
                    Ok(done) => deployed.push(done),
                    Err(e) if e.is_interrupted() => return Err(e),
                    Err(e) => failures.push(e.to_string()),
                }
            }
            if !failures.is_empty() {
                return Err(ManifestError::DeployFailed {
                    count: failures.len(),
                    details: failures.join("; "),
                });
            }
        }

        info!(
            parent: &self.span,
            node = %target.name,
            manifests = deployed.len(),
            "Deployed manifests"
        );

        Ok(DeployReport {
            node: target.name.clone(),
            deployed,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn deploy_one(
        &self,
        ctx: &RuntimeContext,
        manifest: &Manifest,
        target: &Node,
    ) -> Result<DeployedManifest> {
        let destination = self.layout.destination(&manifest.name);
        let staged = self.stage(manifest)?;
        let local_path = staged.path().to_path_buf();

        // `staged` is removed on drop if the copy fails or is cancelled.
        ctx.run(
            "copy manifest to node",
            self.runtime.copy_to_node(&local_path, &destination, target),
        )
        .await
        .map_err(|e| match e {
            ManifestError::Cancelled(_) | ManifestError::Timeout(_) => e,
            other => ManifestError::CopyToNode {
                path: local_path.clone(),
                node: target.name.clone(),
                message: other.to_string(),
            },
        })?;

        staged.close().map_err(|source| ManifestError::RemoveTemp {
            path: local_path.clone(),
            source,
        })?;
        debug!(parent: &self.span, path = %local_path.display(), "Removed temporary local manifest file");

        Ok(DeployedManifest {
            name: manifest.name.clone(),
            destination,
            bytes: manifest.manifest.len(),
        })
    }

    /// Write the payload verbatim into a fresh temporary file named after the
    /// manifest.
    fn stage(&self, manifest: &Manifest) -> Result<NamedTempFile> {
        self.stage_with(manifest, |file, payload| {
            file.write_all(payload)?;
            file.flush()
        })
    }

    fn stage_with<F>(&self, manifest: &Manifest, write: F) -> Result<NamedTempFile>
    where
        F: FnOnce(&mut NamedTempFile, &[u8]) -> std::io::Result<()>,
    {
        let mut builder = tempfile::Builder::new();
        builder.prefix(&manifest.name);
        let created = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };
        let mut file = created.map_err(|source| ManifestError::TempFile {
            hint: manifest.name.clone(),
            source,
        })?;
        debug!(parent: &self.span, path = %file.path().display(), "Created temporary local manifest file");

        // on error `file` is dropped, which removes it
        write(&mut file, manifest.manifest.as_bytes()).map_err(|source| {
            ManifestError::WriteTemp {
                path: file.path().to_path_buf(),
                source,
            }
        })?;

        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cluster::NodeRole;
    use crate::infrastructure::runtime::MemoryRuntime;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn cluster_with(names: &[&str]) -> Cluster {
        names.iter().fold(Cluster::new("demo"), |c, name| {
            c.with_manifest(Manifest::new(*name, format!("# {}\nkind: ConfigMap\n", name)))
        })
    }

    fn target() -> Node {
        Node::new("k3d-demo-server-0", NodeRole::Server).running()
    }

    fn deployer(runtime: Arc<MemoryRuntime>, dir: &tempfile::TempDir) -> ManifestDeployer {
        ManifestDeployer::new(runtime, ManifestLayout::default(), Span::none())
            .with_temp_dir(Some(dir.path().to_path_buf()))
    }

    fn leftovers(dir: &tempfile::TempDir) -> usize {
        std::fs::read_dir(dir.path()).unwrap().count()
    }

    #[tokio::test]
    async fn test_deploys_every_manifest_and_cleans_up() {
        let runtime = Arc::new(MemoryRuntime::new());
        let dir = tempfile::tempdir().unwrap();
        let cluster = cluster_with(&["a.yaml", "b.yaml", "c.yaml"]);

        let report = deployer(runtime.clone(), &dir)
            .deploy_manifests(&RuntimeContext::default(), &cluster, &target())
            .await
            .unwrap();

        assert_eq!(report.deployed.len(), 3);
        assert_eq!(report.node, "k3d-demo-server-0");
        let files = runtime.files_on("k3d-demo-server-0");
        assert_eq!(files.len(), 3);
        for manifest in &cluster.manifests {
            let path = format!("/var/lib/rancher/k3s/server/manifests/{}", manifest.name);
            assert_eq!(files[&path], manifest.manifest.as_bytes());
        }
        assert_eq!(leftovers(&dir), 0);
    }

    #[tokio::test]
    async fn test_temp_files_use_manifest_name_as_hint() {
        let runtime = Arc::new(MemoryRuntime::new());
        let dir = tempfile::tempdir().unwrap();
        let cluster = cluster_with(&["same.yaml", "same.yaml"]);

        deployer(runtime.clone(), &dir)
            .deploy_manifests(&RuntimeContext::default(), &cluster, &target())
            .await
            .unwrap();

        let staged = runtime.staged_paths();
        assert_eq!(staged.len(), 2);
        for path in &staged {
            let file_name = path.file_name().unwrap().to_string_lossy();
            assert!(file_name.starts_with("same.yaml"));
            assert!(!path.exists());
        }
        assert_ne!(staged[0], staged[1]);
        // no dedup: both attempts happened, the second overwrote the first
        assert_eq!(runtime.copy_attempts(), 2);
    }

    #[tokio::test]
    async fn test_failed_copy_stops_loop_and_removes_temp_file() {
        let runtime = Arc::new(MemoryRuntime::new());
        runtime.fail_copy_attempt(2);
        let dir = tempfile::tempdir().unwrap();
        let cluster = cluster_with(&["a.yaml", "b.yaml", "c.yaml"]);

        let err = deployer(runtime.clone(), &dir)
            .deploy_manifests(&RuntimeContext::default(), &cluster, &target())
            .await
            .unwrap_err();

        match &err {
            ManifestError::CopyToNode { path, node, .. } => {
                assert_eq!(node, "k3d-demo-server-0");
                assert_eq!(path, &runtime.staged_paths()[1]);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(runtime.copy_attempts(), 2);
        assert_eq!(runtime.files_on("k3d-demo-server-0").len(), 1);
        assert_eq!(leftovers(&dir), 0);
    }

    #[tokio::test]
    async fn test_missing_temp_dir_reports_temp_file_error() {
        let runtime = Arc::new(MemoryRuntime::new());
        let cluster = cluster_with(&["a.yaml"]);
        let deployer = ManifestDeployer::new(runtime.clone(), ManifestLayout::default(), Span::none())
            .with_temp_dir(Some(PathBuf::from("/nonexistent/k3d-manifests-staging")));

        let err = deployer
            .deploy_manifests(&RuntimeContext::default(), &cluster, &target())
            .await
            .unwrap_err();

        assert!(matches!(err, ManifestError::TempFile { ref hint, .. } if hint == "a.yaml"));
        assert_eq!(runtime.copy_attempts(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_mode_reports_every_failure() {
        let runtime = Arc::new(MemoryRuntime::new());
        runtime.fail_copy_attempt(1);
        let dir = tempfile::tempdir().unwrap();
        let cluster = cluster_with(&["a.yaml", "b.yaml", "c.yaml"]);

        let err = deployer(runtime.clone(), &dir)
            .with_concurrency(3)
            .deploy_manifests(&RuntimeContext::default(), &cluster, &target())
            .await
            .unwrap_err();

        assert!(matches!(err, ManifestError::DeployFailed { count: 1, .. }));
        assert_eq!(runtime.copy_attempts(), 3);
        assert_eq!(runtime.files_on("k3d-demo-server-0").len(), 2);
        assert_eq!(leftovers(&dir), 0);
    }

    #[test]
    fn test_write_failure_removes_temp_file() {
        let runtime = Arc::new(MemoryRuntime::new());
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::new("a.yaml", "kind: ConfigMap\n");
        let mut written_to = None;

        let err = deployer(runtime, &dir)
            .stage_with(&manifest, |file, payload| {
                written_to = Some(file.path().to_path_buf());
                file.write_all(&payload[..4])?;
                Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
            })
            .unwrap_err();

        let written_to = written_to.unwrap();
        match &err {
            ManifestError::WriteTemp { path, source } => {
                assert_eq!(path, &written_to);
                assert_eq!(source.to_string(), "disk full");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(!written_to.exists());
        assert_eq!(leftovers(&dir), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_copy_removes_temp_file() {
        let runtime = Arc::new(MemoryRuntime::new());
        runtime.hang_copy_attempt(2);
        let dir = tempfile::tempdir().unwrap();
        let cluster = cluster_with(&["a.yaml", "b.yaml", "c.yaml"]);
        let token = CancellationToken::new();

        let watcher = {
            let runtime = runtime.clone();
            let token = token.clone();
            tokio::spawn(async move {
                while runtime.copy_attempts() < 2 {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                token.cancel();
            })
        };

        let err = deployer(runtime.clone(), &dir)
            .deploy_manifests(&RuntimeContext::new(token), &cluster, &target())
            .await
            .unwrap_err();
        watcher.await.unwrap();

        assert!(matches!(err, ManifestError::Cancelled(_)));
        assert_eq!(runtime.copy_attempts(), 2);
        assert_eq!(runtime.files_on("k3d-demo-server-0").len(), 1);
        assert!(!runtime.staged_paths()[1].exists());
        assert_eq!(leftovers(&dir), 0);
    }

    #[tokio::test]
    async fn test_concurrent_mode_passes_cancellation_through() {
        let runtime = Arc::new(MemoryRuntime::new());
        runtime.hang_copy_attempt(2);
        let dir = tempfile::tempdir().unwrap();
        let cluster = cluster_with(&["a.yaml", "b.yaml", "c.yaml"]);
        let token = CancellationToken::new();

        let watcher = {
            let runtime = runtime.clone();
            let token = token.clone();
            tokio::spawn(async move {
                while runtime.copy_attempts() < 3 {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                token.cancel();
            })
        };

        let err = deployer(runtime.clone(), &dir)
            .with_concurrency(3)
            .deploy_manifests(&RuntimeContext::new(token), &cluster, &target())
            .await
            .unwrap_err();
        watcher.await.unwrap();

        // not folded into DeployFailed, so callers do not retry it
        assert!(err.is_interrupted(), "unexpected error: {}", err);
        assert!(!matches!(err, ManifestError::DeployFailed { .. }));
        assert_eq!(leftovers(&dir), 0);
    }

    #[tokio::test]
    async fn test_concurrent_mode_passes_timeout_through() {
        let runtime = Arc::new(MemoryRuntime::new());
        runtime.hang_copy_attempt(1);
        let dir = tempfile::tempdir().unwrap();
        let cluster = cluster_with(&["a.yaml", "b.yaml"]);
        let ctx = RuntimeContext::default().with_timeout(Some(Duration::from_millis(50)));

        let err = deployer(runtime.clone(), &dir)
            .with_concurrency(2)
            .deploy_manifests(&ctx, &cluster, &target())
            .await
            .unwrap_err();

        assert!(matches!(err, ManifestError::Timeout(_)));
        assert_eq!(leftovers(&dir), 0);
    }

    #[tokio::test]
    async fn test_empty_manifest_list_is_a_no_op() {
        let runtime = Arc::new(MemoryRuntime::new());
        let dir = tempfile::tempdir().unwrap();

        let report = deployer(runtime.clone(), &dir)
            .deploy_manifests(&RuntimeContext::default(), &Cluster::new("demo"), &target())
            .await
            .unwrap();

        assert!(report.deployed.is_empty());
        assert_eq!(runtime.copy_attempts(), 0);
    }
}
