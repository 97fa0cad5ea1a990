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

//! Container runtime collaborators.

pub mod docker;
pub mod memory;

pub use docker::DockerRuntime;
pub use memory::MemoryRuntime;

use crate::domain::cluster::Node;
use crate::shared::error::{ManifestError, Result};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[async_trait::async_trait]
pub trait ContainerRuntime: Send + Sync {
    fn name(&self) -> &str;

    /// Create a named volume. Creating a volume that already exists with the
    /// same labels succeeds.
    async fn create_volume(&self, name: &str, labels: &BTreeMap<String, String>) -> Result<()>;

    /// Labels of an existing volume, `None` when the volume does not exist.
    async fn volume_labels(&self, name: &str) -> Result<Option<BTreeMap<String, String>>>;

    /// Copy a local file into a node container. The remote file must end up
    /// readable by the node's bootstrap process.
    async fn copy_to_node(&self, local_path: &Path, remote_path: &str, node: &Node) -> Result<()>;
}

/// Cancellation and deadline shared by every runtime call of one operation.
#[derive(Debug, Clone, Default)]
pub struct RuntimeContext {
    cancel: CancellationToken,
    timeout: Option<Duration>,
}

impl RuntimeContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive one runtime call. Fails fast when the token is cancelled or the
    /// per-call timeout elapses; the in-flight future is dropped.
    pub async fn run<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(ManifestError::Cancelled(operation.to_string()));
        }

        let bounded = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                    ManifestError::Timeout(format!(
                        "{} did not finish within {}s",
                        operation,
                        limit.as_secs_f64()
                    ))
                })?,
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ManifestError::Cancelled(operation.to_string())),
            res = bounded => res,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_passes_result_through() {
        let ctx = RuntimeContext::default();
        let value = ctx.run("noop", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_run_fails_fast_when_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = RuntimeContext::new(token);

        let err = ctx
            .run("create volume", std::future::pending::<Result<()>>())
            .await
            .unwrap_err();
        assert!(matches!(err, ManifestError::Cancelled(op) if op == "create volume"));
    }

    #[tokio::test]
    async fn test_run_cancels_in_flight_call() {
        let token = CancellationToken::new();
        let ctx = RuntimeContext::new(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let err = ctx
            .run("copy", std::future::pending::<Result<()>>())
            .await
            .unwrap_err();
        assert!(matches!(err, ManifestError::Cancelled(_)));
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let ctx = RuntimeContext::default().with_timeout(Some(Duration::from_millis(10)));
        let err = ctx
            .run("copy", std::future::pending::<Result<()>>())
            .await
            .unwrap_err();
        assert!(matches!(err, ManifestError::Timeout(_)));
    }
}
