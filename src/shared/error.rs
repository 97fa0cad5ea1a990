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

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ManifestError>;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Container runtime error: {0}")]
    Runtime(String),

    #[error("failed to create manifest volume '{volume}' for cluster '{cluster}': {message}")]
    VolumeCreate {
        volume: String,
        cluster: String,
        message: String,
    },

    #[error("failed to filter nodes: {0}")]
    NodeFilter(String),

    #[error("failed to create manifest temporary file for '{hint}': {source}")]
    TempFile {
        hint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write to temporary manifest file '{}': {source}", .path.display())]
    WriteTemp {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove temporary manifest file '{}': {source}", .path.display())]
    RemoveTemp {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to copy manifest file '{}' to node '{node}': {message}", .path.display())]
    CopyToNode {
        path: PathBuf,
        node: String,
        message: String,
    },

    #[error("failed to deploy {count} manifest(s): {details}")]
    DeployFailed { count: usize, details: String },

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {resource_type} '{name}'")]
    NotFound {
        resource_type: String,
        name: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl ManifestError {
    pub fn runtime(context: impl Into<String>) -> Self {
        Self::Runtime(context.into())
    }

    pub fn config_error(context: impl Into<String>) -> Self {
        Self::ConfigError(context.into())
    }

    pub fn not_found(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// Errors raised because the caller gave up, not because the runtime failed.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cancelled(_) | Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_create_message_names_volume_and_cluster() {
        let err = ManifestError::VolumeCreate {
            volume: "k3d-demo-manifests".to_string(),
            cluster: "demo".to_string(),
            message: "daemon unreachable".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'k3d-demo-manifests'"));
        assert!(msg.contains("'demo'"));
        assert!(msg.contains("daemon unreachable"));
    }

    #[test]
    fn test_copy_error_carries_local_path() {
        let err = ManifestError::CopyToNode {
            path: PathBuf::from("/tmp/a.yamlX1y2"),
            node: "k3d-demo-server-0".to_string(),
            message: "no such container".to_string(),
        };
        assert!(err.to_string().contains("/tmp/a.yamlX1y2"));
    }

    #[test]
    fn test_is_interrupted() {
        assert!(ManifestError::Cancelled("copy".into()).is_interrupted());
        assert!(ManifestError::Timeout("copy".into()).is_interrupted());
        assert!(!ManifestError::runtime("boom").is_interrupted());
    }
}
