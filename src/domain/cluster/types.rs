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

use crate::infrastructure::constants::{
    ROLE_AGENT, ROLE_LOADBALANCER, ROLE_NONE, ROLE_REGISTRY, ROLE_SERVER,
};
use crate::shared::error::{ManifestError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    #[serde(rename = "server")]
    Server,
    #[serde(rename = "agent")]
    Agent,
    #[serde(rename = "loadbalancer")]
    LoadBalancer,
    #[serde(rename = "registry")]
    Registry,
    #[serde(rename = "noRole")]
    NoRole,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Server => ROLE_SERVER,
            NodeRole::Agent => ROLE_AGENT,
            NodeRole::LoadBalancer => ROLE_LOADBALANCER,
            NodeRole::Registry => ROLE_REGISTRY,
            NodeRole::NoRole => ROLE_NONE,
        }
    }
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NodeRole {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            ROLE_SERVER => Ok(NodeRole::Server),
            ROLE_AGENT => Ok(NodeRole::Agent),
            ROLE_LOADBALANCER => Ok(NodeRole::LoadBalancer),
            ROLE_REGISTRY => Ok(NodeRole::Registry),
            ROLE_NONE => Ok(NodeRole::NoRole),
            _ => Err(ManifestError::ConfigError(format!(
                "Invalid node role: {}",
                s
            ))),
        }
    }
}

/// A cluster node as seen by the provisioner.
///
/// `volumes` holds mount specs in `source:target` form. `running` is
/// maintained by whoever creates and starts the node containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub role: NodeRole,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub running: bool,
}

impl Node {
    pub fn new(name: impl Into<String>, role: NodeRole) -> Self {
        Self {
            name: name.into(),
            role,
            volumes: Vec::new(),
            running: false,
        }
    }

    pub fn running(mut self) -> Self {
        self.running = true;
        self
    }

    pub fn has_mount_source(&self, volume: &str) -> bool {
        self.volumes
            .iter()
            .any(|spec| spec.split_once(':').map(|(src, _)| src) == Some(volume))
    }
}

/// A named manifest document. The payload is copied byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub manifest: String,
}

impl Manifest {
    pub fn new(name: impl Into<String>, manifest: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            manifest: manifest.into(),
        }
    }

    /// Load a manifest from disk; the file name becomes the manifest name.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ManifestError::ConfigError(format!(
                    "Manifest path has no usable file name: {}",
                    path.display()
                ))
            })?
            .to_string();
        let manifest = read_to_string(path)?;
        Ok(Self { name, manifest })
    }

    /// Load manifests from a mix of files and directories.
    ///
    /// Directory entries are read non-recursively in file-name order.
    pub fn load_all<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Self>> {
        let mut manifests = Vec::new();
        for path in paths {
            let path = path.as_ref();
            if path.is_dir() {
                let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|p| p.is_file())
                    .collect();
                files.sort();
                for file in files {
                    manifests.push(Self::from_file(file)?);
                }
            } else {
                manifests.push(Self::from_file(path)?);
            }
        }
        Ok(manifests)
    }
}

/// Cluster aggregate mutated in place during provisioning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub manifests: Vec<Manifest>,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_volume: Option<String>,
}

impl Cluster {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.manifests.push(manifest);
        self
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Read a cluster description; `.json` files are parsed as JSON, anything
    /// else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(serde_yaml::from_str(&content)?)
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Options accumulated while a cluster is being created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterCreateOpts {
    #[serde(default)]
    pub global_labels: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_node_role_round_trips_through_str() {
        for role in [
            NodeRole::Server,
            NodeRole::Agent,
            NodeRole::LoadBalancer,
            NodeRole::Registry,
            NodeRole::NoRole,
        ] {
            assert_eq!(role.as_str().parse::<NodeRole>().unwrap(), role);
        }
        assert!("master".parse::<NodeRole>().is_err());
    }

    #[test]
    fn test_has_mount_source() {
        let mut node = Node::new("k3d-demo-server-0", NodeRole::Server);
        node.volumes.push("k3d-demo-images:/k3d/images".to_string());
        assert!(node.has_mount_source("k3d-demo-images"));
        assert!(!node.has_mount_source("k3d-demo"));
    }

    #[test]
    fn test_cluster_from_yaml() {
        let yaml = r#"
name: demo
nodes:
  - name: k3d-demo-server-0
    role: server
    running: true
  - name: k3d-demo-agent-0
    role: agent
manifests:
  - name: a.yaml
    manifest: "kind: Namespace\n"
"#;
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let cluster = Cluster::from_file(file.path()).unwrap();
        assert_eq!(cluster.name, "demo");
        assert_eq!(cluster.nodes.len(), 2);
        assert_eq!(cluster.nodes[1].role, NodeRole::Agent);
        assert!(cluster.nodes[0].running);
        assert!(cluster.nodes[1].volumes.is_empty());
        assert_eq!(cluster.manifests[0].manifest, "kind: Namespace\n");
        assert!(cluster.manifest_volume.is_none());
    }

    #[test]
    fn test_load_all_reads_directory_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.yaml"), "b").unwrap();
        std::fs::write(dir.path().join("a.yaml"), "a").unwrap();
        let single = dir.path().join("a.yaml");

        let manifests = Manifest::load_all(&[dir.path().to_path_buf(), single]).unwrap();
        let names: Vec<_> = manifests.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["a.yaml", "b.yaml", "a.yaml"]);
        assert_eq!(manifests[1].manifest, "b");
    }
}
