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

/// Object naming
pub const DEFAULT_OBJECT_NAME_PREFIX: &str = "k3d";
pub const MANIFEST_VOLUME_SUFFIX: &str = "manifests";

/// Directory scanned by the k3s server for auto-deploy manifests
pub const K3S_PATH_MANIFESTS_EMBEDDED: &str = "/var/lib/rancher/k3s/server/manifests";

/// Resource labels
pub const LABEL_CLUSTER_NAME: &str = "k3d.cluster";
pub const LABEL_MANIFEST_VOLUME: &str = "k3d.cluster.manifestVolume";

/// Node roles
pub const ROLE_SERVER: &str = "server";
pub const ROLE_AGENT: &str = "agent";
pub const ROLE_LOADBALANCER: &str = "loadbalancer";
pub const ROLE_REGISTRY: &str = "registry";
pub const ROLE_NONE: &str = "noRole";

/// Selector matching every control-plane node
pub const SERVER_NODE_SELECTOR: &str = "server:*";

/// Runtime defaults
pub const DEFAULT_DOCKER_BIN: &str = "docker";
pub const REMOTE_FILE_MODE: &str = "0644";

/// Deployment defaults
pub const DEFAULT_DEPLOY_CONCURRENCY: usize = 1;
pub const DEFAULT_DEPLOY_RETRIES: usize = 0;
