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

use super::ProvisionerConf;
use crate::shared::error::{ManifestError, Result};
use std::collections::HashMap;
use std::path::PathBuf;

/// Parse `key=value` pairs given with `-D`.
pub fn parse_dynamic_configs(configs: &[String]) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();

    for config in configs {
        let (key, value) = config.split_once('=').ok_or_else(|| {
            ManifestError::ConfigError(format!(
                "Invalid config format: '{}'. Expected 'key=value'",
                config
            ))
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(ManifestError::ConfigError(format!(
                "Empty key in config: '{}'",
                config
            )));
        }

        map.insert(key.to_string(), value.trim().to_string());
    }

    Ok(map)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| ManifestError::ConfigError(format!("Invalid value for {}: {}", key, value)))
}

/// Apply `-D` overrides on top of the file configuration. Unknown keys are
/// rejected so typos do not silently fall back to defaults.
pub fn apply_to_conf(configs: &HashMap<String, String>, conf: &mut ProvisionerConf) -> Result<()> {
    for (key, value) in configs {
        match key.as_str() {
            "k3d.naming.prefix" => conf.naming.prefix = value.clone(),
            "k3d.k3s.manifests-path" => conf.k3s.manifests_path = value.clone(),
            "k3d.k3s.server-selector" => conf.k3s.server_selector = value.clone(),
            "k3d.runtime.docker-bin" => conf.runtime.docker_bin = value.clone(),
            "k3d.runtime.timeout" => {
                conf.runtime.operation_timeout_secs = Some(parse_number(key, value)?)
            }
            "k3d.runtime.temp-dir" => conf.runtime.temp_dir = Some(PathBuf::from(value)),
            "k3d.deploy.concurrency" => conf.deploy.concurrency = parse_number(key, value)?,
            _ => {
                return Err(ManifestError::ConfigError(format!(
                    "Unknown dynamic config key: {}",
                    key
                )))
            }
        }
    }

    conf.validate()
}
