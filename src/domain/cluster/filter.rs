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

//! Node selectors of the form `<group>:<subset>`.
//!
//! `group` is `all`, `server(s)`, `agent(s)`, `loadbalancer` or `registry`.
//! `subset` is `*`, an index, an inclusive range `N-M`, or a comma separated
//! list of those. Indices count nodes of the selected group in cluster order.
//! `loadbalancer` and `registry` may omit the subset.

use super::types::{Node, NodeRole};
use crate::shared::error::{ManifestError, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn selector_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<group>all|servers?|agents?|loadbalancer|registry)(?::(?P<subset>\*|\d+(?:-\d+)?(?:,\d+(?:-\d+)?)*))?$",
        )
        .expect("node selector regex is valid")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Subset {
    All,
    /// Inclusive `(start, end)` index ranges; a single index is `(i, i)`.
    Ranges(Vec<(usize, usize)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSelector {
    raw: String,
    role: Option<NodeRole>,
    subset: Subset,
}

impl std::str::FromStr for NodeSelector {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        let caps = selector_regex().captures(raw).ok_or_else(|| {
            ManifestError::NodeFilter(format!(
                "invalid node selector '{}': expected '<group>:<subset>', e.g. 'server:*'",
                raw
            ))
        })?;

        let role = match &caps["group"] {
            "all" => None,
            "server" | "servers" => Some(NodeRole::Server),
            "agent" | "agents" => Some(NodeRole::Agent),
            "loadbalancer" => Some(NodeRole::LoadBalancer),
            "registry" => Some(NodeRole::Registry),
            other => {
                return Err(ManifestError::NodeFilter(format!(
                    "unknown node group '{}'",
                    other
                )))
            }
        };

        let subset = match caps.name("subset") {
            Some(m) => parse_subset(raw, m.as_str())?,
            None if matches!(role, Some(NodeRole::LoadBalancer | NodeRole::Registry)) => {
                Subset::All
            }
            None => {
                return Err(ManifestError::NodeFilter(format!(
                    "node selector '{}' is missing a subset (use '{}:*' to select all)",
                    raw, raw
                )))
            }
        };

        Ok(Self {
            raw: raw.to_string(),
            role,
            subset,
        })
    }
}

fn parse_subset(raw: &str, subset: &str) -> Result<Subset> {
    if subset == "*" {
        return Ok(Subset::All);
    }

    let parse_index = |value: &str| {
        value.parse::<usize>().map_err(|e| {
            ManifestError::NodeFilter(format!(
                "invalid index '{}' in node selector '{}': {}",
                value, raw, e
            ))
        })
    };

    let mut ranges = Vec::new();
    for part in subset.split(',') {
        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_index(start)?;
                let end = parse_index(end)?;
                if start > end {
                    return Err(ManifestError::NodeFilter(format!(
                        "invalid range '{}' in node selector '{}': start is after end",
                        part, raw
                    )));
                }
                ranges.push((start, end));
            }
            None => {
                let index = parse_index(part)?;
                ranges.push((index, index));
            }
        }
    }
    Ok(Subset::Ranges(ranges))
}

impl NodeSelector {
    /// Role the selector is restricted to, `None` for `all`.
    pub fn role(&self) -> Option<NodeRole> {
        self.role
    }

    /// Positions in `nodes` matched by this selector.
    fn select(&self, nodes: &[Node]) -> Result<Vec<usize>> {
        let candidates: Vec<usize> = nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| self.role.map_or(true, |role| node.role == role))
            .map(|(idx, _)| idx)
            .collect();

        match &self.subset {
            Subset::All => Ok(candidates),
            Subset::Ranges(ranges) => {
                let mut picked = Vec::new();
                for &(start, end) in ranges {
                    // bounds-check before touching candidates, never expand the range
                    if end >= candidates.len() {
                        return Err(ManifestError::NodeFilter(format!(
                            "node selector '{}' references index {} but only {} node(s) match",
                            self.raw,
                            end,
                            candidates.len()
                        )));
                    }
                    picked.extend_from_slice(&candidates[start..=end]);
                }
                Ok(picked)
            }
        }
    }
}

/// Parse a selector that may only match control-plane nodes. `all` or any
/// other role is rejected.
pub fn parse_server_selector(raw: &str) -> Result<NodeSelector> {
    let selector = raw.parse::<NodeSelector>()?;
    if selector.role != Some(NodeRole::Server) {
        return Err(ManifestError::NodeFilter(format!(
            "node selector '{}' must select server nodes only, e.g. 'server:*'",
            selector.raw
        )));
    }
    Ok(selector)
}

/// Resolve selectors to node positions, in cluster order and without
/// duplicates. Every selector is parsed before any node is looked at, so a
/// malformed selector never yields a partial result.
pub fn filter_node_indices<S: AsRef<str>>(nodes: &[Node], selectors: &[S]) -> Result<Vec<usize>> {
    let selectors = selectors
        .iter()
        .map(|s| s.as_ref().parse::<NodeSelector>())
        .collect::<Result<Vec<_>>>()?;

    let mut picked = BTreeSet::new();
    for selector in &selectors {
        picked.extend(selector.select(nodes)?);
    }
    Ok(picked.into_iter().collect())
}

pub fn filter_nodes<'a, S: AsRef<str>>(nodes: &'a [Node], selectors: &[S]) -> Result<Vec<&'a Node>> {
    Ok(filter_node_indices(nodes, selectors)?
        .into_iter()
        .map(|i| &nodes[i])
        .collect())
}
