//! Color theme for CLI output

use crate::domain::cluster::Node;
use comfy_table::Color as TableColor;

/// Color theme for terminal output
#[derive(Debug, Clone)]
pub struct ColorTheme {
    pub success: TableColor,
    pub warning: TableColor,
    pub error: TableColor,
    pub info: TableColor,
    pub muted: TableColor,
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self {
            success: TableColor::Green,
            warning: TableColor::Yellow,
            error: TableColor::Red,
            info: TableColor::Cyan,
            muted: TableColor::DarkGrey,
        }
    }
}

impl ColorTheme {
    /// Color of a node row given the cluster's manifest volume
    pub fn get_node_color(&self, node: &Node, manifest_volume: Option<&str>) -> TableColor {
        let mounted = manifest_volume
            .map(|v| node.has_mount_source(v))
            .unwrap_or(false);
        match (mounted, node.running) {
            (true, true) => self.success,
            (true, false) => self.warning,
            (false, _) => self.muted,
        }
    }
}
