//! Table rendering for CLI output

use super::{ColorTheme, StatusIcon};
use crate::domain::cluster::Cluster;
use crate::domain::manifest::DeployReport;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Color, ContentArrangement, Table};

/// Table renderer for formatted output
pub struct TableRenderer {
    theme: ColorTheme,
}

impl Default for TableRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TableRenderer {
    /// Create a new table renderer with default theme
    pub fn new() -> Self {
        Self {
            theme: ColorTheme::default(),
        }
    }

    /// Render the nodes of a cluster and whether each mounts the manifest volume
    pub fn render_cluster_nodes(&self, cluster: &Cluster) -> String {
        if cluster.nodes.is_empty() {
            return format!("Cluster '{}' has no nodes", cluster.name);
        }

        let volume = cluster.manifest_volume.as_deref();
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("NODE").set_alignment(CellAlignment::Left),
                Cell::new("ROLE").set_alignment(CellAlignment::Left),
                Cell::new("STATE").set_alignment(CellAlignment::Center),
                Cell::new("MANIFESTS").set_alignment(CellAlignment::Center),
            ]);

        let mut mounted_count = 0;
        for node in &cluster.nodes {
            let mounted = volume.map(|v| node.has_mount_source(v)).unwrap_or(false);
            if mounted {
                mounted_count += 1;
            }
            let color = self.theme.get_node_color(node, volume);

            table.add_row(vec![
                Cell::new(&node.name),
                Cell::new(node.role.as_str()),
                Cell::new(StatusIcon::get_state_text(node.running)),
                Cell::new(StatusIcon::get_mount_icon(mounted)).fg(color),
            ]);
        }

        let mut output = String::new();
        output.push_str(&format!(
            "╭─ Cluster {} {} ─╮\n",
            cluster.name,
            format!("[volume: {}]", volume.unwrap_or("none")).bright_black()
        ));
        output.push_str(&table.to_string());
        output.push('\n');
        output.push_str(&format!(
            "{} {}/{} nodes mount the manifest volume\n",
            StatusIcon::get_mount_icon(mounted_count > 0).green(),
            mounted_count,
            cluster.nodes.len()
        ));

        output
    }

    /// Render the manifests copied by one deploy run
    pub fn render_deploy_report(&self, report: &DeployReport) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("MANIFEST").set_alignment(CellAlignment::Left),
                Cell::new("DESTINATION").set_alignment(CellAlignment::Left),
                Cell::new("BYTES").set_alignment(CellAlignment::Right),
            ]);

        for manifest in &report.deployed {
            table.add_row(vec![
                Cell::new(format!("{} {}", StatusIcon::SUCCESS, manifest.name)).fg(Color::Green),
                Cell::new(&manifest.destination).fg(self.theme.info),
                Cell::new(manifest.bytes).set_alignment(CellAlignment::Right),
            ]);
        }

        let elapsed = report.finished_at - report.started_at;
        let mut output = String::new();
        output.push_str(&format!(
            "╭─ Deployed to {} {} ─╮\n",
            report.node,
            format!("[{} manifests]", report.deployed.len()).bright_black()
        ));
        output.push_str(&table.to_string());
        output.push('\n');
        output.push_str(&format!(
            "Finished at {} ({} ms)\n",
            report.finished_at.format("%Y-%m-%d %H:%M:%S UTC"),
            elapsed.num_milliseconds()
        ));

        output
    }
}
