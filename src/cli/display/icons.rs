//! Status icons for CLI output

/// Status icons for different states
pub struct StatusIcon;

impl StatusIcon {
    /// Success icon (node mounts the manifest volume)
    pub const SUCCESS: &'static str = "✓";

    /// Warning icon
    pub const WARNING: &'static str = "⚠";

    /// Error icon
    pub const ERROR: &'static str = "✗";

    /// Node is not part of the control plane
    pub const SKIPPED: &'static str = "-";

    pub fn get_mount_icon(mounted: bool) -> &'static str {
        if mounted {
            Self::SUCCESS
        } else {
            Self::SKIPPED
        }
    }

    pub fn get_state_text(running: bool) -> &'static str {
        if running {
            "Running"
        } else {
            "Created"
        }
    }
}
