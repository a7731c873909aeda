use std::path::PathBuf;

pub const DEFAULT_BINARY_EXTENSIONS: &[&str] = &["vmdk", "nvram"];

/// Inventory folder names that exist in every deployment and would rewrite
/// ordinary words if they were substituted.
pub const DEFAULT_EXCLUDED_NAMES: &[&str] = &["Datacenters", "vm", "host", "datastore", "network"];

pub const DEFAULT_REPORT_PATH: &str = "index.html";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrubConfig {
    /// Extensions (without the dot, compared case-insensitively) copied verbatim.
    pub binary_extensions: Vec<String>,
    /// Sniff the first bytes of streams whose name has no recognized extension.
    pub sniff_unknown: bool,
    pub max_workers: u32,
    pub staging_dir: Option<PathBuf>,
    pub excluded_names: Vec<String>,
    pub report_path: PathBuf,
}

impl Default for ScrubConfig {
    fn default() -> Self {
        Self {
            binary_extensions: DEFAULT_BINARY_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            sniff_unknown: false,
            max_workers: 1,
            staging_dir: None,
            excluded_names: DEFAULT_EXCLUDED_NAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            report_path: PathBuf::from(DEFAULT_REPORT_PATH),
        }
    }
}
