use std::path::{Path, PathBuf};

use serde::Deserialize;
use vscrub_domain::ScrubConfig;

pub(super) const CONFIG_SCHEMA_V1: &str = "config.v1";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFileV1 {
    schema_version: String,
    binary_extensions: Option<Vec<String>>,
    sniff_unknown: Option<bool>,
    max_workers: Option<u32>,
    staging_dir: Option<PathBuf>,
    excluded_names: Option<Vec<String>>,
    report_path: Option<PathBuf>,
}

pub(super) fn load_config(path: &Path) -> Result<ScrubConfig, String> {
    let bytes = std::fs::read(path).map_err(|_| "config file is unreadable".to_string())?;
    parse_config(&bytes)
}

fn parse_config(bytes: &[u8]) -> Result<ScrubConfig, String> {
    let file: ConfigFileV1 =
        serde_json::from_slice(bytes).map_err(|e| format!("config file is invalid: {e}"))?;
    if file.schema_version != CONFIG_SCHEMA_V1 {
        return Err(format!(
            "config schema_version must be '{CONFIG_SCHEMA_V1}'"
        ));
    }

    let mut config = ScrubConfig::default();
    if let Some(binary_extensions) = file.binary_extensions {
        config.binary_extensions = binary_extensions;
    }
    if let Some(sniff_unknown) = file.sniff_unknown {
        config.sniff_unknown = sniff_unknown;
    }
    if let Some(max_workers) = file.max_workers {
        if max_workers == 0 {
            return Err("config max_workers must be >= 1".to_string());
        }
        config.max_workers = max_workers;
    }
    if file.staging_dir.is_some() {
        config.staging_dir = file.staging_dir;
    }
    if let Some(excluded_names) = file.excluded_names {
        config.excluded_names = excluded_names;
    }
    if let Some(report_path) = file.report_path {
        config.report_path = report_path;
    }
    Ok(config)
}
