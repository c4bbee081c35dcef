//! `load_config`: reads `docsync.yaml` into a [`CliConfig`].
//!
//! This is the only place the CLI parses its own YAML. Relative `catalog` and
//! `output_root` paths are resolved against the directory holding the config
//! file, so the tool behaves the same from any working directory.
//!
//! ```yaml
//! catalog: catalog.yaml
//! output_root: ../docs
//! mode: snapshot            # or `live`
//! github_api_url: https://api.github.com
//! raw_base_url: https://raw.githubusercontent.com
//! ```
//!
//! Secrets (`GITHUB_TOKEN`, `GH_TOKEN`) are never read from this file; they
//! come from the environment.

use anyhow::Result;
use docsync_core::catalog::RAW_BASE_URL;
use docsync_core::release::GITHUB_API_URL;
use docsync_core::synchronise::SyncMode;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    pub catalog: PathBuf,
    pub output_root: PathBuf,
    #[serde(default)]
    pub mode: SyncMode,
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,
    #[serde(default = "default_raw_base_url")]
    pub raw_base_url: String,
}

fn default_github_api_url() -> String {
    GITHUB_API_URL.to_string()
}

fn default_raw_base_url() -> String {
    RAW_BASE_URL.to_string()
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let base_dir = path_ref.parent().unwrap_or_else(|| Path::new(""));
    config.catalog = relative_to(base_dir, &config.catalog);
    config.output_root = relative_to(base_dir, &config.output_root);
    info!(
        catalog = %config.catalog.display(),
        output_root = %config.output_root.display(),
        mode = ?config.mode,
        "Configuration resolved"
    );
    Ok(config)
}

fn relative_to(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
