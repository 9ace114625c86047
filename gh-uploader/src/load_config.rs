/// `load_config` module: Loads a static YAML config and injects the GitHub credential from the environment.
///
/// This module is the only place where untrusted YAML is parsed and mapped to the
/// strongly-typed [`UploadTarget`] and [`UploadOptions`] of the core crate.
///
/// # Responsibilities
/// - Parse the user-supplied YAML file (`target`, optional `upload`, optional `api_base`)
/// - Inject the credential from `GITHUB_TOKEN`; secrets never live in the YAML file
/// - Validate upload options before any network traffic happens
///
/// # Errors
/// All errors use `anyhow::Error` for context-rich diagnostics and surface at the CLI boundary.
use anyhow::{Context, Result};
use gh_uploader_core::{UploadOptions, UploadTarget};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

use crate::github::DEFAULT_API_BASE;

/// Environment variable holding the bearer token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

#[derive(Debug, Deserialize)]
pub struct TargetSection {
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    target: TargetSection,
    #[serde(default)]
    upload: UploadOptions,
    #[serde(default = "default_api_base")]
    api_base: String,
}

/// Fully merged configuration for one CLI invocation.
#[derive(Debug)]
pub struct CliConfig {
    pub target: UploadTarget,
    pub options: UploadOptions,
    pub api_base: String,
}

/// Loads a static YAML config file (no secrets) and injects `GITHUB_TOKEN`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let credential = match std::env::var(TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => {
            info!("{TOKEN_ENV} found in env");
            token
        }
        Ok(_) => {
            error!("{TOKEN_ENV} is set but empty");
            anyhow::bail!("{TOKEN_ENV} environment variable is empty");
        }
        Err(e) => {
            error!(error = ?e, "{TOKEN_ENV} environment variable not set");
            return Err(anyhow::anyhow!(
                "{TOKEN_ENV} environment variable not set: {e}"
            ));
        }
    };

    raw.upload
        .validate()
        .context("Invalid upload section in config")?;

    let target = UploadTarget::new(
        raw.target.owner,
        raw.target.repo,
        raw.target.branch,
        credential,
    );
    target.trace_loaded();
    raw.upload.trace_loaded();

    info!(api_base = %raw.api_base, "Config loaded and merged successfully");
    Ok(CliConfig {
        target,
        options: raw.upload,
        api_base: raw.api_base,
    })
}
