use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::SpireError;

pub const DEFAULT_CONFIG_FILE: &str = "spire.json";
pub const DEFAULT_API_URL: &str = "https://spire.embl.de";
pub const DEFAULT_ARCHIVE_URL: &str = "https://swifter.embl.de";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub archive_url: Option<String>,
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub reconstruction: Option<ReconstructionEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ReconstructionEntry {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub medium: Option<String>,
    #[serde(default)]
    pub gapfill: Option<String>,
}

/// Base URLs of the two SPIRE hosts: the web API and the bulk file server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUrls {
    pub api: String,
    pub archive: String,
}

impl Default for ServiceUrls {
    fn default() -> Self {
        Self {
            api: DEFAULT_API_URL.to_string(),
            archive: DEFAULT_ARCHIVE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructionSettings {
    pub command: String,
    pub medium: String,
    pub gapfill: String,
}

impl Default for ReconstructionSettings {
    fn default() -> Self {
        Self {
            command: "carve".to_string(),
            medium: "M9".to_string(),
            gapfill: "M9".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub urls: ServiceUrls,
    pub data_dir: Utf8PathBuf,
    pub timeout: Duration,
    pub reconstruction: ReconstructionSettings,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit path must exist; without one, `spire.json` in the current
    /// directory is used when present and defaults apply otherwise.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, SpireError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| SpireError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content).map_err(|err| SpireError::ConfigParse(err.to_string()))?
        };

        Self::resolve_config(config, |key| std::env::var(key).ok())
    }

    /// `SPIRE_API_URL` and `SPIRE_DATA_DIR` take precedence over the file.
    pub fn resolve_config<F>(config: Config, env: F) -> Result<ResolvedConfig, SpireError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |value: Option<String>| value.filter(|value| !value.trim().is_empty());

        let api = non_empty(env("SPIRE_API_URL"))
            .or(config.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let archive = config
            .archive_url
            .unwrap_or_else(|| DEFAULT_ARCHIVE_URL.to_string());

        let data_dir = match non_empty(env("SPIRE_DATA_DIR")).or(config.data_dir) {
            Some(dir) => Utf8PathBuf::from(dir),
            None => default_data_dir()?,
        };

        let reconstruction = config.reconstruction.unwrap_or_default();
        let defaults = ReconstructionSettings::default();

        Ok(ResolvedConfig {
            urls: ServiceUrls {
                api: api.trim_end_matches('/').to_string(),
                archive: archive.trim_end_matches('/').to_string(),
            },
            data_dir,
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            reconstruction: ReconstructionSettings {
                command: reconstruction.command.unwrap_or(defaults.command),
                medium: reconstruction.medium.unwrap_or(defaults.medium),
                gapfill: reconstruction.gapfill.unwrap_or(defaults.gapfill),
            },
        })
    }
}

pub fn default_data_dir() -> Result<Utf8PathBuf, SpireError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("spire")).ok()
        })
        .ok_or_else(|| SpireError::Filesystem("unable to resolve data directory".to_string()))
}
