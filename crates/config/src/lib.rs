//! Layered configuration for salvage.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults.
//! 2. `salvage.toml`, `salvage.yaml` and `salvage.json` in the platform
//!    config directory, then the same names in the current directory.
//!    Within one directory a later format overrides an earlier one.
//! 3. Environment variables prefixed `SALVAGE_`, with `__` separating
//!    nested keys (`SALVAGE_LOG__LEVEL=debug`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use salvage_extract::DEFAULT_ANALYSIS_BYTES;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::instrument;

pub const ENV_PREFIX: &str = "SALVAGE_";
const FILE_STEM: &str = "salvage";
const FORMATS: &[&str] = &["toml", "yaml", "json"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub analysis: AnalysisConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Directory holding one JSON file per cached document.
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: project_dirs()
                .map(|dirs| dirs.cache_dir().join("metadata"))
                .unwrap_or_else(|| PathBuf::from("metadata_cache")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Budget for the HTML handed to the analyzer, in bytes.
    pub max_html_bytes: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_html_bytes: DEFAULT_ANALYSIS_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", FILE_STEM)
}

/// Candidate config files in `dir`, in merge order.
pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    FORMATS.iter().map(|ext| dir.join(format!("{FILE_STEM}.{ext}"))).collect()
}

/// Every location searched by [`Config::load`], in merge order.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dirs) = project_dirs() {
        paths.extend(files_in(dirs.config_dir()));
    }
    if let Ok(cwd) = std::env::current_dir() {
        paths.extend(files_in(&cwd));
    }
    paths
}

impl Config {
    /// Loads from the default search paths and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(&search_paths())
    }

    /// Loads from the given files (missing ones are skipped) and the environment.
    #[instrument(skip_all, fields(files = files.len()))]
    pub fn load_from(files: &[PathBuf]) -> Result<Self> {
        let config: Self = Self::figment(files).extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(?config, "configuration loaded");
        Ok(config)
    }

    /// The provider stack behind [`Config::load_from`].
    pub fn figment(files: &[PathBuf]) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        for file in files {
            figment = match file.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file(file)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
                Some("json") => figment.merge(Json::file(file)),
                _ => {
                    tracing::warn!(file = %file.display(), "ignoring config file with unknown format");
                    figment
                },
            };
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.log.level.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("log.level must not be empty".to_string()));
        }
        if self.analysis.max_html_bytes == 0 {
            exn::bail!(ErrorKind::Invalid("analysis.max_html_bytes must be greater than zero".to_string()));
        }
        if self.cache.dir.exists() && !self.cache.dir.is_dir() {
            exn::bail!(ErrorKind::Invalid(format!(
                "cache.dir '{}' is not a directory",
                self.cache.dir.display()
            )));
        }
        Ok(())
    }
}
