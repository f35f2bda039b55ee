//! Host configuration.
//!
//! The engine itself never reads files; an embedding host loads an
//! [`EngineConfig`] from TOML and hands the pieces (rule file path, audit
//! settings, a [`crate::weekly::WeeklyRangesCatalog`]) to `ruleset::load_file`
//! and `audit::AuditSink::open`. The `run` CLI subcommand is exactly such a
//! host: it loads a config file, builds a [`crate::engine::PolicyEngine`]
//! from it, and evaluates names against it.

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// The options a host needs to build a [`crate::engine::PolicyEngine`] from
/// files on disk: where the rule file and audit log live, the audit line
/// format, and the audit log's rotation thresholds.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Path to the rule file. Empty means the engine is inactive.
    #[serde(default)]
    pub block_name_file: String,
    /// Path for the audit log. Empty disables audit.
    #[serde(default)]
    pub block_name_log_file: String,
    /// `"tsv"` or `"ltsv"`; required if audit is enabled.
    #[serde(default = "default_format")]
    pub block_name_format: String,
    #[serde(default = "default_max_size")]
    pub log_max_size: u64,
    /// Maximum age of the current audit file, in seconds, before rotation.
    #[serde(default = "default_max_age_secs")]
    pub log_max_age: u64,
    #[serde(default = "default_max_backups")]
    pub log_max_backups: u32,
}

fn default_format() -> String {
    "tsv".to_string()
}

fn default_max_size() -> u64 {
    100 * 1024 * 1024
}

fn default_max_age_secs() -> u64 {
    7 * 24 * 3600
}

fn default_max_backups() -> u32 {
    5
}

impl EngineConfig {
    pub fn audit_enabled(&self) -> bool {
        !self.block_name_log_file.trim().is_empty()
    }

    pub fn block_name_file_path(&self) -> Option<&Path> {
        if self.block_name_file.trim().is_empty() {
            None
        } else {
            Some(Path::new(&self.block_name_file))
        }
    }

    pub fn rotation_policy(&self) -> crate::audit::RotationPolicy {
        crate::audit::RotationPolicy {
            max_size_bytes: self.log_max_size,
            max_age: std::time::Duration::from_secs(self.log_max_age),
            max_backups: self.log_max_backups,
        }
    }
}

/// Reads and parses `path` as TOML into an [`EngineConfig`].
pub fn load(path: &Path) -> Result<EngineConfig, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
}

pub fn load_from_str(text: &str, origin: impl Into<PathBuf>) -> Result<EngineConfig, ConfigError> {
    let origin = origin.into();
    toml::from_str(text).map_err(|source| ConfigError::Parse { path: origin, source })
}
