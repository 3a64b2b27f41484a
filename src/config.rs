// src/config.rs

//! Runtime configuration loaded from TOML.
//!
//! The file path comes from `LEARNING_CORE_CONFIG`. A missing variable means
//! defaults. The binary logs an unreadable or invalid file and falls back to
//! defaults.

use crate::error::{CoreError, CoreResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "LEARNING_CORE_CONFIG";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub log_filter: String,
    pub feedback_queue_capacity: usize,
    pub default_mission_count: usize,
    pub seed_catalog: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("learning_core.db"),
            log_filter: "info".to_string(),
            feedback_queue_capacity: 256,
            default_mission_count: 3,
            seed_catalog: true,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> CoreResult<Self> {
        toml::from_str::<AppConfig>(s).map_err(|e| CoreError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> CoreResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    /// Loads from `LEARNING_CORE_CONFIG`. An unset variable gives defaults.
    pub fn from_env() -> CoreResult<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) => AppConfig::load(Path::new(&path)),
            Err(_) => Ok(AppConfig::default()),
        }
    }
}
