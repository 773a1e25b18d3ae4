//! Application settings stored as JSON in the platform config directory.

use crate::models::TestSettings;
use crate::services::{FeedbackOptions, MatchingOptions, MultipleChoiceOptions};
use crate::store::AvatarConfig;
use directories::ProjectDirs;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const QUALIFIER: &str = "com";
const ORG_NAME: &str = "flashcards";
const APP_NAME: &str = "flashcards_app";
const CONFIG_FILE: &str = "config.json";
const DATABASE_FILE: &str = "flashcards.db";

/// Overrides `database_path` when set.
pub const DATABASE_ENV: &str = "FLASHCARDS_DB";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not determine the config directory")]
    NoConfigDir,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub auth_debounce_ms: u64,
    pub avatars: AvatarConfig,
    pub test_settings: TestSettings,
    pub multiple_choice: MultipleChoiceOptions,
    pub matching: MatchingOptions,
    pub feedback: FeedbackOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            auth_debounce_ms: 100,
            avatars: AvatarConfig::default(),
            test_settings: TestSettings::default(),
            multiple_choice: MultipleChoiceOptions::default(),
            matching: MatchingOptions::default(),
            feedback: FeedbackOptions::default(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, ORG_NAME, APP_NAME)
}

fn default_database_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join(DATABASE_FILE))
        .unwrap_or_else(|| PathBuf::from(DATABASE_FILE))
}

impl AppConfig {
    /// Loads the config from the platform config directory and applies the
    /// environment override.
    pub fn load() -> Result<Self, ConfigError> {
        let dirs = project_dirs().ok_or(ConfigError::NoConfigDir)?;
        let config = Self::load_from(dirs.config_dir().join(CONFIG_FILE))?;
        Ok(config.with_database_override(std::env::var(DATABASE_ENV).ok()))
    }

    /// A missing file yields the defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn with_database_override(mut self, database_path: Option<String>) -> Self {
        if let Some(path) = database_path.filter(|p| !p.is_empty()) {
            self.database_path = PathBuf::from(path);
        }
        self
    }

    pub fn auth_debounce(&self) -> Duration {
        Duration::from_millis(self.auth_debounce_ms)
    }
}
