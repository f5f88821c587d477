//! Configuration handling for the form engine

use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Default quiet period before a field is validated
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Environment variable overriding the debounce delay
pub const DEBOUNCE_ENV_VAR: &str = "FORM_ENGINE_DEBOUNCE_MS";

/// How concurrent validations of the same field are reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOrdering {
    /// Whichever response resolves last is applied
    #[default]
    LastResolved,
    /// Only the response to the most recently issued call is applied
    LastIssued,
}

/// User configuration for the engine
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Debounce delay for field validation, in milliseconds
    pub debounce_ms: Option<u64>,
    /// Ordering policy for concurrent field validations
    pub validation_ordering: Option<ValidationOrdering>,
    /// Whether form values are persisted between sessions
    pub persist_values: Option<bool>,
    /// Directory used by file-backed snapshot storage
    pub storage_dir: Option<PathBuf>,
}

impl EngineConfig {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("io", "centy", "form-engine")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Default directory for persisted form snapshots
    pub fn default_storage_dir() -> Option<PathBuf> {
        ProjectDirs::from("io", "centy", "form-engine").map(|dirs| dirs.data_dir().to_path_buf())
    }

    /// Load configuration from file, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => {
                let content = fs::read_to_string(&path)?;
                serde_json::from_str(&content)?
            }
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(path) = Self::config_path() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let content = serde_json::to_string_pretty(self)?;
            fs::write(&path, content)?;
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(raw) = std::env::var(DEBOUNCE_ENV_VAR) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.debounce_ms = Some(ms),
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid {DEBOUNCE_ENV_VAR}"),
            }
        }
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS))
    }

    pub fn ordering(&self) -> ValidationOrdering {
        self.validation_ordering.unwrap_or_default()
    }

    pub fn persists_values(&self) -> bool {
        self.persist_values.unwrap_or(true)
    }

    pub fn storage_dir(&self) -> Option<PathBuf> {
        self.storage_dir.clone().or_else(Self::default_storage_dir)
    }
}
