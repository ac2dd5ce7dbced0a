//! Application configuration and persistence paths.
//!
//! Every field has a serde default so older or partial config files keep
//! loading as new settings are added.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::geometry::DEFAULT_MIN_CROP_PCT;
use crate::orchestrator::OrchestratorConfig;
use crate::types::Facing;

/// Configuration error type.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Other configuration error.
    #[error("{0}")]
    Other(String),
}

/// Camera acquisition preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Preferred facing for the first acquisition attempt.
    #[serde(default)]
    pub facing: Facing,
    /// Resolution hint for the first attempt.
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Frame clock period.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_frame_interval_ms() -> u64 {
    33
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            facing: Facing::Environment,
            width: default_width(),
            height: default_height(),
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

/// AI explanation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainConfig {
    /// Model name passed to the service.
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variables checked, in order, for the API key.
    #[serde(default = "default_api_key_vars")]
    pub api_key_vars: Vec<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_api_key_vars() -> Vec<String> {
    vec!["GEMINI_API_KEY".to_string(), "API_KEY".to_string()]
}

fn default_temperature() -> f32 {
    0.4
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key_vars: default_api_key_vars(),
            temperature: default_temperature(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Window after an accepted scan during which new scans are dropped.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    /// Maximum decode passes when extracting several codes from one image.
    #[serde(default = "default_attempt_budget")]
    pub attempt_budget: usize,
    /// Smallest crop side, in percent.
    #[serde(default = "default_min_crop_pct")]
    pub min_crop_pct: f64,
    /// Preview surface size in pixels (square).
    #[serde(default = "default_preview_size")]
    pub preview_size: u32,
    /// Vibration pattern in milliseconds.
    #[serde(default = "default_haptic_pattern_ms")]
    pub haptic_pattern_ms: Vec<u64>,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub explain: ExplainConfig,
}

fn default_cooldown_ms() -> u64 {
    2000
}

fn default_attempt_budget() -> usize {
    10
}

fn default_min_crop_pct() -> f64 {
    DEFAULT_MIN_CROP_PCT
}

fn default_preview_size() -> u32 {
    240
}

fn default_haptic_pattern_ms() -> Vec<u64> {
    vec![100, 50, 100]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown_ms(),
            attempt_budget: default_attempt_budget(),
            min_crop_pct: default_min_crop_pct(),
            preview_size: default_preview_size(),
            haptic_pattern_ms: default_haptic_pattern_ms(),
            camera: CameraConfig::default(),
            explain: ExplainConfig::default(),
        }
    }
}

impl AppConfig {
    /// Orchestrator tunables derived from this config.
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            cooldown: Duration::from_millis(self.cooldown_ms),
            haptic_pattern: self
                .haptic_pattern_ms
                .iter()
                .copied()
                .map(Duration::from_millis)
                .collect(),
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.camera.frame_interval_ms.max(1))
    }
}

// ==================== Path Utilities ====================

fn project_dirs() -> Result<ProjectDirs, ConfigError> {
    ProjectDirs::from("io", "qrlens", "qrlens")
        .ok_or_else(|| ConfigError::Other("Could not determine home directory".to_string()))
}

/// Get the application data directory.
pub fn get_data_dir() -> Result<PathBuf, ConfigError> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// Get the config directory.
pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the config file path.
pub fn get_config_path() -> Result<PathBuf, ConfigError> {
    get_config_dir().map(|dir| dir.join("config.json"))
}

/// Get the history file path.
pub fn get_history_path() -> Result<PathBuf, ConfigError> {
    get_data_dir().map(|dir| dir.join("history.json"))
}

// ==================== Config I/O ====================

/// Load configuration from disk. A missing file yields defaults.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = get_config_path()?;
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let content = fs::read_to_string(&path)?;
    let config = serde_json::from_str(&content)?;
    Ok(config)
}

/// Save configuration to disk.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    let path = get_config_path()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config)?;
    fs::write(&path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.cooldown_ms, 2000);
        assert_eq!(config.attempt_budget, 10);
        assert_eq!(config.min_crop_pct, 10.0);
        assert_eq!(config.camera.facing, Facing::Environment);
        assert_eq!((config.camera.width, config.camera.height), (1280, 720));
    }

    #[test]
    fn test_app_config_deserialize_missing_fields() {
        let json = r#"{"cooldown_ms":3000}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.cooldown_ms, 3000);
        assert_eq!(config.attempt_budget, 10);
        assert_eq!(config.explain, ExplainConfig::default());
    }

    #[test]
    fn test_app_config_nested_partial() {
        let json = r#"{"camera":{"facing":"user"}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.camera.facing, Facing::User);
        assert_eq!(config.camera.width, 1280);
    }

    #[test]
    fn test_app_config_serialization() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_orchestrator_config_from_app_config() {
        let config = AppConfig {
            cooldown_ms: 3000,
            ..AppConfig::default()
        };
        let orch = config.orchestrator();
        assert_eq!(orch.cooldown, Duration::from_millis(3000));
        assert_eq!(orch.haptic_pattern.len(), 3);
    }

    #[test]
    fn test_frame_interval_never_zero() {
        let mut config = AppConfig::default();
        config.camera.frame_interval_ms = 0;
        assert_eq!(config.frame_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_get_history_path() {
        let result = get_history_path();
        assert!(result.is_ok());
        assert!(result.unwrap().to_string_lossy().contains("history.json"));
    }

    #[test]
    fn test_get_config_path() {
        let result = get_config_path();
        assert!(result.is_ok());
        assert!(result.unwrap().to_string_lossy().contains("config.json"));
    }
}
