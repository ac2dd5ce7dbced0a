//! Core domain logic for QR scanning.
//!
//! This crate provides:
//! - Result types and payload classification (`types`, `classify` modules)
//! - Crop and display-fit geometry (`geometry` module)
//! - Scan history with repeat suppression (`history` module)
//! - Cooldown and result orchestration (`orchestrator` module)
//! - Host capability flags and result actions (`capabilities`, `actions` modules)
//! - Error taxonomy (`error` module)
//!
//! With the `persistence` feature enabled:
//! - Configuration management (`config` module)
//! - JSON history file storage (`store` module)

pub mod actions;
pub mod capabilities;
pub mod classify;
pub mod error;
pub mod geometry;
pub mod history;
pub mod orchestrator;
pub mod types;

#[cfg(feature = "persistence")]
pub mod config;
#[cfg(feature = "persistence")]
pub mod store;

// Re-export commonly used items from core modules
pub use actions::*;
pub use capabilities::*;
pub use classify::classify;
pub use error::*;
pub use geometry::*;
pub use history::*;
pub use orchestrator::*;
pub use types::*;

#[cfg(feature = "persistence")]
pub use config::{AppConfig, CameraConfig, ConfigError, ExplainConfig};
#[cfg(feature = "persistence")]
pub use store::JsonFileStore;
