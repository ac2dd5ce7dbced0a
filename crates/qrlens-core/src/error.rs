//! Error types and user-facing error taxonomy.

use std::fmt;
use thiserror::Error;

/// Persistent storage failure.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Stored data could not be parsed.
    #[error("Corrupt history data: {0}")]
    Corrupt(String),
    /// Other storage error.
    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "persistence")]
impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Corrupt(e.to_string())
    }
}

/// Failure categories the pipeline can surface to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Camera access refused.
    PermissionDenied(String),
    /// No camera present or hardware busy.
    DeviceUnavailable(String),
    /// Zero codes in a static image. A normal negative result.
    DecodeNotFound,
    /// The image could not be turned into pixels.
    UnreadableImage(String),
    /// The explanation service failed.
    AiServiceFailure(String),
    /// Stored history could not be read.
    StorageCorrupt(String),
}

impl ScanError {
    /// Get the error category for display.
    pub fn category(&self) -> &'static str {
        match self {
            ScanError::PermissionDenied(_) => "Camera Permission",
            ScanError::DeviceUnavailable(_) => "Camera Unavailable",
            ScanError::DecodeNotFound => "Nothing Found",
            ScanError::UnreadableImage(_) => "Unreadable Image",
            ScanError::AiServiceFailure(_) => "Analysis Unavailable",
            ScanError::StorageCorrupt(_) => "History Reset",
        }
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        match self {
            ScanError::PermissionDenied(msg)
            | ScanError::DeviceUnavailable(msg)
            | ScanError::UnreadableImage(msg)
            | ScanError::AiServiceFailure(msg)
            | ScanError::StorageCorrupt(msg) => msg,
            ScanError::DecodeNotFound => "No QR code was found in the image.",
        }
    }

    /// Whether an automatic retry makes sense.
    ///
    /// Only device availability is retried, and only once with relaxed constraints.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ScanError::DeviceUnavailable(_))
    }

    /// Whether the failure changes the primary UI mode.
    pub fn changes_mode(&self) -> bool {
        matches!(
            self,
            ScanError::PermissionDenied(_) | ScanError::DeviceUnavailable(_)
        )
    }

    /// Whether the user should see this at all.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, ScanError::StorageCorrupt(_))
    }

    /// Get a suggested action for the user.
    pub fn suggestion(&self) -> &'static str {
        match self {
            ScanError::PermissionDenied(_) => {
                "Allow camera access in your system settings, or scan an image file instead."
            }
            ScanError::DeviceUnavailable(_) => {
                "Check that a camera is connected and not used by another app, then retry."
            }
            ScanError::DecodeNotFound => "Try cropping closer to the code.",
            ScanError::UnreadableImage(_) => "Pick a PNG or JPEG image.",
            ScanError::AiServiceFailure(_) => "Check the content manually.",
            ScanError::StorageCorrupt(_) => "History was reset.",
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category(), self.message())
    }
}

impl std::error::Error for ScanError {}

/// Severity level for display styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational message.
    Info,
    /// Warning that doesn't block operation.
    Warning,
    /// Persistent state that blocks the current mode.
    Blocking,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Info => "Info",
            Severity::Warning => "Warning",
            Severity::Blocking => "Error",
        }
    }
}

/// A displayable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub title: String,
    pub message: String,
    /// Transient toasts are dismissible; persistent states are not.
    pub dismissible: bool,
}

impl Notice {
    /// Create an info notice.
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            title: title.into(),
            message: message.into(),
            dismissible: true,
        }
    }

    /// Create from a ScanError. Returns None for errors the user never sees.
    pub fn from_error(error: &ScanError) -> Option<Self> {
        if !error.is_user_visible() {
            return None;
        }
        let severity = match error {
            ScanError::PermissionDenied(_) | ScanError::DeviceUnavailable(_) => Severity::Blocking,
            ScanError::DecodeNotFound => Severity::Info,
            _ => Severity::Warning,
        };
        Some(Self {
            severity,
            title: error.category().to_string(),
            message: format!("{} {}", error.message(), error.suggestion()),
            dismissible: severity != Severity::Blocking,
        })
    }
}
