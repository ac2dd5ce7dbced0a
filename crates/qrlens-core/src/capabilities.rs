//! Host capability negotiation.
//!
//! Optional features (torch, share, haptics, permission query) are probed
//! once and recorded here. Callers branch on this struct instead of probing
//! the host at each use site, and every optional feature has a no-op fallback.

use std::time::Duration;
use thiserror::Error;

/// Capabilities probed from the host at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HostCapabilities {
    /// The camera exposes a flashlight control.
    pub torch: bool,
    /// A native share sheet is available.
    pub share: bool,
    /// Vibration / haptic feedback is available.
    pub haptics: bool,
    /// Camera permission can be queried without prompting.
    pub permission_query: bool,
}

impl HostCapabilities {
    /// Nothing optional is available.
    pub fn none() -> Self {
        Self::default()
    }

    /// How a result should be handed off for sharing.
    pub fn share_method(&self) -> ShareMethod {
        if self.share {
            ShareMethod::NativeShare
        } else {
            ShareMethod::CopyToClipboard
        }
    }
}

/// How a result is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareMethod {
    NativeShare,
    /// Fallback when no share sheet exists.
    CopyToClipboard,
}

/// Haptic feedback failed or is missing.
#[derive(Debug, Error)]
#[error("haptics unavailable: {0}")]
pub struct HapticsError(pub String);

/// Short vibration patterns.
pub trait Haptics {
    /// Play `pattern` as alternating on/off durations.
    fn pulse(&self, pattern: &[Duration]) -> Result<(), HapticsError>;
}

/// Host without haptics.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHaptics;

impl Haptics for NoHaptics {
    fn pulse(&self, _pattern: &[Duration]) -> Result<(), HapticsError> {
        Err(HapticsError("not supported on this host".to_string()))
    }
}

/// Default acknowledgement pattern: buzz, pause, buzz.
pub fn default_haptic_pattern() -> Vec<Duration> {
    [100, 50, 100].map(Duration::from_millis).to_vec()
}
