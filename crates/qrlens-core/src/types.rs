//! Core domain types for the scan pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Semantic type of a decoded payload - exhaustive match required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Url,
    Email,
    Phone,
    Text,
}

impl PayloadKind {
    /// Get display label.
    pub fn label(&self) -> &'static str {
        match self {
            PayloadKind::Url => "URL",
            PayloadKind::Email => "Email",
            PayloadKind::Phone => "Phone",
            PayloadKind::Text => "Text",
        }
    }

    /// Returns all payload kinds.
    pub fn all() -> &'static [PayloadKind] {
        &[
            PayloadKind::Url,
            PayloadKind::Email,
            PayloadKind::Phone,
            PayloadKind::Text,
        ]
    }
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadKind::Url => write!(f, "url"),
            PayloadKind::Email => write!(f, "email"),
            PayloadKind::Phone => write!(f, "phone"),
            PayloadKind::Text => write!(f, "text"),
        }
    }
}

/// A single accepted scan. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Opaque unique token.
    pub id: String,
    /// Decoded text.
    pub content: String,
    /// Capture instant, stored as Unix milliseconds.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Classified payload type.
    #[serde(rename = "type")]
    pub kind: PayloadKind,
}

impl ScanResult {
    /// Create a result with a fresh id.
    pub fn new(content: impl Into<String>, kind: PayloadKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            content: content.into(),
            timestamp,
            kind,
        }
    }
}

/// A 2D point in some pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Width and height of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True when either side is zero, negative or not finite.
    pub fn is_empty(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width as f64, height as f64)
    }
}

/// Four corners locating a decoded code within its source image.
///
/// Order: top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DecodeLocation {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl DecodeLocation {
    /// Corners in polygon order.
    pub fn corners(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Build from corners in polygon order.
    pub fn from_corners(corners: [Point; 4]) -> Self {
        Self {
            top_left: corners[0],
            top_right: corners[1],
            bottom_right: corners[2],
            bottom_left: corners[3],
        }
    }

    /// Apply a point transform to every corner.
    pub fn map(&self, f: impl Fn(Point) -> Point) -> Self {
        Self::from_corners(self.corners().map(f))
    }

    /// Mean of the four corners.
    pub fn center(&self) -> Point {
        let c = self.corners();
        Point::new(
            c.iter().map(|p| p.x).sum::<f64>() / 4.0,
            c.iter().map(|p| p.y).sum::<f64>() / 4.0,
        )
    }

    /// Axis-aligned bounds as `(min, max)`.
    pub fn bounds(&self) -> (Point, Point) {
        let c = self.corners();
        let min = c
            .iter()
            .fold(Point::new(f64::MAX, f64::MAX), |m, p| {
                Point::new(m.x.min(p.x), m.y.min(p.y))
            });
        let max = c
            .iter()
            .fold(Point::new(f64::MIN, f64::MIN), |m, p| {
                Point::new(m.x.max(p.x), m.y.max(p.y))
            });
        (min, max)
    }
}

/// Rectangle in source pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    /// Snap to whole pixels, clipped to a `width` x `height` image.
    ///
    /// Returns `(x, y, w, h)`, with `w` and `h` at least 1 when the image is non-empty.
    pub fn snap(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        if width == 0 || height == 0 {
            return (0, 0, 0, 0);
        }
        let x = (self.x.round().max(0.0) as u32).min(width - 1);
        let y = (self.y.round().max(0.0) as u32).min(height - 1);
        let w = (self.width.round().max(1.0) as u32).min(width - x);
        let h = (self.height.round().max(1.0) as u32).min(height - y);
        (x, y, w, h)
    }
}

/// Which way a camera faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// Rear camera, preferred for scanning.
    #[default]
    Environment,
    /// Front camera.
    User,
}

impl Facing {
    /// Name fragments a device label commonly carries for this facing.
    pub fn name_hints(&self) -> &'static [&'static str] {
        match self {
            Facing::Environment => &["back", "rear", "environment", "world"],
            Facing::User => &["front", "user", "facetime", "integrated"],
        }
    }
}

/// Camera permission as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    /// Not decided yet; requesting the camera will prompt.
    Prompt,
}

/// Primary UI mode chosen at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Live camera scanning.
    LiveCamera,
    /// Camera unusable; only image upload is offered.
    GalleryOnly,
}

impl ScanMode {
    /// Choose the initial mode from the permission state.
    pub fn for_permission(state: PermissionState) -> Self {
        match state {
            PermissionState::Granted | PermissionState::Prompt => ScanMode::LiveCamera,
            PermissionState::Denied => ScanMode::GalleryOnly,
        }
    }
}

/// Error kind recorded on the capture device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureErrorKind {
    PermissionDenied,
    DeviceUnavailable,
}

/// Observable state of a capture device. Reset on every start/stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureDeviceState {
    pub ready: bool,
    pub torch_supported: bool,
    pub torch_on: bool,
    pub last_error: Option<CaptureErrorKind>,
}
