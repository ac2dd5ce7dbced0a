//! Mapping between source pixel space, render space and percentage space.
//!
//! Three spaces are involved:
//! - source pixels: native resolution of the frame or image,
//! - render space: the box the element is displayed in, after fitting,
//! - percentages (0-100) of the displayed image box, used by crop regions
//!   so they survive resizes.

use crate::types::{DecodeLocation, PixelRect, Point, Size};
use serde::{Deserialize, Serialize};

/// Smallest crop side, in percent, unless configured otherwise.
pub const DEFAULT_MIN_CROP_PCT: f64 = 10.0;

/// Rectangular region in percentages of the displayed image box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for CropRegion {
    /// Centered region covering 80% of each axis.
    fn default() -> Self {
        Self {
            x: 10.0,
            y: 10.0,
            width: 80.0,
            height: 80.0,
        }
    }
}

impl CropRegion {
    /// The whole image.
    pub const FULL: CropRegion = CropRegion {
        x: 0.0,
        y: 0.0,
        width: 100.0,
        height: 100.0,
    };

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Check the region invariants for a given minimum side.
    pub fn is_valid(&self, min_size: f64) -> bool {
        const EPS: f64 = 1e-9;
        self.x >= -EPS
            && self.y >= -EPS
            && self.width + EPS >= min_size
            && self.height + EPS >= min_size
            && self.right() <= 100.0 + EPS
            && self.bottom() <= 100.0 + EPS
    }

    /// Force the region into bounds, keeping its size where possible.
    pub fn clamped(&self, min_size: f64) -> Self {
        let min_size = min_size.clamp(0.0, 100.0);
        let width = finite_or(self.width, 100.0).clamp(min_size, 100.0);
        let height = finite_or(self.height, 100.0).clamp(min_size, 100.0);
        Self {
            x: finite_or(self.x, 0.0).clamp(0.0, 100.0 - width),
            y: finite_or(self.y, 0.0).clamp(0.0, 100.0 - height),
            width,
            height,
        }
    }

    /// Percentage region to source pixel rectangle.
    pub fn to_pixels(&self, source: Size) -> PixelRect {
        PixelRect {
            x: self.x / 100.0 * source.width,
            y: self.y / 100.0 * source.height,
            width: self.width / 100.0 * source.width,
            height: self.height / 100.0 * source.height,
        }
    }

    /// Source pixel rectangle back to percentages.
    pub fn from_pixels(rect: PixelRect, source: Size) -> Self {
        if source.is_empty() {
            return Self::FULL;
        }
        Self {
            x: rect.x / source.width * 100.0,
            y: rect.y / source.height * 100.0,
            width: rect.width / source.width * 100.0,
            height: rect.height / source.height * 100.0,
        }
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

/// How content is fitted into its display box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitMode {
    /// Scale up to fully cover the box, cropping overflow, centered.
    #[default]
    Cover,
    /// Scale to fit entirely inside the box, letterboxed, centered.
    Contain,
}

/// Uniform scale plus offset from source pixels to render space.
///
/// Depends on the current display size, so rebuild it on every layout change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitTransform {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl FitTransform {
    /// Build the transform for `source` shown inside `display`.
    pub fn new(mode: FitMode, source: Size, display: Size) -> Self {
        if source.is_empty() || display.is_empty() {
            return Self::identity();
        }
        let sx = display.width / source.width;
        let sy = display.height / source.height;
        let scale = match mode {
            FitMode::Cover => sx.max(sy),
            FitMode::Contain => sx.min(sy),
        };
        Self {
            scale,
            offset_x: (source.width * scale - display.width) / 2.0,
            offset_y: (source.height * scale - display.height) / 2.0,
        }
    }

    /// Cover fit, as used by the live video overlay.
    pub fn cover(source: Size, display: Size) -> Self {
        Self::new(FitMode::Cover, source, display)
    }

    /// Contain fit, as used by the crop preview.
    pub fn contain(source: Size, display: Size) -> Self {
        Self::new(FitMode::Contain, source, display)
    }

    pub fn identity() -> Self {
        Self {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }

    /// Source pixel to render space.
    pub fn map_point(&self, p: Point) -> Point {
        Point::new(
            p.x * self.scale - self.offset_x,
            p.y * self.scale - self.offset_y,
        )
    }

    /// Render space back to source pixels.
    pub fn unmap_point(&self, p: Point) -> Point {
        Point::new(
            (p.x + self.offset_x) / self.scale,
            (p.y + self.offset_y) / self.scale,
        )
    }

    /// Source quadrilateral to render-space overlay polygon.
    pub fn map_location(&self, location: &DecodeLocation) -> DecodeLocation {
        location.map(|p| self.map_point(p))
    }
}
