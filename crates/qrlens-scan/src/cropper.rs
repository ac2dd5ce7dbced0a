//! Interactive cropping of a static image.
//!
//! The region lives in percentages of the displayed image box. Pointer
//! deltas are converted with the display box size, every change re-renders
//! the preview, and confirm materializes the region into pixels.

use image::{Rgba, RgbaImage, imageops};
use qrlens_core::{CropRegion, DEFAULT_MIN_CROP_PCT, FitTransform, Point, Size};

/// Percent added or removed by one grow/shrink step.
pub const ZOOM_STEP_PCT: f64 = 10.0;

const PREVIEW_BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// What part of the region a drag moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Move,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

#[derive(Debug, Clone, Copy)]
struct DragState {
    mode: DragMode,
    origin: Point,
    start: CropRegion,
}

/// Apply a drag of `(dx, dy)` percent to `start`.
///
/// Resizing keeps the opposite corner fixed and never goes under `min_size`
/// or outside `[0, 100]`.
pub fn apply_drag(
    start: CropRegion,
    mode: DragMode,
    dx: f64,
    dy: f64,
    min_size: f64,
) -> CropRegion {
    let min_size = min_size.clamp(0.0, 100.0);
    let (dx, dy) = (finite(dx), finite(dy));
    let right = start.right();
    let bottom = start.bottom();

    let region = match mode {
        DragMode::Move => CropRegion {
            x: bounded(start.x + dx, 0.0, 100.0 - start.width),
            y: bounded(start.y + dy, 0.0, 100.0 - start.height),
            ..start
        },
        DragMode::TopLeft => {
            let x = bounded(start.x + dx, 0.0, right - min_size);
            let y = bounded(start.y + dy, 0.0, bottom - min_size);
            CropRegion {
                x,
                y,
                width: right - x,
                height: bottom - y,
            }
        }
        DragMode::TopRight => {
            let new_right = bounded(right + dx, start.x + min_size, 100.0);
            let y = bounded(start.y + dy, 0.0, bottom - min_size);
            CropRegion {
                x: start.x,
                y,
                width: new_right - start.x,
                height: bottom - y,
            }
        }
        DragMode::BottomLeft => {
            let x = bounded(start.x + dx, 0.0, right - min_size);
            let new_bottom = bounded(bottom + dy, start.y + min_size, 100.0);
            CropRegion {
                x,
                y: start.y,
                width: right - x,
                height: new_bottom - start.y,
            }
        }
        DragMode::BottomRight => {
            let new_right = bounded(right + dx, start.x + min_size, 100.0);
            let new_bottom = bounded(bottom + dy, start.y + min_size, 100.0);
            CropRegion {
                width: new_right - start.x,
                height: new_bottom - start.y,
                ..start
            }
        }
    };
    region.clamped(min_size)
}

/// Grow (`steps > 0`) or shrink the region about its center.
pub fn zoom(region: CropRegion, steps: i32, min_size: f64) -> CropRegion {
    let delta = ZOOM_STEP_PCT * steps as f64;
    let width = bounded(region.width + delta, min_size, 100.0);
    let height = bounded(region.height + delta, min_size, 100.0);
    let cx = region.x + region.width / 2.0;
    let cy = region.y + region.height / 2.0;
    CropRegion {
        x: cx - width / 2.0,
        y: cy - height / 2.0,
        width,
        height,
    }
    .clamped(min_size)
}

fn finite(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

/// Like `f64::clamp`, but an empty range collapses to `lo` instead of panicking.
fn bounded(v: f64, lo: f64, hi: f64) -> f64 {
    v.min(hi).max(lo)
}

/// One cropping session over a source image.
pub struct CropSession {
    source: RgbaImage,
    display: Size,
    preview_size: (u32, u32),
    min_size: f64,
    region: CropRegion,
    drag: Option<DragState>,
    preview: RgbaImage,
}

impl CropSession {
    /// Start with the default region, `display` being the on-screen image box.
    pub fn new(source: RgbaImage, display: Size, preview_size: (u32, u32)) -> Self {
        Self::with_min_size(source, display, preview_size, DEFAULT_MIN_CROP_PCT)
    }

    pub fn with_min_size(
        source: RgbaImage,
        display: Size,
        preview_size: (u32, u32),
        min_size: f64,
    ) -> Self {
        let mut session = Self {
            source,
            display,
            preview_size,
            min_size,
            region: CropRegion::default().clamped(min_size),
            drag: None,
            preview: RgbaImage::new(0, 0),
        };
        session.render_preview();
        session
    }

    pub fn region(&self) -> CropRegion {
        self.region
    }

    /// Replace the region directly, clamped to the invariants.
    pub fn set_region(&mut self, region: CropRegion) {
        self.update(region.clamped(self.min_size));
    }

    /// The displayed image box changed size.
    pub fn set_display(&mut self, display: Size) {
        self.display = display;
    }

    pub fn begin_drag(&mut self, mode: DragMode, pointer: Point) {
        self.drag = Some(DragState {
            mode,
            origin: pointer,
            start: self.region,
        });
    }

    /// Move the pointer during a drag. Ignored when no drag is active.
    pub fn drag_to(&mut self, pointer: Point) -> CropRegion {
        let Some(drag) = self.drag else {
            return self.region;
        };
        if self.display.is_empty() {
            return self.region;
        }
        let dx = (pointer.x - drag.origin.x) / self.display.width * 100.0;
        let dy = (pointer.y - drag.origin.y) / self.display.height * 100.0;
        let region = apply_drag(drag.start, drag.mode, dx, dy, self.min_size);
        self.update(region);
        self.region
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn grow(&mut self) {
        self.update(zoom(self.region, 1, self.min_size));
    }

    pub fn shrink(&mut self) {
        self.update(zoom(self.region, -1, self.min_size));
    }

    fn update(&mut self, region: CropRegion) {
        if region != self.region {
            self.region = region;
            self.render_preview();
        }
    }

    /// Current preview: the cropped area contain-fitted on a fixed surface.
    pub fn preview(&self) -> &RgbaImage {
        &self.preview
    }

    fn cropped(&self) -> RgbaImage {
        let (w, h) = self.source.dimensions();
        let rect = self.region.to_pixels(Size::from((w, h)));
        let (x, y, cw, ch) = rect.snap(w, h);
        imageops::crop_imm(&self.source, x, y, cw, ch).to_image()
    }

    fn render_preview(&mut self) {
        let (pw, ph) = self.preview_size;
        let mut surface = RgbaImage::from_pixel(pw, ph, PREVIEW_BACKGROUND);
        let crop = self.cropped();
        if crop.width() == 0 || crop.height() == 0 || pw == 0 || ph == 0 {
            self.preview = surface;
            return;
        }

        let fit = FitTransform::contain(Size::from(crop.dimensions()), Size::from((pw, ph)));
        let fw = ((crop.width() as f64 * fit.scale).round() as u32).clamp(1, pw);
        let fh = ((crop.height() as f64 * fit.scale).round() as u32).clamp(1, ph);
        let scaled = imageops::resize(&crop, fw, fh, imageops::FilterType::Triangle);
        let origin = fit.map_point(Point::new(0.0, 0.0));
        imageops::overlay(
            &mut surface,
            &scaled,
            origin.x.round() as i64,
            origin.y.round() as i64,
        );
        tracing::trace!("Crop preview rendered for {:?}", self.region);
        self.preview = surface;
    }

    /// Materialize the region into a cropped image.
    pub fn confirm(self) -> RgbaImage {
        tracing::debug!("Crop confirmed: {:?}", self.region);
        self.cropped()
    }

    /// Drop all crop state.
    pub fn cancel(self) {
        tracing::debug!("Crop cancelled");
    }
}
