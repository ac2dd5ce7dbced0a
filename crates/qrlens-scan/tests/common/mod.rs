//! Shared fixtures for integration tests.

#![allow(dead_code)]

use image::RgbaImage;
use qrlens_scan::{CameraBackend, CameraStream, CaptureError, StreamRequest};
use std::cell::Cell;
use std::rc::Rc;

#[path = "../../src/test_support.rs"]
mod fixtures;

pub use fixtures::{render_qr, side_by_side};

/// Codes laid out left to right on a white canvas.
pub fn row(texts: &[&str]) -> RgbaImage {
    let tiles: Vec<RgbaImage> = texts.iter().map(|t| render_qr(t)).collect();
    side_by_side(&tiles, 24)
}

/// Camera that always shows the same frame.
pub struct StillCamera {
    pub frame: RgbaImage,
    pub open: Rc<Cell<usize>>,
}

pub struct StillStream {
    frame: RgbaImage,
    open: Rc<Cell<usize>>,
    stopped: bool,
}

impl CameraBackend for StillCamera {
    type Stream = StillStream;

    fn open(&mut self, _request: &StreamRequest) -> Result<StillStream, CaptureError> {
        self.open.set(self.open.get() + 1);
        Ok(StillStream {
            frame: self.frame.clone(),
            open: self.open.clone(),
            stopped: false,
        })
    }
}

impl CameraStream for StillStream {
    fn name(&self) -> String {
        "Still Camera".to_string()
    }

    fn frame(&mut self) -> Result<RgbaImage, CaptureError> {
        Ok(self.frame.clone())
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.open.set(self.open.get() - 1);
        }
    }
}
