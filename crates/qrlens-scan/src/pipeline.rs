//! End-to-end flows: image to history, and camera to history.

use crate::capture::{CameraBackend, CameraSource, CaptureError, CaptureSource};
use crate::decoder::{Decoder, load_image_file};
use crate::extractor::{ExtractOutcome, MultiCodeExtractor};
use crate::scan_loop::{FrameClock, LoopEvent, ScanLoop};
use image::RgbaImage;
use qrlens_core::{
    AcceptOutcome, Clock, CropRegion, DecodeLocation, Facing, FitTransform, HistoryStorage,
    PermissionState, ScanError, ScanMode, ScanOrchestrator, Size,
};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Outcome of scanning a static image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageScan {
    /// One code, passed to the orchestrator.
    Accepted(AcceptOutcome),
    /// Several codes; nothing recorded until one is chosen.
    Choice(Vec<String>),
}

/// Crop `image` to `region`, given in percentages.
pub fn crop_image(image: &RgbaImage, region: CropRegion) -> RgbaImage {
    let (w, h) = image.dimensions();
    let (x, y, cw, ch) = region.to_pixels(Size::from((w, h))).snap(w, h);
    image::imageops::crop_imm(image, x, y, cw, ch).to_image()
}

/// Load an image file, mapping failures onto the user-facing taxonomy.
pub fn load_image(path: impl AsRef<Path>) -> Result<RgbaImage, ScanError> {
    let path = path.as_ref();
    load_image_file(path).map_err(|e| {
        tracing::warn!("Could not read {:?}: {}", path, e);
        ScanError::UnreadableImage(e.to_string())
    })
}

/// Extract codes from `image` and hand a single result to `orchestrator`.
pub fn scan_image<D, S, C>(
    extractor: &MultiCodeExtractor<D>,
    image: &RgbaImage,
    orchestrator: &mut ScanOrchestrator<S, C>,
) -> Result<ImageScan, ScanError>
where
    D: Decoder,
    S: HistoryStorage,
    C: Clock,
{
    match extractor.extract_outcome(image) {
        ExtractOutcome::NothingFound => Err(ScanError::DecodeNotFound),
        ExtractOutcome::Single(text) => Ok(ImageScan::Accepted(orchestrator.accept(&text))),
        ExtractOutcome::Choice(codes) => {
            tracing::info!("{} codes found, waiting for a choice", codes.len());
            Ok(ImageScan::Choice(codes))
        }
    }
}

/// Commit the code picked from a [`ImageScan::Choice`].
pub fn commit_choice<S: HistoryStorage, C: Clock>(
    orchestrator: &mut ScanOrchestrator<S, C>,
    codes: &[String],
    index: usize,
) -> Option<AcceptOutcome> {
    codes.get(index).map(|text| orchestrator.accept(text))
}

/// Open the camera according to the permission state.
///
/// Returns the mode to show. Permission denial, known up front or reported
/// by the device, lands in gallery-only mode; device failures are returned
/// so the caller can offer a retry.
pub fn acquire_camera<B: CameraBackend>(
    camera: &mut CameraSource<B>,
    facing: Facing,
    permission: PermissionState,
) -> Result<ScanMode, ScanError> {
    if ScanMode::for_permission(permission) == ScanMode::GalleryOnly {
        tracing::info!("Camera permission denied, using gallery-only mode");
        return Ok(ScanMode::GalleryOnly);
    }
    match camera.start(facing) {
        Ok(()) => Ok(ScanMode::LiveCamera),
        Err(CaptureError::PermissionDenied(msg)) => {
            tracing::info!("Camera permission refused on open: {}", msg);
            Ok(ScanMode::GalleryOnly)
        }
        Err(e) => Err(e.into()),
    }
}

/// A live decode accepted by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveHit {
    pub outcome: AcceptOutcome,
    /// Code corners in frame pixels, for drawing an overlay.
    pub location: DecodeLocation,
    pub frame_size: Size,
}

impl LiveHit {
    /// Overlay polygon for a preview of `display` size showing the frame with cover fit.
    pub fn overlay(&self, display: Size) -> DecodeLocation {
        FitTransform::cover(self.frame_size, display).map_location(&self.location)
    }
}

/// Drives the frame loop into the orchestrator.
pub struct LiveScanner<D: Decoder, K: FrameClock> {
    scan_loop: ScanLoop<D, K>,
}

impl<D: Decoder, K: FrameClock> LiveScanner<D, K> {
    pub fn new(scan_loop: ScanLoop<D, K>) -> Self {
        Self { scan_loop }
    }

    /// Scan until a decode is accepted, or `None` once cancelled.
    ///
    /// Decodes arriving during cooldown are dropped and scanning continues
    /// after the next frame clock tick. The loop stays disarmed after a
    /// result until the next call.
    pub async fn next_result<Src, S, C>(
        &mut self,
        source: &mut Src,
        orchestrator: &mut ScanOrchestrator<S, C>,
        cancel: &CancellationToken,
    ) -> Option<LiveHit>
    where
        Src: CaptureSource + ?Sized,
        S: HistoryStorage,
        C: Clock,
    {
        loop {
            self.scan_loop.rearm();
            match self.scan_loop.run(source, cancel).await {
                LoopEvent::Cancelled => return None,
                LoopEvent::Decoded(decoded) => match orchestrator.accept(&decoded.text) {
                    AcceptOutcome::Dropped => {
                        if !self.scan_loop.pause(cancel).await {
                            return None;
                        }
                    }
                    outcome => {
                        let frame_size = self
                            .scan_loop
                            .frame_size()
                            .map(Size::from)
                            .unwrap_or_default();
                        return Some(LiveHit {
                            outcome,
                            location: decoded.location,
                            frame_size,
                        });
                    }
                },
            }
        }
    }

    pub fn scan_loop(&self) -> &ScanLoop<D, K> {
        &self.scan_loop
    }
}
