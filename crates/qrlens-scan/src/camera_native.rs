//! Native camera backend using nokhwa.

use crate::capture::{CameraBackend, CameraStream, CaptureError, StreamRequest};
use crate::decoder::rgb_to_rgba;
use image::RgbaImage;
use nokhwa::Camera;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};

/// Opens cameras through the platform capture API.
#[derive(Debug, Default)]
pub struct NokhwaBackend;

impl NokhwaBackend {
    pub fn new() -> Self {
        Self
    }

    /// Pick a device for the requested facing by matching its name.
    ///
    /// Desktop capture APIs do not report facing, so this falls back to the
    /// first device when no name matches.
    fn select_index(request: &StreamRequest) -> CameraIndex {
        let Some(facing) = request.facing else {
            return CameraIndex::Index(0);
        };
        let devices = match nokhwa::query(ApiBackend::Auto) {
            Ok(devices) => devices,
            Err(e) => {
                tracing::debug!("Camera query failed: {}", e);
                return CameraIndex::Index(0);
            }
        };
        devices
            .iter()
            .find(|info| {
                let name = info.human_name().to_lowercase();
                facing.name_hints().iter().any(|hint| name.contains(hint))
            })
            .map(|info| info.index().clone())
            .unwrap_or(CameraIndex::Index(0))
    }

    fn requested_format(request: &StreamRequest) -> RequestedFormat<'static> {
        match request.resolution {
            Some((width, height)) => RequestedFormat::new::<RgbFormat>(
                RequestedFormatType::Closest(CameraFormat::new(
                    Resolution::new(width, height),
                    FrameFormat::MJPEG,
                    30,
                )),
            ),
            None => RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
        }
    }
}

/// Map a nokhwa failure onto the capture taxonomy.
fn open_error(e: nokhwa::NokhwaError) -> CaptureError {
    let message = e.to_string();
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("not authorized") || lower.contains("denied")
    {
        CaptureError::PermissionDenied(message)
    } else {
        CaptureError::DeviceUnavailable(message)
    }
}

impl CameraBackend for NokhwaBackend {
    type Stream = NokhwaStream;

    fn open(&mut self, request: &StreamRequest) -> Result<NokhwaStream, CaptureError> {
        let index = Self::select_index(request);
        tracing::info!("Opening camera {:?} with {:?}", index, request);

        let mut camera = Camera::new(index, Self::requested_format(request)).map_err(open_error)?;
        camera.open_stream().map_err(open_error)?;

        tracing::info!(
            "Camera opened: {:?} at {:?}",
            camera.info().human_name(),
            camera.resolution()
        );
        Ok(NokhwaStream {
            camera,
            streaming: true,
        })
    }
}

/// An open nokhwa stream.
pub struct NokhwaStream {
    camera: Camera,
    streaming: bool,
}

impl CameraStream for NokhwaStream {
    fn name(&self) -> String {
        self.camera.info().human_name()
    }

    fn frame(&mut self) -> Result<RgbaImage, CaptureError> {
        let frame = self
            .camera
            .frame()
            .map_err(|e| CaptureError::Frame(e.to_string()))?;
        let decoded = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| CaptureError::Frame(e.to_string()))?;

        let width = decoded.width();
        let height = decoded.height();
        rgb_to_rgba(width, height, &decoded.into_raw())
            .ok_or_else(|| CaptureError::Frame(format!("short frame buffer for {width}x{height}")))
    }

    // nokhwa exposes no flashlight control; the trait defaults report
    // torch as unsupported.

    fn stop(&mut self) {
        if !self.streaming {
            return;
        }
        self.streaming = false;
        if let Err(e) = self.camera.stop_stream() {
            tracing::warn!("Failed to stop camera stream: {}", e);
        }
    }
}
