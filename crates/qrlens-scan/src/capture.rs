//! Frame sources: a live camera or a static decoded image.
//!
//! The camera is reached through [`CameraBackend`], which hands out an
//! owned stream. [`CameraSource`] keeps at most one stream open, wrapped in
//! a [`StreamGuard`] whose `Drop` releases the device on every exit path.

use image::RgbaImage;
use qrlens_core::{CaptureDeviceState, CaptureErrorKind, Facing, HostCapabilities, ScanError};
use thiserror::Error;

/// Camera acquisition or capture failure.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The user or the OS refused camera access.
    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),
    /// No usable camera, or it could not be opened with the requested format.
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),
    /// A frame could not be read from an open stream.
    #[error("Frame capture failed: {0}")]
    Frame(String),
    /// Torch control failed on a device that claims to support it.
    #[error("Torch control failed: {0}")]
    Torch(String),
}

impl CaptureError {
    pub fn kind(&self) -> CaptureErrorKind {
        match self {
            CaptureError::PermissionDenied(_) => CaptureErrorKind::PermissionDenied,
            _ => CaptureErrorKind::DeviceUnavailable,
        }
    }
}

impl From<CaptureError> for ScanError {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::PermissionDenied(msg) => ScanError::PermissionDenied(msg),
            other => ScanError::DeviceUnavailable(other.to_string()),
        }
    }
}

/// Anything the frame loop can pull frames from.
pub trait CaptureSource {
    /// Frames can be pulled right now.
    fn is_ready(&self) -> bool;

    /// Latest frame, or `None` when not ready or the read failed.
    fn current_frame(&mut self) -> Option<RgbaImage>;
}

/// A single decoded image served as a frame.
#[derive(Debug, Clone)]
pub struct StaticImageSource {
    image: RgbaImage,
}

impl StaticImageSource {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

impl CaptureSource for StaticImageSource {
    fn is_ready(&self) -> bool {
        self.image.width() > 0 && self.image.height() > 0
    }

    fn current_frame(&mut self) -> Option<RgbaImage> {
        self.is_ready().then(|| self.image.clone())
    }
}

/// Constraints for opening a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamRequest {
    /// Preferred facing, or any camera when `None`.
    pub facing: Option<Facing>,
    /// Resolution hint, or the device default when `None`.
    pub resolution: Option<(u32, u32)>,
}

impl StreamRequest {
    pub fn preferred(facing: Facing, resolution: (u32, u32)) -> Self {
        Self {
            facing: Some(facing),
            resolution: Some(resolution),
        }
    }

    /// Any camera, any format.
    pub fn unconstrained() -> Self {
        Self::default()
    }
}

/// An open camera stream.
pub trait CameraStream {
    /// Human readable device name.
    fn name(&self) -> String;

    fn frame(&mut self) -> Result<RgbaImage, CaptureError>;

    fn torch_supported(&self) -> bool {
        false
    }

    fn set_torch(&mut self, _on: bool) -> Result<(), CaptureError> {
        Err(CaptureError::Torch("not supported".to_string()))
    }

    /// Release the device. Must be safe to call more than once.
    fn stop(&mut self);
}

/// Opens camera streams.
pub trait CameraBackend {
    type Stream: CameraStream;

    fn open(&mut self, request: &StreamRequest) -> Result<Self::Stream, CaptureError>;
}

/// Owns an open stream and stops it on drop.
pub struct StreamGuard<S: CameraStream> {
    stream: S,
}

impl<S: CameraStream> StreamGuard<S> {
    fn new(stream: S) -> Self {
        Self { stream }
    }
}

impl<S: CameraStream> std::ops::Deref for StreamGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.stream
    }
}

impl<S: CameraStream> std::ops::DerefMut for StreamGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.stream
    }
}

impl<S: CameraStream> Drop for StreamGuard<S> {
    fn drop(&mut self) {
        self.stream.stop();
        tracing::info!("Camera stream released");
    }
}

/// Live camera capture with a single owned stream.
pub struct CameraSource<B: CameraBackend> {
    backend: B,
    resolution: (u32, u32),
    stream: Option<StreamGuard<B::Stream>>,
    state: CaptureDeviceState,
}

impl<B: CameraBackend> CameraSource<B> {
    pub fn new(backend: B, resolution: (u32, u32)) -> Self {
        Self {
            backend,
            resolution,
            stream: None,
            state: CaptureDeviceState::default(),
        }
    }

    /// Open the camera, replacing any stream already open.
    ///
    /// Tries the preferred facing and resolution first, then any camera in
    /// any format. Permission failures are returned without a retry.
    pub fn start(&mut self, facing: Facing) -> Result<(), CaptureError> {
        self.stop();

        let preferred = StreamRequest::preferred(facing, self.resolution);
        let stream = match self.backend.open(&preferred) {
            Ok(stream) => stream,
            Err(e @ CaptureError::PermissionDenied(_)) => return Err(self.fail(e)),
            Err(e) => {
                tracing::warn!("Preferred camera request failed: {}, retrying unconstrained", e);
                match self.backend.open(&StreamRequest::unconstrained()) {
                    Ok(stream) => stream,
                    Err(e) => return Err(self.fail(e)),
                }
            }
        };

        tracing::info!("Camera opened: {}", stream.name());
        self.state = CaptureDeviceState {
            ready: true,
            torch_supported: stream.torch_supported(),
            torch_on: false,
            last_error: None,
        };
        self.stream = Some(StreamGuard::new(stream));
        Ok(())
    }

    fn fail(&mut self, e: CaptureError) -> CaptureError {
        tracing::warn!("Camera start failed: {}", e);
        self.state.last_error = Some(e.kind());
        e
    }

    /// Release the camera. Safe to call when nothing is open.
    pub fn stop(&mut self) {
        // Dropping the guard stops the stream.
        self.stream = None;
        self.state = CaptureDeviceState::default();
    }

    /// Switch the torch; a no-op when unsupported or when the toggle fails.
    pub fn set_torch(&mut self, on: bool) {
        let Some(stream) = self.stream.as_mut() else {
            tracing::debug!("Torch toggle ignored, camera not running");
            return;
        };
        if !self.state.torch_supported {
            tracing::info!("Torch not supported on this camera");
            return;
        }
        match stream.set_torch(on) {
            Ok(()) => self.state.torch_on = on,
            Err(e) => tracing::warn!("{}", e),
        }
    }

    pub fn toggle_torch(&mut self) {
        self.set_torch(!self.state.torch_on);
    }

    pub fn state(&self) -> CaptureDeviceState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    /// `probed` with torch support taken from the open device.
    pub fn host_capabilities(&self, probed: HostCapabilities) -> HostCapabilities {
        HostCapabilities {
            torch: self.state.torch_supported,
            ..probed
        }
    }
}

impl<B: CameraBackend> CaptureSource for CameraSource<B> {
    fn is_ready(&self) -> bool {
        self.state.ready && self.stream.is_some()
    }

    fn current_frame(&mut self) -> Option<RgbaImage> {
        let stream = self.stream.as_mut()?;
        match stream.frame() {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        }
    }
}

impl<B: CameraBackend> Drop for CameraSource<B> {
    fn drop(&mut self) {
        self.stop();
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeBackend;
    use super::*;
    use pretty_assertions::assert_eq;

    fn blank() -> RgbaImage {
        RgbaImage::from_pixel(8, 8, image::Rgba([255, 255, 255, 255]))
    }

    #[test]
    fn test_static_source_serves_image() {
        let mut source = StaticImageSource::new(blank());
        assert!(source.is_ready());
        assert_eq!(source.current_frame().map(|f| f.width()), Some(8));
    }

    #[test]
    fn test_empty_static_source_not_ready() {
        let mut source = StaticImageSource::new(RgbaImage::new(0, 0));
        assert!(!source.is_ready());
        assert!(source.current_frame().is_none());
    }

    #[test]
    fn test_start_uses_preferred_request() {
        let backend = FakeBackend::new(blank());
        let log = backend.log.clone();
        let mut camera = CameraSource::new(backend, (1280, 720));

        camera.start(Facing::Environment).unwrap();
        assert!(camera.is_ready());
        assert_eq!(
            log.borrow().requests,
            vec![StreamRequest::preferred(Facing::Environment, (1280, 720))]
        );
    }

    #[test]
    fn test_device_unavailable_falls_back_once() {
        let backend = FakeBackend::new(blank()).script(vec![
            Err(CaptureError::DeviceUnavailable("no rear camera".into())),
            Ok(()),
        ]);
        let log = backend.log.clone();
        let mut camera = CameraSource::new(backend, (1280, 720));

        camera.start(Facing::Environment).unwrap();
        let requests = log.borrow().requests.clone();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1], StreamRequest::unconstrained());
        assert!(camera.state().ready);
    }

    #[test]
    fn test_fallback_failure_is_terminal() {
        let backend = FakeBackend::new(blank()).script(vec![
            Err(CaptureError::DeviceUnavailable("a".into())),
            Err(CaptureError::DeviceUnavailable("b".into())),
        ]);
        let log = backend.log.clone();
        let mut camera = CameraSource::new(backend, (1280, 720));

        assert!(matches!(
            camera.start(Facing::Environment),
            Err(CaptureError::DeviceUnavailable(_))
        ));
        assert_eq!(log.borrow().requests.len(), 2);
        assert!(!camera.is_ready());
        assert_eq!(
            camera.state().last_error,
            Some(CaptureErrorKind::DeviceUnavailable)
        );
    }

    #[test]
    fn test_permission_denied_not_retried() {
        let backend = FakeBackend::new(blank())
            .script(vec![Err(CaptureError::PermissionDenied("denied".into()))]);
        let log = backend.log.clone();
        let mut camera = CameraSource::new(backend, (1280, 720));

        let err = camera.start(Facing::Environment).unwrap_err();
        assert_eq!(err.kind(), CaptureErrorKind::PermissionDenied);
        assert_eq!(log.borrow().requests.len(), 1);
        assert_eq!(
            camera.state().last_error,
            Some(CaptureErrorKind::PermissionDenied)
        );
    }

    #[test]
    fn test_restart_releases_previous_stream() {
        let backend = FakeBackend::new(blank());
        let log = backend.log.clone();
        let mut camera = CameraSource::new(backend, (1280, 720));

        camera.start(Facing::Environment).unwrap();
        camera.start(Facing::User).unwrap();
        assert_eq!(log.borrow().open_streams, 1);
        assert_eq!(log.borrow().stops, 1);
    }

    #[test]
    fn test_stop_is_idempotent_and_resets_state() {
        let mut backend = FakeBackend::new(blank());
        backend.torch = true;
        let log = backend.log.clone();
        let mut camera = CameraSource::new(backend, (1280, 720));

        camera.start(Facing::Environment).unwrap();
        camera.toggle_torch();
        assert!(camera.state().torch_on);

        camera.stop();
        camera.stop();
        assert_eq!(camera.state(), CaptureDeviceState::default());
        assert_eq!(log.borrow().stops, 1);
        assert!(camera.current_frame().is_none());
    }

    #[test]
    fn test_drop_releases_device() {
        let backend = FakeBackend::new(blank());
        let log = backend.log.clone();
        {
            let mut camera = CameraSource::new(backend, (1280, 720));
            camera.start(Facing::Environment).unwrap();
            assert_eq!(log.borrow().open_streams, 1);
        }
        assert_eq!(log.borrow().open_streams, 0);
    }

    #[test]
    fn test_torch_unsupported_is_noop() {
        let backend = FakeBackend::new(blank());
        let mut camera = CameraSource::new(backend, (1280, 720));
        camera.set_torch(true);
        assert!(!camera.state().torch_on);

        camera.start(Facing::Environment).unwrap();
        camera.set_torch(true);
        assert!(!camera.state().torch_supported);
        assert!(!camera.state().torch_on);
    }

    #[test]
    fn test_host_capabilities_follow_open_device() {
        let probed = HostCapabilities {
            share: true,
            ..HostCapabilities::default()
        };
        let mut backend = FakeBackend::new(blank());
        backend.torch = true;
        let mut camera = CameraSource::new(backend, (1280, 720));
        assert!(!camera.host_capabilities(probed).torch);

        camera.start(Facing::Environment).unwrap();
        let caps = camera.host_capabilities(probed);
        assert!(caps.torch);
        assert!(caps.share);

        camera.stop();
        assert!(!camera.host_capabilities(probed).torch);
    }

    #[test]
    fn test_capture_error_to_scan_error() {
        let e: ScanError = CaptureError::Frame("boom".into()).into();
        assert!(e.is_retriable());
        let e: ScanError = CaptureError::PermissionDenied("no".into()).into();
        assert!(!e.is_retriable());
    }
}
