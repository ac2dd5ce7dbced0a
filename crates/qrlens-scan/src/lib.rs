//! Capture, decoding and image flows for qrlens.
//!
//! This crate provides:
//! - rqrr-backed decoding with polarity handling (`decoder` module)
//! - Camera and static image frame sources (`capture` module)
//! - The cancelable frame scan loop (`scan_loop` module)
//! - Multi-code extraction and interactive cropping (`extractor`, `cropper` modules)
//! - AI explanations of decoded payloads (`explain` module)
//! - Camera permission probing (`permission` module)
//! - Image and camera flows into the orchestrator (`pipeline` module)
//!
//! With the `camera` feature enabled:
//! - A nokhwa camera backend (`camera_native` module)

pub mod capture;
pub mod cropper;
pub mod decoder;
pub mod explain;
pub mod extractor;
pub mod permission;
pub mod pipeline;
pub mod scan_loop;

#[cfg(feature = "camera")]
pub mod camera_native;

#[cfg(test)]
pub(crate) mod test_support;

pub use capture::{
    CameraBackend, CameraSource, CameraStream, CaptureError, CaptureSource, StaticImageSource,
    StreamGuard, StreamRequest,
};
pub use cropper::{CropSession, DragMode};
pub use decoder::{DecodeError, Decoded, Decoder, InvertPolicy, RqrrDecoder};
pub use explain::{Explainer, ExplanationState, GeminiSummarizer, Summarizer};
pub use extractor::{ExtractOutcome, MultiCodeExtractor};
pub use pipeline::{ImageScan, LiveHit, LiveScanner};
pub use scan_loop::{FrameClock, IntervalClock, LoopEvent, ScanLoop};

#[cfg(feature = "camera")]
pub use camera_native::NokhwaBackend;
