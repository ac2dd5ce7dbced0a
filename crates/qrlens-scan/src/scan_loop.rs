//! Cooperative frame scan loop.
//!
//! Each tick pulls one frame from a [`CaptureSource`] and decodes it with
//! both polarities. The loop suspends on a [`FrameClock`] between ticks and
//! races every suspension against a cancellation token. After a decode it
//! stops consuming frames until [`ScanLoop::rearm`] is called.

use crate::capture::CaptureSource;
use crate::decoder::{Decoded, Decoder, InvertPolicy};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Paces the loop between frames.
#[allow(async_fn_in_trait)]
pub trait FrameClock {
    /// Suspend until the next frame is due.
    async fn tick(&mut self);
}

/// Fixed-rate clock backed by a tokio interval.
#[derive(Debug)]
pub struct IntervalClock {
    interval: Interval,
}

impl IntervalClock {
    /// Must be called inside a tokio runtime.
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

impl FrameClock for IntervalClock {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

/// Result of a single tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Source not ready or loop disarmed; no frame consumed.
    Skipped,
    /// A frame was decoded with no usable text.
    Miss,
    Decoded(Decoded),
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    Decoded(Decoded),
    Cancelled,
}

/// Frame loop state.
pub struct ScanLoop<D: Decoder, K: FrameClock> {
    decoder: D,
    clock: K,
    armed: bool,
    frames: u64,
    frame_size: Option<(u32, u32)>,
}

impl<D: Decoder, K: FrameClock> ScanLoop<D, K> {
    pub fn new(decoder: D, clock: K) -> Self {
        Self {
            decoder,
            clock,
            armed: true,
            frames: 0,
            frame_size: None,
        }
    }

    /// Run one step against `source`.
    pub fn tick<S: CaptureSource + ?Sized>(&mut self, source: &mut S) -> TickOutcome {
        if !self.armed || !source.is_ready() {
            return TickOutcome::Skipped;
        }
        let Some(frame) = source.current_frame() else {
            return TickOutcome::Skipped;
        };
        self.frames += 1;
        self.frame_size = Some(frame.dimensions());

        match self.decoder.decode(&frame, InvertPolicy::AttemptBoth) {
            Some(decoded) if !decoded.text.trim().is_empty() => {
                tracing::info!("Frame {} decoded ({} chars)", self.frames, decoded.text.len());
                self.armed = false;
                TickOutcome::Decoded(decoded)
            }
            Some(_) => {
                tracing::debug!("Frame {} decoded to empty text, ignoring", self.frames);
                TickOutcome::Miss
            }
            None => {
                tracing::trace!("Frame {}: no code", self.frames);
                TickOutcome::Miss
            }
        }
    }

    /// Tick until a decode or until `cancel` fires.
    pub async fn run<S: CaptureSource + ?Sized>(
        &mut self,
        source: &mut S,
        cancel: &CancellationToken,
    ) -> LoopEvent {
        loop {
            if cancel.is_cancelled() {
                tracing::debug!("Scan loop cancelled");
                return LoopEvent::Cancelled;
            }
            if let TickOutcome::Decoded(decoded) = self.tick(source) {
                return LoopEvent::Decoded(decoded);
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("Scan loop cancelled while waiting for frame");
                    return LoopEvent::Cancelled;
                }
                _ = self.clock.tick() => {}
            }
        }
    }

    /// Wait for one frame clock tick. Returns false if `cancel` fired first.
    pub async fn pause(&mut self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = self.clock.tick() => true,
        }
    }

    /// Resume consuming frames after a decode.
    pub fn rearm(&mut self) {
        self.armed = true;
    }

    /// Stop consuming frames without ending a run.
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Frames consumed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Dimensions of the last frame consumed.
    pub fn frame_size(&self) -> Option<(u32, u32)> {
        self.frame_size
    }
}
