//! Two-shot object capture: a picture with the object, a dwell while it is
//! taken away, a picture of the bare background, then the difference mask
//! folded into the first picture.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use lighthouse_camera::{CameraError, CameraResult, Configuration, FrameStream};
use lighthouse_types::{FrameError, ImageFrame};
use lighthouse_vision::BackgroundIsolator;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::event_loop::CancelToken;
use crate::feedback::{FeedbackSink, TelemetryEvent};

pub const DEFAULT_DWELL: Duration = Duration::from_millis(1000);
/// Time a recorded frame stands for when a dwell is realized by reading.
pub const RECORDED_FRAME_DURATION: Duration = Duration::from_millis(16);
const LIVE_POLL: Duration = Duration::from_millis(50);

const TELEMETRY_CATEGORY: &str = "vision";

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture aborted by a newer task")]
    Aborted,

    #[error("no camera available: {0}")]
    NoCamera(CameraError),

    #[error("capture failed: {message}")]
    Failed { message: String },
}

impl CaptureError {
    fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

impl From<FrameError> for CaptureError {
    fn from(err: FrameError) -> Self {
        Self::failed(err.to_string())
    }
}

/// Where camera streams come from. Opened once per capture.
pub trait CameraSource: Send {
    fn open(&mut self) -> CameraResult<FrameStream>;
}

impl CameraSource for Configuration {
    fn open(&mut self) -> CameraResult<FrameStream> {
        self.open_default_or_fallback()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePurpose {
    Record,
    Identify,
}

impl CapturePurpose {
    fn action(self) -> &'static str {
        match self {
            CapturePurpose::Record => "record_object",
            CapturePurpose::Identify => "identify_object",
        }
    }

    fn frame_label(self) -> &'static str {
        match self {
            CapturePurpose::Record => "CaptureForRecord",
            CapturePurpose::Identify => "CaptureForIdentification",
        }
    }
}

pub struct CaptureOrchestrator {
    source: Box<dyn CameraSource>,
    isolator: BackgroundIsolator,
    dwell: Duration,
    feedback: Arc<dyn FeedbackSink>,
}

impl CaptureOrchestrator {
    pub fn new(
        source: Box<dyn CameraSource>,
        isolator: BackgroundIsolator,
        dwell: Duration,
        feedback: Arc<dyn FeedbackSink>,
    ) -> Self {
        Self {
            source,
            isolator,
            dwell,
            feedback,
        }
    }

    pub fn acquire_for_record(&mut self, cancel: &CancelToken) -> Result<ImageFrame, CaptureError> {
        self.acquire(CapturePurpose::Record, cancel)
    }

    pub fn acquire_for_identify(
        &mut self,
        cancel: &CancelToken,
    ) -> Result<ImageFrame, CaptureError> {
        self.acquire(CapturePurpose::Identify, cancel)
    }

    fn acquire(
        &mut self,
        purpose: CapturePurpose,
        cancel: &CancelToken,
    ) -> Result<ImageFrame, CaptureError> {
        let result = self.two_shot(purpose, cancel);
        match &result {
            Ok(frame) => {
                info!(
                    purpose = purpose.action(),
                    width = frame.width(),
                    height = frame.height(),
                    "capture complete"
                );
                self.feedback.received_frame(purpose.frame_label(), frame);
                self.feedback
                    .record_telemetry(TelemetryEvent::new(TELEMETRY_CATEGORY, purpose.action(), "ok"));
            }
            Err(CaptureError::Aborted) => {
                debug!(purpose = purpose.action(), "capture aborted");
            }
            Err(err) => {
                warn!(purpose = purpose.action(), error = %err, "capture failed");
                self.feedback.record_telemetry(
                    TelemetryEvent::new(TELEMETRY_CATEGORY, purpose.action(), "errcode")
                        .with_measure(1),
                );
            }
        }
        result
    }

    fn two_shot(
        &mut self,
        purpose: CapturePurpose,
        cancel: &CancelToken,
    ) -> Result<ImageFrame, CaptureError> {
        check(cancel)?;
        let mut stream = self.source.open().map_err(|err| match err {
            CameraError::NoCamera { .. } => CaptureError::NoCamera(err),
            other => CaptureError::failed(other.to_string()),
        })?;
        debug!(purpose = purpose.action(), backend = %stream.backend(), "camera opened");

        self.feedback.play_sound_named("register_step1");
        let with_object = self.take_picture(&mut stream)?;
        check(cancel)?;

        self.feedback.play_sound_named("register_step2");
        self.dwell(&mut stream, cancel)?;
        check(cancel)?;

        let background = self.take_picture(&mut stream)?;
        let mask = self.isolator.isolate(&with_object, &background)?;
        debug!(
            foreground = mask.foreground_fraction(),
            "background isolated"
        );
        check(cancel)?;
        Ok(with_object.with_mask(&mask)?)
    }

    fn take_picture(&self, stream: &mut FrameStream) -> Result<ImageFrame, CaptureError> {
        let frame = match stream.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                self.feedback.cannot_take_picture();
                return Err(CaptureError::failed("camera stream ended"));
            }
            Err(err) => {
                self.feedback.cannot_take_picture();
                return Err(CaptureError::failed(err.to_string()));
            }
        };
        self.feedback.play_sound_named("shutter");
        self.feedback.received_frame("TakePicture", &frame);
        Ok(frame)
    }

    // Recorded sources only move forward when read, so the dwell consumes
    // frames instead of sleeping.
    fn dwell(&self, stream: &mut FrameStream, cancel: &CancelToken) -> Result<(), CaptureError> {
        if stream.is_recorded() {
            let frames = (self.dwell.as_millis() / RECORDED_FRAME_DURATION.as_millis()) as usize;
            for _ in 0..frames {
                check(cancel)?;
                match stream.read_frame() {
                    Ok(Some(_)) => {}
                    Ok(None) => break,
                    Err(err) => return Err(CaptureError::failed(err.to_string())),
                }
            }
            return Ok(());
        }
        let mut remaining = self.dwell;
        while !remaining.is_zero() {
            let step = remaining.min(LIVE_POLL);
            thread::sleep(step);
            remaining -= step;
            check(cancel)?;
        }
        Ok(())
    }
}

fn check(cancel: &CancelToken) -> Result<(), CaptureError> {
    if cancel.is_cancelled() {
        Err(CaptureError::Aborted)
    } else {
        Ok(())
    }
}
