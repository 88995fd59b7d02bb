use std::path::PathBuf;
use std::thread;

use lighthouse_types::{FrameError, ImageFrame};
use thiserror::Error;
use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::config::Backend;

pub type CameraResult<T> = Result<T, CameraError>;

pub type DynCameraProvider = Box<dyn CameraProvider>;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("backend {backend} is not supported in this build")]
    Unsupported { backend: &'static str },

    #[error("{backend} backend failed: {message}")]
    BackendFailure {
        backend: &'static str,
        message: String,
    },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("no camera source could be opened (tried {tried})")]
    NoCamera { tried: String },

    #[error("failed to decode image {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    #[error("failed to encode image: {message}")]
    Encode { message: String },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CameraError {
    pub fn unsupported(backend: &'static str) -> Self {
        Self::Unsupported { backend }
    }

    pub fn backend_failure(backend: &'static str, message: impl Into<String>) -> Self {
        Self::BackendFailure {
            backend,
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

pub trait CameraProvider: Send + 'static {
    fn backend(&self) -> Backend;

    fn open(self: Box<Self>) -> CameraResult<FrameStream>;
}

/// Blocking reader over frames produced by a camera backend thread.
///
/// Dropping the stream closes the channel, which stops the producer.
pub struct FrameStream {
    backend: Backend,
    recorded: bool,
    receiver: Receiver<CameraResult<ImageFrame>>,
}

impl FrameStream {
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Recorded sources (clips, synthetic scenes) only advance when frames are
    /// read, so wall-clock waits have to be realized by consuming frames.
    pub fn is_recorded(&self) -> bool {
        self.recorded
    }

    /// Returns `Ok(None)` once the source has no more frames.
    ///
    /// Must not be called from inside an async runtime.
    pub fn read_frame(&mut self) -> CameraResult<Option<ImageFrame>> {
        match self.receiver.blocking_recv() {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(err)) => Err(err),
            None => Ok(None),
        }
    }
}

pub fn spawn_stream_from_channel(
    backend: Backend,
    recorded: bool,
    capacity: usize,
    task: impl FnOnce(Sender<CameraResult<ImageFrame>>) + Send + 'static,
) -> CameraResult<FrameStream> {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    thread::Builder::new()
        .name(format!("camera-{}", backend.as_str()))
        .spawn(move || task(tx))?;
    Ok(FrameStream {
        backend,
        recorded,
        receiver: rx,
    })
}
