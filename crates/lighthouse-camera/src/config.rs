use std::env;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};

use crate::backends::{clip::ClipProvider, device::DeviceProvider, mock::MockProvider};
use crate::core::{CameraError, CameraResult, DynCameraProvider, FrameStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Mock,
    Clip,
    Device,
}

impl FromStr for Backend {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mock" => Ok(Backend::Mock),
            "clip" => Ok(Backend::Clip),
            "device" | "camera" => Ok(Backend::Device),
            other => Err(CameraError::configuration(format!(
                "unknown backend '{other}'"
            ))),
        }
    }
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Mock => "mock",
            Backend::Clip => "clip",
            Backend::Device => "device",
        }
    }

    /// Order in which backends are attempted when the preferred one fails.
    pub fn fallback_order() -> [Backend; 3] {
        [Backend::Device, Backend::Clip, Backend::Mock]
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default capture command; emits raw RGBA frames on stdout.
pub const DEFAULT_DEVICE_COMMAND: &str =
    "ffmpeg -loglevel quiet -f v4l2 -video_size 640x480 -i /dev/video0 -f rawvideo -pix_fmt rgba -";

#[derive(Debug, Clone)]
pub struct Configuration {
    pub backend: Backend,
    /// Clip directory used by the clip backend.
    pub input: Option<PathBuf>,
    /// Bundled sample clip substituted when no camera is available.
    pub fallback_clip: Option<PathBuf>,
    pub device_command: String,
    pub device_width: u32,
    pub device_height: u32,
    pub channel_capacity: Option<NonZeroUsize>,
    /// Pause between frames emitted by recorded sources.
    pub frame_interval: Duration,
    pub mock_seed: u64,
    /// Number of leading mock frames that show the object.
    pub mock_object_frames: usize,
    pub mock_frame_count: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            backend: Backend::Device,
            input: None,
            fallback_clip: None,
            device_command: DEFAULT_DEVICE_COMMAND.to_string(),
            device_width: 640,
            device_height: 480,
            channel_capacity: None,
            frame_interval: Duration::ZERO,
            mock_seed: 1,
            mock_object_frames: 1,
            mock_frame_count: 240,
        }
    }
}

impl Configuration {
    pub fn from_env() -> CameraResult<Self> {
        let mut config = Configuration::default();
        if let Ok(backend) = env::var("LIGHTHOUSE_BACKEND") {
            config.backend = Backend::from_str(&backend)?;
        }
        if let Ok(path) = env::var("LIGHTHOUSE_INPUT") {
            config.input = Some(PathBuf::from(path));
        }
        if let Ok(command) = env::var("LIGHTHOUSE_DEVICE_COMMAND") {
            config.device_command = command;
        }
        if let Ok(capacity) = env::var("LIGHTHOUSE_CHANNEL_CAPACITY") {
            let parsed: usize = capacity.parse().map_err(|_| {
                CameraError::configuration(format!(
                    "failed to parse LIGHTHOUSE_CHANNEL_CAPACITY='{capacity}' as a positive integer"
                ))
            })?;
            let Some(value) = NonZeroUsize::new(parsed) else {
                return Err(CameraError::configuration(
                    "LIGHTHOUSE_CHANNEL_CAPACITY must be greater than zero",
                ));
            };
            config.channel_capacity = Some(value);
        }
        Ok(config)
    }

    pub fn create_provider(&self, backend: Backend) -> CameraResult<DynCameraProvider> {
        let capacity = self.channel_capacity.map(NonZeroUsize::get);
        match backend {
            Backend::Mock => Ok(Box::new(MockProvider::new(self, capacity))),
            Backend::Clip => {
                let path = self
                    .input
                    .clone()
                    .or_else(|| self.fallback_clip.clone())
                    .ok_or_else(|| {
                        CameraError::configuration("clip backend requires LIGHTHOUSE_INPUT")
                    })?;
                Ok(Box::new(ClipProvider::new(
                    path,
                    self.frame_interval,
                    capacity,
                )?))
            }
            Backend::Device => Ok(Box::new(DeviceProvider::new(self, capacity)?)),
        }
    }

    /// Opens the configured backend, walking the fallback order when it
    /// cannot produce a stream.
    pub fn open_default_or_fallback(&self) -> CameraResult<FrameStream> {
        let mut tried = Vec::new();
        let candidates = std::iter::once(self.backend).chain(
            Backend::fallback_order()
                .into_iter()
                .filter(|backend| *backend != self.backend),
        );
        for backend in candidates {
            if backend == Backend::Clip && self.input.is_none() && self.fallback_clip.is_none() {
                continue;
            }
            tried.push(backend.as_str());
            match self.create_provider(backend).and_then(|provider| provider.open()) {
                Ok(stream) => {
                    if backend != self.backend {
                        info!(
                            "camera backend '{}' unavailable; using '{}'",
                            self.backend, backend
                        );
                    }
                    return Ok(stream);
                }
                Err(err) => {
                    warn!("camera backend '{}' failed to open: {err}", backend);
                }
            }
        }
        Err(CameraError::NoCamera {
            tried: tried.join(", "),
        })
    }
}
