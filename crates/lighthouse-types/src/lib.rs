//! Shared domain models for the lighthouse workspace.
//!
//! This crate centralizes lightweight data structures used across the camera,
//! vision, matching, and appliance crates. Keep it backend-agnostic and avoid
//! image codecs or platform dependencies so every crate can depend on it.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type FrameResult<T> = Result<T, FrameError>;

/// Row-major RGBA pixel buffer. The fourth channel doubles as the
/// foreground mask once a capture has been isolated.
#[derive(Clone, PartialEq)]
pub struct ImageFrame {
    width: u32,
    height: u32,
    data: Arc<[u8]>,
}

impl fmt::Debug for ImageFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl ImageFrame {
    pub const CHANNELS: usize = 4;

    pub fn from_owned(width: u32, height: u32, data: Vec<u8>) -> FrameResult<Self> {
        let required = required_len(width, height, Self::CHANNELS)?;
        if data.len() != required {
            return Err(FrameError::InvalidFrame {
                reason: format!(
                    "expected {} RGBA bytes for {}x{}, got {}",
                    required,
                    width,
                    height,
                    data.len()
                ),
            });
        }
        Ok(Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
        })
    }

    /// Builds a frame from gray, RGB or RGBA samples, adding an opaque alpha
    /// channel when the source has none.
    pub fn from_channels(
        width: u32,
        height: u32,
        channels: usize,
        data: &[u8],
    ) -> FrameResult<Self> {
        let required = required_len(width, height, channels)?;
        if data.len() < required {
            return Err(FrameError::InvalidFrame {
                reason: format!(
                    "insufficient pixel bytes: got {} expected at least {}",
                    data.len(),
                    required
                ),
            });
        }
        let data = &data[..required];
        let rgba = match channels {
            4 => data.to_vec(),
            3 => data
                .chunks_exact(3)
                .flat_map(|px| [px[0], px[1], px[2], 255])
                .collect(),
            1 => data.iter().flat_map(|&v| [v, v, v, 255]).collect(),
            other => {
                return Err(FrameError::UnsupportedChannels { channels: other });
            }
        };
        Self::from_owned(width, height, rgba)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]
    }

    pub fn alpha(&self) -> Vec<u8> {
        self.data.chunks_exact(Self::CHANNELS).map(|px| px[3]).collect()
    }

    /// BT.601 luma of the color channels.
    pub fn luma(&self) -> Vec<u8> {
        self.data
            .chunks_exact(Self::CHANNELS)
            .map(|px| {
                let value = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
                value.round().clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    pub fn rgb(&self) -> Vec<u8> {
        self.data
            .chunks_exact(Self::CHANNELS)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect()
    }

    /// Applies `mask` to every channel and stores it as the alpha channel.
    pub fn with_mask(&self, mask: &Mask) -> FrameResult<Self> {
        if mask.width() != self.width || mask.height() != self.height {
            return Err(FrameError::DimensionMismatch {
                expected: (self.width, self.height),
                actual: (mask.width(), mask.height()),
            });
        }
        let mut data = self.data.to_vec();
        for (px, &m) in data.chunks_exact_mut(Self::CHANNELS).zip(mask.data()) {
            px[0] &= m;
            px[1] &= m;
            px[2] &= m;
            px[3] = m;
        }
        Self::from_owned(self.width, self.height, data)
    }
}

fn required_len(width: u32, height: u32, channels: usize) -> FrameResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(channels))
        .ok_or_else(|| FrameError::InvalidFrame {
            reason: "calculated frame length overflowed".into(),
        })
}

/// Single-channel binary mask, 0 for background and 255 for foreground.
#[derive(Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl fmt::Debug for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mask")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("foreground", &self.foreground_pixels())
            .finish()
    }
}

impl Mask {
    pub const FOREGROUND: u8 = 255;

    pub fn new(width: u32, height: u32, data: Vec<u8>) -> FrameResult<Self> {
        let required = required_len(width, height, 1)?;
        if data.len() != required {
            return Err(FrameError::InvalidFrame {
                reason: format!(
                    "expected {} mask bytes for {}x{}, got {}",
                    required,
                    width,
                    height,
                    data.len()
                ),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        self.data[y as usize * self.width as usize + x as usize] != 0
    }

    pub fn foreground_pixels(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    pub fn foreground_fraction(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.foreground_pixels() as f32 / self.data.len() as f32
    }
}

/// A detected interest point. Coordinates are expressed in the full
/// resolution frame regardless of the pyramid level it was found on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub angle: f32,
    pub response: f32,
    pub octave: i32,
    pub class_id: i32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, size: f32) -> Self {
        Self {
            x,
            y,
            size,
            angle: -1.0,
            response: 0.0,
            octave: 0,
            class_id: -1,
        }
    }
}

/// Unit of work understood by the appliance event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    Wait,
    Record,
    Identify,
    Shutdown,
}

impl Task {
    pub fn code(self) -> u8 {
        match self {
            Task::Wait => 0,
            Task::Record => 1,
            Task::Identify => 2,
            Task::Shutdown => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Task::Wait),
            1 => Some(Task::Record),
            2 => Some(Task::Identify),
            3 => Some(Task::Shutdown),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Task::Wait => "wait",
            Task::Record => "record",
            Task::Identify => "identify",
            Task::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid frame: {reason}")]
    InvalidFrame { reason: String },

    #[error("unsupported channel count {channels}")]
    UnsupportedChannels { channels: usize },

    #[error("dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}
