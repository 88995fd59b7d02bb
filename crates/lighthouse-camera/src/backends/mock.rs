use std::thread;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc::Sender;

use crate::config::{Backend, Configuration};
use crate::core::{CameraProvider, CameraResult, FrameStream, spawn_stream_from_channel};
use lighthouse_types::ImageFrame;

/// Synthetic scene: a seeded, blocky textured object on a smooth background
/// for the first `object_frames` frames, then the background alone.
pub struct MockProvider {
    width: u32,
    height: u32,
    seed: u64,
    object_frames: usize,
    frame_count: usize,
    frame_interval: Duration,
    channel_capacity: usize,
}

impl MockProvider {
    const DEFAULT_CHANNEL_CAPACITY: usize = 2;
    const BLOCK: u32 = 8;

    pub fn new(config: &Configuration, capacity: Option<usize>) -> Self {
        Self {
            width: 320,
            height: 240,
            seed: config.mock_seed,
            object_frames: config.mock_object_frames,
            frame_count: config.mock_frame_count,
            frame_interval: config.frame_interval,
            channel_capacity: capacity.unwrap_or(Self::DEFAULT_CHANNEL_CAPACITY).max(1),
        }
    }

    pub fn background(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for y in 0..self.height {
            for x in 0..self.width {
                let r = (60 + x * 60 / self.width.max(1)) as u8;
                let g = (80 + y * 40 / self.height.max(1)) as u8;
                buffer.extend_from_slice(&[r, g, 110, 255]);
            }
        }
        buffer
    }

    /// Paints the object into `buffer`. The texture depends only on the seed.
    pub fn paint_object(&self, buffer: &mut [u8]) {
        let side = (self.width.min(self.height) / 2 / Self::BLOCK) * Self::BLOCK;
        let left = (self.width - side) / 2;
        let top = (self.height - side) / 2;
        let blocks = (side / Self::BLOCK) as usize;
        let mut rng = SmallRng::seed_from_u64(self.seed);
        let palette: Vec<[u8; 3]> = (0..blocks * blocks)
            .map(|_| [rng.random(), rng.random(), rng.random()])
            .collect();
        for y in top..top + side {
            for x in left..left + side {
                let bx = ((x - left) / Self::BLOCK) as usize;
                let by = ((y - top) / Self::BLOCK) as usize;
                let color = palette[by * blocks + bx];
                let offset = (y as usize * self.width as usize + x as usize) * 4;
                buffer[offset..offset + 3].copy_from_slice(&color);
            }
        }
    }

    fn emit_frames(&self, tx: Sender<CameraResult<ImageFrame>>) {
        let background = self.background();
        let mut with_object = background.clone();
        self.paint_object(&mut with_object);

        for index in 0..self.frame_count {
            if tx.is_closed() {
                break;
            }
            let pixels = if index < self.object_frames {
                with_object.clone()
            } else {
                background.clone()
            };
            let frame = ImageFrame::from_owned(self.width, self.height, pixels).map_err(Into::into);
            if tx.blocking_send(frame).is_err() {
                break;
            }
            if !self.frame_interval.is_zero() {
                thread::sleep(self.frame_interval);
            }
        }
    }
}

impl CameraProvider for MockProvider {
    fn backend(&self) -> Backend {
        Backend::Mock
    }

    fn open(self: Box<Self>) -> CameraResult<FrameStream> {
        let provider = *self;
        let capacity = provider.channel_capacity;
        spawn_stream_from_channel(Backend::Mock, true, capacity, move |tx| {
            provider.emit_frames(tx);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DynCameraProvider;

    fn config(seed: u64) -> Configuration {
        Configuration {
            backend: Backend::Mock,
            mock_seed: seed,
            mock_frame_count: 4,
            ..Configuration::default()
        }
    }

    #[test]
    fn mock_backend_emits_object_then_background() {
        let provider = Box::new(MockProvider::new(&config(3), None)) as DynCameraProvider;
        let mut stream = provider.open().unwrap();
        assert!(stream.is_recorded());
        let first = stream.read_frame().unwrap().unwrap();
        let second = stream.read_frame().unwrap().unwrap();
        assert_eq!(first.width(), 320);
        assert_eq!(first.height(), 240);
        assert_ne!(first, second);
        let third = stream.read_frame().unwrap().unwrap();
        assert_eq!(second, third);
    }

    #[test]
    fn mock_backend_ends_after_frame_count() {
        let provider = Box::new(MockProvider::new(&config(3), None)) as DynCameraProvider;
        let mut stream = provider.open().unwrap();
        for _ in 0..4 {
            assert!(stream.read_frame().unwrap().is_some());
        }
        assert!(stream.read_frame().unwrap().is_none());
    }

    #[test]
    fn seeds_change_object_texture() {
        let a = MockProvider::new(&config(1), None);
        let b = MockProvider::new(&config(2), None);
        let mut pa = a.background();
        let mut pb = b.background();
        a.paint_object(&mut pa);
        b.paint_object(&mut pb);
        assert_ne!(pa, pb);

        let mut again = a.background();
        a.paint_object(&mut again);
        assert_eq!(pa, again);
    }
}
