use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc::Sender;

use crate::config::Backend;
use crate::core::{CameraError, CameraProvider, CameraResult, FrameStream, spawn_stream_from_channel};
use crate::still;
use lighthouse_types::ImageFrame;

const CLIP_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Plays a directory of still images, in lexical order, as a recorded clip.
pub struct ClipProvider {
    frames: Vec<PathBuf>,
    frame_interval: Duration,
    channel_capacity: usize,
}

impl ClipProvider {
    const DEFAULT_CHANNEL_CAPACITY: usize = 4;

    pub fn new(
        directory: PathBuf,
        frame_interval: Duration,
        capacity: Option<usize>,
    ) -> CameraResult<Self> {
        let frames = list_clip_frames(&directory)?;
        if frames.is_empty() {
            return Err(CameraError::backend_failure(
                "clip",
                format!("no frames found in {}", directory.display()),
            ));
        }
        Ok(Self {
            frames,
            frame_interval,
            channel_capacity: capacity.unwrap_or(Self::DEFAULT_CHANNEL_CAPACITY).max(1),
        })
    }

    fn emit_frames(&self, tx: Sender<CameraResult<ImageFrame>>) {
        let mut dimensions = None;
        for path in &self.frames {
            if tx.is_closed() {
                break;
            }
            let frame = still::load_frame(path).and_then(|frame| {
                let size = (frame.width(), frame.height());
                match dimensions {
                    None => {
                        dimensions = Some(size);
                        Ok(frame)
                    }
                    Some(expected) if expected == size => Ok(frame),
                    Some(expected) => Err(CameraError::backend_failure(
                        "clip",
                        format!(
                            "{} is {}x{}, clip frames are {}x{}",
                            path.display(),
                            size.0,
                            size.1,
                            expected.0,
                            expected.1
                        ),
                    )),
                }
            });
            let failed = frame.is_err();
            if tx.blocking_send(frame).is_err() || failed {
                break;
            }
            if !self.frame_interval.is_zero() {
                thread::sleep(self.frame_interval);
            }
        }
    }
}

impl CameraProvider for ClipProvider {
    fn backend(&self) -> Backend {
        Backend::Clip
    }

    fn open(self: Box<Self>) -> CameraResult<FrameStream> {
        let provider = *self;
        let capacity = provider.channel_capacity;
        spawn_stream_from_channel(Backend::Clip, true, capacity, move |tx| {
            provider.emit_frames(tx);
        })
    }
}

fn list_clip_frames(directory: &Path) -> CameraResult<Vec<PathBuf>> {
    let mut frames = Vec::new();
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        let is_frame = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| CLIP_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_frame && path.is_file() {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_frame(dir: &Path, name: &str, value: u8, width: u32) {
        let frame = ImageFrame::from_owned(width, 2, vec![value; width as usize * 2 * 4]).unwrap();
        still::save_png(&frame, &dir.join(name)).unwrap();
    }

    #[test]
    fn clip_frames_play_in_lexical_order() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "002.png", 20, 2);
        write_frame(dir.path(), "001.png", 10, 2);
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let provider = Box::new(ClipProvider::new(dir.path().into(), Duration::ZERO, None).unwrap());
        let mut stream = provider.open().unwrap();
        assert_eq!(stream.read_frame().unwrap().unwrap().data()[0], 10);
        assert_eq!(stream.read_frame().unwrap().unwrap().data()[0], 20);
        assert!(stream.read_frame().unwrap().is_none());
    }

    #[test]
    fn empty_clip_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = ClipProvider::new(dir.path().into(), Duration::ZERO, None);
        assert!(matches!(result, Err(CameraError::BackendFailure { backend: "clip", .. })));
    }

    #[test]
    fn mismatched_frame_sizes_stop_the_clip() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "a.png", 1, 2);
        write_frame(dir.path(), "b.png", 1, 3);

        let provider = Box::new(ClipProvider::new(dir.path().into(), Duration::ZERO, None).unwrap());
        let mut stream = provider.open().unwrap();
        assert!(stream.read_frame().unwrap().is_some());
        assert!(stream.read_frame().is_err());
    }
}
