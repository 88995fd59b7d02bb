use std::io::{self, Read};
use std::process::{Child, ChildStdout, Command, Stdio};

use tokio::sync::mpsc::Sender;
use tracing::debug;

use crate::config::{Backend, Configuration};
use crate::core::{CameraError, CameraProvider, CameraResult, FrameStream, spawn_stream_from_channel};
use lighthouse_types::ImageFrame;

/// Live camera read through an external capture command that writes raw
/// RGBA frames of a fixed size to stdout.
pub struct DeviceProvider {
    program: String,
    args: Vec<String>,
    width: u32,
    height: u32,
    channel_capacity: usize,
}

impl DeviceProvider {
    // Keep the queue short so a picture is never far behind the scene.
    const DEFAULT_CHANNEL_CAPACITY: usize = 1;

    pub fn new(config: &Configuration, capacity: Option<usize>) -> CameraResult<Self> {
        let mut parts = config.device_command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| CameraError::configuration("device capture command is empty"))?;
        if config.device_width == 0 || config.device_height == 0 {
            return Err(CameraError::configuration(
                "device frame size must be non-zero",
            ));
        }
        Ok(Self {
            program,
            args: parts.collect(),
            width: config.device_width,
            height: config.device_height,
            channel_capacity: capacity.unwrap_or(Self::DEFAULT_CHANNEL_CAPACITY).max(1),
        })
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * ImageFrame::CHANNELS
    }

    fn read_frame(&self, stdout: &mut ChildStdout) -> io::Result<ImageFrame> {
        let mut buffer = vec![0u8; self.frame_len()];
        stdout.read_exact(&mut buffer)?;
        ImageFrame::from_owned(self.width, self.height, buffer)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    fn emit_frames(
        &self,
        mut child: Child,
        mut stdout: ChildStdout,
        first: ImageFrame,
        tx: Sender<CameraResult<ImageFrame>>,
    ) {
        let mut next: io::Result<ImageFrame> = Ok(first);
        loop {
            match next {
                Ok(frame) => {
                    if tx.blocking_send(Ok(frame)).is_err() {
                        break;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!("capture command reached end of stream");
                    break;
                }
                Err(err) => {
                    let _ = tx.blocking_send(Err(CameraError::backend_failure(
                        "device",
                        err.to_string(),
                    )));
                    break;
                }
            }
            next = self.read_frame(&mut stdout);
        }
        stop_child(&mut child);
    }
}

impl CameraProvider for DeviceProvider {
    fn backend(&self) -> Backend {
        Backend::Device
    }

    fn open(self: Box<Self>) -> CameraResult<FrameStream> {
        let provider = *self;
        let mut child = Command::new(&provider.program)
            .args(&provider.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| {
                CameraError::backend_failure(
                    "device",
                    format!("failed to start '{}': {err}", provider.program),
                )
            })?;
        let Some(mut stdout) = child.stdout.take() else {
            stop_child(&mut child);
            return Err(CameraError::backend_failure(
                "device",
                "capture command has no stdout",
            ));
        };
        // A camera that cannot deliver one frame is treated as absent.
        let first = match provider.read_frame(&mut stdout) {
            Ok(frame) => frame,
            Err(err) => {
                stop_child(&mut child);
                return Err(CameraError::backend_failure(
                    "device",
                    format!("no frame from capture command: {err}"),
                ));
            }
        };
        let capacity = provider.channel_capacity;
        spawn_stream_from_channel(Backend::Device, false, capacity, move |tx| {
            provider.emit_frames(child, stdout, first, tx);
        })
    }
}

fn stop_child(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
