pub mod backends;
pub mod config;
pub mod core;
pub mod still;

pub use config::{Backend, Configuration};
pub use core::{
    CameraError, CameraProvider, CameraResult, DynCameraProvider, FrameStream,
    spawn_stream_from_channel,
};
pub use lighthouse_types::ImageFrame;
