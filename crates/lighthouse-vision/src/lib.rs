//! Image processing for the lighthouse appliance: background isolation from
//! two shots, ORB-style keypoints and binary descriptors, and color
//! histograms.

pub mod components;
pub mod features;
pub mod geometry;
pub mod histogram;
pub mod isolator;
pub mod ops;
pub mod render;

pub use features::{Descriptor, DESCRIPTOR_BYTES, OrbConfig, OrbExtractor};
pub use histogram::{ColorHistogram, HISTOGRAM_BINS};
pub use isolator::BackgroundIsolator;
pub use render::render_matches;
