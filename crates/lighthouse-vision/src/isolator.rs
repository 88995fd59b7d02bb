use lighthouse_types::{FrameError, FrameResult, ImageFrame, Mask};

use crate::components::connected_components;
use crate::geometry::{convex_hull, fill_convex_polygon};
use crate::ops;

// Work on a reduced image, both for speed and to damp small changes.
pub const DEFAULT_DOWNSAMPLE_FACTOR: f32 = 0.5;
// Sigma of the noise-suppressing blur applied to both shots.
pub const DEFAULT_BLUR_SIGMA: f32 = 0.5;
// Components smaller than this fraction of the frame are treated as noise.
pub const DEFAULT_MIN_AREA_FRACTION: f32 = 0.05;

/// Segments an object from two shots of the same viewpoint: one with the
/// object present and one with it removed.
///
/// The camera is assumed not to move between the shots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundIsolator {
    pub downsample_factor: f32,
    pub blur_sigma: f32,
    pub min_area_fraction: f32,
}

impl Default for BackgroundIsolator {
    fn default() -> Self {
        Self {
            downsample_factor: DEFAULT_DOWNSAMPLE_FACTOR,
            blur_sigma: DEFAULT_BLUR_SIGMA,
            min_area_fraction: DEFAULT_MIN_AREA_FRACTION,
        }
    }
}

impl BackgroundIsolator {
    pub fn isolate(&self, first: &ImageFrame, second: &ImageFrame) -> FrameResult<Mask> {
        if (first.width(), first.height()) != (second.width(), second.height()) {
            return Err(FrameError::DimensionMismatch {
                expected: (first.width(), first.height()),
                actual: (second.width(), second.height()),
            });
        }
        let width = first.width() as usize;
        let height = first.height() as usize;
        if width == 0 || height == 0 {
            return Ok(Mask::empty(first.width(), first.height()));
        }
        let small_width = ((width as f32 * self.downsample_factor) as usize).max(1);
        let small_height = ((height as f32 * self.downsample_factor) as usize).max(1);

        let small_a = self.downsample_and_blur(first, small_width, small_height);
        let small_b = self.downsample_and_blur(second, small_width, small_height);

        let delta = ops::average_channels(&ops::absdiff(&small_a, &small_b), ImageFrame::CHANNELS, 3);
        let threshold = ops::otsu_threshold(&delta);
        let noisy = ops::threshold_binary(&delta, threshold);
        let clean = self.clean_mask(&noisy, small_width, small_height);

        let full = ops::resize_nearest(&clean, small_width, small_height, width, height);
        Mask::new(first.width(), first.height(), full)
    }

    fn downsample_and_blur(&self, frame: &ImageFrame, width: usize, height: usize) -> Vec<u8> {
        let small = ops::resize_area(
            frame.data(),
            frame.width() as usize,
            frame.height() as usize,
            ImageFrame::CHANNELS,
            width,
            height,
        );
        ops::gaussian_blur(&small, width, height, ImageFrame::CHANNELS, self.blur_sigma)
    }

    /// Drops small components and replaces each survivor with its filled
    /// convex hull.
    pub fn clean_mask(&self, noisy: &[u8], width: usize, height: usize) -> Vec<u8> {
        let surface = (width * height) as f32;
        let mut clean = vec![0u8; width * height];
        for component in connected_components(noisy, width, height) {
            if (component.area as f32) / surface < self.min_area_fraction {
                continue;
            }
            let hull = convex_hull(&component.extreme_points());
            fill_convex_polygon(&mut clean, width, height, &hull, Mask::FOREGROUND);
        }
        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(width: u32, height: u32, square: Option<(u32, u32, u32)>) -> ImageFrame {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let inside = square.is_some_and(|(left, top, side)| {
                    x >= left && x < left + side && y >= top && y < top + side
                });
                if inside {
                    let v = if (x / 4 + y / 4) % 2 == 0 { 230 } else { 20 };
                    data.extend_from_slice(&[v, 255 - v, v / 2, 255]);
                } else {
                    data.extend_from_slice(&[90, 100, 110, 255]);
                }
            }
        }
        ImageFrame::from_owned(width, height, data).unwrap()
    }

    #[test]
    fn identical_frames_produce_empty_mask() {
        let frame = scene(64, 48, Some((16, 8, 24)));
        let mask = BackgroundIsolator::default().isolate(&frame, &frame).unwrap();
        assert_eq!(mask.foreground_pixels(), 0);
    }

    #[test]
    fn removed_object_is_isolated() {
        let with_object = scene(64, 48, Some((16, 8, 24)));
        let background = scene(64, 48, None);
        let mask = BackgroundIsolator::default()
            .isolate(&with_object, &background)
            .unwrap();
        assert!(mask.is_set(28, 20));
        assert!(!mask.is_set(2, 2));
        assert!(!mask.is_set(60, 44));
        let expected = 24.0 * 24.0 / (64.0 * 48.0);
        assert!((mask.foreground_fraction() - expected).abs() < 0.08);
    }

    #[test]
    fn specks_below_min_area_are_dropped() {
        let with_speck = scene(64, 48, Some((30, 20, 4)));
        let background = scene(64, 48, None);
        let mask = BackgroundIsolator::default()
            .isolate(&with_speck, &background)
            .unwrap();
        assert_eq!(mask.foreground_pixels(), 0);
    }

    #[test]
    fn clean_mask_fills_holes() {
        let isolator = BackgroundIsolator {
            min_area_fraction: 0.0,
            ..BackgroundIsolator::default()
        };
        let ring = [
            255, 255, 255, 255, 255, //
            255, 0, 0, 0, 255, //
            255, 0, 0, 0, 255, //
            255, 255, 255, 255, 255,
        ];
        let clean = isolator.clean_mask(&ring, 5, 4);
        assert!(clean.iter().all(|&v| v == 255));
    }

    #[test]
    fn mismatched_shots_are_rejected() {
        let a = scene(8, 8, None);
        let b = scene(8, 4, None);
        assert!(BackgroundIsolator::default().isolate(&a, &b).is_err());
    }
}
