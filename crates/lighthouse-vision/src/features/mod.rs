//! ORB-style keypoints and 256-bit binary descriptors.

pub mod brief;
pub mod fast;

use lighthouse_types::{ImageFrame, Keypoint};
use rayon::prelude::*;

use crate::ops;
use brief::TestPair;

pub const DESCRIPTOR_BYTES: usize = 32;

pub type Descriptor = [u8; DESCRIPTOR_BYTES];

const HARRIS_BLOCK_SIZE: usize = 7;
const HARRIS_K: f32 = 0.04;
const SMOOTHING_KERNEL: usize = 7;
const SMOOTHING_SIGMA: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbConfig {
    pub n_features: usize,
    pub scale_factor: f32,
    pub n_levels: usize,
    pub edge_threshold: usize,
    pub patch_size: usize,
    pub fast_threshold: u8,
}

impl Default for OrbConfig {
    fn default() -> Self {
        Self {
            n_features: 500,
            scale_factor: 1.2,
            n_levels: 8,
            edge_threshold: 31,
            patch_size: 31,
            fast_threshold: 20,
        }
    }
}

struct Level {
    index: usize,
    scale: f32,
    width: usize,
    height: usize,
    image: Vec<u8>,
    mask: Option<Vec<u8>>,
    quota: usize,
}

#[derive(Debug, Clone)]
pub struct OrbExtractor {
    config: OrbConfig,
    pattern: Vec<TestPair>,
    extents: Vec<isize>,
}

impl OrbExtractor {
    pub fn new(config: OrbConfig) -> Self {
        let pattern = brief::sampling_pattern(config.patch_size);
        let extents = brief::circle_extents(config.patch_size / 2);
        Self {
            config,
            pattern,
            extents,
        }
    }

    pub fn config(&self) -> &OrbConfig {
        &self.config
    }

    /// Detects keypoints on the luma of `frame`, restricted to the non-zero
    /// pixels of `mask` when given, and describes each of them. The two
    /// vectors are aligned: descriptor `i` belongs to keypoint `i`.
    ///
    /// The result only depends on the pixels, so the same frame always
    /// yields the same keypoints in the same order.
    pub fn detect_and_compute(
        &self,
        frame: &ImageFrame,
        mask: Option<&[u8]>,
    ) -> (Vec<Keypoint>, Vec<Descriptor>) {
        let levels = self.build_pyramid(frame, mask);
        let per_level: Vec<(Vec<Keypoint>, Vec<Descriptor>)> =
            levels.par_iter().map(|level| self.process_level(level)).collect();

        let mut keypoints = Vec::new();
        let mut descriptors = Vec::new();
        for (kps, descs) in per_level {
            keypoints.extend(kps);
            descriptors.extend(descs);
        }
        (keypoints, descriptors)
    }

    fn build_pyramid(&self, frame: &ImageFrame, mask: Option<&[u8]>) -> Vec<Level> {
        let width = frame.width() as usize;
        let height = frame.height() as usize;
        let luma = frame.luma();
        let mask = mask.filter(|m| m.len() == width * height);
        let min_side = 2 * self.config.edge_threshold + 1;

        let mut levels = Vec::new();
        for index in 0..self.config.n_levels.max(1) {
            let scale = self.config.scale_factor.powi(index as i32);
            let level_width = (width as f32 / scale).round() as usize;
            let level_height = (height as f32 / scale).round() as usize;
            if level_width <= min_side || level_height <= min_side {
                break;
            }
            let (image, level_mask) = if index == 0 {
                (luma.clone(), mask.map(<[u8]>::to_vec))
            } else {
                (
                    ops::resize_bilinear(&luma, width, height, level_width, level_height),
                    mask.map(|m| ops::resize_nearest(m, width, height, level_width, level_height)),
                )
            };
            levels.push(Level {
                index,
                scale,
                width: level_width,
                height: level_height,
                image,
                mask: level_mask,
                quota: 0,
            });
        }

        let quotas = level_quotas(self.config.n_features, self.config.scale_factor, levels.len());
        for (level, quota) in levels.iter_mut().zip(quotas) {
            level.quota = quota;
        }
        levels
    }

    fn process_level(&self, level: &Level) -> (Vec<Keypoint>, Vec<Descriptor>) {
        if level.quota == 0 {
            return (Vec::new(), Vec::new());
        }
        let corners = fast::detect(
            &level.image,
            level.width,
            level.height,
            self.config.fast_threshold,
            self.config.edge_threshold,
            level.mask.as_deref(),
        );

        let mut ranked: Vec<(f32, fast::Corner)> = corners
            .into_iter()
            .map(|corner| {
                let response = fast::harris_response(
                    &level.image,
                    level.width,
                    level.height,
                    corner.x,
                    corner.y,
                    HARRIS_BLOCK_SIZE,
                    HARRIS_K,
                );
                (response, corner)
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| (a.1.y, a.1.x).cmp(&(b.1.y, b.1.x)))
        });
        ranked.truncate(level.quota);
        if ranked.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let smoothed = ops::gaussian_blur_sized(
            &level.image,
            level.width,
            level.height,
            1,
            SMOOTHING_KERNEL,
            SMOOTHING_SIGMA,
        );

        let mut keypoints = Vec::with_capacity(ranked.len());
        let mut descriptors = Vec::with_capacity(ranked.len());
        for (response, corner) in ranked {
            let angle = brief::intensity_centroid_angle(
                &level.image,
                level.width,
                level.height,
                corner.x,
                corner.y,
                &self.extents,
            );
            descriptors.push(brief::describe(
                &smoothed,
                level.width,
                level.height,
                corner.x,
                corner.y,
                angle,
                &self.pattern,
            ));
            keypoints.push(Keypoint {
                x: corner.x as f32 * level.scale,
                y: corner.y as f32 * level.scale,
                size: self.config.patch_size as f32 * level.scale,
                angle,
                response,
                octave: level.index as i32,
                class_id: -1,
            });
        }
        (keypoints, descriptors)
    }
}

impl Default for OrbExtractor {
    fn default() -> Self {
        Self::new(OrbConfig::default())
    }
}

// Geometric split of the feature budget: each level gets 1/scale of the
// previous one and the last level takes whatever is left.
fn level_quotas(total: usize, scale_factor: f32, levels: usize) -> Vec<usize> {
    if levels == 0 {
        return Vec::new();
    }
    let factor = 1.0 / scale_factor.max(1.0 + f32::EPSILON);
    let first = total as f32 * (1.0 - factor) / (1.0 - factor.powi(levels as i32));
    let mut quotas = Vec::with_capacity(levels);
    let mut assigned = 0usize;
    for index in 0..levels - 1 {
        let quota = ((first * factor.powi(index as i32)).round() as usize).min(total - assigned);
        quotas.push(quota);
        assigned += quota;
    }
    quotas.push(total - assigned);
    quotas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squares_frame(width: u32, height: u32) -> ImageFrame {
        let mut data = vec![0u8; (width * height * 4) as usize];
        for y in 0..height {
            for x in 0..width {
                let idx = ((y * width + x) * 4) as usize;
                let in_square = (x % 24) < 12 && (y % 24) < 12;
                let v = if in_square {
                    120 + ((x / 24 * 29 + y / 24 * 53) % 120) as u8
                } else {
                    15
                };
                data[idx..idx + 4].copy_from_slice(&[v, v, v, 255]);
            }
        }
        ImageFrame::from_owned(width, height, data).unwrap()
    }

    #[test]
    fn quotas_sum_to_budget() {
        let quotas = level_quotas(500, 1.2, 8);
        assert_eq!(quotas.len(), 8);
        assert_eq!(quotas.iter().sum::<usize>(), 500);
        assert!(quotas[0] > quotas[1]);
    }

    #[test]
    fn textured_frame_yields_aligned_keypoints() {
        let frame = squares_frame(160, 120);
        let extractor = OrbExtractor::default();
        let (keypoints, descriptors) = extractor.detect_and_compute(&frame, None);
        assert!(!keypoints.is_empty());
        assert_eq!(keypoints.len(), descriptors.len());
        assert!(keypoints.len() <= extractor.config().n_features);
        for kp in &keypoints {
            assert!(kp.x >= 0.0 && kp.x < 160.0);
            assert!(kp.y >= 0.0 && kp.y < 120.0);
            assert!((0.0..360.0).contains(&kp.angle));
        }
    }

    #[test]
    fn extraction_is_deterministic() {
        let frame = squares_frame(160, 120);
        let extractor = OrbExtractor::default();
        let first = extractor.detect_and_compute(&frame, None);
        let second = extractor.detect_and_compute(&frame, None);
        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
    }

    #[test]
    fn empty_mask_blocks_detection() {
        let frame = squares_frame(160, 120);
        let mask = vec![0u8; 160 * 120];
        let (keypoints, descriptors) = OrbExtractor::default().detect_and_compute(&frame, Some(&mask));
        assert!(keypoints.is_empty());
        assert!(descriptors.is_empty());
    }

    #[test]
    fn flat_frame_has_no_features() {
        let frame = ImageFrame::from_owned(128, 96, vec![80; 128 * 96 * 4]).unwrap();
        let (keypoints, _) = OrbExtractor::default().detect_and_compute(&frame, None);
        assert!(keypoints.is_empty());
    }

    #[test]
    fn feature_budget_is_respected() {
        let frame = squares_frame(320, 240);
        let extractor = OrbExtractor::new(OrbConfig {
            n_features: 12,
            ..OrbConfig::default()
        });
        let (keypoints, _) = extractor.detect_and_compute(&frame, None);
        assert!(!keypoints.is_empty());
        assert!(keypoints.len() <= 12);
    }
}
