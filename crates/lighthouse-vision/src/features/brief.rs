//! Steered BRIEF: binary intensity tests rotated by the keypoint orientation.

use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, Normal};

use super::{DESCRIPTOR_BYTES, Descriptor};

const PATTERN_SEED: u64 = 0x0DDB_1A5E_CBAD_5EED;

pub type TestPair = [(f32, f32); 2];

/// Fixed sampling pattern: pairs drawn from an isotropic Gaussian with a
/// standard deviation of a fifth of the patch, clamped inside the patch.
pub fn sampling_pattern(patch_size: usize) -> Vec<TestPair> {
    let half = (patch_size / 2) as f32;
    let std_dev = patch_size as f32 / 5.0;
    let mut rng = SmallRng::seed_from_u64(PATTERN_SEED);
    let normal = Normal::new(0.0f32, std_dev).expect("patch deviation is finite and positive");
    let mut draw = || normal.sample(&mut rng).round().clamp(-half, half);
    let mut pattern = Vec::with_capacity(DESCRIPTOR_BYTES * 8);
    for _ in 0..DESCRIPTOR_BYTES * 8 {
        pattern.push([(draw(), draw()), (draw(), draw())]);
    }
    pattern
}

/// Half-widths of the circular patch per row offset.
pub fn circle_extents(half_patch: usize) -> Vec<isize> {
    (0..=half_patch)
        .map(|v| (((half_patch * half_patch - v * v) as f32).sqrt()).floor() as isize)
        .collect()
}

/// Orientation from the intensity centroid of the circular patch, in degrees
/// within [0, 360).
pub fn intensity_centroid_angle(
    image: &[u8],
    width: usize,
    height: usize,
    x: usize,
    y: usize,
    extents: &[isize],
) -> f32 {
    let half = extents.len() as isize - 1;
    let mut m01 = 0.0f64;
    let mut m10 = 0.0f64;
    for v in -half..=half {
        let reach = extents[v.unsigned_abs()];
        for u in -reach..=reach {
            let value = sample(image, width, height, x as isize + u, y as isize + v) as f64;
            m10 += u as f64 * value;
            m01 += v as f64 * value;
        }
    }
    let angle = (m01.atan2(m10).to_degrees()) as f32;
    if angle < 0.0 { angle + 360.0 } else { angle }
}

/// Computes the descriptor on a pre-smoothed image. Bit `i` of the result is
/// set when the first point of test `i` is darker than the second.
pub fn describe(
    smoothed: &[u8],
    width: usize,
    height: usize,
    x: usize,
    y: usize,
    angle_degrees: f32,
    pattern: &[TestPair],
) -> Descriptor {
    let (sin, cos) = angle_degrees.to_radians().sin_cos();
    let at = |(px, py): (f32, f32)| -> u8 {
        let rx = (px * cos - py * sin).round() as isize;
        let ry = (px * sin + py * cos).round() as isize;
        sample(smoothed, width, height, x as isize + rx, y as isize + ry)
    };
    let mut descriptor = [0u8; DESCRIPTOR_BYTES];
    for (i, [a, b]) in pattern.iter().take(DESCRIPTOR_BYTES * 8).enumerate() {
        if at(*a) < at(*b) {
            descriptor[i / 8] |= 1 << (i % 8);
        }
    }
    descriptor
}

fn sample(image: &[u8], width: usize, height: usize, x: isize, y: isize) -> u8 {
    let cx = x.clamp(0, width as isize - 1) as usize;
    let cy = y.clamp(0, height as isize - 1) as usize;
    image[cy * width + cx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_is_deterministic_and_bounded() {
        let a = sampling_pattern(31);
        let b = sampling_pattern(31);
        assert_eq!(a, b);
        assert_eq!(a.len(), 256);
        assert!(
            a.iter()
                .flatten()
                .all(|(x, y)| x.abs() <= 15.0 && y.abs() <= 15.0)
        );
    }

    #[test]
    fn centroid_points_towards_bright_side() {
        let width = 40;
        let mut image = vec![0u8; width * width];
        for y in 0..width {
            for x in 25..width {
                image[y * width + x] = 255;
            }
        }
        let extents = circle_extents(15);
        let angle = intensity_centroid_angle(&image, width, width, 20, 20, &extents);
        assert!(angle < 1.0 || angle > 359.0, "angle {angle}");

        let mut below = vec![0u8; width * width];
        for y in 25..width {
            for x in 0..width {
                below[y * width + x] = 255;
            }
        }
        let angle = intensity_centroid_angle(&below, width, width, 20, 20, &extents);
        assert!((angle - 90.0).abs() < 1.0, "angle {angle}");
    }

    #[test]
    fn flat_patch_yields_zero_descriptor() {
        let image = vec![100u8; 64 * 64];
        let pattern = sampling_pattern(31);
        assert_eq!(describe(&image, 64, 64, 32, 32, 0.0, &pattern), [0u8; 32]);
    }

    #[test]
    fn descriptor_follows_rotation() {
        // A patch rotated by 90 degrees, described at the matching angle,
        // gives the same bits as the original described at 0.
        let size = 64usize;
        let mut image = vec![0u8; size * size];
        for y in 0..size {
            for x in 0..size {
                image[y * size + x] = ((x * 7 + y * 13) % 251) as u8;
            }
        }
        let mut rotated = vec![0u8; size * size];
        let c = 32isize;
        for y in 0..size as isize {
            for x in 0..size as isize {
                // rotated(p) = image(R^-1 p) around the centre
                let sx = c + (y - c);
                let sy = c - (x - c);
                if (0..size as isize).contains(&sx) && (0..size as isize).contains(&sy) {
                    rotated[(y * size as isize + x) as usize] = image[(sy * size as isize + sx) as usize];
                }
            }
        }
        let pattern = sampling_pattern(31);
        let original = describe(&image, size, size, 32, 32, 0.0, &pattern);
        let turned = describe(&rotated, size, size, 32, 32, 90.0, &pattern);
        assert_eq!(original, turned);
    }
}
