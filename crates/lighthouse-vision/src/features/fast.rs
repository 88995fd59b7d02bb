//! FAST-9 corner detection and Harris ranking on single-channel images.

// Bresenham circle of radius 3, clockwise from twelve o'clock.
const CIRCLE: [(isize, isize); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

const ARC_LENGTH: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corner {
    pub x: usize,
    pub y: usize,
    pub score: u32,
}

/// Detects corners at least `border` pixels away from the image edge, only
/// where `mask` is non-zero, and keeps local maxima of the corner score.
pub fn detect(
    image: &[u8],
    width: usize,
    height: usize,
    threshold: u8,
    border: usize,
    mask: Option<&[u8]>,
) -> Vec<Corner> {
    assert_eq!(image.len(), width * height);
    let border = border.max(3);
    if width <= 2 * border || height <= 2 * border {
        return Vec::new();
    }

    let mut scores = vec![0u32; width * height];
    for y in border..height - border {
        for x in border..width - border {
            let idx = y * width + x;
            if mask.is_some_and(|m| m[idx] == 0) {
                continue;
            }
            scores[idx] = corner_score(image, width, x, y, threshold);
        }
    }

    let mut corners = Vec::new();
    for y in border..height - border {
        for x in border..width - border {
            let idx = y * width + x;
            let score = scores[idx];
            if score == 0 || !is_local_max(&scores, width, x, y) {
                continue;
            }
            corners.push(Corner { x, y, score });
        }
    }
    corners
}

// Sum of absolute differences over the qualifying arc, 0 when not a corner.
fn corner_score(image: &[u8], width: usize, x: usize, y: usize, threshold: u8) -> u32 {
    let center = image[y * width + x] as i32;
    let t = threshold as i32;
    let mut classes = [0i8; 16];
    let mut diffs = [0i32; 16];
    for (i, (dx, dy)) in CIRCLE.iter().enumerate() {
        let px = (x as isize + dx) as usize;
        let py = (y as isize + dy) as usize;
        let value = image[py * width + px] as i32;
        diffs[i] = value - center;
        classes[i] = if value > center + t {
            1
        } else if value < center - t {
            -1
        } else {
            0
        };
    }

    for class in [1i8, -1] {
        let mut run = 0usize;
        let mut best = 0usize;
        for i in 0..CIRCLE.len() + ARC_LENGTH - 1 {
            if classes[i % CIRCLE.len()] == class {
                run += 1;
                best = best.max(run);
            } else {
                run = 0;
            }
        }
        if best >= ARC_LENGTH {
            return classes
                .iter()
                .zip(diffs.iter())
                .filter(|(c, _)| **c == class)
                .map(|(_, d)| (d.abs() - t) as u32)
                .sum();
        }
    }
    0
}

fn is_local_max(scores: &[u32], width: usize, x: usize, y: usize) -> bool {
    let idx = y * width + x;
    let score = scores[idx];
    for dy in -1isize..=1 {
        for dx in -1isize..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let nidx = ((y as isize + dy) as usize) * width + (x as isize + dx) as usize;
            let other = scores[nidx];
            // Ties go to the earlier pixel in raster order.
            if other > score || (other == score && nidx < idx) {
                return false;
            }
        }
    }
    true
}

/// Harris corner measure over a square window centred on (x, y).
pub fn harris_response(
    image: &[u8],
    width: usize,
    height: usize,
    x: usize,
    y: usize,
    block_size: usize,
    k: f32,
) -> f32 {
    let radius = (block_size / 2) as isize;
    let sample = |sx: isize, sy: isize| -> f32 {
        let cx = sx.clamp(0, width as isize - 1) as usize;
        let cy = sy.clamp(0, height as isize - 1) as usize;
        image[cy * width + cx] as f32
    };
    let (mut a, mut b, mut c) = (0.0f32, 0.0f32, 0.0f32);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let px = x as isize + dx;
            let py = y as isize + dy;
            let ix = (sample(px + 1, py) - sample(px - 1, py)) / 2.0;
            let iy = (sample(px, py + 1) - sample(px, py - 1)) / 2.0;
            a += ix * ix;
            b += iy * iy;
            c += ix * iy;
        }
    }
    let scale = 1.0 / (255.0 * (block_size * block_size) as f32);
    let (a, b, c) = (a * scale, b * scale, c * scale);
    a * b - c * c - k * (a + b) * (a + b)
}
