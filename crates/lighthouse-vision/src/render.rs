//! Side-by-side visualization of matched keypoints.

use lighthouse_types::{ImageFrame, Keypoint};

const PALETTE: [[u8; 3]; 6] = [
    [255, 64, 64],
    [64, 255, 64],
    [64, 128, 255],
    [255, 220, 0],
    [255, 0, 255],
    [0, 230, 230],
];

struct Canvas {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Canvas {
    fn new(width: usize, height: usize) -> Self {
        let mut data = vec![0u8; width * height * ImageFrame::CHANNELS];
        for px in data.chunks_exact_mut(ImageFrame::CHANNELS) {
            px[3] = 255;
        }
        Self {
            width,
            height,
            data,
        }
    }

    fn blit(&mut self, frame: &ImageFrame, offset_x: usize) {
        let src_width = frame.width() as usize;
        for y in 0..frame.height() as usize {
            let src = &frame.data()[y * src_width * 4..(y + 1) * src_width * 4];
            let start = (y * self.width + offset_x) * 4;
            let dst = &mut self.data[start..start + src_width * 4];
            for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                d[..3].copy_from_slice(&s[..3]);
            }
        }
    }

    fn put(&mut self, x: i64, y: i64, color: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let idx = (y as usize * self.width + x as usize) * 4;
        self.data[idx..idx + 3].copy_from_slice(&color);
    }

    fn line(&mut self, from: (i64, i64), to: (i64, i64), color: [u8; 3]) {
        let (mut x, mut y) = from;
        let dx = (to.0 - x).abs();
        let dy = -(to.1 - y).abs();
        let sx = if x < to.0 { 1 } else { -1 };
        let sy = if y < to.1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.put(x, y, color);
            if (x, y) == to {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn marker(&mut self, at: (i64, i64), color: [u8; 3]) {
        for d in -2..=2 {
            self.put(at.0 + d, at.1, color);
            self.put(at.0, at.1 + d, color);
        }
    }
}

/// Places `query` left of `candidate` and connects each `(query, candidate)`
/// keypoint index pair with a line. Pairs pointing outside either keypoint
/// list are ignored.
pub fn render_matches(
    query: &ImageFrame,
    query_keypoints: &[Keypoint],
    candidate: &ImageFrame,
    candidate_keypoints: &[Keypoint],
    pairs: &[(usize, usize)],
) -> ImageFrame {
    let left = query.width() as usize;
    let width = left + candidate.width() as usize;
    let height = query.height().max(candidate.height()) as usize;
    let mut canvas = Canvas::new(width, height);
    canvas.blit(query, 0);
    canvas.blit(candidate, left);

    for (n, &(qi, ci)) in pairs.iter().enumerate() {
        let (Some(q), Some(c)) = (query_keypoints.get(qi), candidate_keypoints.get(ci)) else {
            continue;
        };
        let color = PALETTE[n % PALETTE.len()];
        let from = (q.x.round() as i64, q.y.round() as i64);
        let to = (c.x.round() as i64 + left as i64, c.y.round() as i64);
        canvas.line(from, to, color);
        canvas.marker(from, color);
        canvas.marker(to, color);
    }

    ImageFrame::from_owned(width as u32, height as u32, canvas.data)
        .unwrap_or_else(|_| query.clone())
}
