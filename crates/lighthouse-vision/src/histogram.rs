use lighthouse_types::ImageFrame;

/// Bins per color channel.
pub const HISTOGRAM_BINS: usize = 8;

const TOTAL_BINS: usize = HISTOGRAM_BINS * HISTOGRAM_BINS * HISTOGRAM_BINS;
const BIN_SHIFT: u32 = 5;

/// Normalized 3-D color histogram over the red, green and blue channels.
///
/// An empty histogram has no bins at all; it is what a description carries
/// when nothing was detected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorHistogram {
    values: Vec<f32>,
}

impl ColorHistogram {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Bins every pixel of the frame and scales the counts to sum to 1.
    pub fn compute(frame: &ImageFrame) -> Self {
        let mut counts = vec![0u32; TOTAL_BINS];
        for px in frame.data().chunks_exact(ImageFrame::CHANNELS) {
            counts[bin_index(px[0], px[1], px[2])] += 1;
        }
        let total = frame.pixel_count();
        if total == 0 {
            return Self::empty();
        }
        let values = counts
            .into_iter()
            .map(|count| count as f32 / total as f32)
            .collect();
        Self { values }
    }

    /// Wraps stored bin values. Anything other than zero or the full bin
    /// count is rejected.
    pub fn from_values(values: Vec<f32>) -> Option<Self> {
        if values.is_empty() || values.len() == TOTAL_BINS {
            Some(Self { values })
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Pearson correlation between two histograms, in [-1, 1]. Two
    /// constant histograms correlate perfectly; an empty one correlates
    /// with nothing.
    pub fn correlation(&self, other: &ColorHistogram) -> f32 {
        if self.is_empty() || other.is_empty() || self.len() != other.len() {
            return 0.0;
        }
        let n = self.len() as f64;
        let mean_a = self.values.iter().map(|&v| v as f64).sum::<f64>() / n;
        let mean_b = other.values.iter().map(|&v| v as f64).sum::<f64>() / n;
        let (mut num, mut var_a, mut var_b) = (0.0f64, 0.0f64, 0.0f64);
        for (&a, &b) in self.values.iter().zip(other.values.iter()) {
            let da = a as f64 - mean_a;
            let db = b as f64 - mean_b;
            num += da * db;
            var_a += da * da;
            var_b += db * db;
        }
        let denom = var_a * var_b;
        if denom.abs() <= f64::EPSILON * f64::EPSILON {
            return 1.0;
        }
        (num / denom.sqrt()).clamp(-1.0, 1.0) as f32
    }
}

fn bin_index(r: u8, g: u8, b: u8) -> usize {
    let r = (r >> BIN_SHIFT) as usize;
    let g = (g >> BIN_SHIFT) as usize;
    let b = (b >> BIN_SHIFT) as usize;
    (r * HISTOGRAM_BINS + g) * HISTOGRAM_BINS + b
}
