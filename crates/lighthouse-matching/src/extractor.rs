use lighthouse_types::ImageFrame;
use lighthouse_vision::{ColorHistogram, OrbConfig, OrbExtractor};
use tracing::debug;

use crate::description::ImageDescription;
use crate::error::{MatchingError, MatchingResult};
use crate::settings::MatchingSettings;

/// Turns a captured frame into an [`ImageDescription`]. Only pixels with a
/// non-zero alpha contribute keypoints.
#[derive(Debug, Clone)]
pub struct DescriptorExtractor {
    orb: OrbExtractor,
    min_features: usize,
}

impl DescriptorExtractor {
    pub fn new(settings: &MatchingSettings) -> Self {
        let config = OrbConfig {
            n_features: settings.number_of_features as usize,
            ..OrbConfig::default()
        };
        Self {
            orb: OrbExtractor::new(config),
            min_features: settings.min_number_of_features as usize,
        }
    }

    pub fn extract(&self, frame: &ImageFrame) -> MatchingResult<ImageDescription> {
        let alpha = frame.alpha();
        let (keypoints, descriptors) = self.orb.detect_and_compute(frame, Some(&alpha));
        debug!(
            width = frame.width(),
            height = frame.height(),
            keypoints = keypoints.len(),
            "extracted features"
        );
        if keypoints.len() < self.min_features {
            return Err(MatchingError::InsufficientFeatures {
                found: keypoints.len(),
                required: self.min_features,
            });
        }
        let histogram = if keypoints.is_empty() {
            ColorHistogram::empty()
        } else {
            ColorHistogram::compute(frame)
        };
        ImageDescription::new(keypoints, descriptors, histogram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textured_frame(width: u32, height: u32, seed: u32) -> ImageFrame {
        let mut data = vec![0u8; (width * height * 4) as usize];
        for y in 0..height {
            for x in 0..width {
                let idx = ((y * width + x) * 4) as usize;
                let (bx, by) = (x / 10, y / 10);
                let inside = (x % 20) < 10 && (y % 20) < 10;
                let v = if inside {
                    100 + ((bx * 31 + by * 17 + seed * 59) % 150) as u8
                } else {
                    10
                };
                data[idx..idx + 4].copy_from_slice(&[v, v / 2, 255 - v, 255]);
            }
        }
        ImageFrame::from_owned(width, height, data).unwrap()
    }

    #[test]
    fn textured_frame_is_described() {
        let extractor = DescriptorExtractor::new(&MatchingSettings::default());
        let description = extractor.extract(&textured_frame(160, 120, 1)).unwrap();
        assert!(description.keypoints().len() >= 10);
        assert_eq!(description.keypoints().len(), description.descriptors().len());
        assert_eq!(description.histogram().len(), 512);
    }

    #[test]
    fn repeated_extraction_only_changes_the_id() {
        let extractor = DescriptorExtractor::new(&MatchingSettings::default());
        let frame = textured_frame(160, 120, 2);
        let a = extractor.extract(&frame).unwrap();
        let b = extractor.extract(&frame).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.keypoints(), b.keypoints());
        assert_eq!(a.descriptors(), b.descriptors());
        assert_eq!(a.histogram(), b.histogram());
    }

    #[test]
    fn transparent_frame_has_insufficient_features() {
        let frame = textured_frame(160, 120, 3);
        let mut data = frame.data().to_vec();
        for px in data.chunks_exact_mut(4) {
            px[3] = 0;
        }
        let hidden = ImageFrame::from_owned(160, 120, data).unwrap();
        let extractor = DescriptorExtractor::new(&MatchingSettings::default());
        assert!(matches!(
            extractor.extract(&hidden),
            Err(MatchingError::InsufficientFeatures { found: 0, required: 10 })
        ));
    }

    #[test]
    fn zero_keypoints_leave_histogram_empty() {
        let settings = MatchingSettings {
            min_number_of_features: 0,
            ..MatchingSettings::default()
        };
        let flat = ImageFrame::from_owned(96, 96, vec![50; 96 * 96 * 4]).unwrap();
        let description = DescriptorExtractor::new(&settings).extract(&flat).unwrap();
        assert!(description.keypoints().is_empty());
        assert!(description.histogram().is_empty());
    }
}
