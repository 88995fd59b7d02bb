use crate::error::{MatchingError, MatchingResult};

pub const DEFAULT_NUMBER_OF_FEATURES: u32 = 500;
pub const DEFAULT_MIN_NUMBER_OF_FEATURES: u32 = 10;
pub const DEFAULT_MATCHING_SCORE_THRESHOLD: f32 = 30.0;
pub const DEFAULT_RATIO_TEST_K: f32 = 0.8;
pub const DEFAULT_HISTOGRAM_WEIGHT: f32 = 10.0;

/// Tuning of extraction and scoring. Fixed for the lifetime of a matcher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchingSettings {
    /// Upper bound on keypoints kept per frame.
    pub number_of_features: u32,
    /// Extraction fails below this many keypoints.
    pub min_number_of_features: u32,
    /// Scores below this are dropped from match results.
    pub matching_score_threshold: f32,
    /// Lowe's ratio: a match is good when its distance is below this
    /// fraction of the second best distance.
    pub ratio_test_k: f32,
    /// Weight of the histogram correlation added to the score, 0 disables it.
    pub histogram_weight: f32,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            number_of_features: DEFAULT_NUMBER_OF_FEATURES,
            min_number_of_features: DEFAULT_MIN_NUMBER_OF_FEATURES,
            matching_score_threshold: DEFAULT_MATCHING_SCORE_THRESHOLD,
            ratio_test_k: DEFAULT_RATIO_TEST_K,
            histogram_weight: DEFAULT_HISTOGRAM_WEIGHT,
        }
    }
}

impl MatchingSettings {
    pub fn validate(&self) -> MatchingResult<()> {
        if self.min_number_of_features > self.number_of_features {
            return Err(MatchingError::invalid_settings(format!(
                "min_number_of_features ({}) exceeds number_of_features ({})",
                self.min_number_of_features, self.number_of_features
            )));
        }
        if !(0.0..1.0).contains(&self.ratio_test_k) {
            return Err(MatchingError::invalid_settings(format!(
                "ratio_test_k must be within [0, 1), got {}",
                self.ratio_test_k
            )));
        }
        if !self.histogram_weight.is_finite() || self.histogram_weight < 0.0 {
            return Err(MatchingError::invalid_settings(format!(
                "histogram_weight must be a non-negative number, got {}",
                self.histogram_weight
            )));
        }
        if !self.matching_score_threshold.is_finite() {
            return Err(MatchingError::invalid_settings(
                "matching_score_threshold must be finite",
            ));
        }
        // A masked capture is mostly zeroed background, so any two frames
        // correlate near 1 and the histogram alone can reach `histogram_weight`.
        if self.matching_score_threshold <= self.histogram_weight {
            return Err(MatchingError::invalid_settings(format!(
                "matching_score_threshold ({}) must exceed histogram_weight ({})",
                self.matching_score_threshold, self.histogram_weight
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(MatchingSettings::default().validate().is_ok());
    }

    #[test]
    fn min_features_cannot_exceed_budget() {
        let settings = MatchingSettings {
            number_of_features: 5,
            min_number_of_features: 6,
            ..MatchingSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(MatchingError::InvalidSettings { .. })
        ));
    }

    #[test]
    fn ratio_and_weight_are_bounded() {
        let ratio = MatchingSettings {
            ratio_test_k: 1.0,
            ..MatchingSettings::default()
        };
        assert!(ratio.validate().is_err());

        let zero_ratio = MatchingSettings {
            ratio_test_k: 0.0,
            ..MatchingSettings::default()
        };
        assert!(zero_ratio.validate().is_ok());

        let weight = MatchingSettings {
            histogram_weight: -0.5,
            ..MatchingSettings::default()
        };
        assert!(weight.validate().is_err());
    }

    #[test]
    fn threshold_must_exceed_histogram_weight() {
        let defaults = MatchingSettings::default();
        assert!(defaults.matching_score_threshold > defaults.histogram_weight);

        let equal = MatchingSettings {
            matching_score_threshold: 10.0,
            histogram_weight: 10.0,
            ..MatchingSettings::default()
        };
        assert!(matches!(
            equal.validate(),
            Err(MatchingError::InvalidSettings { .. })
        ));

        let no_histogram = MatchingSettings {
            matching_score_threshold: 5.0,
            histogram_weight: 0.0,
            ..MatchingSettings::default()
        };
        assert!(no_histogram.validate().is_ok());
    }
}
