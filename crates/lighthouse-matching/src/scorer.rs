use std::sync::Arc;

use lighthouse_vision::Descriptor;

use crate::description::ImageDescription;
use crate::settings::MatchingSettings;

/// A query descriptor row paired with its nearest candidate row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoodMatch {
    pub query_index: usize,
    pub candidate_index: usize,
    pub distance: u32,
}

#[derive(Debug, Clone)]
pub struct ScoredMatch {
    pub score: f32,
    pub description: Arc<ImageDescription>,
}

#[derive(Debug, Clone, Copy)]
pub struct MatchScorer {
    settings: MatchingSettings,
}

impl MatchScorer {
    pub fn new(settings: MatchingSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &MatchingSettings {
        &self.settings
    }

    /// Two-nearest-neighbour Hamming matching followed by the ratio test.
    /// Query rows with fewer than two candidate neighbours never pass.
    pub fn good_matches(
        &self,
        query: &ImageDescription,
        candidate: &ImageDescription,
    ) -> Vec<GoodMatch> {
        let candidates = candidate.descriptors();
        if candidates.len() < 2 {
            return Vec::new();
        }
        let k = self.settings.ratio_test_k;
        query
            .descriptors()
            .iter()
            .enumerate()
            .filter_map(|(query_index, descriptor)| {
                let (best, best_distance, second_distance) = two_nearest(descriptor, candidates);
                let passes = (best_distance as f32) < k * second_distance as f32;
                passes.then_some(GoodMatch {
                    query_index,
                    candidate_index: best,
                    distance: best_distance,
                })
            })
            .collect()
    }

    /// Percentage of query rows with a good match, plus the weighted
    /// histogram correlation. `None` when no row matched at all.
    pub fn score(&self, query: &ImageDescription, candidate: &ImageDescription) -> Option<f32> {
        let total = query.descriptors().len();
        if total == 0 {
            return None;
        }
        let good = self.good_matches(query, candidate).len();
        if good == 0 {
            return None;
        }
        let mut score = good as f32 / total as f32 * 100.0;
        if self.settings.histogram_weight > 0.0 {
            score += self.settings.histogram_weight
                * query.histogram().correlation(candidate.histogram());
        }
        Some(score)
    }

    /// Scores every candidate and keeps those reaching the threshold, best
    /// first.
    pub fn find_matches<'a, I>(&self, query: &ImageDescription, candidates: I) -> Vec<ScoredMatch>
    where
        I: IntoIterator<Item = &'a Arc<ImageDescription>>,
    {
        let mut matches: Vec<ScoredMatch> = candidates
            .into_iter()
            .filter_map(|candidate| {
                let score = self.score(query, candidate)?;
                (score >= self.settings.matching_score_threshold).then(|| ScoredMatch {
                    score,
                    description: Arc::clone(candidate),
                })
            })
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches
    }
}

fn hamming(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

// Index of the nearest row, its distance and the second nearest distance.
fn two_nearest(descriptor: &Descriptor, candidates: &[Descriptor]) -> (usize, u32, u32) {
    let mut best = (0usize, u32::MAX);
    let mut second = u32::MAX;
    for (index, candidate) in candidates.iter().enumerate() {
        let distance = hamming(descriptor, candidate);
        if distance < best.1 {
            second = best.1;
            best = (index, distance);
        } else if distance < second {
            second = distance;
        }
    }
    (best.0, best.1, second)
}
