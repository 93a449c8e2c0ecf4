//! Gap-based outlier detection over corpus distances.
//!
//! Instead of a fixed similarity threshold, plagiarism shows up as a relative
//! discontinuity: genuine duplicates cluster at small distances, well below
//! the bulk of unrelated corpus entries. This module finds the largest
//! normalized gap in a sorted distance distribution and turns it into a
//! suspicion score.

use serde::{Deserialize, Serialize};

/// Finite stand-in for distances that are capped or infinite.
pub const MAX_DISTANCE: f64 = 10_000.0;

/// Added to every distance so gap normalization never divides by zero.
const EPSILON: f64 = 0.001;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapConfig {
    /// Weights the raw gap before normalization; larger values demand a more
    /// pronounced discontinuity for the same score.
    pub weight_threshold: f64,
    /// Candidate clusters larger than this are treated as commonly occurring
    /// content (a shared logo, boilerplate) rather than plagiarism.
    pub cutoff: usize,
}

impl Default for GapConfig {
    fn default() -> Self {
        Self { weight_threshold: 1.0, cutoff: 10 }
    }
}

/// Outcome of one gap detection run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Number of corpus entries on the suspicious side of the largest gap.
    pub match_count: usize,
    /// Normalized suspicion in [0, 1); 0.0 means no evidence.
    pub score: f64,
}

impl Detection {
    fn none() -> Self {
        Self { match_count: 0, score: 0.0 }
    }
}

/// Finds the largest relative gap in `distances` and scores it.
///
/// Infinite distances are replaced by [`MAX_DISTANCE`], an epsilon is added
/// throughout, the values are sorted and clipped at their median (so one
/// extreme non-match cannot dominate), and adjacent pairs are compared by
/// `(j - i) / i`. Pairs where either clipped value sits at the sentinel cap
/// contribute no gap. The index of the largest gap plus one is the candidate
/// match count; the score is `g / (t + g)` for gap `g` and weight `t`.
///
/// Fewer than two samples yield `(0, 0.0)`: with no adjacent pair there is
/// no gap evidence. A candidate cluster larger than `cutoff` yields the full
/// sample count with score 0.0.
pub fn detect(distances: &[f64], config: &GapConfig) -> Detection {
    if distances.len() < 2 {
        return Detection::none();
    }

    let mut data: Vec<f64> = distances
        .iter()
        .map(|&d| if d.is_finite() { d.min(MAX_DISTANCE) } else { MAX_DISTANCE } + EPSILON)
        .collect();
    data.sort_by(f64::total_cmp);

    let median = median_of_sorted(&data);
    for value in &mut data {
        if *value > median {
            *value = median;
        }
    }

    let gaps: Vec<f64> = data.windows(2).map(|pair| relative_gap(pair[0], pair[1])).collect();
    // First occurrence of the maximum, like an argmax.
    let mut best_index = 0;
    let mut best_gap = gaps[0];
    for (index, &gap) in gaps.iter().enumerate().skip(1) {
        if gap > best_gap {
            best_gap = gap;
            best_index = index;
        }
    }

    let weighted = best_gap / config.weight_threshold;
    let score = weighted / (1.0 + weighted);
    if best_index > config.cutoff {
        return Detection { match_count: distances.len(), score: 0.0 };
    }
    Detection { match_count: best_index + 1, score }
}

/// Relative distance between sorted neighbors, zeroed at the sentinel cap.
fn relative_gap(smaller: f64, larger: f64) -> f64 {
    if smaller >= MAX_DISTANCE || larger >= MAX_DISTANCE {
        0.0
    } else {
        (larger - smaller).abs() / smaller
    }
}

/// Median of an already-sorted slice; even lengths average the middle pair.
fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_no_match() {
        assert_eq!(detect(&[], &GapConfig::default()), Detection { match_count: 0, score: 0.0 });
    }

    #[test]
    fn single_sample_is_no_match() {
        let detection = detect(&[0.5], &GapConfig::default());
        assert_eq!(detection.match_count, 0);
        assert_eq!(detection.score, 0.0);
    }

    #[test]
    fn one_close_match_among_distant_corpus() {
        let mut distances = vec![0.1];
        distances.extend(std::iter::repeat(500.0).take(9));
        let detection = detect(&distances, &GapConfig::default());
        assert_eq!(detection.match_count, 1);
        assert!(detection.score > 0.9);
        assert!(detection.score < 1.0);
    }

    #[test]
    fn tight_cluster_is_counted_whole() {
        let distances = vec![1.0, 1.1, 1.2, 800.0, 810.0, 820.0, 830.0];
        let detection = detect(&distances, &GapConfig::default());
        assert_eq!(detection.match_count, 3);
        assert!(detection.score > 0.5);
    }

    #[test]
    fn uniform_distances_score_zero() {
        let distances = vec![42.0; 8];
        let detection = detect(&distances, &GapConfig::default());
        assert_eq!(detection.score, 0.0);
    }

    #[test]
    fn all_sentinel_distances_score_zero() {
        let distances = vec![MAX_DISTANCE; 5];
        let detection = detect(&distances, &GapConfig::default());
        assert_eq!(detection.score, 0.0);
    }

    #[test]
    fn infinite_distances_are_capped() {
        let distances = vec![0.2, f64::INFINITY, f64::INFINITY, 50.0];
        let detection = detect(&distances, &GapConfig::default());
        assert_eq!(detection.match_count, 1);
        assert!(detection.score > 0.0);
        assert!(detection.score < 1.0);
    }

    #[test]
    fn cluster_larger_than_cutoff_is_rejected() {
        // Twelve near-identical close entries before the gap: common content,
        // not plagiarism.
        let mut distances: Vec<f64> = (0..12).map(|i| 1.0 + i as f64 * 0.001).collect();
        distances.extend(std::iter::repeat(900.0).take(12));
        let config = GapConfig::default();
        let detection = detect(&distances, &config);
        assert_eq!(detection.score, 0.0);
        assert_eq!(detection.match_count, distances.len());
    }

    #[test]
    fn weight_threshold_dampens_scores() {
        let distances = vec![0.5, 300.0, 310.0, 320.0];
        let strict = detect(&distances, &GapConfig { weight_threshold: 100.0, cutoff: 10 });
        let lenient = detect(&distances, &GapConfig::default());
        assert_eq!(strict.match_count, lenient.match_count);
        assert!(strict.score < lenient.score);
    }

    #[test]
    fn one_real_match_against_one_sentinel_is_detected() {
        // The sentinel is clipped down to the median, which still leaves a
        // huge relative gap above the real match.
        let detection = detect(&[0.0, MAX_DISTANCE], &GapConfig::default());
        assert_eq!(detection.match_count, 1);
        assert!(detection.score > 0.9);
    }
}
