//! String similarity strategies used by the fuzzy duplicate resolver.
//!
//! All strategies return a ratio in `[0, 1]` where `1.0` means identical. The
//! resolver only depends on [`SimilarityStrategy`], so both the metric and the
//! cutoff it is compared against can be swapped independently.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use similar::{Algorithm, DiffOp, capture_diff_slices};

pub trait SimilarityStrategy {
    fn similarity(&self, left: &str, right: &str) -> f64;
}

/// Matching-characters ratio `2 * M / T`, where `M` is the number of characters
/// in the longest common subsequence and `T` the total length of both inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceRatio;

impl SimilarityStrategy for SequenceRatio {
    fn similarity(&self, left: &str, right: &str) -> f64 {
        let old = left.chars().collect::<Vec<_>>();
        let new = right.chars().collect::<Vec<_>>();
        let total = old.len() + new.len();
        if total == 0 {
            return 1.0;
        }
        let matches: usize = capture_diff_slices(Algorithm::Myers, &old, &new)
            .iter()
            .map(|op| match op {
                DiffOp::Equal { len, .. } => *len,
                _ => 0,
            })
            .sum();
        (2 * matches) as f64 / total as f64
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedLevenshtein;

impl SimilarityStrategy for NormalizedLevenshtein {
    fn similarity(&self, left: &str, right: &str) -> f64 {
        strsim::normalized_levenshtein(left, right)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JaroWinkler;

impl SimilarityStrategy for JaroWinkler {
    fn similarity(&self, left: &str, right: &str) -> f64 {
        strsim::jaro_winkler(left, right)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum SimilarityMetric {
    #[default]
    SequenceRatio,
    Levenshtein,
    JaroWinkler,
}

impl SimilarityMetric {
    pub fn strategy(&self) -> Box<dyn SimilarityStrategy> {
        match self {
            SimilarityMetric::SequenceRatio => Box::new(SequenceRatio),
            SimilarityMetric::Levenshtein => Box::new(NormalizedLevenshtein),
            SimilarityMetric::JaroWinkler => Box::new(JaroWinkler),
        }
    }
}
