//! Near-duplicate spelling repair for one categorical column.
//!
//! Distinct values are ranked by descending frequency (ties keep first
//! appearance order). Each value that has not itself been merged is compared
//! against the lower-ranked values that are still unmerged; up to
//! `max_matches` of those scoring at or above the threshold are considered,
//! best score first, and each one is rewritten to the higher-ranked spelling
//! when that spelling is strictly more frequent.

use std::collections::{HashMap, HashSet};

use crate::{
    data::{Cell, ColumnType},
    frame::Column,
    similarity::SimilarityStrategy,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    pub from: String,
    pub to: String,
    pub from_count: usize,
    pub to_count: usize,
    pub score: f64,
}

pub struct FuzzyResolver<'a> {
    strategy: &'a dyn SimilarityStrategy,
    threshold: f64,
    max_matches: usize,
}

impl<'a> FuzzyResolver<'a> {
    pub fn new(strategy: &'a dyn SimilarityStrategy, threshold: f64, max_matches: usize) -> Self {
        Self {
            strategy,
            threshold,
            max_matches,
        }
    }

    pub fn plan(&self, cells: &[Option<Cell>]) -> Vec<Correction> {
        let ranked = rank_by_frequency(cells);
        let mut merged = HashSet::new();
        let mut corrections = Vec::new();

        for (rank, (value, count)) in ranked.iter().enumerate() {
            if merged.contains(&rank) {
                continue;
            }
            let mut matches = ranked
                .iter()
                .enumerate()
                .skip(rank + 1)
                .filter(|(candidate, _)| !merged.contains(candidate))
                .filter_map(|(candidate, (other, _))| {
                    let score = self.strategy.similarity(value, other);
                    (score >= self.threshold).then_some((candidate, score))
                })
                .collect::<Vec<_>>();
            matches.sort_by(|a, b| b.1.total_cmp(&a.1));
            matches.truncate(self.max_matches);

            for (candidate, score) in matches {
                let (other, other_count) = &ranked[candidate];
                if count > other_count {
                    merged.insert(candidate);
                    corrections.push(Correction {
                        from: other.clone(),
                        to: value.clone(),
                        from_count: *other_count,
                        to_count: *count,
                        score,
                    });
                }
            }
        }
        corrections
    }

    /// Plans and applies corrections to a text column. Non-text columns are
    /// left alone.
    pub fn resolve(&self, column: &mut Column) -> Vec<Correction> {
        if column.datatype != ColumnType::Text {
            return Vec::new();
        }
        let corrections = self.plan(&column.cells);
        if corrections.is_empty() {
            return corrections;
        }
        {
            let substitutions = corrections
                .iter()
                .map(|c| (c.from.as_str(), c.to.as_str()))
                .collect::<HashMap<_, _>>();
            for cell in &mut column.cells {
                if let Some(Cell::Text(text)) = cell
                    && let Some(canonical) = substitutions.get(text.as_str())
                {
                    *text = (*canonical).to_string();
                }
            }
        }
        corrections
    }
}

fn rank_by_frequency(cells: &[Option<Cell>]) -> Vec<(String, usize)> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut ranked: Vec<(String, usize)> = Vec::new();
    for text in cells.iter().flatten().filter_map(Cell::as_text) {
        match positions.get(text) {
            Some(&idx) => ranked[idx].1 += 1,
            None => {
                positions.insert(text, ranked.len());
                ranked.push((text.to_string(), 1));
            }
        }
    }
    // Stable: equal counts keep first-appearance order.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}
