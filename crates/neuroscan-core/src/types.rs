//! Prediction types shared by classifiers and the HTTP surface

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A single ranked label with its confidence score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Class label
    pub label: String,

    /// Confidence score (0.0-1.0)
    pub score: f32,
}

impl Prediction {
    /// Create a new prediction
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Rank `scores` in descending order and keep the best `k`.
///
/// `labels[i]` names `scores[i]`; indices without a label fall back to
/// `LABEL_<i>`. NaN scores sort after every real score.
pub fn rank_top_k(scores: &[f32], labels: &[String], k: usize) -> Vec<Prediction> {
    let mut indexed: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| descending(a.1, b.1));

    indexed
        .into_iter()
        .take(k)
        .map(|(idx, score)| {
            let label = labels
                .get(idx)
                .cloned()
                .unwrap_or_else(|| format!("LABEL_{}", idx));
            Prediction::new(label, score)
        })
        .collect()
}

fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
