//! Scalar similarity measures shared by the engines.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::Rating;

/// Cosine similarity between two sparse rating vectors.
///
/// The dot product runs over commonly rated items while each magnitude spans
/// the full vector. Returns 0.0 when the vectors share no item or either has
/// zero magnitude.
pub fn sparse_cosine(a: &[Rating], b: &[Rating]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let lookup: FxHashMap<_, f64> = a.iter().map(|r| (r.item, f64::from(r.value))).collect();
    let norm_a: f64 = lookup.values().map(|v| v * v).sum();

    let mut dot = 0.0;
    let mut norm_b = 0.0;
    let mut common = 0usize;
    for rating in b {
        let value = f64::from(rating.value);
        if let Some(other) = lookup.get(&rating.item) {
            dot += other * value;
            common += 1;
        }
        norm_b += value * value;
    }

    if common == 0 || norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Jaccard index of two label sets; 0.0 when either set is empty.
pub fn jaccard<S: AsRef<str>>(a: &[S], b: &[S]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let left: FxHashSet<&str> = a.iter().map(AsRef::as_ref).collect();
    let right: FxHashSet<&str> = b.iter().map(AsRef::as_ref).collect();
    let intersection = left.intersection(&right).count();
    let union = left.len() + right.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}
