//! Per-label vote mappings.
//!
//! Labels are `usize` class indices. The map is ordered by label so that
//! iteration, accumulation and tie-breaking are deterministic across runs.

use std::collections::btree_map;
use std::collections::BTreeMap;

/// Label emitted when no learner has cast a vote.
pub const DEFAULT_LABEL: usize = 0;

/// Mapping from class label to vote mass.
///
/// # Example
///
/// ```
/// use adaforest::online::Votes;
///
/// let mut votes = Votes::new();
/// votes.add(2, 1.0);
/// votes.add(1, 3.0);
/// votes.normalize();
/// assert_eq!(votes.argmax(), Some(1));
/// assert!((votes.get(1) - 0.75).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Votes {
    inner: BTreeMap<usize, f64>,
}

impl Votes {
    /// Create an empty vote mapping
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` to the mass of `label`, creating the entry if missing
    pub fn add(&mut self, label: usize, value: f64) {
        *self.inner.entry(label).or_insert(0.0) += value;
    }

    /// Vote mass for `label` (0.0 when absent)
    #[must_use]
    pub fn get(&self, label: usize) -> f64 {
        self.inner.get(&label).copied().unwrap_or(0.0)
    }

    /// Whether `label` has an entry
    #[must_use]
    pub fn contains(&self, label: usize) -> bool {
        self.inner.contains_key(&label)
    }

    /// Number of labels with an entry
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True if no label has an entry
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Sum of all vote masses
    #[must_use]
    pub fn total(&self) -> f64 {
        self.inner.values().sum()
    }

    /// Rescale so that the masses sum to 1.
    ///
    /// Leaves the mapping untouched when the total is not positive.
    pub fn normalize(&mut self) {
        let total = self.total();
        if total > 0.0 {
            self.scale(1.0 / total);
        }
    }

    /// Multiply every mass by `factor`
    pub fn scale(&mut self, factor: f64) {
        for value in self.inner.values_mut() {
            *value *= factor;
        }
    }

    /// Accumulate every entry of `other` into `self`
    pub fn merge(&mut self, other: &Votes) {
        for (&label, &value) in &other.inner {
            self.add(label, value);
        }
    }

    /// Label with the largest mass.
    ///
    /// Ties go to the smallest label; `None` when empty.
    #[must_use]
    pub fn argmax(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (&label, &value) in &self.inner {
            match best {
                Some((_, best_value)) if value <= best_value => {}
                _ => best = Some((label, value)),
            }
        }
        best.map(|(label, _)| label)
    }

    /// Iterate `(label, mass)` pairs in ascending label order
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.inner.iter().map(|(&label, &value)| (label, value))
    }
}

impl FromIterator<(usize, f64)> for Votes {
    fn from_iter<I: IntoIterator<Item = (usize, f64)>>(iter: I) -> Self {
        let mut votes = Votes::new();
        for (label, value) in iter {
            votes.add(label, value);
        }
        votes
    }
}

impl IntoIterator for Votes {
    type Item = (usize, f64);
    type IntoIter = btree_map::IntoIter<usize, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_accumulates() {
        let mut votes = Votes::new();
        votes.add(3, 1.5);
        votes.add(3, 0.5);
        assert_eq!(votes.len(), 1);
        assert!((votes.get(3) - 2.0).abs() < 1e-12);
        assert_eq!(votes.get(7), 0.0);
    }

    #[test]
    fn test_normalize_sums_to_one() {
        let mut votes: Votes = [(0, 2.0), (1, 6.0)].into_iter().collect();
        votes.normalize();
        assert!((votes.total() - 1.0).abs() < 1e-12);
        assert!((votes.get(1) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_zero_total_is_noop() {
        let mut votes: Votes = [(0, 0.0), (1, 0.0)].into_iter().collect();
        votes.normalize();
        assert_eq!(votes.get(0), 0.0);
        assert_eq!(votes.len(), 2);
    }

    #[test]
    fn test_argmax_empty_is_none() {
        assert_eq!(Votes::new().argmax(), None);
    }

    #[test]
    fn test_argmax_tie_goes_to_smallest_label() {
        let votes: Votes = [(5, 1.0), (2, 1.0), (9, 1.0)].into_iter().collect();
        assert_eq!(votes.argmax(), Some(2));
    }

    #[test]
    fn test_argmax_picks_max() {
        let votes: Votes = [(0, 0.2), (1, 0.7), (2, 0.1)].into_iter().collect();
        assert_eq!(votes.argmax(), Some(1));
    }

    #[test]
    fn test_merge_creates_missing_keys() {
        let mut a: Votes = [(0, 1.0)].into_iter().collect();
        let b: Votes = [(0, 0.5), (4, 2.0)].into_iter().collect();
        a.merge(&b);
        assert!((a.get(0) - 1.5).abs() < 1e-12);
        assert!((a.get(4) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_iter_is_label_ordered() {
        let votes: Votes = [(9, 1.0), (1, 1.0), (4, 1.0)].into_iter().collect();
        let labels: Vec<usize> = votes.iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec![1, 4, 9]);
    }
}
