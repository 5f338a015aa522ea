//! Outcome distributions.
//!
//! A [`Distribution`] maps a measurement outcome, packed into a `u64` with
//! bit `i` holding classical bit `i`, to a weight. Executors return
//! probabilities; knitting produces signed quasi-probabilities in the same
//! type.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Map from packed outcome to (possibly negative) weight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Distribution {
    weights: FxHashMap<u64, f64>,
}

impl Distribution {
    /// Create an empty distribution.
    pub fn new() -> Self {
        Self::default()
    }

    /// A distribution with all weight on a single outcome.
    pub fn delta(outcome: u64) -> Self {
        let mut dist = Self::new();
        dist.add(outcome, 1.0);
        dist
    }

    /// Build a probability distribution from shot counts.
    pub fn from_counts(counts: &FxHashMap<u64, u64>, shots: u32) -> Self {
        let shots = f64::from(shots.max(1));
        counts
            .iter()
            .map(|(&outcome, &count)| (outcome, count as f64 / shots))
            .collect()
    }

    /// Weight of an outcome (0 if absent).
    pub fn get(&self, outcome: u64) -> f64 {
        self.weights.get(&outcome).copied().unwrap_or(0.0)
    }

    /// Accumulate `weight` onto `outcome`.
    pub fn add(&mut self, outcome: u64, weight: f64) {
        *self.weights.entry(outcome).or_insert(0.0) += weight;
    }

    /// Accumulate `factor * other` into this distribution.
    pub fn add_scaled(&mut self, other: &Distribution, factor: f64) {
        for (outcome, weight) in other.iter() {
            self.add(outcome, factor * weight);
        }
    }

    /// Number of stored outcomes.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Check if no outcome is stored.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Iterate over `(outcome, weight)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, f64)> + '_ {
        self.weights.iter().map(|(&k, &v)| (k, v))
    }

    /// Outcomes sorted ascending, for deterministic output.
    pub fn sorted(&self) -> Vec<(u64, f64)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_unstable_by_key(|&(k, _)| k);
        entries
    }

    /// Sum of all weights.
    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Multiply every weight by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for w in self.weights.values_mut() {
            *w *= factor;
        }
    }

    /// Drop outcomes whose weight magnitude is at most `epsilon`.
    pub fn prune(&mut self, epsilon: f64) {
        self.weights.retain(|_, w| w.abs() > epsilon);
    }

    /// Move bit `i` of every outcome to bit `positions[i]`.
    ///
    /// Bits at or above `positions.len()` must be clear.
    pub fn scatter(&self, positions: &[usize]) -> Distribution {
        self.iter()
            .map(|(outcome, w)| (scatter_bits(outcome, positions), w))
            .collect()
    }

    /// Outer product of two distributions over disjoint bit sets.
    ///
    /// Outcomes are combined with bitwise OR, so the two operands must not
    /// share set bits.
    pub fn tensor(&self, other: &Distribution) -> Distribution {
        let mut out = Distribution::new();
        out.weights.reserve(self.len() * other.len());
        for (a, wa) in self.iter() {
            for (b, wb) in other.iter() {
                out.add(a | b, wa * wb);
            }
        }
        out
    }

    /// Largest absolute weight difference over the union of outcomes.
    pub fn max_abs_diff(&self, other: &Distribution) -> f64 {
        self.iter()
            .map(|(k, w)| (w - other.get(k)).abs())
            .chain(
                other
                    .iter()
                    .filter(|(k, _)| !self.weights.contains_key(k))
                    .map(|(_, w)| w.abs()),
            )
            .fold(0.0, f64::max)
    }

    /// Render outcomes as bitstrings of `num_bits` characters.
    ///
    /// Classical bit 0 is the leftmost character.
    pub fn to_bitstrings(&self, num_bits: usize) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        for (outcome, w) in self.iter() {
            let bits: String = format!("{:0width$b}", outcome, width = num_bits)
                .chars()
                .rev()
                .collect();
            *out.entry(bits).or_insert(0.0) += w;
        }
        out
    }
}

impl FromIterator<(u64, f64)> for Distribution {
    fn from_iter<I: IntoIterator<Item = (u64, f64)>>(iter: I) -> Self {
        let mut dist = Distribution::new();
        for (outcome, weight) in iter {
            dist.add(outcome, weight);
        }
        dist
    }
}

/// Move bit `i` of `value` to bit `positions[i]`.
pub fn scatter_bits(value: u64, positions: &[usize]) -> u64 {
    let mut out = 0u64;
    let mut rest = value;
    let mut i = 0;
    while rest != 0 && i < positions.len() {
        if rest & 1 == 1 {
            out |= 1u64 << positions[i];
        }
        rest >>= 1;
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_add_and_total() {
        let mut dist = Distribution::new();
        dist.add(0b00, 0.5);
        dist.add(0b11, 0.25);
        dist.add(0b11, 0.25);
        assert_eq!(dist.len(), 2);
        assert!((dist.get(0b11) - 0.5).abs() < 1e-12);
        assert!((dist.total() - 1.0).abs() < 1e-12);
        assert_eq!(dist.get(0b01), 0.0);
    }

    #[test]
    fn test_from_counts() {
        let mut counts = FxHashMap::default();
        counts.insert(0, 750);
        counts.insert(3, 250);
        let dist = Distribution::from_counts(&counts, 1000);
        assert!((dist.get(0) - 0.75).abs() < 1e-12);
        assert!((dist.get(3) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_scatter() {
        let dist: Distribution = [(0b01, 0.3), (0b10, 0.7)].into_iter().collect();
        let moved = dist.scatter(&[4, 1]);
        assert!((moved.get(0b1_0000) - 0.3).abs() < 1e-12);
        assert!((moved.get(0b0_0010) - 0.7).abs() < 1e-12);
        assert_eq!(scatter_bits(0b11, &[2, 0]), 0b101);
    }

    #[test]
    fn test_tensor() {
        let a: Distribution = [(0b00, 0.5), (0b01, 0.5)].into_iter().collect();
        let b: Distribution = [(0b00, 0.25), (0b10, 0.75)].into_iter().collect();
        let ab = a.tensor(&b);
        assert_eq!(ab.len(), 4);
        assert!((ab.get(0b11) - 0.375).abs() < 1e-12);
        assert!((ab.total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_to_bitstrings() {
        let dist: Distribution = [(0b001, 1.0)].into_iter().collect();
        let bits = dist.to_bitstrings(3);
        assert_eq!(bits.get("100"), Some(&1.0));
    }

    #[test]
    fn test_max_abs_diff() {
        let a: Distribution = [(0, 0.5), (1, 0.5)].into_iter().collect();
        let b: Distribution = [(0, 0.4), (2, 0.1)].into_iter().collect();
        assert!((a.max_abs_diff(&b) - 0.5).abs() < 1e-12);
        assert!((b.max_abs_diff(&a) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_serialize_json() {
        let dist = Distribution::delta(5);
        let json = serde_json::to_string(&dist).unwrap();
        let back: Distribution = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dist);
    }

    fn dist_on(bits: std::ops::Range<usize>) -> impl Strategy<Value = Distribution> {
        let width = bits.end - bits.start;
        let shift = bits.start;
        prop::collection::vec((0u64..(1 << width), -1.0f64..1.0), 1..6).prop_map(
            move |entries| {
                entries
                    .into_iter()
                    .map(|(k, w)| (k << shift, w))
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn tensor_is_commutative(a in dist_on(0..3), b in dist_on(3..5)) {
            prop_assert!(a.tensor(&b).max_abs_diff(&b.tensor(&a)) < 1e-12);
        }

        #[test]
        fn tensor_is_associative(
            a in dist_on(0..2),
            b in dist_on(2..4),
            c in dist_on(4..6),
        ) {
            let left = a.tensor(&b).tensor(&c);
            let right = a.tensor(&b.tensor(&c));
            prop_assert!(left.max_abs_diff(&right) < 1e-12);
        }

        #[test]
        fn tensor_total_is_product(a in dist_on(0..3), b in dist_on(3..6)) {
            let expected = a.total() * b.total();
            prop_assert!((a.tensor(&b).total() - expected).abs() < 1e-9);
        }
    }
}
