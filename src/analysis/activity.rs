//! how busy the rows of a subarray are for each input vector

use bit_vec::BitVec;
use serde::{Deserialize, Serialize};

use super::{
    matrix::WeightMatrix,
    traits::{get_mean_std_max, ReportStats},
};

/// how the row activity of a read is derived, chosen once per run
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ActivityPolicy {
    /// fraction of rows driven high
    RawActivation,
    /// fraction of rows whose input changed since the previous vector
    ToggleActivation,
    /// a fixed number of active rows whatever the data
    Forced { active_rows: usize },
}

/// the activity figures handed to the subarray model for one read
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadActivity {
    pub row_activity: f64,
    /// fraction of cells feeding a switching input into the digital adder tree
    pub adder_toggle_rate: f64,
}

/// what was measured on one input vector
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VectorSample {
    pub activity: ReadActivity,
    pub rows: usize,
    pub activated_rows: usize,
    pub toggled_rows: usize,
    pub adder_tree_toggles: usize,
}

/// cells in `rows` holding the highest conductance
fn max_weights_in(weights: &WeightMatrix, rows: impl Iterator<Item = usize>) -> usize {
    rows.map(|i| weights.row(i).iter().filter(|w| weights.is_max(**w)).count())
        .sum()
}

impl ActivityPolicy {
    /// measure `current` against the vector read right before it
    pub fn measure(
        &self,
        current: &BitVec,
        previous: Option<&BitVec>,
        weights: &WeightMatrix,
    ) -> VectorSample {
        let rows = current.len();
        let cells = (rows * weights.cols()).max(1) as f64;
        let activated_rows = current.iter().filter(|b| *b).count();
        let toggled: Vec<usize> = match previous {
            None => current
                .iter()
                .enumerate()
                .filter_map(|(i, b)| b.then_some(i))
                .collect(),
            Some(previous) => current
                .iter()
                .zip(previous.iter())
                .enumerate()
                .filter_map(|(i, (now, before))| (now != before).then_some(i))
                .collect(),
        };
        let len = rows.max(1) as f64;

        let (row_activity, adder_tree_toggles) = match self {
            ActivityPolicy::RawActivation => {
                let active = current.iter().enumerate().filter_map(|(i, b)| b.then_some(i));
                (
                    activated_rows as f64 / len,
                    max_weights_in(weights, active),
                )
            }
            ActivityPolicy::ToggleActivation => (
                toggled.len() as f64 / len,
                max_weights_in(weights, toggled.iter().copied()),
            ),
            ActivityPolicy::Forced { active_rows } => {
                let active = (*active_rows).min(rows);
                (active as f64 / len, max_weights_in(weights, 0..active))
            }
        };
        VectorSample {
            activity: ReadActivity {
                row_activity,
                adder_toggle_rate: adder_tree_toggles as f64 / cells,
            },
            rows,
            activated_rows,
            toggled_rows: toggled.len(),
            adder_tree_toggles,
        }
    }
}

/// counters gathered while reading, only used for reporting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityStatistics {
    pub vectors: usize,
    /// rows summed over all vectors
    pub row_positions: usize,
    pub activated_rows: usize,
    pub toggle_count: usize,
    pub adder_tree_toggles: usize,
    /// cells left in the lowest conductance state
    pub zero_weights: usize,
    pub weight_count: usize,
}

impl ActivityStatistics {
    pub fn record(&mut self, sample: &VectorSample) {
        self.vectors += 1;
        self.row_positions += sample.rows;
        self.activated_rows += sample.activated_rows;
        self.toggle_count += sample.toggled_rows;
        self.adder_tree_toggles += sample.adder_tree_toggles;
    }

    pub fn record_weights(&mut self, weights: &WeightMatrix) {
        self.zero_weights += weights.count_min();
        self.weight_count += weights.rows() * weights.cols();
    }

    /// fold `other` into `self`
    pub fn merge(&mut self, other: ActivityStatistics) {
        self.vectors += other.vectors;
        self.row_positions += other.row_positions;
        self.activated_rows += other.activated_rows;
        self.toggle_count += other.toggle_count;
        self.adder_tree_toggles += other.adder_tree_toggles;
        self.zero_weights += other.zero_weights;
        self.weight_count += other.weight_count;
    }

    fn ratio(num: usize, den: usize) -> f64 {
        if den == 0 {
            0.0
        } else {
            num as f64 / den as f64
        }
    }

    pub fn activation_rate(&self) -> f64 {
        Self::ratio(self.activated_rows, self.row_positions)
    }

    pub fn toggle_rate(&self) -> f64 {
        Self::ratio(self.toggle_count, self.row_positions)
    }

    pub fn sparsity(&self) -> f64 {
        Self::ratio(self.zero_weights, self.weight_count)
    }
}

impl ReportStats for ActivityStatistics {
    fn report_stats(data_vec: &[Self]) -> std::collections::BTreeMap<String, (f64, f64, f64)> {
        let mut map = std::collections::BTreeMap::new();
        map.insert(
            "activation_rate".to_string(),
            get_mean_std_max(data_vec, |x| x.activation_rate()),
        );
        map.insert(
            "toggle_rate".to_string(),
            get_mean_std_max(data_vec, |x| x.toggle_rate()),
        );
        map.insert(
            "sparsity".to_string(),
            get_mean_std_max(data_vec, |x| x.sparsity()),
        );
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN_G: f64 = 1e-6;
    const MAX_G: f64 = 1e-4;

    fn bits(s: &str) -> BitVec {
        s.chars().map(|c| c == '1').collect()
    }

    /// row i holds i+1 max weights out of 4 columns
    fn weights() -> WeightMatrix {
        WeightMatrix::from_fn(4, 4, MIN_G, MAX_G, |i, j| if j <= i { MAX_G } else { MIN_G })
    }

    #[test]
    fn test_raw_activation() {
        let sample = ActivityPolicy::RawActivation.measure(&bits("1010"), None, &weights());
        assert_eq!(sample.activity.row_activity, 0.5);
        assert_eq!(sample.activated_rows, 2);
        // rows 0 and 2 hold 1 + 3 max weights
        assert_eq!(sample.adder_tree_toggles, 4);
        assert_eq!(sample.activity.adder_toggle_rate, 4.0 / 16.0);
    }

    #[test]
    fn test_toggle_first_vector_counts_ones() {
        let sample = ActivityPolicy::ToggleActivation.measure(&bits("0110"), None, &weights());
        assert_eq!(sample.toggled_rows, 2);
        assert_eq!(sample.activity.row_activity, 0.5);
        assert_eq!(sample.adder_tree_toggles, 2 + 3);
    }

    #[test]
    fn test_toggle_against_previous() {
        let previous = bits("0110");
        let sample = ActivityPolicy::ToggleActivation.measure(&bits("0111"), Some(&previous), &weights());
        assert_eq!(sample.toggled_rows, 1);
        assert_eq!(sample.activity.row_activity, 0.25);
        assert_eq!(sample.adder_tree_toggles, 4);
        assert_eq!(sample.activated_rows, 3);

        let same = ActivityPolicy::ToggleActivation.measure(&previous, Some(&previous), &weights());
        assert_eq!(same.activity, ReadActivity::default());
    }

    #[test]
    fn test_forced() {
        let sample = ActivityPolicy::Forced { active_rows: 3 }.measure(&bits("0000"), None, &weights());
        assert_eq!(sample.activity.row_activity, 0.75);
        let sample = ActivityPolicy::Forced { active_rows: 9 }.measure(&bits("0000"), None, &weights());
        assert_eq!(sample.activity.row_activity, 1.0);
    }

    #[test]
    fn test_statistics() {
        let w = weights();
        let mut stats = ActivityStatistics::default();
        stats.record_weights(&w);
        let policy = ActivityPolicy::ToggleActivation;
        let a = bits("1100");
        let b = bits("1000");
        stats.record(&policy.measure(&a, None, &w));
        stats.record(&policy.measure(&b, Some(&a), &w));
        assert_eq!(stats.vectors, 2);
        assert_eq!(stats.row_positions, 8);
        assert_eq!(stats.activated_rows, 3);
        assert_eq!(stats.toggle_count, 3);
        assert_eq!(stats.zero_weights, 6);
        assert_eq!(stats.sparsity(), 6.0 / 16.0);

        let mut total = ActivityStatistics::default();
        total.merge(stats.clone());
        total.merge(stats);
        assert_eq!(total.vectors, 4);
        assert_eq!(total.row_positions, 16);
        assert_eq!(total.activation_rate(), 3.0 / 8.0);
    }

    #[test]
    fn test_report_stats() {
        let w = weights();
        let policy = ActivityPolicy::RawActivation;
        // one layer with every row on, one with half of them
        let layers: Vec<_> = ["1111", "1100"]
            .iter()
            .map(|v| {
                let mut stats = ActivityStatistics::default();
                stats.record_weights(&w);
                stats.record(&policy.measure(&bits(v), None, &w));
                stats
            })
            .collect();
        let report = ActivityStatistics::report_stats(&layers);
        assert_eq!(report["activation_rate"], (0.75, 0.25, 1.0));
        // the first vector of a layer toggles every row driven high
        assert_eq!(report["toggle_rate"], (0.75, 0.25, 1.0));
        assert_eq!(report["sparsity"], (6.0 / 16.0, 0.0, 6.0 / 16.0));
    }

    #[test]
    fn test_empty_statistics() {
        let stats = ActivityStatistics::default();
        assert_eq!(stats.toggle_rate(), 0.0);
        assert_eq!(stats.sparsity(), 0.0);
    }
}
