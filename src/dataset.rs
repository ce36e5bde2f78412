use itertools::Itertools;
use ndarray::{ArrayView1, ArrayView2};

use crate::DataError;

fn x_log_x(p: f64) -> f64 {
    if p > 0.0 {
        p * p.ln()
    } else {
        0.0
    }
}

/// An index-based view over a shared feature matrix and label array.
///
/// Rows of `features` are points, columns are feature dimensions. A view
/// owns only its sequence of active point indices plus derived statistics
/// (label occupancies, memoized per-dimension extrema); the backing store
/// is borrowed read-only and never copied. Child views produced by
/// [`TrainingSet::partition`] share the same store.
#[derive(Debug, Clone)]
pub struct TrainingSet<'a> {
    features: ArrayView2<'a, f64>,
    labels: ArrayView1<'a, usize>,
    n_labels: usize,
    indices: Vec<usize>,
    label_occurrences: Vec<usize>,
    min_features: Vec<Option<f64>>,
    max_features: Vec<Option<f64>>,
}

impl<'a> TrainingSet<'a> {
    /// Builds the full view over every point, validating input shape.
    pub fn new(
        features: ArrayView2<'a, f64>,
        labels: ArrayView1<'a, usize>,
        n_labels: usize,
    ) -> Result<Self, DataError> {
        if features.nrows() == 0 {
            return Err(DataError::EmptyTrainingSet);
        }
        if labels.len() != features.nrows() {
            return Err(DataError::LabelCountMismatch {
                labels: labels.len(),
                points: features.nrows(),
            });
        }
        if let Some(&label) = labels.iter().find(|&&l| l >= n_labels) {
            return Err(DataError::LabelOutOfRange { label, n_labels });
        }

        let mut set = TrainingSet {
            features,
            labels,
            n_labels,
            indices: (0..features.nrows()).collect(),
            label_occurrences: vec![0; n_labels],
            min_features: vec![None; features.ncols()],
            max_features: vec![None; features.ncols()],
        };
        set.compute_label_occurrences();
        Ok(set)
    }

    /// An empty view over the same backing store, used as a partition target.
    pub fn empty_like(&self) -> TrainingSet<'a> {
        TrainingSet {
            features: self.features,
            labels: self.labels,
            n_labels: self.n_labels,
            indices: Vec::new(),
            label_occurrences: vec![0; self.n_labels],
            min_features: vec![None; self.features.ncols()],
            max_features: vec![None; self.features.ncols()],
        }
    }

    pub fn n_points(&self) -> usize {
        self.indices.len()
    }

    pub fn n_labels(&self) -> usize {
        self.n_labels
    }

    pub fn feature_dim(&self) -> usize {
        self.features.ncols()
    }

    /// Label of the `i`-th active point.
    pub fn point_label(&self, i: usize) -> usize {
        self.labels[self.indices[i]]
    }

    /// Value of feature `d` for the `i`-th active point.
    pub fn point_feature(&self, i: usize, d: usize) -> f64 {
        self.features[(self.indices[i], d)]
    }

    pub fn label_occurrences(&self, label: usize) -> usize {
        self.label_occurrences[label]
    }

    fn compute_label_occurrences(&mut self) {
        self.label_occurrences.clear();
        self.label_occurrences.resize(self.n_labels, 0);
        for &i in &self.indices {
            self.label_occurrences[self.labels[i]] += 1;
        }
    }

    /// Clears the active index sequence and every derived statistic.
    pub fn flush_indices(&mut self, capacity: usize) {
        self.indices.clear();
        self.indices.reserve(capacity);
        self.label_occurrences.clear();
        self.label_occurrences.resize(self.n_labels, 0);
        self.min_features.fill(None);
        self.max_features.fill(None);
    }

    /// Splits the active points into `left` (`feature < threshold`) and
    /// `right` (the rest), recomputing both targets' label occupancies.
    /// The backing store is untouched.
    pub fn partition(
        &self,
        feature: usize,
        threshold: f64,
        left: &mut TrainingSet<'a>,
        right: &mut TrainingSet<'a>,
    ) {
        left.flush_indices(self.n_points());
        right.flush_indices(self.n_points());
        for &i in &self.indices {
            if self.features[(i, feature)] < threshold {
                left.indices.push(i);
            } else {
                right.indices.push(i);
            }
        }
        left.compute_label_occurrences();
        right.compute_label_occurrences();
    }

    /// True iff exactly one label class has nonzero occupancy.
    pub fn is_unmixed(&self) -> bool {
        self.label_occurrences.iter().filter(|&&c| c > 0).count() == 1
    }

    /// True if no split could separate anything: either the set is
    /// unmixed, or every active point is numerically identical across all
    /// feature dimensions (exact equality, zero tolerance).
    pub fn is_indivisible(&self) -> bool {
        if self.is_unmixed() {
            return true;
        }
        (0..self.feature_dim())
            .all(|d| self.indices.iter().map(|&i| self.features[(i, d)]).all_equal())
    }

    /// Shannon entropy (natural log) of the label distribution.
    pub fn label_entropy(&self) -> f64 {
        let n = self.n_points() as f64;
        self.label_occurrences
            .iter()
            .map(|&c| -x_log_x(c as f64 / n))
            .sum()
    }

    /// Binary entropy of the size ratio `|a| / (|a| + |b|)`.
    pub fn partition_entropy(a: &TrainingSet, b: &TrainingSet) -> f64 {
        let p = a.n_points() as f64 / (a.n_points() + b.n_points()) as f64;
        -x_log_x(p) - x_log_x(1.0 - p)
    }

    /// Joint entropy over the 2 x L (side, label) contingency table,
    /// normalized by `|a| + |b|`.
    pub fn label_partition_joint_entropy(a: &TrainingSet, b: &TrainingSet) -> f64 {
        let n = (a.n_points() + b.n_points()) as f64;
        let mut entropy = 0.0;
        for label in 0..a.n_labels() {
            entropy += -x_log_x(a.label_occurrences(label) as f64 / n);
            entropy += -x_log_x(b.label_occurrences(label) as f64 / n);
        }
        entropy
    }

    /// Memoized minimum of feature `d` over the active points.
    pub fn min_feature(&mut self, d: usize) -> f64 {
        match self.min_features[d] {
            Some(m) => m,
            None => {
                let m = self
                    .indices
                    .iter()
                    .map(|&i| self.features[(i, d)])
                    .fold(f64::INFINITY, f64::min);
                self.min_features[d] = Some(m);
                m
            }
        }
    }

    /// Memoized maximum of feature `d` over the active points.
    pub fn max_feature(&mut self, d: usize) -> f64 {
        match self.max_features[d] {
            Some(m) => m,
            None => {
                let m = self
                    .indices
                    .iter()
                    .map(|&i| self.features[(i, d)])
                    .fold(f64::NEG_INFINITY, f64::max);
                self.max_features[d] = Some(m);
                m
            }
        }
    }
}
