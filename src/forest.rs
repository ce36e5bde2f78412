use std::path::Path;

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::{rngs::StdRng, SeedableRng};

use crate::dataset::TrainingSet;
use crate::io;
use crate::tree::Tree;
use crate::{DataError, ParseError};

#[cfg(feature = "use-rayon")]
use rand::Rng;
#[cfg(feature = "use-rayon")]
use rayon::prelude::*;

/// Forest training hyperparameters.
///
/// `s_min` is the partition score at which a node stops searching for a
/// better split; `t_max` bounds the extra trials after the first, so each
/// node runs at most `t_max + 1` trials.
#[derive(Debug, Clone)]
pub struct ForestParams {
    pub n_trees: usize,
    pub s_min: f64,
    pub t_max: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        ForestParamsBuilder::new().build()
    }
}

#[derive(Debug, Clone)]
pub struct ForestParamsBuilder {
    n_trees: usize,
    s_min: f64,
    t_max: usize,
    seed: u64,
}

impl ForestParamsBuilder {
    pub fn new() -> Self {
        Self {
            n_trees: 10,
            s_min: 0.5,
            t_max: 50,
            seed: 42,
        }
    }

    pub fn n_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    pub fn s_min(mut self, s_min: f64) -> Self {
        self.s_min = s_min;
        self
    }

    pub fn t_max(mut self, t_max: usize) -> Self {
        self.t_max = t_max;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(self) -> ForestParams {
        ForestParams {
            n_trees: self.n_trees,
            s_min: self.s_min,
            t_max: self.t_max,
            seed: self.seed,
        }
    }
}

impl Default for ForestParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An ensemble of independently trained randomized trees.
///
/// Every tree sees the same full training set; variance across trees
/// comes solely from independent random split choices, never from
/// resampling.
#[derive(Debug, Clone)]
pub struct Forest {
    pub(crate) trees: Vec<Tree>,
    pub(crate) feature_dim: usize,
}

/// Trains a forest on `features` (rows are points) and `labels` in
/// `[0, n_labels)`. One `StdRng` seeded from `params.seed` drives both
/// feature-index and threshold choice; with `use-rayon` each tree derives
/// its own independently seeded generator instead.
pub fn fit<'a>(
    features: ArrayView2<'a, f64>,
    labels: ArrayView1<'a, usize>,
    n_labels: usize,
    params: &ForestParams,
) -> Result<Forest, DataError> {
    let set = TrainingSet::new(features, labels, n_labels)?;
    let trees;

    #[cfg(not(feature = "use-rayon"))]
    {
        let mut rng = StdRng::seed_from_u64(params.seed);
        trees = (0..params.n_trees)
            .map(|_| {
                let mut tree_set = set.clone();
                let mut tree = Tree::new();
                tree.train(&mut tree_set, params.s_min, params.t_max, &mut rng);
                tree
            })
            .collect();
    }
    #[cfg(feature = "use-rayon")]
    {
        let mut seed_rng = StdRng::seed_from_u64(params.seed);
        let seeds: Vec<u64> = (0..params.n_trees).map(|_| seed_rng.gen()).collect();
        trees = seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let mut tree_set = set.clone();
                let mut tree = Tree::new();
                tree.train(&mut tree_set, params.s_min, params.t_max, &mut rng);
                tree
            })
            .collect();
    }

    Ok(Forest {
        trees,
        feature_dim: features.ncols(),
    })
}

impl Forest {
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Total leaves across all trees, the length of a classification
    /// histogram.
    pub fn n_leaves(&self) -> usize {
        self.trees.iter().map(Tree::n_leaves).sum()
    }

    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    /// Routes `feature` through every tree and returns the concatenated
    /// one-hot-per-tree histogram: length [`Forest::n_leaves`], with
    /// exactly [`Forest::n_trees`] entries set to one.
    pub fn classify(&self, feature: ArrayView1<f64>) -> Result<Array1<f64>, DataError> {
        if feature.len() < self.feature_dim {
            return Err(DataError::FeatureDimMismatch {
                got: feature.len(),
                required: self.feature_dim,
            });
        }
        let mut histogram = Array1::zeros(self.n_leaves());
        self.classify_into(&mut histogram, feature);
        Ok(histogram)
    }

    /// In-place variant of [`Forest::classify`]: increments
    /// `histogram[tree_offset + leaf_index]` for every tree, where
    /// `tree_offset` is the running sum of prior trees' leaf counts.
    pub fn classify_into(&self, histogram: &mut Array1<f64>, feature: ArrayView1<f64>) {
        let mut offset = 0;
        for tree in &self.trees {
            histogram[offset + tree.route(feature).index] += 1.0;
            offset += tree.n_leaves();
        }
    }

    /// True if any single tree routes `feature` to a leaf unmixed with
    /// exactly this label.
    pub fn is_unmixed(&self, feature: ArrayView1<f64>, label: usize) -> bool {
        self.trees
            .iter()
            .any(|tree| tree.route(feature).unmixed == Some(label))
    }

    /// Prunes every tree independently to the same leaf budget.
    pub fn prune(&mut self, max_leaves: usize) {
        for tree in &mut self.trees {
            tree.prune(max_leaves);
        }
    }

    /// Per-tree leaf counts, in tree order.
    pub fn leaves_per_tree(&self) -> Vec<usize> {
        self.trees.iter().map(Tree::n_leaves).collect()
    }

    /// Writes the forest in its structural text format.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path, io::forest_to_text(self))
    }

    /// Reads a forest back from [`Forest::save`] output. Leaf indices and
    /// the weakest-node caches are rebuilt, not read.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Forest, ParseError> {
        io::forest_from_text(&std::fs::read_to_string(path)?)
    }
}
