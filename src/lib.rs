pub mod dataset;
pub mod forest;
pub mod io;
pub mod tree;

#[cfg(test)]
mod test_data;

pub use dataset::TrainingSet;
pub use forest::{fit, Forest, ForestParams, ForestParamsBuilder};
pub use io::ParseError;
pub use tree::{Leaf, Tree};

use thiserror::Error;

/// Input-shape errors, rejected before induction or classification starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("training set is empty")]
    EmptyTrainingSet,
    #[error("label array has {labels} entries but feature matrix has {points} points")]
    LabelCountMismatch { labels: usize, points: usize },
    #[error("label {label} is out of range for {n_labels} classes")]
    LabelOutOfRange { label: usize, n_labels: usize },
    #[error("feature vector has {got} dimensions, at least {required} required")]
    FeatureDimMismatch { got: usize, required: usize },
}
