//! Feed-forward digit classifier for MNIST and its flat parameter export.
//!
//! - IDX loading (gzip or raw) and a positional train/evaluation split
//! - MLP trained with mini-batch SGD (Nesterov momentum, L2 penalty, tolerance-based stopping)
//! - Export of every layer's bias and weights to one value per line, and the reverse import
//! - Accuracy and confusion-matrix metrics

pub mod activations;
pub mod classifier;
pub mod datasets;
pub mod error;
pub mod export;
pub mod layers;
pub mod loss;
pub mod metrics;
pub mod network;
pub mod optimizer;
pub mod utils;

pub use activations::{Activation, ActivationKind, Identity, Logistic, OutputKind, ReLU, Tanh};
pub use classifier::{Classifier, FitReport, Fitted, MlpClassifier, MlpConfig, StopReason};
pub use datasets::{load_mnist, Dataset, Mnist, MNIST_TRAIN_CUTOFF};
pub use error::{Error, Result};
pub use export::{
    export_parameters, flatten_parameters, import_parameters, read_parameters, segments,
    write_parameters, Segment, SegmentKind, DEFAULT_EXPORT_PATH,
};
pub use layers::{DenseLayer, Matrix};
pub use metrics::{confusion_matrix, Evaluation};
pub use network::{Architecture, Mlp, Prediction};
pub use utils::{log_fit_summary, log_model_summary, synthetic_blobs};
