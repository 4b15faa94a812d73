//! MLP classifier: hyperparameters, the fit contract, and the SGD training loop.
use crate::activations::{ActivationKind, OutputKind};
use crate::error::{Error, Result};
use crate::network::{Architecture, Mlp};
use crate::optimizer::Sgd;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Largest mini-batch used when `batch_size` is left unset.
const AUTO_BATCH_SIZE: usize = 200;

/// Hyperparameters for [`MlpClassifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlpConfig {
    /// Hidden layer widths, input side first.
    pub hidden_layer_sizes: Vec<usize>,
    /// Activation for hidden layers.
    pub activation: ActivationKind,
    /// L2 penalty coefficient.
    pub alpha: f64,
    /// Mini-batch size; `None` means `min(200, n_samples)`.
    pub batch_size: Option<usize>,
    pub learning_rate_init: f64,
    /// Upper bound on epochs.
    pub max_iter: usize,
    /// Minimum loss improvement that resets the patience counter.
    pub tol: f64,
    /// Epochs without `tol` improvement tolerated before stopping.
    pub n_iter_no_change: usize,
    pub momentum: f64,
    pub nesterov: bool,
    /// Reshuffle sample order every epoch.
    pub shuffle: bool,
    /// Seeds weight initialization and shuffling.
    pub seed: u64,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_layer_sizes: vec![100],
            activation: ActivationKind::Relu,
            alpha: 1e-4,
            batch_size: None,
            learning_rate_init: 1e-3,
            max_iter: 200,
            tol: 1e-4,
            n_iter_no_change: 10,
            momentum: 0.9,
            nesterov: true,
            shuffle: true,
            seed: 1,
        }
    }
}

impl MlpConfig {
    /// The digit trainer's settings: 300 logistic hidden units, learning
    /// rate 0.1, at most 50 epochs, seed 1.
    pub fn mnist() -> Self {
        Self::default()
            .with_hidden_layer_sizes(vec![300])
            .with_activation(ActivationKind::Logistic)
            .with_learning_rate(0.1)
            .with_max_iter(50)
    }

    pub fn with_hidden_layer_sizes(mut self, sizes: Vec<usize>) -> Self {
        self.hidden_layer_sizes = sizes;
        self
    }

    pub fn with_activation(mut self, activation: ActivationKind) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate_init = learning_rate;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_n_iter_no_change(mut self, n: usize) -> Self {
        self.n_iter_no_change = n;
        self
    }

    pub fn with_momentum(mut self, momentum: f64, nesterov: bool) -> Self {
        self.momentum = momentum;
        self.nesterov = nesterov;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.hidden_layer_sizes.iter().any(|&s| s == 0) {
            return Err(Error::InvalidConfig(format!(
                "hidden layer sizes must be positive, got {:?}",
                self.hidden_layer_sizes
            )));
        }
        if !(self.learning_rate_init > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning_rate_init must be > 0, got {}",
                self.learning_rate_init
            )));
        }
        if !(self.alpha >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "alpha must be >= 0, got {}",
                self.alpha
            )));
        }
        if !(0.0..=1.0).contains(&self.momentum) {
            return Err(Error::InvalidConfig(format!(
                "momentum must be in [0, 1], got {}",
                self.momentum
            )));
        }
        if self.max_iter == 0 {
            return Err(Error::InvalidConfig("max_iter must be >= 1".into()));
        }
        if self.batch_size == Some(0) {
            return Err(Error::InvalidConfig("batch_size must be >= 1".into()));
        }
        Ok(())
    }
}

/// Why training ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Loss failed to improve by `tol` for more than `n_iter_no_change` epochs.
    Converged,
    /// `max_iter` epochs ran without meeting the tolerance rule.
    MaxIter,
}

/// Summary of one `fit` call.
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub n_iter: usize,
    /// Mean training loss per epoch.
    pub loss_curve: Vec<f64>,
    pub best_loss: f64,
    pub stop: StopReason,
}

/// A trained model plus how training went.
#[derive(Debug, Clone)]
pub struct Fitted {
    pub model: Mlp,
    pub report: FitReport,
}

/// Anything that turns a labeled feature matrix into a fitted [`Mlp`].
pub trait Classifier {
    fn fit(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<Fitted>;
}

/// Multi-layer perceptron trained with mini-batch SGD on log loss.
#[derive(Debug, Clone, Default)]
pub struct MlpClassifier {
    config: MlpConfig,
}

impl MlpClassifier {
    pub fn new(config: MlpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MlpConfig {
        &self.config
    }
}

impl Classifier for MlpClassifier {
    fn fit(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<Fitted> {
        let cfg = &self.config;
        cfg.validate()?;

        let n_samples = features.len();
        if n_samples == 0 {
            return Err(Error::InvalidConfig("training set is empty".into()));
        }
        if labels.len() != n_samples {
            return Err(Error::ShapeMismatch {
                what: "labels",
                expected: n_samples,
                actual: labels.len(),
            });
        }
        let n_features = features[0].len();
        if let Some(bad) = features.iter().find(|row| row.len() != n_features) {
            return Err(Error::ShapeMismatch {
                what: "feature width",
                expected: n_features,
                actual: bad.len(),
            });
        }

        let classes: Vec<usize> = labels.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let output_units = match OutputKind::for_classes(classes.len()) {
            OutputKind::Logistic => 1,
            OutputKind::Softmax => classes.len(),
        };
        let mut sizes = Vec::with_capacity(cfg.hidden_layer_sizes.len() + 2);
        sizes.push(n_features);
        sizes.extend_from_slice(&cfg.hidden_layer_sizes);
        sizes.push(output_units);
        let architecture = Architecture::new(sizes)?;

        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let mut model = Mlp::new(&architecture, cfg.activation, classes, &mut rng)?;
        let targets: Vec<Vec<f64>> = labels.iter().map(|&l| model.encode_label(l)).collect();

        let batch_size = match cfg.batch_size {
            None => AUTO_BATCH_SIZE.min(n_samples),
            Some(b) if b > n_samples => {
                warn!(batch_size = b, n_samples, "batch size clipped to the sample count");
                n_samples
            }
            Some(b) => b,
        };
        let mut optimizer = Sgd::new(&model.layers, cfg.learning_rate_init, cfg.momentum, cfg.nesterov);
        info!(
            architecture = %architecture,
            n_samples,
            batch_size,
            learning_rate = optimizer.learning_rate(),
            "training MLP"
        );

        let mut order: Vec<usize> = (0..n_samples).collect();
        let mut loss_curve = Vec::with_capacity(cfg.max_iter);
        let mut best_loss = f64::INFINITY;
        let mut no_improvement = 0usize;
        let mut stop = StopReason::MaxIter;

        for epoch in 1..=cfg.max_iter {
            if cfg.shuffle {
                order.shuffle(&mut rng);
            }
            let mut accumulated = 0.0;
            for batch in order.chunks(batch_size) {
                let inputs: Vec<&[f64]> = batch.iter().map(|&i| features[i].as_slice()).collect();
                let batch_targets: Vec<&[f64]> = batch.iter().map(|&i| targets[i].as_slice()).collect();
                let (loss, grads) = model.compute_gradients(&inputs, &batch_targets, cfg.alpha);
                optimizer.step(&mut model.layers, &grads);
                accumulated += loss * batch.len() as f64;
            }
            let loss = accumulated / n_samples as f64;
            loss_curve.push(loss);
            info!("Iteration {}, loss = {:.8}", epoch, loss);

            if loss > best_loss - cfg.tol {
                no_improvement += 1;
            } else {
                no_improvement = 0;
            }
            if loss < best_loss {
                best_loss = loss;
            }
            debug!(epoch, no_improvement, best_loss, "epoch finished");

            if no_improvement > cfg.n_iter_no_change {
                info!(
                    "Training loss did not improve more than tol={} for {} consecutive epochs. Stopping.",
                    cfg.tol, cfg.n_iter_no_change
                );
                stop = StopReason::Converged;
                break;
            }
        }

        if stop == StopReason::MaxIter {
            warn!(
                "Maximum iterations ({}) reached and the optimization hasn't converged yet.",
                cfg.max_iter
            );
        }

        Ok(Fitted {
            model,
            report: FitReport {
                n_iter: loss_curve.len(),
                loss_curve,
                best_loss,
                stop,
            },
        })
    }
}
