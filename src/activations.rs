//! Hidden-layer activations and the output functions applied to final logits.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Trait for element-wise activation functions.
///
/// Back-propagation only keeps post-activation values around, so the
/// derivative is expressed in terms of the output `a = f(z)`.
pub trait Activation: fmt::Debug + Send + Sync {
    fn apply(&self, x: f64) -> f64;
    fn derivative_from_output(&self, a: f64) -> f64;
    fn apply_vec(&self, x: &[f64]) -> Vec<f64> {
        x.iter().map(|&xi| self.apply(xi)).collect()
    }
}

/// Identity: f(x) = x
#[derive(Debug, Clone, Default)]
pub struct Identity;

impl Activation for Identity {
    fn apply(&self, x: f64) -> f64 {
        x
    }
    fn derivative_from_output(&self, _a: f64) -> f64 {
        1.0
    }
}

/// Logistic sigmoid: 1 / (1 + exp(-x))
#[derive(Debug, Clone, Default)]
pub struct Logistic;

impl Activation for Logistic {
    fn apply(&self, x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }
    fn derivative_from_output(&self, a: f64) -> f64 {
        a * (1.0 - a)
    }
}

/// Tanh
#[derive(Debug, Clone, Default)]
pub struct Tanh;

impl Activation for Tanh {
    fn apply(&self, x: f64) -> f64 {
        x.tanh()
    }
    fn derivative_from_output(&self, a: f64) -> f64 {
        1.0 - a * a
    }
}

/// ReLU: max(0, x)
#[derive(Debug, Clone, Default)]
pub struct ReLU;

impl Activation for ReLU {
    fn apply(&self, x: f64) -> f64 {
        x.max(0.0)
    }
    fn derivative_from_output(&self, a: f64) -> f64 {
        (a > 0.0) as u8 as f64
    }
}

/// Softmax over a logit vector, shifted by the max for stability.
pub fn softmax(x: &[f64]) -> Vec<f64> {
    if x.is_empty() {
        return Vec::new();
    }
    let max = x.iter().fold(f64::MIN, |a, &b| a.max(b));
    let exps: Vec<f64> = x.iter().map(|&xi| (xi - max).exp()).collect();
    let exp_sum: f64 = exps.iter().sum();
    if !exp_sum.is_finite() || exp_sum <= 0.0 {
        // Fallback to uniform distribution to avoid NaNs
        let n = x.len() as f64;
        return vec![1.0 / n; x.len()];
    }
    exps.into_iter().map(|e| e / exp_sum).collect()
}

/// Hidden activation selector, as it appears in [`crate::MlpConfig`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActivationKind {
    Identity,
    Logistic,
    Tanh,
    #[default]
    Relu,
}

impl ActivationKind {
    pub fn to_arc(self) -> Arc<dyn Activation + Send + Sync> {
        match self {
            ActivationKind::Identity => Arc::new(Identity),
            ActivationKind::Logistic => Arc::new(Logistic),
            ActivationKind::Tanh => Arc::new(Tanh),
            ActivationKind::Relu => Arc::new(ReLU),
        }
    }

    /// Numerator of the Glorot uniform bound `sqrt(factor / (fan_in + fan_out))`.
    pub fn init_factor(self) -> f64 {
        match self {
            ActivationKind::Logistic => 2.0,
            _ => 6.0,
        }
    }
}

/// Function applied to the final layer's logits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// One logistic unit, used for two-class problems.
    Logistic,
    /// Softmax over one unit per class.
    Softmax,
}

impl OutputKind {
    pub fn for_classes(n_classes: usize) -> Self {
        if n_classes == 2 {
            OutputKind::Logistic
        } else {
            OutputKind::Softmax
        }
    }

    pub fn apply(self, logits: &[f64]) -> Vec<f64> {
        match self {
            OutputKind::Logistic => Logistic.apply_vec(logits),
            OutputKind::Softmax => softmax(logits),
        }
    }
}
