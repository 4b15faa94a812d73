//! Log-loss functions matched to the output kinds.
use crate::activations::OutputKind;

/// Probabilities are clipped into `[EPS, 1 - EPS]` before taking logs.
const EPS: f64 = f64::EPSILON;

fn clip(p: f64) -> f64 {
    p.clamp(EPS, 1.0 - EPS)
}

fn xlogy(x: f64, y: f64) -> f64 {
    if x == 0.0 {
        0.0
    } else {
        x * y.ln()
    }
}

/// Categorical cross-entropy summed over classes for one sample.
pub fn log_loss(pred: &[f64], target: &[f64]) -> f64 {
    -pred
        .iter()
        .zip(target)
        .map(|(&p, &t)| xlogy(t, clip(p)))
        .sum::<f64>()
}

/// Binary cross-entropy for one sample with one or more logistic outputs.
pub fn binary_log_loss(pred: &[f64], target: &[f64]) -> f64 {
    -pred
        .iter()
        .zip(target)
        .map(|(&p, &t)| {
            let p = clip(p);
            xlogy(t, p) + xlogy(1.0 - t, 1.0 - p)
        })
        .sum::<f64>()
}

/// Per-sample loss for the given output function.
pub fn sample_loss(output: OutputKind, pred: &[f64], target: &[f64]) -> f64 {
    match output {
        OutputKind::Softmax => log_loss(pred, target),
        OutputKind::Logistic => binary_log_loss(pred, target),
    }
}
