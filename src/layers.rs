//! Dense layer implementation with weights, bias, and activation function.
use crate::activations::Activation;
use rand::Rng;
use std::sync::Arc;

/// Row-major matrix.
pub type Matrix = Vec<Vec<f64>>;

/// A fully-connected (dense) layer.
///
/// `weights[i][j]` connects input unit `i` to output unit `j`, so the matrix
/// is `fan_in × fan_out` and row `i` is everything leaving input `i`. This is
/// also the order the exporter flattens it in.
#[derive(Debug, Clone)]
pub struct DenseLayer {
    pub weights: Matrix,
    pub bias: Vec<f64>,
    pub activation: Arc<dyn Activation + Send + Sync>,
}

impl DenseLayer {
    /// Glorot uniform initialization: weights then biases drawn from
    /// `U(-b, b)` with `b = sqrt(factor / (fan_in + fan_out))`.
    pub fn new<R: Rng + ?Sized>(
        fan_in: usize,
        fan_out: usize,
        factor: f64,
        activation: Arc<dyn Activation + Send + Sync>,
        rng: &mut R,
    ) -> Self {
        let bound = (factor / (fan_in + fan_out) as f64).sqrt();
        let weights: Matrix = (0..fan_in)
            .map(|_| (0..fan_out).map(|_| rng.gen_range(-bound..bound)).collect())
            .collect();
        let bias = (0..fan_out).map(|_| rng.gen_range(-bound..bound)).collect();
        Self {
            weights,
            bias,
            activation,
        }
    }

    pub fn fan_in(&self) -> usize {
        self.weights.len()
    }

    pub fn fan_out(&self) -> usize {
        self.bias.len()
    }

    /// Forward pass: `a = act(x·W + b)`.
    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        let mut z = self.bias.clone();
        for (&x, row) in input.iter().zip(&self.weights) {
            // MNIST rows are mostly background pixels.
            if x == 0.0 {
                continue;
            }
            for (zj, &w) in z.iter_mut().zip(row) {
                *zj += x * w;
            }
        }
        for zj in &mut z {
            *zj = self.activation.apply(*zj);
        }
        z
    }

    /// Error signal for the previous layer's outputs: `δ·Wᵀ`.
    pub fn propagate_delta(&self, delta: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .map(|row| row.iter().zip(delta).map(|(&w, &d)| w * d).sum())
            .collect()
    }

    /// Adds this sample's `xᵀ·δ` and `δ` into the running gradient sums.
    pub fn accumulate_gradients(
        &self,
        input: &[f64],
        delta: &[f64],
        d_w: &mut Matrix,
        db: &mut [f64],
    ) {
        for (b, &d) in db.iter_mut().zip(delta) {
            *b += d;
        }
        for (&x, row) in input.iter().zip(d_w.iter_mut()) {
            if x == 0.0 {
                continue;
            }
            for (g, &d) in row.iter_mut().zip(delta) {
                *g += x * d;
            }
        }
    }

    /// Sum of squared weights, for the L2 penalty.
    pub fn squared_weight_norm(&self) -> f64 {
        self.weights
            .iter()
            .flat_map(|row| row.iter())
            .map(|&w| w * w)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activations::{Identity, Logistic};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fixed_layer() -> DenseLayer {
        DenseLayer {
            weights: vec![vec![1.0, -1.0, 0.5], vec![2.0, 0.0, -0.5]],
            bias: vec![0.1, 0.2, 0.3],
            activation: Arc::new(Identity),
        }
    }

    #[test]
    fn init_respects_glorot_bound_and_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let layer = DenseLayer::new(784, 300, 2.0, Arc::new(Logistic), &mut rng);
        let bound = (2.0f64 / 1084.0).sqrt();
        assert_eq!(layer.fan_in(), 784);
        assert_eq!(layer.fan_out(), 300);
        assert!(layer.weights.iter().all(|row| row.len() == 300));
        assert!(layer
            .weights
            .iter()
            .flatten()
            .chain(layer.bias.iter())
            .all(|w| w.abs() < bound));
    }

    #[test]
    fn forward_is_input_times_weights_plus_bias() {
        let out = fixed_layer().forward(&[1.0, 2.0]);
        assert_relative_eq!(out[0], 1.0 + 4.0 + 0.1);
        assert_relative_eq!(out[1], -1.0 + 0.0 + 0.2);
        assert_relative_eq!(out[2], 0.5 - 1.0 + 0.3);
    }

    #[test]
    fn propagate_delta_multiplies_by_transpose() {
        let back = fixed_layer().propagate_delta(&[1.0, 1.0, 2.0]);
        assert_eq!(back, vec![1.0, 1.0]);
    }

    #[test]
    fn gradients_accumulate_outer_product() {
        let layer = fixed_layer();
        let mut d_w = vec![vec![0.0; 3]; 2];
        let mut db = vec![0.0; 3];
        layer.accumulate_gradients(&[2.0, 0.0], &[1.0, -1.0, 0.5], &mut d_w, &mut db);
        layer.accumulate_gradients(&[1.0, 1.0], &[1.0, 1.0, 1.0], &mut d_w, &mut db);
        assert_eq!(d_w, vec![vec![3.0, -1.0, 2.0], vec![1.0, 1.0, 1.0]]);
        assert_eq!(db, vec![2.0, 0.0, 1.5]);
    }
}
