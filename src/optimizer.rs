//! Stochastic gradient descent with (Nesterov) momentum.
use crate::layers::{DenseLayer, Matrix};
use crate::network::Gradients;

#[derive(Debug, Clone, Copy)]
struct Momentum {
    learning_rate: f64,
    momentum: f64,
    nesterov: bool,
}

impl Momentum {
    /// `v = μv - ηg`, then the step is `μv - ηg` (Nesterov) or `v`.
    #[inline]
    fn update(self, v: &mut f64, g: f64) -> f64 {
        *v = self.momentum * *v - self.learning_rate * g;
        if self.nesterov {
            self.momentum * *v - self.learning_rate * g
        } else {
            *v
        }
    }
}

/// Constant-learning-rate SGD. One velocity buffer per parameter.
#[derive(Debug)]
pub struct Sgd {
    rule: Momentum,
    v_w: Vec<Matrix>,
    v_b: Vec<Vec<f64>>,
}

impl Sgd {
    pub fn new(layers: &[DenseLayer], learning_rate: f64, momentum: f64, nesterov: bool) -> Self {
        Self {
            rule: Momentum {
                learning_rate,
                momentum,
                nesterov,
            },
            v_w: layers
                .iter()
                .map(|l| vec![vec![0.0; l.fan_out()]; l.fan_in()])
                .collect(),
            v_b: layers.iter().map(|l| vec![0.0; l.fan_out()]).collect(),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.rule.learning_rate
    }

    pub fn step(&mut self, layers: &mut [DenseLayer], grads: &Gradients) {
        let rule = self.rule;
        for (l, layer) in layers.iter_mut().enumerate() {
            for ((p_row, g_row), v_row) in layer
                .weights
                .iter_mut()
                .zip(&grads.d_w[l])
                .zip(self.v_w[l].iter_mut())
            {
                for ((p, &g), v) in p_row.iter_mut().zip(g_row).zip(v_row.iter_mut()) {
                    *p += rule.update(v, g);
                }
            }
            for ((p, &g), v) in layer
                .bias
                .iter_mut()
                .zip(&grads.db[l])
                .zip(self.v_b[l].iter_mut())
            {
                *p += rule.update(v, g);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activations::Identity;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn scalar_layer(w: f64) -> Vec<DenseLayer> {
        vec![DenseLayer {
            weights: vec![vec![w]],
            bias: vec![0.0],
            activation: Arc::new(Identity),
        }]
    }

    fn grads(g: f64) -> Gradients {
        Gradients {
            d_w: vec![vec![vec![g]]],
            db: vec![vec![0.0]],
        }
    }

    #[test]
    fn zero_momentum_is_plain_gradient_step() {
        let mut layers = scalar_layer(1.0);
        let mut opt = Sgd::new(&layers, 0.1, 0.0, false);
        opt.step(&mut layers, &grads(2.0));
        assert_relative_eq!(layers[0].weights[0][0], 0.8);
    }

    #[test]
    fn classical_momentum_accumulates_velocity() {
        let mut layers = scalar_layer(0.0);
        let mut opt = Sgd::new(&layers, 0.1, 0.9, false);
        opt.step(&mut layers, &grads(1.0));
        assert_relative_eq!(layers[0].weights[0][0], -0.1);
        opt.step(&mut layers, &grads(1.0));
        // v = 0.9 * -0.1 - 0.1 = -0.19
        assert_relative_eq!(layers[0].weights[0][0], -0.29);
    }

    #[test]
    fn nesterov_looks_ahead() {
        let mut layers = scalar_layer(0.0);
        let mut opt = Sgd::new(&layers, 0.1, 0.9, true);
        opt.step(&mut layers, &grads(1.0));
        // v = -0.1, step = 0.9 * -0.1 - 0.1
        assert_relative_eq!(layers[0].weights[0][0], -0.19);
    }
}
