//! Multi-Layer Perceptron (MLP): layer stack, forward pass and batch gradients.
use crate::activations::{Activation, ActivationKind, Identity, OutputKind};
use crate::error::{Error, Result};
use crate::layers::{DenseLayer, Matrix};
use crate::loss::sample_loss;
use crate::metrics::Evaluation;
use rand::Rng;
use std::fmt;
use std::sync::Arc;

/// Layer widths from input to output, e.g. `[784, 300, 10]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Architecture {
    sizes: Vec<usize>,
}

impl Architecture {
    pub fn new(sizes: Vec<usize>) -> Result<Self> {
        if sizes.len() < 2 {
            return Err(Error::InvalidConfig(format!(
                "an architecture needs an input and an output width, got {:?}",
                sizes
            )));
        }
        if sizes.iter().any(|&s| s == 0) {
            return Err(Error::InvalidConfig(format!(
                "layer widths must be positive, got {:?}",
                sizes
            )));
        }
        Ok(Self { sizes })
    }

    /// 784 pixels, 300 hidden units, 10 digit classes.
    pub fn mnist() -> Self {
        Self {
            sizes: vec![784, 300, 10],
        }
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn input_size(&self) -> usize {
        self.sizes[0]
    }

    pub fn output_size(&self) -> usize {
        self.sizes[self.sizes.len() - 1]
    }

    /// `(fan_in, fan_out)` for each weight layer.
    pub fn layer_shapes(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.sizes.windows(2).map(|w| (w[0], w[1]))
    }

    /// Number of values in a flat parameter dump for this architecture.
    pub fn parameter_count(&self) -> usize {
        self.layer_shapes()
            .map(|(fan_in, fan_out)| fan_out + fan_in * fan_out)
            .sum()
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.sizes.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", parts.join("-"))
    }
}

/// Most likely class for one input and the output value behind it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub class: usize,
    pub confidence: f64,
}

/// Gradients for all layers in order
#[derive(Debug)]
pub struct Gradients {
    pub d_w: Vec<Matrix>,
    pub db: Vec<Vec<f64>>,
}

impl Gradients {
    fn zeros(layers: &[DenseLayer]) -> Self {
        Self {
            d_w: layers
                .iter()
                .map(|l| vec![vec![0.0; l.fan_out()]; l.fan_in()])
                .collect(),
            db: layers.iter().map(|l| vec![0.0; l.fan_out()]).collect(),
        }
    }
}

/// MLP
#[derive(Debug, Clone)]
pub struct Mlp {
    /// Ordered list of dense layers from input to output.
    pub layers: Vec<DenseLayer>,
    output: OutputKind,
    /// Class label behind each output unit (two-class models have one unit
    /// and two labels).
    classes: Vec<usize>,
}

impl Mlp {
    /// Fresh network with Glorot-initialized layers drawn from `rng`.
    ///
    /// Hidden layers use `hidden`; the final layer is linear and its logits
    /// go through the output function picked from the class count.
    pub fn new<R: Rng + ?Sized>(
        architecture: &Architecture,
        hidden: ActivationKind,
        classes: Vec<usize>,
        rng: &mut R,
    ) -> Result<Self> {
        let output = check_classes(architecture, &classes)?;
        let n_layers = architecture.sizes().len() - 1;
        let factor = hidden.init_factor();
        let layers = architecture
            .layer_shapes()
            .enumerate()
            .map(|(i, (fan_in, fan_out))| {
                let activation: Arc<dyn Activation + Send + Sync> = if i + 1 == n_layers {
                    Arc::new(Identity)
                } else {
                    hidden.to_arc()
                };
                DenseLayer::new(fan_in, fan_out, factor, activation, &mut *rng)
            })
            .collect();
        Ok(Self {
            layers,
            output,
            classes,
        })
    }

    /// Rebuild a network from a flat dump laid out as bias, weights (row
    /// major), per layer from input to output.
    ///
    /// The dump carries no labels, so classes are numbered from zero. A
    /// single output unit is read as a two-class logistic model; any wider
    /// output layer is a softmax over that many classes.
    pub fn from_flat(
        architecture: &Architecture,
        hidden: ActivationKind,
        values: &[f64],
    ) -> Result<Self> {
        let expected = architecture.parameter_count();
        if values.len() != expected {
            return Err(Error::ShapeMismatch {
                what: "flat parameter count",
                expected,
                actual: values.len(),
            });
        }
        let (output, classes) = match architecture.output_size() {
            1 => (OutputKind::Logistic, vec![0, 1]),
            units => (OutputKind::Softmax, (0..units).collect()),
        };
        let n_layers = architecture.sizes().len() - 1;
        let mut rest = values;
        let mut layers = Vec::with_capacity(n_layers);
        for (i, (fan_in, fan_out)) in architecture.layer_shapes().enumerate() {
            let (bias, tail) = rest.split_at(fan_out);
            let (flat_w, tail) = tail.split_at(fan_in * fan_out);
            rest = tail;
            let activation: Arc<dyn Activation + Send + Sync> = if i + 1 == n_layers {
                Arc::new(Identity)
            } else {
                hidden.to_arc()
            };
            layers.push(DenseLayer {
                weights: flat_w.chunks(fan_out).map(<[f64]>::to_vec).collect(),
                bias: bias.to_vec(),
                activation,
            });
        }
        Ok(Self {
            layers,
            output,
            classes,
        })
    }

    pub fn architecture(&self) -> Architecture {
        let mut sizes = vec![self.input_size()];
        sizes.extend(self.layers.iter().map(DenseLayer::fan_out));
        Architecture { sizes }
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, DenseLayer::fan_in)
    }

    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    pub fn output_kind(&self) -> OutputKind {
        self.output
    }

    /// Bias vectors, input to output.
    pub fn intercepts(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.layers.iter().map(|l| l.bias.as_slice())
    }

    /// Weight matrices (`fan_in × fan_out`), input to output.
    pub fn coefs(&self) -> impl Iterator<Item = &Matrix> + '_ {
        self.layers.iter().map(|l| &l.weights)
    }

    fn check_width(&self, input: &[f64]) -> Result<()> {
        if input.len() != self.input_size() {
            return Err(Error::ShapeMismatch {
                what: "input width",
                expected: self.input_size(),
                actual: input.len(),
            });
        }
        Ok(())
    }

    /// Forward pass from input to output probabilities. The input must be
    /// exactly as wide as the first layer.
    pub fn forward(&self, input: &[f64]) -> Result<Vec<f64>> {
        self.check_width(input)?;
        let mut current = input.to_vec();
        for layer in &self.layers {
            current = layer.forward(&current);
        }
        Ok(self.output.apply(&current))
    }

    /// Activations of every layer, input first and probabilities last.
    fn forward_cached(&self, input: &[f64]) -> Vec<Vec<f64>> {
        debug_assert_eq!(input.len(), self.input_size());
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(input.to_vec());
        for layer in &self.layers {
            let next = layer.forward(&activations[activations.len() - 1]);
            activations.push(next);
        }
        if let Some(last) = activations.last_mut() {
            *last = self.output.apply(last);
        }
        activations
    }

    /// Most likely class for a single input.
    pub fn predict(&self, input: &[f64]) -> Result<Prediction> {
        let out = self.forward(input)?;
        Ok(match self.output {
            OutputKind::Logistic => {
                let p = out[0];
                if p > 0.5 {
                    Prediction {
                        class: self.classes[1],
                        confidence: p,
                    }
                } else {
                    Prediction {
                        class: self.classes[0],
                        confidence: 1.0 - p,
                    }
                }
            }
            OutputKind::Softmax => {
                let best = out
                    .iter()
                    .enumerate()
                    .fold(0usize, |max_i, (i, &v)| if v > out[max_i] { i } else { max_i });
                Prediction {
                    class: self.classes[best],
                    confidence: out[best],
                }
            }
        })
    }

    /// Correct / total counts over a labeled set.
    pub fn evaluate(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<Evaluation> {
        if features.len() != labels.len() {
            return Err(Error::ShapeMismatch {
                what: "labels",
                expected: features.len(),
                actual: labels.len(),
            });
        }
        let mut eval = Evaluation::default();
        for (input, &label) in features.iter().zip(labels) {
            eval.record(self.predict(input)?.class == label);
        }
        Ok(eval)
    }

    /// Target vector for a label: one-hot over the classes, or a single
    /// 0/1 value for two-class models.
    pub fn encode_label(&self, label: usize) -> Vec<f64> {
        match self.output {
            OutputKind::Logistic => vec![if label == self.classes[1] { 1.0 } else { 0.0 }],
            OutputKind::Softmax => self
                .classes
                .iter()
                .map(|&c| if c == label { 1.0 } else { 0.0 })
                .collect(),
        }
    }

    /// Mean loss and gradients over a mini-batch, including the L2 term
    /// `0.5 * alpha * Σ‖W‖² / batch_len`. Biases are not penalized.
    pub fn compute_gradients(
        &self,
        inputs: &[&[f64]],
        targets: &[&[f64]],
        alpha: f64,
    ) -> (f64, Gradients) {
        let n = inputs.len() as f64;
        let mut grads = Gradients::zeros(&self.layers);
        let mut loss = 0.0;
        for (&input, &target) in inputs.iter().zip(targets) {
            let activations = self.forward_cached(input);
            let pred = &activations[self.layers.len()];
            loss += sample_loss(self.output, pred, target);

            // Both output functions pair with their log loss so dL/dz = p - y.
            let mut delta: Vec<f64> = pred.iter().zip(target).map(|(&p, &t)| p - t).collect();
            for l in (0..self.layers.len()).rev() {
                let layer = &self.layers[l];
                layer.accumulate_gradients(
                    &activations[l],
                    &delta,
                    &mut grads.d_w[l],
                    &mut grads.db[l],
                );
                if l > 0 {
                    let upstream = &self.layers[l - 1].activation;
                    delta = layer
                        .propagate_delta(&delta)
                        .into_iter()
                        .zip(&activations[l])
                        .map(|(d, &a)| d * upstream.derivative_from_output(a))
                        .collect();
                }
            }
        }

        let penalty: f64 = self.layers.iter().map(DenseLayer::squared_weight_norm).sum();
        loss = loss / n + 0.5 * alpha * penalty / n;

        for (layer, (d_w, db)) in self
            .layers
            .iter()
            .zip(grads.d_w.iter_mut().zip(grads.db.iter_mut()))
        {
            for (g_row, w_row) in d_w.iter_mut().zip(&layer.weights) {
                for (g, &w) in g_row.iter_mut().zip(w_row) {
                    *g = (*g + alpha * w) / n;
                }
            }
            for g in db.iter_mut() {
                *g /= n;
            }
        }
        (loss, grads)
    }
}

impl fmt::Display for Mlp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MLP: {}", self.architecture())
    }
}

fn check_classes(architecture: &Architecture, classes: &[usize]) -> Result<OutputKind> {
    if classes.len() < 2 {
        return Err(Error::InvalidConfig(format!(
            "need at least two classes, got {}",
            classes.len()
        )));
    }
    let output = OutputKind::for_classes(classes.len());
    let units = match output {
        OutputKind::Logistic => 1,
        OutputKind::Softmax => classes.len(),
    };
    if architecture.output_size() != units {
        return Err(Error::ShapeMismatch {
            what: "output units",
            expected: units,
            actual: architecture.output_size(),
        });
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_net(seed: u64) -> Mlp {
        let arch = Architecture::new(vec![4, 5, 3]).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        Mlp::new(&arch, ActivationKind::Logistic, vec![0, 1, 2], &mut rng).unwrap()
    }

    #[test]
    fn mnist_architecture_parameter_count() {
        let arch = Architecture::mnist();
        assert_eq!(arch.parameter_count(), 300 + 784 * 300 + 10 + 300 * 10);
        assert_eq!(arch.parameter_count(), 238_510);
        assert_eq!(arch.to_string(), "784-300-10");
    }

    #[test]
    fn architecture_rejects_degenerate_sizes() {
        assert!(Architecture::new(vec![784]).is_err());
        assert!(Architecture::new(vec![784, 0, 10]).is_err());
    }

    #[test]
    fn forward_yields_a_distribution() {
        let net = small_net(3);
        let p = net.forward(&[0.1, 0.9, 0.0, 0.5]).unwrap();
        assert_eq!(p.len(), 3);
        assert_relative_eq!(p.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn wrong_input_width_is_rejected() {
        let net = small_net(5);
        for bad in [&[0.1, 0.2, 0.3][..], &[][..], &[0.0; 5][..]] {
            let err = net.predict(bad).unwrap_err();
            assert!(matches!(
                err,
                Error::ShapeMismatch {
                    what: "input width",
                    expected: 4,
                    ..
                }
            ));
        }
        let err = net.evaluate(&[vec![0.0; 4], vec![0.0; 3]], &[0, 1]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { what: "input width", .. }));
        let err = net.evaluate(&[vec![0.0; 4]], &[0, 1]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { what: "labels", .. }));
    }

    #[test]
    fn output_units_must_match_classes() {
        let arch = Architecture::new(vec![4, 5, 3]).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let err = Mlp::new(&arch, ActivationKind::Relu, vec![0, 1, 2, 3], &mut rng).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
        let err = Mlp::new(&arch, ActivationKind::Relu, vec![0], &mut rng).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn binary_model_encodes_labels_as_single_unit() {
        let arch = Architecture::new(vec![2, 3, 1]).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let net = Mlp::new(&arch, ActivationKind::Tanh, vec![4, 9], &mut rng).unwrap();
        assert_eq!(net.output_kind(), OutputKind::Logistic);
        assert_eq!(net.encode_label(9), vec![1.0]);
        assert_eq!(net.encode_label(4), vec![0.0]);
        let pred = net.predict(&[0.3, -0.2]).unwrap();
        assert!([4, 9].contains(&pred.class));
        assert!(pred.confidence >= 0.5);
    }

    #[test]
    fn gradients_match_finite_differences() {
        let mut net = small_net(11);
        let inputs: Vec<Vec<f64>> = vec![vec![0.2, 0.0, 0.7, 1.0], vec![0.9, 0.4, 0.0, 0.1]];
        let targets = vec![net.encode_label(2), net.encode_label(0)];
        let refs: Vec<&[f64]> = inputs.iter().map(Vec::as_slice).collect();
        let targets: Vec<&[f64]> = targets.iter().map(Vec::as_slice).collect();
        let alpha = 1e-2;
        let (_, grads) = net.compute_gradients(&refs, &targets, alpha);

        let h = 1e-6;
        for (l, i, j) in [(0, 0, 1), (0, 2, 4), (1, 3, 0), (1, 4, 2)] {
            let orig = net.layers[l].weights[i][j];
            net.layers[l].weights[i][j] = orig + h;
            let (up, _) = net.compute_gradients(&refs, &targets, alpha);
            net.layers[l].weights[i][j] = orig - h;
            let (down, _) = net.compute_gradients(&refs, &targets, alpha);
            net.layers[l].weights[i][j] = orig;
            assert_relative_eq!(grads.d_w[l][i][j], (up - down) / (2.0 * h), epsilon = 1e-6);
        }
        for (l, j) in [(0, 3), (1, 1)] {
            let orig = net.layers[l].bias[j];
            net.layers[l].bias[j] = orig + h;
            let (up, _) = net.compute_gradients(&refs, &targets, alpha);
            net.layers[l].bias[j] = orig - h;
            let (down, _) = net.compute_gradients(&refs, &targets, alpha);
            net.layers[l].bias[j] = orig;
            assert_relative_eq!(grads.db[l][j], (up - down) / (2.0 * h), epsilon = 1e-6);
        }
    }

    #[test]
    fn from_flat_rejects_wrong_length() {
        let arch = Architecture::new(vec![2, 2, 3]).unwrap();
        let err = Mlp::from_flat(&arch, ActivationKind::Logistic, &[0.0; 5]).unwrap_err();
        assert!(matches!(
            err,
            Error::ShapeMismatch {
                expected: 15,
                actual: 5,
                ..
            }
        ));
    }

    #[test]
    fn from_flat_places_bias_before_row_major_weights() {
        let arch = Architecture::new(vec![2, 2, 3]).unwrap();
        let values: Vec<f64> = (0..15).map(f64::from).collect();
        let net = Mlp::from_flat(&arch, ActivationKind::Logistic, &values).unwrap();
        assert_eq!(net.layers[0].bias, vec![0.0, 1.0]);
        assert_eq!(net.layers[0].weights, vec![vec![2.0, 3.0], vec![4.0, 5.0]]);
        assert_eq!(net.layers[1].bias, vec![6.0, 7.0, 8.0]);
        assert_eq!(
            net.layers[1].weights,
            vec![vec![9.0, 10.0, 11.0], vec![12.0, 13.0, 14.0]]
        );
        assert_eq!(net.classes(), &[0, 1, 2]);
    }

    #[test]
    fn from_flat_reads_two_output_units_as_softmax() {
        let arch = Architecture::new(vec![2, 2]).unwrap();
        let net = Mlp::from_flat(&arch, ActivationKind::Logistic, &[0.0, 1.0, 0.0, 0.0, 0.0, 0.0])
            .unwrap();
        assert_eq!(net.output_kind(), OutputKind::Softmax);
        assert_eq!(net.classes(), &[0, 1]);
        let p = net.forward(&[0.0, 0.0]).unwrap();
        assert_relative_eq!(p.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_eq!(net.predict(&[0.0, 0.0]).unwrap().class, 1);

        let single = Architecture::new(vec![2, 1]).unwrap();
        let net = Mlp::from_flat(&single, ActivationKind::Logistic, &[0.0; 3]).unwrap();
        assert_eq!(net.output_kind(), OutputKind::Logistic);
        assert_eq!(net.classes(), &[0, 1]);
    }
}
