//! Metrics for evaluating classifier performance.
use crate::error::{Error, Result};
use crate::network::Mlp;
use std::fmt;

/// Running tally of predictions checked against their labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub total: usize,
    pub correct: usize,
}

impl Evaluation {
    pub fn record(&mut self, hit: bool) {
        self.total += 1;
        if hit {
            self.correct += 1;
        }
    }

    /// Fraction correct; 0 for an empty set.
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} correct ({:.2}%)",
            self.correct,
            self.total,
            self.accuracy() * 100.0
        )
    }
}

/// Confusion matrix indexed `[true][predicted]`. Labels at or above
/// `num_classes` are skipped.
pub fn confusion_matrix(
    model: &Mlp,
    features: &[Vec<f64>],
    labels: &[usize],
    num_classes: usize,
) -> Result<Vec<Vec<usize>>> {
    if features.len() != labels.len() {
        return Err(Error::ShapeMismatch {
            what: "labels",
            expected: features.len(),
            actual: labels.len(),
        });
    }
    let mut cm = vec![vec![0; num_classes]; num_classes];
    for (input, &label) in features.iter().zip(labels) {
        let pred = model.predict(input)?.class;
        if label < num_classes && pred < num_classes {
            cm[label][pred] += 1;
        }
    }
    Ok(cm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activations::ActivationKind;
    use crate::network::Architecture;

    #[test]
    fn empty_evaluation_has_zero_accuracy() {
        let eval = Evaluation::default();
        assert_eq!(eval.accuracy(), 0.0);
    }

    #[test]
    fn evaluation_display() {
        let mut eval = Evaluation::default();
        eval.record(true);
        eval.record(false);
        eval.record(true);
        eval.record(true);
        assert_eq!(eval.to_string(), "3/4 correct (75.00%)");
    }

    #[test]
    fn confusion_matrix_counts_every_sample_once() {
        // Output bias dominates, so everything is predicted as class 1.
        let arch = Architecture::new(vec![1, 3]).unwrap();
        let net =
            Mlp::from_flat(&arch, ActivationKind::Identity, &[0.0, 5.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        let features = vec![vec![1.0], vec![0.0], vec![0.5]];
        let labels = vec![0, 1, 2];
        let cm = confusion_matrix(&net, &features, &labels, 3).unwrap();
        assert_eq!(cm, vec![vec![0, 1, 0], vec![0, 1, 0], vec![0, 1, 0]]);
        assert_eq!(net.evaluate(&features, &labels).unwrap().correct, 1);
    }

    #[test]
    fn confusion_matrix_rejects_misaligned_inputs() {
        let arch = Architecture::new(vec![2, 3]).unwrap();
        let net = Mlp::from_flat(&arch, ActivationKind::Identity, &[0.0; 9]).unwrap();
        let err = confusion_matrix(&net, &[vec![0.0; 2]], &[0, 1], 3).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { what: "labels", .. }));
        let err = confusion_matrix(&net, &[vec![0.0; 5]], &[0], 3).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { what: "input width", expected: 2, actual: 5 }));
    }
}
