use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::vectorizer::SparseVector;

/// L2-regularized logistic regression trained by full-batch gradient
/// descent on sparse TF-IDF rows.
///
/// This is the LinearMargin classifier variant: it exposes only the raw
/// decision margin `w . x + b`; turning that into a probability is the
/// normalizer's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    weights: Vec<f64>,
    bias: f64,
    learning_rate: f64,
    l2: f64,
    epochs: usize,
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            weights: Vec::new(),
            bias: 0.0,
            learning_rate: 0.5,
            l2: 1e-4,
            epochs: 300,
        }
    }

    /// Fit on labeled rows. Class imbalance is compensated with
    /// inverse-frequency sample weights (`n / (2 * n_c)`).
    pub fn fit(&mut self, x: &[SparseVector], y: &[u8]) {
        let n = x.len();
        debug_assert_eq!(n, y.len());

        let dim = x
            .iter()
            .flat_map(|row| row.indices.iter())
            .map(|&i| i as usize + 1)
            .max()
            .unwrap_or(0);
        self.weights = vec![0.0; dim];
        self.bias = 0.0;

        let sample_weights = balanced_sample_weights(y);
        let total_weight: f64 = sample_weights.iter().sum();

        for epoch in 0..self.epochs {
            let mut grad = vec![0.0; dim];
            let mut grad_bias = 0.0;

            for ((row, &label), &w) in x.iter().zip(y).zip(&sample_weights) {
                let z = row.dot(&self.weights) + self.bias;
                let err = w * (sigmoid(z) - label as f64);
                for (&idx, &val) in row.indices.iter().zip(&row.values) {
                    grad[idx as usize] += err * val;
                }
                grad_bias += err;
            }

            for (w, g) in self.weights.iter_mut().zip(&grad) {
                *w -= self.learning_rate * (g / total_weight + self.l2 * *w);
            }
            self.bias -= self.learning_rate * grad_bias / total_weight;

            if epoch % 100 == 0 {
                debug!("logreg epoch {}: |grad_bias|={:.6}", epoch, grad_bias.abs());
            }
        }
    }

    /// Raw unbounded decision margin for one row.
    pub fn margin(&self, row: &SparseVector) -> f64 {
        row.dot(&self.weights) + self.bias
    }

    pub fn margins(&self, x: &[SparseVector]) -> Vec<f64> {
        x.iter().map(|row| self.margin(row)).collect()
    }
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Per-sample weights proportional to inverse class frequency, so the
/// minority class carries the same total weight as the majority class.
pub fn balanced_sample_weights(y: &[u8]) -> Vec<f64> {
    let n = y.len() as f64;
    let n_pos = y.iter().filter(|&&l| l == 1).count() as f64;
    let n_neg = n - n_pos;

    let w_pos = if n_pos > 0.0 { n / (2.0 * n_pos) } else { 0.0 };
    let w_neg = if n_neg > 0.0 { n / (2.0 * n_neg) } else { 0.0 };

    y.iter()
        .map(|&l| if l == 1 { w_pos } else { w_neg })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable_data() -> (Vec<SparseVector>, Vec<u8>) {
        // Feature 0 is active for positives, feature 1 for negatives.
        let x = vec![
            SparseVector { indices: vec![0], values: vec![1.0] },
            SparseVector { indices: vec![0], values: vec![0.9] },
            SparseVector { indices: vec![0], values: vec![1.1] },
            SparseVector { indices: vec![1], values: vec![1.0] },
            SparseVector { indices: vec![1], values: vec![0.8] },
            SparseVector { indices: vec![1], values: vec![1.2] },
        ];
        let y = vec![1, 1, 1, 0, 0, 0];
        (x, y)
    }

    #[test]
    fn test_learns_separable_margins() {
        let (x, y) = separable_data();
        let mut clf = LogisticRegression::new();
        clf.fit(&x, &y);

        let margins = clf.margins(&x);
        for (m, &label) in margins.iter().zip(&y) {
            if label == 1 {
                assert!(*m > 0.0, "positive sample got margin {m}");
            } else {
                assert!(*m < 0.0, "negative sample got margin {m}");
            }
        }
    }

    #[test]
    fn test_sigmoid_bounds() {
        assert!(sigmoid(-1e6) >= 0.0);
        assert!(sigmoid(1e6) <= 1.0);
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_balanced_weights_equalize_classes() {
        let y = vec![1, 0, 0, 0];
        let w = balanced_sample_weights(&y);
        let pos: f64 = w.iter().zip(&y).filter(|(_, &l)| l == 1).map(|(w, _)| w).sum();
        let neg: f64 = w.iter().zip(&y).filter(|(_, &l)| l == 0).map(|(w, _)| w).sum();
        assert!((pos - neg).abs() < 1e-12);
    }
}
