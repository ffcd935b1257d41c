use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logistic::balanced_sample_weights;
use crate::vectorizer::SparseVector;

/// Bagged ensemble of CART trees over sparse TF-IDF rows.
///
/// This is the EnsembleTree classifier variant: it natively emits per-class
/// probability columns (weighted leaf class frequencies averaged across
/// trees), so no margin squashing is needed downstream.
///
/// Trees are grown on bootstrap resamples with a random feature subset per
/// split. The RNG is seeded so the same training set yields the same forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<Tree>,
    n_classes: usize,
    n_trees: usize,
    max_depth: usize,
    min_samples_split: usize,
    seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Tree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        dist: Vec<f64>,
    },
    Split {
        feature: u32,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

impl RandomForest {
    pub fn new() -> Self {
        Self::with_params(200, 25, 2, 42)
    }

    pub fn with_params(n_trees: usize, max_depth: usize, min_samples_split: usize, seed: u64) -> Self {
        Self {
            trees: Vec::new(),
            n_classes: 0,
            n_trees,
            max_depth,
            min_samples_split: min_samples_split.max(2),
            seed,
        }
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Fit on labeled rows. Class imbalance is compensated through
    /// inverse-frequency sample weights folded into every impurity and
    /// leaf-frequency computation.
    pub fn fit(&mut self, x: &[SparseVector], y: &[u8]) {
        debug_assert_eq!(x.len(), y.len());
        let n = x.len();
        self.n_classes = 2;
        self.trees.clear();

        let weights = balanced_sample_weights(y);
        let mut rng = StdRng::seed_from_u64(self.seed);

        for t in 0..self.n_trees {
            let samples: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let mut tree = Tree { nodes: Vec::new() };
            self.build_node(&mut tree, x, y, &weights, samples, 0, &mut rng);
            self.trees.push(tree);
            if (t + 1) % 50 == 0 {
                debug!("grew {} of {} trees", t + 1, self.n_trees);
            }
        }
    }

    /// Per-class probability columns `[p_benign, p_phish]`, one row per input.
    pub fn class_probability(&self, x: &[SparseVector]) -> Vec<Vec<f64>> {
        x.iter().map(|row| self.predict_one(row)).collect()
    }

    fn predict_one(&self, row: &SparseVector) -> Vec<f64> {
        let mut acc = vec![0.0; self.n_classes];
        for tree in &self.trees {
            let dist = tree.leaf_dist(row);
            for (a, d) in acc.iter_mut().zip(dist) {
                *a += d;
            }
        }
        let n = self.trees.len().max(1) as f64;
        for a in &mut acc {
            *a /= n;
        }
        acc
    }

    fn build_node(
        &self,
        tree: &mut Tree,
        x: &[SparseVector],
        y: &[u8],
        weights: &[f64],
        samples: Vec<usize>,
        depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let node_idx = tree.nodes.len();
        tree.nodes.push(Node::Leaf {
            dist: class_distribution(y, weights, &samples, self.n_classes),
        });

        if depth >= self.max_depth || samples.len() < self.min_samples_split {
            return node_idx;
        }
        if is_pure(y, &samples) {
            return node_idx;
        }

        let split = match self.best_split(x, y, weights, &samples, rng) {
            Some(s) => s,
            None => return node_idx,
        };

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| x[i].get(split.feature) <= split.threshold);

        let left = self.build_node(tree, x, y, weights, left_samples, depth + 1, rng);
        let right = self.build_node(tree, x, y, weights, right_samples, depth + 1, rng);

        tree.nodes[node_idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_idx
    }

    fn best_split(
        &self,
        x: &[SparseVector],
        y: &[u8],
        weights: &[f64],
        samples: &[usize],
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        // Only features that are nonzero somewhere in this node can produce
        // a split; sample a sqrt-sized subset of them.
        let active: BTreeSet<u32> = samples
            .iter()
            .flat_map(|&i| x[i].indices.iter().copied())
            .collect();
        if active.is_empty() {
            return None;
        }
        let active: Vec<u32> = active.into_iter().collect();
        let m_try = ((active.len() as f64).sqrt().ceil() as usize).max(1);
        let candidates: Vec<u32> = active
            .choose_multiple(rng, m_try.min(active.len()))
            .copied()
            .collect();

        let parent_weight: f64 = samples.iter().map(|&i| weights[i]).sum();
        let parent_gini = gini(y, weights, samples.iter().copied(), self.n_classes);

        let mut best: Option<SplitCandidate> = None;
        for feature in candidates {
            let mut column: Vec<(f64, usize)> = samples
                .iter()
                .map(|&i| (x[i].get(feature), i))
                .collect();
            column.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            for pos in 1..column.len() {
                let (lo, hi) = (column[pos - 1].0, column[pos].0);
                if hi <= lo {
                    continue;
                }
                let threshold = (lo + hi) / 2.0;

                let left = column[..pos].iter().map(|&(_, i)| i);
                let right = column[pos..].iter().map(|&(_, i)| i);
                let left_weight: f64 = column[..pos].iter().map(|&(_, i)| weights[i]).sum();
                let right_weight = parent_weight - left_weight;
                if left_weight <= 0.0 || right_weight <= 0.0 {
                    continue;
                }

                let impurity = (left_weight * gini(y, weights, left, self.n_classes)
                    + right_weight * gini(y, weights, right, self.n_classes))
                    / parent_weight;
                let gain = parent_gini - impurity;

                if gain > 1e-12
                    && best.as_ref().map(|b| gain > b.gain).unwrap_or(true)
                {
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }
        best
    }
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new()
    }
}

struct SplitCandidate {
    feature: u32,
    threshold: f64,
    gain: f64,
}

impl Tree {
    fn leaf_dist(&self, row: &SparseVector) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { dist } => return dist,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row.get(*feature) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

fn class_distribution(y: &[u8], weights: &[f64], samples: &[usize], n_classes: usize) -> Vec<f64> {
    let mut dist = vec![0.0; n_classes];
    for &i in samples {
        dist[y[i] as usize] += weights[i];
    }
    let total: f64 = dist.iter().sum();
    if total > 0.0 {
        for d in &mut dist {
            *d /= total;
        }
    }
    dist
}

fn is_pure(y: &[u8], samples: &[usize]) -> bool {
    let mut iter = samples.iter();
    match iter.next() {
        Some(&first) => iter.all(|&i| y[i] == y[first]),
        None => true,
    }
}

fn gini<I>(y: &[u8], weights: &[f64], samples: I, n_classes: usize) -> f64
where
    I: Iterator<Item = usize>,
{
    let mut dist = vec![0.0; n_classes];
    let mut total = 0.0;
    for i in samples {
        dist[y[i] as usize] += weights[i];
        total += weights[i];
    }
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - dist.iter().map(|d| (d / total).powi(2)).sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_data() -> (Vec<SparseVector>, Vec<u8>) {
        // Feature 0 high for phish, feature 1 high for benign.
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..10 {
            x.push(SparseVector {
                indices: vec![0],
                values: vec![0.8 + 0.01 * i as f64],
            });
            y.push(1);
            x.push(SparseVector {
                indices: vec![1],
                values: vec![0.7 + 0.01 * i as f64],
            });
            y.push(0);
        }
        (x, y)
    }

    #[test]
    fn test_forest_learns_toy_split() {
        let (x, y) = toy_data();
        let mut forest = RandomForest::with_params(25, 8, 2, 42);
        forest.fit(&x, &y);

        let proba = forest.class_probability(&x);
        for (row, &label) in proba.iter().zip(&y) {
            assert_eq!(row.len(), 2);
            let p1 = row[1];
            if label == 1 {
                assert!(p1 > 0.5, "phish sample scored {p1}");
            } else {
                assert!(p1 < 0.5, "benign sample scored {p1}");
            }
        }
    }

    #[test]
    fn test_forest_is_deterministic() {
        let (x, y) = toy_data();
        let mut a = RandomForest::with_params(10, 6, 2, 7);
        let mut b = RandomForest::with_params(10, 6, 2, 7);
        a.fit(&x, &y);
        b.fit(&x, &y);

        let pa = a.class_probability(&x);
        let pb = b.class_probability(&x);
        assert_eq!(pa, pb);
    }

    #[test]
    fn test_probability_rows_sum_to_one() {
        let (x, y) = toy_data();
        let mut forest = RandomForest::with_params(10, 6, 2, 42);
        forest.fit(&x, &y);

        for row in forest.class_probability(&x) {
            let sum: f64 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9);
            assert!(row.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
    }
}
