//! # Isolation Forest
//!
//! ランダム分割で孤立させるまでの経路長から異常度を推定する
//! Trees are grown on random subsamples; short average paths mean rare rows.

use rand::seq::index;
use rand::Rng;

use crate::vectorizer::DenseMatrix;

const EULER_GAMMA: f64 = 0.5772156649;

/// Average path length of an unsuccessful binary search over `n` items
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * harmonic(n - 1.0) - 2.0 * (n - 1.0) / n
        }
    }
}

fn harmonic(i: f64) -> f64 {
    i.ln() + EULER_GAMMA
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// One isolation tree
#[derive(Debug, Clone)]
pub struct IsolationTree {
    root: Node,
}

impl IsolationTree {
    /// Grow a tree over the given sample rows
    pub fn grow<R: Rng + ?Sized>(
        matrix: &DenseMatrix,
        sample: Vec<usize>,
        height_limit: usize,
        rng: &mut R,
    ) -> Self {
        Self {
            root: grow_node(matrix, sample, 0, height_limit, rng),
        }
    }

    /// Depth of the leaf `point` falls into, adjusted for the leaf size
    pub fn path_length(&self, point: &[f64]) -> f64 {
        let mut node = &self.root;
        let mut depth = 0usize;

        loop {
            match node {
                Node::Leaf { size } => return depth as f64 + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if point[*feature] <= *threshold { left } else { right };
                    depth += 1;
                }
            }
        }
    }
}

fn grow_node<R: Rng + ?Sized>(
    matrix: &DenseMatrix,
    rows: Vec<usize>,
    depth: usize,
    height_limit: usize,
    rng: &mut R,
) -> Node {
    if rows.len() <= 1 || depth >= height_limit {
        return Node::Leaf { size: rows.len() };
    }

    // ノード内で値が変化する特徴量のみ分割候補にする
    let varying: Vec<(usize, f64, f64)> = (0..matrix.n_features())
        .filter_map(|feature| {
            let (min, max) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                let v = matrix.get(r, feature);
                (lo.min(v), hi.max(v))
            });
            (max > min).then_some((feature, min, max))
        })
        .collect();

    if varying.is_empty() {
        return Node::Leaf { size: rows.len() };
    }

    let (feature, min, max) = varying[rng.gen_range(0..varying.len())];
    let threshold = rng.gen_range(min..max);

    let (left, right): (Vec<usize>, Vec<usize>) = rows
        .into_iter()
        .partition(|&r| matrix.get(r, feature) <= threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(grow_node(matrix, left, depth + 1, height_limit, rng)),
        right: Box::new(grow_node(matrix, right, depth + 1, height_limit, rng)),
    }
}

/// A fitted ensemble of isolation trees
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
}

impl IsolationForest {
    /// Fit `n_trees` trees on subsamples of `min(max_samples, rows)` distinct rows
    pub fn fit<R: Rng + ?Sized>(
        matrix: &DenseMatrix,
        n_trees: usize,
        max_samples: usize,
        rng: &mut R,
    ) -> Self {
        let n = matrix.n_rows();
        let sample_size = max_samples.min(n);
        let height_limit = (sample_size.max(2) as f64).log2().ceil() as usize;

        let trees = (0..n_trees)
            .map(|_| {
                let sample = index::sample(rng, n, sample_size).into_vec();
                IsolationTree::grow(matrix, sample, height_limit, rng)
            })
            .collect();

        Self { trees, sample_size }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Anomaly score in (0, 1]; higher is more anomalous
    pub fn score(&self, point: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }

        let mean_path = self.trees.iter().map(|t| t.path_length(point)).sum::<f64>()
            / self.trees.len() as f64;
        let normalizer = average_path_length(self.sample_size);
        if normalizer == 0.0 {
            return 0.5;
        }

        2f64.powf(-mean_path / normalizer)
    }
}
