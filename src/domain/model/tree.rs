//! CART regression tree with squared-error splits.

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; all when `None`.
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    pub fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    root: Node,
    /// Total squared-error reduction per feature, unnormalized.
    importances: Vec<f64>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct Builder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    params: &'a TreeParams,
    n_features: usize,
    importances: Vec<f64>,
}

impl RegressionTree {
    /// Fit on the rows of `x`/`y` selected by `indices` (repeats allowed).
    pub fn fit(
        x: &[Vec<f64>],
        y: &[f64],
        indices: &[usize],
        params: &TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let n_features = x.first().map_or(0, Vec::len);
        let mut builder = Builder {
            x,
            y,
            params,
            n_features,
            importances: vec![0.0; n_features],
        };
        let mut idx = indices.to_vec();
        let root = builder.build(&mut idx, 0, rng);
        Self {
            root,
            importances: builder.importances,
        }
    }

    pub fn predict_one(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = row.get(*feature).copied().unwrap_or(0.0);
                    node = if v <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }
}

impl Builder<'_> {
    fn build(&mut self, indices: &mut [usize], depth: usize, rng: &mut ChaCha8Rng) -> Node {
        let n = indices.len();
        if n == 0 {
            return Node::Leaf { value: 0.0 };
        }
        let (sum, sum_sq) = indices.iter().fold((0.0, 0.0), |(s, q), &i| {
            let v = self.y[i];
            (s + v, q + v * v)
        });
        let mean = sum / n as f64;
        let sse = sum_sq - sum * sum / n as f64;

        if depth >= self.params.max_depth
            || n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf.max(1)
            || sse <= 1e-12
        {
            return Node::Leaf { value: mean };
        }

        let Some(best) = self.best_split(indices, sse, rng) else {
            return Node::Leaf { value: mean };
        };

        self.importances[best.feature] += best.gain;
        let (feature, threshold) = (best.feature, best.threshold);
        let mut left: Vec<usize> = Vec::with_capacity(n);
        let mut right: Vec<usize> = Vec::with_capacity(n);
        for &i in indices.iter() {
            if self.x[i][feature] <= threshold {
                left.push(i);
            } else {
                right.push(i);
            }
        }
        Node::Split {
            feature,
            threshold,
            left: Box::new(self.build(&mut left, depth + 1, rng)),
            right: Box::new(self.build(&mut right, depth + 1, rng)),
        }
    }

    /// Best midpoint split by squared-error reduction, scanning each
    /// candidate feature in sorted order with running sums.
    fn best_split(
        &self,
        indices: &mut [usize],
        parent_sse: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitCandidate> {
        let mut features: Vec<usize> = (0..self.n_features).collect();
        if let Some(max) = self.params.max_features {
            if max < self.n_features {
                features.shuffle(rng);
                features.truncate(max.max(1));
            }
        }

        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let total_sum: f64 = indices.iter().map(|&i| self.y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| self.y[i] * self.y[i]).sum();
        let mut best: Option<SplitCandidate> = None;

        for feature in features {
            indices.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));
            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for pos in 1..n {
                let prev = indices[pos - 1];
                left_sum += self.y[prev];
                left_sq += self.y[prev] * self.y[prev];

                let (lo, hi) = (self.x[prev][feature], self.x[indices[pos]][feature]);
                if pos < min_leaf || n - pos < min_leaf || lo >= hi {
                    continue;
                }
                let (nl, nr) = (pos as f64, (n - pos) as f64);
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let child_sse =
                    (left_sq - left_sum * left_sum / nl) + (right_sq - right_sum * right_sum / nr);
                let gain = parent_sse - child_sse;
                if gain > best.as_ref().map_or(1e-12, |b| b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: (lo + hi) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }
}
