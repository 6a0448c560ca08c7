//! Gradient-boosted regression trees.
//!
//! Plain least-squares boosting: start from the target mean, then fit each
//! tree to the residuals of the ensemble so far and add it in, damped by
//! the learning rate. Greedy SSE splits, no randomness, so a fit on the
//! same rows always yields the same model.

use std::cmp::Ordering;

use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Splits below this gain are noise, not structure.
const MIN_SPLIT_GAIN: f64 = 1e-12;

/// Training hyperparameters. The defaults are the tuned values the
/// pipeline retrains with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbrtParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

impl Default for GbrtParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.05,
            max_depth: 5,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// One regression tree, nodes flattened into a vector with the root at 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    fn fit(x: ArrayView2<'_, f64>, targets: &[f64], params: &GbrtParams) -> Self {
        let mut nodes = Vec::new();
        let indices: Vec<usize> = (0..targets.len()).collect();
        grow(&mut nodes, x, targets, indices, 0, params);
        Self { nodes }
    }

    fn predict_one(&self, features: &[f64]) -> f64 {
        self.descend(|feature| features[feature])
    }

    fn predict_row(&self, x: ArrayView2<'_, f64>, row: usize) -> f64 {
        self.descend(|feature| x[[row, feature]])
    }

    fn descend(&self, value_at: impl Fn(usize) -> f64) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if value_at(*feature) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Recursively grow a subtree over `indices`, returning its node index.
fn grow(
    nodes: &mut Vec<Node>,
    x: ArrayView2<'_, f64>,
    targets: &[f64],
    indices: Vec<usize>,
    depth: usize,
    params: &GbrtParams,
) -> usize {
    let mean = indices.iter().map(|&i| targets[i]).sum::<f64>() / indices.len() as f64;

    // Place a leaf first; it becomes a split only if a useful one exists.
    let node_index = nodes.len();
    nodes.push(Node::Leaf { value: mean });

    let min_leaf = params.min_samples_leaf.max(1);
    if depth >= params.max_depth || indices.len() < 2 * min_leaf {
        return node_index;
    }
    let Some(split) = best_split(x, targets, &indices, min_leaf) else {
        return node_index;
    };

    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
        .into_iter()
        .partition(|&i| x[[i, split.feature]] <= split.threshold);

    let left = grow(nodes, x, targets, left_indices, depth + 1, params);
    let right = grow(nodes, x, targets, right_indices, depth + 1, params);
    nodes[node_index] = Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left,
        right,
    };
    node_index
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Scan every feature for the split with the largest SSE reduction, using
/// the identity: reduction = L^2/nl + R^2/nr - T^2/n over target sums.
fn best_split(
    x: ArrayView2<'_, f64>,
    targets: &[f64],
    indices: &[usize],
    min_leaf: usize,
) -> Option<SplitCandidate> {
    let total_count = indices.len() as f64;
    let total_sum: f64 = indices.iter().map(|&i| targets[i]).sum();
    let parent_score = total_sum * total_sum / total_count;

    let mut best: Option<SplitCandidate> = None;
    for feature in 0..x.ncols() {
        let mut order = indices.to_vec();
        order.sort_by(|&a, &b| {
            x[[a, feature]]
                .partial_cmp(&x[[b, feature]])
                .unwrap_or(Ordering::Equal)
        });

        let mut left_sum = 0.0;
        for (position, &row) in order[..order.len() - 1].iter().enumerate() {
            left_sum += targets[row];
            let left_count = position + 1;
            let right_count = order.len() - left_count;

            let here = x[[row, feature]];
            let next = x[[order[position + 1], feature]];
            if here == next {
                continue;
            }
            if left_count < min_leaf || right_count < min_leaf {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let gain = left_sum * left_sum / left_count as f64
                + right_sum * right_sum / right_count as f64
                - parent_score;
            if gain > MIN_SPLIT_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: (here + next) / 2.0,
                    gain,
                });
            }
        }
    }
    best
}

/// The boosted ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostedRegressor {
    params: GbrtParams,
    base_prediction: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedRegressor {
    /// Fit on a feature matrix (rows are samples) and a target vector.
    pub fn fit(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, params: GbrtParams) -> Self {
        if y.is_empty() {
            return Self {
                params,
                base_prediction: 0.0,
                trees: Vec::new(),
            };
        }

        let base_prediction = y.mean().unwrap_or(0.0);
        let mut current = vec![base_prediction; y.len()];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let residuals: Vec<f64> = y
                .iter()
                .zip(&current)
                .map(|(target, predicted)| target - predicted)
                .collect();
            let tree = RegressionTree::fit(x, &residuals, &params);
            for (row, predicted) in current.iter_mut().enumerate() {
                *predicted += params.learning_rate * tree.predict_row(x, row);
            }
            trees.push(tree);
        }

        Self {
            params,
            base_prediction,
            trees,
        }
    }

    pub fn predict_one(&self, features: &[f64]) -> f64 {
        self.trees.iter().fold(self.base_prediction, |acc, tree| {
            acc + self.params.learning_rate * tree.predict_one(features)
        })
    }

    /// In-sample mean absolute error over the given rows.
    pub fn mean_absolute_error(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> f64 {
        if y.is_empty() {
            return 0.0;
        }
        let total: f64 = (0..y.len())
            .map(|row| {
                let predicted = self.trees.iter().fold(self.base_prediction, |acc, tree| {
                    acc + self.params.learning_rate * tree.predict_row(x, row)
                });
                (predicted - y[row]).abs()
            })
            .sum();
        total / y.len() as f64
    }

    pub fn params(&self) -> &GbrtParams {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    fn single_feature_data(values: &[f64], targets: &[f64]) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((values.len(), 1), |(row, _)| values[row]);
        let y = Array1::from_vec(targets.to_vec());
        (x, y)
    }

    #[test]
    fn constant_target_predicts_the_constant() {
        let (x, y) = single_feature_data(&[1.0, 2.0, 3.0, 4.0], &[42.0, 42.0, 42.0, 42.0]);
        let model = GradientBoostedRegressor::fit(x.view(), y.view(), GbrtParams::default());

        assert_eq!(model.predict_one(&[99.0]), 42.0);
        assert_eq!(model.mean_absolute_error(x.view(), y.view()), 0.0);
    }

    #[test]
    fn step_function_is_learned() {
        let values: Vec<f64> = (0..20).map(f64::from).collect();
        let targets: Vec<f64> = values
            .iter()
            .map(|&v| if v < 10.0 { 10.0 } else { 50.0 })
            .collect();
        let (x, y) = single_feature_data(&values, &targets);
        let model = GradientBoostedRegressor::fit(x.view(), y.view(), GbrtParams::default());

        assert!((model.predict_one(&[3.0]) - 10.0).abs() < 1.0);
        assert!((model.predict_one(&[15.0]) - 50.0).abs() < 1.0);
    }

    #[test]
    fn boosting_drives_training_error_down() {
        let values: Vec<f64> = (1..=30).map(f64::from).collect();
        let targets: Vec<f64> = values.iter().map(|&v| v * 2.0 + 5.0).collect();
        let (x, y) = single_feature_data(&values, &targets);
        let model = GradientBoostedRegressor::fit(x.view(), y.view(), GbrtParams::default());

        assert!(model.mean_absolute_error(x.view(), y.view()) < 1.0);
    }

    #[test]
    fn fitting_is_deterministic() {
        let values: Vec<f64> = (0..25).map(|v| f64::from(v) * 1.3).collect();
        let targets: Vec<f64> = values.iter().map(|&v| v * v * 0.1).collect();
        let (x, y) = single_feature_data(&values, &targets);

        let a = GradientBoostedRegressor::fit(x.view(), y.view(), GbrtParams::default());
        let b = GradientBoostedRegressor::fit(x.view(), y.view(), GbrtParams::default());

        for point in [0.0, 7.7, 19.5, 31.2] {
            assert_eq!(a.predict_one(&[point]), b.predict_one(&[point]));
        }
    }

    #[test]
    fn fitted_model_keeps_its_hyperparameters() {
        let params = GbrtParams {
            n_estimators: 7,
            ..GbrtParams::default()
        };
        let (x, y) = single_feature_data(&[1.0, 2.0], &[3.0, 4.0]);
        let model = GradientBoostedRegressor::fit(x.view(), y.view(), params.clone());
        assert_eq!(model.params(), &params);
    }

    #[test]
    fn empty_training_set_yields_zero_model() {
        let (x, y) = single_feature_data(&[], &[]);
        let model = GradientBoostedRegressor::fit(x.view(), y.view(), GbrtParams::default());
        assert_eq!(model.predict_one(&[5.0]), 0.0);
    }

    #[test]
    fn depth_zero_reduces_to_the_mean() {
        let params = GbrtParams {
            max_depth: 0,
            ..GbrtParams::default()
        };
        let (x, y) = single_feature_data(&[1.0, 2.0, 3.0], &[10.0, 20.0, 30.0]);
        let model = GradientBoostedRegressor::fit(x.view(), y.view(), params);

        // Trees of depth zero carry no structure, only the mean residual.
        assert!((model.predict_one(&[1.0]) - 20.0).abs() < 1e-9);
        assert!((model.predict_one(&[3.0]) - 20.0).abs() < 1e-9);
    }
}
