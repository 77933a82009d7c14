//! Regression trees and the random forest ensemble.
//!
//! This module implements:
//! - CART regression trees using the MSE (variance reduction) criterion
//! - Random Forest regression over bootstrap samples, fitted in parallel
//!
//! # Example
//!
//! ```
//! use housing_dashboard::primitives::{Matrix, Vector};
//! use housing_dashboard::tree::RandomForestRegressor;
//!
//! let x = Matrix::from_vec(5, 1, vec![1.0, 2.0, 3.0, 4.0, 5.0]).expect("5x1 matrix");
//! let y = Vector::from_slice(&[2.0, 4.0, 6.0, 8.0, 10.0]);
//!
//! let mut rf = RandomForestRegressor::new(10).with_random_state(42);
//! rf.fit(&x, &y).expect("fit should succeed");
//! let predictions = rf.predict(&x).expect("same feature count");
//! assert_eq!(predictions.len(), 5);
//! ```

use crate::error::{DashboardError, Result};
use crate::primitives::{Matrix, Vector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Leaf node in a regression tree.
///
/// Contains the predicted value (mean of training samples) and number of
/// training samples that reached this leaf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionLeaf {
    /// Predicted value for this leaf (mean of y values)
    pub value: f32,
    /// Number of training samples in this leaf
    pub n_samples: usize,
}

/// Internal node in a regression tree.
///
/// Contains a split condition (feature and threshold) and pointers to
/// left and right subtrees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionNode {
    /// Index of the feature to split on
    pub feature_idx: usize,
    /// Threshold value for the split
    pub threshold: f32,
    /// Left subtree (samples where feature <= threshold)
    pub left: Box<RegressionTreeNode>,
    /// Right subtree (samples where feature > threshold)
    pub right: Box<RegressionTreeNode>,
}

/// A node in a regression tree (either internal node or leaf).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RegressionTreeNode {
    /// Internal decision node with split condition
    Node(RegressionNode),
    /// Leaf node with value prediction
    Leaf(RegressionLeaf),
}

impl RegressionTreeNode {
    /// Returns the depth of the tree rooted at this node.
    ///
    /// Leaf nodes have depth 0, internal nodes have depth 1 + max(left, right).
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            RegressionTreeNode::Leaf(_) => 0,
            RegressionTreeNode::Node(node) => 1 + node.left.depth().max(node.right.depth()),
        }
    }

    /// Number of training samples below this node.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        match self {
            RegressionTreeNode::Leaf(leaf) => leaf.n_samples,
            RegressionTreeNode::Node(n) => n.left.n_samples() + n.right.n_samples(),
        }
    }

    fn predict_one(&self, sample: &[f32]) -> f32 {
        let mut node = self;
        loop {
            match node {
                RegressionTreeNode::Leaf(leaf) => return leaf.value,
                RegressionTreeNode::Node(internal) => {
                    node = if sample[internal.feature_idx] <= internal.threshold {
                        &internal.left
                    } else {
                        &internal.right
                    };
                }
            }
        }
    }
}

/// Stopping parameters shared by a tree and the forest that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct GrowthLimits {
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
}

impl Default for GrowthLimits {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

/// Decision tree regressor using the CART algorithm.
///
/// Uses Mean Squared Error (MSE) for splitting criterion and builds trees recursively.
/// Leaf nodes predict the mean of target values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    tree: Option<RegressionTreeNode>,
    limits: GrowthLimits,
    n_features_in: Option<usize>,
}

impl DecisionTreeRegressor {
    /// Creates a new decision tree regressor with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: None,
            limits: GrowthLimits::default(),
            n_features_in: None,
        }
    }

    /// Sets the maximum depth of the tree (root has depth 0).
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.limits.max_depth = Some(depth);
        self
    }

    /// Sets the minimum number of samples required to split an internal node.
    ///
    /// Values below 2 are raised to 2.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.limits.min_samples_split = min_samples.max(2);
        self
    }

    /// Sets the minimum number of samples required to be at a leaf node.
    ///
    /// Values below 1 are raised to 1.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.limits.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Returns the fitted root node, if any.
    #[must_use]
    pub fn root(&self) -> Option<&RegressionTreeNode> {
        self.tree.as_ref()
    }

    /// Fits the decision tree to training data.
    ///
    /// # Errors
    ///
    /// Returns an error if X and y disagree on the sample count or are empty.
    pub fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<()> {
        let indices: Vec<usize> = (0..x.n_rows()).collect();
        self.fit_indices(x, y, &indices)
    }

    /// Fits the tree on the rows named by `indices` (repeats allowed).
    fn fit_indices(&mut self, x: &Matrix<f32>, y: &Vector<f32>, indices: &[usize]) -> Result<()> {
        validate_training_data(x, y)?;
        let mut work = indices.to_vec();
        self.tree = Some(build_regression_tree(
            x,
            y.as_slice(),
            &mut work,
            0,
            self.limits,
        ));
        self.n_features_in = Some(x.n_cols());
        Ok(())
    }

    /// Predicts target values for samples.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree is not fitted or the column count differs
    /// from the one seen during `fit`.
    pub fn predict(&self, x: &Matrix<f32>) -> Result<Vector<f32>> {
        let tree = self.fitted_root(x.n_cols())?;
        let predictions = (0..x.n_rows())
            .map(|row| tree.predict_one(x.row_slice(row)))
            .collect();
        Ok(Vector::from_vec(predictions))
    }

    fn fitted_root(&self, n_cols: usize) -> Result<&RegressionTreeNode> {
        let (Some(tree), Some(expected)) = (self.tree.as_ref(), self.n_features_in) else {
            return Err(DashboardError::TrainingFailure(
                "Cannot predict with an unfitted tree. Call fit() first.".to_string(),
            ));
        };
        if n_cols != expected {
            return Err(DashboardError::dimension_mismatch(
                "n_features",
                expected,
                n_cols,
            ));
        }
        Ok(tree)
    }
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self::new()
    }
}

/// Random Forest Regressor.
///
/// Ensemble of decision tree regressors trained on bootstrap samples.
/// Predictions are averaged across all trees to reduce variance and overfitting.
///
/// Tree `i` draws its bootstrap sample from seed `random_state + i`, so a
/// seeded fit is reproducible regardless of how rayon schedules the trees.
/// Without a seed the thread RNG is used and every fit differs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    trees: Vec<DecisionTreeRegressor>,
    n_estimators: usize,
    limits: GrowthLimits,
    random_state: Option<u64>,
    n_features_in: Option<usize>,
    /// OOB sample indices for each tree (samples NOT in bootstrap sample)
    oob_indices: Vec<Vec<usize>>,
    oob_score: Option<f32>,
}

impl RandomForestRegressor {
    /// Creates a new Random Forest regressor with `n_estimators` trees.
    #[must_use]
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            limits: GrowthLimits::default(),
            random_state: None,
            n_features_in: None,
            oob_indices: Vec::new(),
            oob_score: None,
        }
    }

    /// Sets the maximum depth for each tree.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.limits.max_depth = Some(max_depth);
        self
    }

    /// Sets the minimum samples needed to split a node in each tree.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.limits.min_samples_split = min_samples.max(2);
        self
    }

    /// Sets the minimum samples per leaf in each tree.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.limits.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Sets the random state for reproducibility.
    #[must_use]
    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self
    }

    /// Number of trees requested.
    #[must_use]
    pub fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    /// Fitted trees (empty before `fit`).
    #[must_use]
    pub fn trees(&self) -> &[DecisionTreeRegressor] {
        &self.trees
    }

    /// Number of feature columns seen during `fit`.
    #[must_use]
    pub fn n_features_in(&self) -> Option<usize> {
        self.n_features_in
    }

    /// Fits the random forest to training data.
    ///
    /// # Errors
    ///
    /// Returns an error if `n_estimators` is zero or the data is invalid.
    pub fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(DashboardError::InvalidHyperparameter {
                param: "n_estimators".to_string(),
                value: "0".to_string(),
                constraint: ">= 1".to_string(),
            });
        }
        validate_training_data(x, y)?;

        let n_samples = x.n_rows();
        let limits = self.limits;
        let random_state = self.random_state;

        let fitted: Vec<(DecisionTreeRegressor, Vec<usize>)> = (0..self.n_estimators)
            .into_par_iter()
            .map(|i| -> Result<(DecisionTreeRegressor, Vec<usize>)> {
                let seed = random_state.map(|s| s.wrapping_add(i as u64));
                let bootstrap_indices = bootstrap_sample(n_samples, seed);

                let mut in_bag = vec![false; n_samples];
                for &idx in &bootstrap_indices {
                    in_bag[idx] = true;
                }
                let oob: Vec<usize> = (0..n_samples).filter(|&idx| !in_bag[idx]).collect();

                let mut tree = DecisionTreeRegressor {
                    tree: None,
                    limits,
                    n_features_in: None,
                };
                tree.fit_indices(x, y, &bootstrap_indices)?;
                Ok((tree, oob))
            })
            .collect::<Result<_>>()?;

        let (trees, oob_indices): (Vec<_>, Vec<_>) = fitted.into_iter().unzip();
        self.trees = trees;
        self.oob_indices = oob_indices;
        self.n_features_in = Some(x.n_cols());
        self.oob_score = self.compute_oob_score(x, y);

        Ok(())
    }

    /// Makes predictions for input data by averaging predictions from all trees.
    ///
    /// # Errors
    ///
    /// Returns an error if the forest is not fitted, or
    /// [`DashboardError::DimensionMismatch`] if `x` has a different column
    /// count than the training matrix.
    pub fn predict(&self, x: &Matrix<f32>) -> Result<Vector<f32>> {
        let Some(expected) = self.n_features_in.filter(|_| !self.trees.is_empty()) else {
            return Err(DashboardError::TrainingFailure(
                "Cannot predict with an unfitted Random Forest. Call fit() first.".to_string(),
            ));
        };
        if x.n_cols() != expected {
            return Err(DashboardError::dimension_mismatch(
                "n_features",
                expected,
                x.n_cols(),
            ));
        }

        let n_trees = self.trees.len() as f32;
        let predictions = (0..x.n_rows())
            .map(|row| {
                let sample = x.row_slice(row);
                let total: f32 = self
                    .trees
                    .iter()
                    .filter_map(DecisionTreeRegressor::root)
                    .map(|root| root.predict_one(sample))
                    .sum();
                total / n_trees
            })
            .collect();

        Ok(Vector::from_vec(predictions))
    }

    /// Returns the Out-of-Bag (OOB) R² score computed during `fit`.
    ///
    /// `None` before fitting, or when no sample was ever left out of a bootstrap.
    #[must_use]
    pub fn oob_score(&self) -> Option<f32> {
        self.oob_score
    }

    fn compute_oob_score(&self, x: &Matrix<f32>, y: &Vector<f32>) -> Option<f32> {
        let n_samples = y.len();
        let mut sums = vec![0.0_f32; n_samples];
        let mut counts = vec![0_usize; n_samples];

        for (tree, oob) in self.trees.iter().zip(&self.oob_indices) {
            let root = tree.root()?;
            for &idx in oob {
                sums[idx] += root.predict_one(x.row_slice(idx));
                counts[idx] += 1;
            }
        }

        // Samples that were in every bootstrap have no OOB estimate
        let (preds, truth): (Vec<f32>, Vec<f32>) = (0..n_samples)
            .filter(|&i| counts[i] > 0)
            .map(|i| (sums[i] / counts[i] as f32, y[i]))
            .unzip();

        if preds.len() < 2 {
            return None;
        }
        Some(crate::metrics::r_squared(
            &Vector::from_vec(preds),
            &Vector::from_vec(truth),
        ))
    }

    /// Returns feature importances based on samples routed through each split.
    ///
    /// Each split adds the number of samples it routes to its feature; totals are
    /// averaged over all trees and normalized to sum to 1.0.
    ///
    /// `None` if the model has not been fitted.
    #[must_use]
    pub fn feature_importances(&self) -> Option<Vec<f32>> {
        let n_features = self.n_features_in?;
        if self.trees.is_empty() {
            return None;
        }

        let mut total_importances = vec![0.0; n_features];

        for root in self.trees.iter().filter_map(DecisionTreeRegressor::root) {
            compute_regression_tree_feature_importances(root, &mut total_importances);
        }

        let n_trees = self.trees.len() as f32;
        for importance in &mut total_importances {
            *importance /= n_trees;
        }

        let total_sum: f32 = total_importances.iter().sum();
        if total_sum > 0.0 {
            for importance in &mut total_importances {
                *importance /= total_sum;
            }
        }

        Some(total_importances)
    }
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(100)
    }
}

fn validate_training_data(x: &Matrix<f32>, y: &Vector<f32>) -> Result<()> {
    if x.n_rows() != y.len() {
        return Err(DashboardError::dimension_mismatch(
            "n_samples",
            x.n_rows(),
            y.len(),
        ));
    }
    if x.n_rows() == 0 {
        return Err(DashboardError::TrainingFailure(
            "Cannot fit with zero samples".to_string(),
        ));
    }
    if x.n_cols() == 0 {
        return Err(DashboardError::TrainingFailure(
            "Cannot fit with zero features".to_string(),
        ));
    }
    Ok(())
}

// ========================================================================
// Regression Tree Building Functions
// ========================================================================

/// Compute the mean of the targets at `indices`.
fn mean_at(y: &[f32], indices: &[usize]) -> f32 {
    if indices.is_empty() {
        return 0.0;
    }
    let sum: f64 = indices.iter().map(|&i| f64::from(y[i])).sum();
    (sum / indices.len() as f64) as f32
}

/// Compute the variance of the targets at `indices`.
fn variance_at(y: &[f32], indices: &[usize]) -> f64 {
    if indices.len() <= 1 {
        return 0.0;
    }
    let n = indices.len() as f64;
    let mean = f64::from(mean_at(y, indices));
    indices
        .iter()
        .map(|&i| (f64::from(y[i]) - mean).powi(2))
        .sum::<f64>()
        / n
}

/// Population variance from running sums.
fn variance_from_sums(sum: f64, sum_sq: f64, n: f64) -> f64 {
    if n <= 1.0 {
        return 0.0;
    }
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

/// Find the best split for a single feature by sweeping the sorted values.
///
/// Returns (threshold, gain). Splits leaving fewer than `min_samples_leaf`
/// samples on either side are skipped.
fn find_best_regression_split_for_feature(
    x: &Matrix<f32>,
    y: &[f32],
    indices: &[usize],
    feature_idx: usize,
    current_variance: f64,
    min_samples_leaf: usize,
) -> Option<(f32, f64)> {
    let mut pairs: Vec<(f32, f64)> = indices
        .iter()
        .map(|&i| (x.get(i, feature_idx), f64::from(y[i])))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let n_total = pairs.len() as f64;
    let total_sum: f64 = pairs.iter().map(|p| p.1).sum();
    let total_sq: f64 = pairs.iter().map(|p| p.1 * p.1).sum();

    let mut left_sum = 0.0;
    let mut left_sq = 0.0;
    let mut best: Option<(f32, f64)> = None;

    for i in 0..pairs.len().saturating_sub(1) {
        left_sum += pairs[i].1;
        left_sq += pairs[i].1 * pairs[i].1;

        let (lo, hi) = (pairs[i].0, pairs[i + 1].0);
        if lo == hi {
            continue;
        }

        let n_left = i + 1;
        let n_right = pairs.len() - n_left;
        if n_left < min_samples_leaf || n_right < min_samples_leaf {
            continue;
        }

        let var_left = variance_from_sums(left_sum, left_sq, n_left as f64);
        let var_right = variance_from_sums(
            total_sum - left_sum,
            total_sq - left_sq,
            n_right as f64,
        );
        let split_mse =
            (n_left as f64 / n_total) * var_left + (n_right as f64 / n_total) * var_right;
        let gain = current_variance - split_mse;

        if gain > 1e-12 && best.map_or(true, |(_, g)| gain > g) {
            best = Some((split_threshold(lo, hi), gain));
        }
    }

    best
}

/// Midpoint between two adjacent distinct values that still separates them.
fn split_threshold(lo: f32, hi: f32) -> f32 {
    let mid = lo + (hi - lo) / 2.0;
    if mid >= hi {
        lo
    } else {
        mid
    }
}

/// Find the best split over all features.
///
/// Returns (feature_idx, threshold) if a split reduces the MSE.
fn find_best_regression_split(
    x: &Matrix<f32>,
    y: &[f32],
    indices: &[usize],
    min_samples_leaf: usize,
) -> Option<(usize, f32)> {
    let current_variance = variance_at(y, indices);
    let mut best: Option<(usize, f32, f64)> = None;

    for feature_idx in 0..x.n_cols() {
        if let Some((threshold, gain)) = find_best_regression_split_for_feature(
            x,
            y,
            indices,
            feature_idx,
            current_variance,
            min_samples_leaf,
        ) {
            if best.map_or(true, |(_, _, g)| gain > g) {
                best = Some((feature_idx, threshold, gain));
            }
        }
    }

    best.map(|(feature, threshold, _)| (feature, threshold))
}

/// Create a regression leaf node from the targets at `indices`.
fn make_regression_leaf(y: &[f32], indices: &[usize]) -> RegressionTreeNode {
    RegressionTreeNode::Leaf(RegressionLeaf {
        value: mean_at(y, indices),
        n_samples: indices.len(),
    })
}

/// Check if we've reached max depth.
fn at_max_depth(depth: usize, max_depth: Option<usize>) -> bool {
    max_depth.is_some_and(|max_d| depth >= max_d)
}

/// Reorders `indices` so rows with `feature <= threshold` come first.
///
/// Returns the number of rows on the left side.
fn partition_by_threshold(
    x: &Matrix<f32>,
    indices: &mut [usize],
    feature_idx: usize,
    threshold: f32,
) -> usize {
    let mut boundary = 0;
    for i in 0..indices.len() {
        if x.get(indices[i], feature_idx) <= threshold {
            indices.swap(i, boundary);
            boundary += 1;
        }
    }
    boundary
}

/// Build a regression decision tree recursively over the rows in `indices`.
fn build_regression_tree(
    x: &Matrix<f32>,
    y: &[f32],
    indices: &mut [usize],
    depth: usize,
    limits: GrowthLimits,
) -> RegressionTreeNode {
    if indices.len() < limits.min_samples_split
        || at_max_depth(depth, limits.max_depth)
        || variance_at(y, indices) < 1e-10
    {
        return make_regression_leaf(y, indices);
    }

    let Some((feature_idx, threshold)) =
        find_best_regression_split(x, y, indices, limits.min_samples_leaf)
    else {
        return make_regression_leaf(y, indices);
    };

    let boundary = partition_by_threshold(x, indices, feature_idx, threshold);
    let (left_indices, right_indices) = indices.split_at_mut(boundary);

    let left_child = build_regression_tree(x, y, left_indices, depth + 1, limits);
    let right_child = build_regression_tree(x, y, right_indices, depth + 1, limits);

    RegressionTreeNode::Node(RegressionNode {
        feature_idx,
        threshold,
        left: Box::new(left_child),
        right: Box::new(right_child),
    })
}

/// Compute feature importances from a regression tree by traversing it.
fn compute_regression_tree_feature_importances(node: &RegressionTreeNode, importances: &mut [f32]) {
    if let RegressionTreeNode::Node(n) = node {
        importances[n.feature_idx] += node.n_samples() as f32;
        compute_regression_tree_feature_importances(&n.left, importances);
        compute_regression_tree_feature_importances(&n.right, importances);
    }
}

/// Creates a bootstrap sample (random sample with replacement).
///
/// Returns indices of samples to include in the bootstrap sample.
fn bootstrap_sample(n_samples: usize, random_state: Option<u64>) -> Vec<usize> {
    use rand::distributions::{Distribution, Uniform};
    use rand::SeedableRng;

    let dist = Uniform::from(0..n_samples);

    if let Some(seed) = random_state {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        (0..n_samples).map(|_| dist.sample(&mut rng)).collect()
    } else {
        let mut rng = rand::thread_rng();
        (0..n_samples).map(|_| dist.sample(&mut rng)).collect()
    }
}

#[cfg(test)]
mod tests;
