//! Tests for regression trees and the random forest.

use super::*;
use crate::primitives::{Matrix, Vector};

fn regression_data() -> (Matrix<f32>, Vector<f32>) {
    let x = Matrix::from_vec(
        8,
        2,
        vec![
            1.0, 0.0, // y = 2
            0.0, 1.0, // y = 3
            1.0, 1.0, // y = 5
            2.0, 0.0, // y = 4
            0.0, 2.0, // y = 6
            2.0, 1.0, // y = 7
            1.0, 2.0, // y = 8
            3.0, 1.0, // y = 9
        ],
    )
    .expect("8x2 matrix");
    let y = Vector::from_slice(&[2.0, 3.0, 5.0, 4.0, 6.0, 7.0, 8.0, 9.0]);
    (x, y)
}

fn step_data() -> (Matrix<f32>, Vector<f32>) {
    let x = Matrix::from_vec(4, 1, vec![1.0, 2.0, 3.0, 4.0]).expect("4x1 matrix");
    let y = Vector::from_slice(&[1.0, 1.0, 5.0, 5.0]);
    (x, y)
}

// ====================================================================
// Nodes
// ====================================================================

#[test]
fn test_leaf_depth_is_zero() {
    let leaf = RegressionTreeNode::Leaf(RegressionLeaf {
        value: 1.5,
        n_samples: 3,
    });
    assert_eq!(leaf.depth(), 0);
    assert_eq!(leaf.n_samples(), 3);
}

#[test]
fn test_node_depth_and_sample_count() {
    let tree = RegressionTreeNode::Node(RegressionNode {
        feature_idx: 0,
        threshold: 0.5,
        left: Box::new(RegressionTreeNode::Leaf(RegressionLeaf {
            value: 1.0,
            n_samples: 2,
        })),
        right: Box::new(RegressionTreeNode::Node(RegressionNode {
            feature_idx: 1,
            threshold: 2.0,
            left: Box::new(RegressionTreeNode::Leaf(RegressionLeaf {
                value: 3.0,
                n_samples: 1,
            })),
            right: Box::new(RegressionTreeNode::Leaf(RegressionLeaf {
                value: 4.0,
                n_samples: 4,
            })),
        })),
    });
    assert_eq!(tree.depth(), 2);
    assert_eq!(tree.n_samples(), 7);
    assert!((tree.predict_one(&[0.0, 9.0]) - 1.0).abs() < 1e-6);
    assert!((tree.predict_one(&[1.0, 2.0]) - 3.0).abs() < 1e-6);
    assert!((tree.predict_one(&[1.0, 2.5]) - 4.0).abs() < 1e-6);
}

// ====================================================================
// Split search helpers
// ====================================================================

#[test]
fn test_split_threshold_is_midpoint() {
    assert!((split_threshold(2.0, 3.0) - 2.5).abs() < 1e-6);
}

#[test]
fn test_split_threshold_separates_adjacent_floats() {
    let lo = 1.0_f32;
    let hi = f32::from_bits(lo.to_bits() + 1);
    let t = split_threshold(lo, hi);
    assert!(lo <= t && t < hi);
}

#[test]
fn test_partition_by_threshold_moves_left_rows_first() {
    let (x, _) = step_data();
    let mut indices = vec![3, 0, 2, 1];
    let boundary = partition_by_threshold(&x, &mut indices, 0, 2.5);
    assert_eq!(boundary, 2);
    let mut left = indices[..2].to_vec();
    left.sort_unstable();
    assert_eq!(left, vec![0, 1]);
}

#[test]
fn test_variance_from_sums_matches_direct() {
    let y = [1.0_f32, 2.0, 4.0];
    let direct = variance_at(&y, &[0, 1, 2]);
    let sum: f64 = y.iter().map(|&v| f64::from(v)).sum();
    let sum_sq: f64 = y.iter().map(|&v| f64::from(v).powi(2)).sum();
    assert!((variance_from_sums(sum, sum_sq, 3.0) - direct).abs() < 1e-9);
}

#[test]
fn test_bootstrap_sample_is_seeded() {
    let a = bootstrap_sample(50, Some(7));
    let b = bootstrap_sample(50, Some(7));
    assert_eq!(a, b);
    assert_eq!(a.len(), 50);
    assert!(a.iter().all(|&i| i < 50));
}

// ====================================================================
// DecisionTreeRegressor
// ====================================================================

#[test]
fn test_tree_fits_step_function_exactly() {
    let (x, y) = step_data();
    let mut tree = DecisionTreeRegressor::new();
    tree.fit(&x, &y).expect("fit should succeed");

    let preds = tree.predict(&x).expect("same feature count");
    assert_eq!(preds.as_slice(), &[1.0, 1.0, 5.0, 5.0]);

    let root = tree.root().expect("fitted");
    assert_eq!(root.depth(), 1);
    match root {
        RegressionTreeNode::Node(node) => {
            assert_eq!(node.feature_idx, 0);
            assert!((node.threshold - 2.5).abs() < 1e-6);
        }
        RegressionTreeNode::Leaf(_) => panic!("expected a split"),
    }
}

#[test]
fn test_tree_max_depth_zero_predicts_mean() {
    let (x, y) = step_data();
    let mut tree = DecisionTreeRegressor::new().with_max_depth(0);
    tree.fit(&x, &y).expect("fit should succeed");
    let preds = tree.predict(&x).expect("same feature count");
    assert!(preds.as_slice().iter().all(|&p| (p - 3.0).abs() < 1e-6));
}

#[test]
fn test_tree_min_samples_leaf_blocks_small_splits() {
    let (x, y) = step_data();
    let mut tree = DecisionTreeRegressor::new().with_min_samples_leaf(3);
    tree.fit(&x, &y).expect("fit should succeed");
    assert_eq!(tree.root().expect("fitted").depth(), 0);
}

#[test]
fn test_tree_min_samples_split_stops_growth() {
    let (x, y) = step_data();
    let mut tree = DecisionTreeRegressor::new().with_min_samples_split(5);
    tree.fit(&x, &y).expect("fit should succeed");
    assert_eq!(tree.root().expect("fitted").depth(), 0);
}

#[test]
fn test_tree_constant_feature_gives_leaf() {
    let x = Matrix::from_vec(3, 1, vec![2.0, 2.0, 2.0]).expect("3x1 matrix");
    let y = Vector::from_slice(&[1.0, 2.0, 6.0]);
    let mut tree = DecisionTreeRegressor::new();
    tree.fit(&x, &y).expect("fit should succeed");
    let preds = tree.predict(&x).expect("same feature count");
    assert!((preds[0] - 3.0).abs() < 1e-6);
}

#[test]
fn test_tree_single_sample() {
    let x = Matrix::from_vec(1, 2, vec![0.5, 0.5]).expect("1x2 matrix");
    let y = Vector::from_slice(&[42.0]);
    let mut tree = DecisionTreeRegressor::new();
    tree.fit(&x, &y).expect("fit should succeed");
    let preds = tree.predict(&x).expect("same feature count");
    assert!((preds[0] - 42.0).abs() < 1e-6);
}

#[test]
fn test_tree_fit_rejects_sample_mismatch() {
    let x = Matrix::from_vec(3, 1, vec![1.0, 2.0, 3.0]).expect("3x1 matrix");
    let y = Vector::from_slice(&[1.0, 2.0]);
    let err = DecisionTreeRegressor::new().fit(&x, &y).unwrap_err();
    assert!(matches!(err, DashboardError::DimensionMismatch { .. }));
}

#[test]
fn test_tree_fit_rejects_empty_data() {
    let x = Matrix::from_vec(0, 2, Vec::new()).expect("0x2 matrix");
    let y = Vector::from_vec(Vec::new());
    let err = DecisionTreeRegressor::new().fit(&x, &y).unwrap_err();
    assert!(matches!(err, DashboardError::TrainingFailure(_)));
}

#[test]
fn test_tree_predict_unfitted_is_error() {
    let (x, _) = step_data();
    let err = DecisionTreeRegressor::new().predict(&x).unwrap_err();
    assert!(matches!(err, DashboardError::TrainingFailure(_)));
}

// ====================================================================
// RandomForestRegressor — construction
// ====================================================================

#[test]
fn test_regressor_new_sets_n_estimators() {
    let rf = RandomForestRegressor::new(7);
    assert_eq!(rf.n_estimators(), 7);
    assert!(rf.trees().is_empty());
    assert!(rf.n_features_in().is_none());
    assert!(rf.oob_score().is_none());
}

#[test]
fn test_regressor_default_has_hundred_trees() {
    assert_eq!(RandomForestRegressor::default().n_estimators(), 100);
}

#[test]
fn test_regressor_builder_clamps_limits() {
    let rf = RandomForestRegressor::new(3)
        .with_max_depth(6)
        .with_min_samples_split(0)
        .with_min_samples_leaf(0)
        .with_random_state(123);
    assert_eq!(rf.limits.max_depth, Some(6));
    assert_eq!(rf.limits.min_samples_split, 2);
    assert_eq!(rf.limits.min_samples_leaf, 1);
    assert_eq!(rf.random_state, Some(123));
}

// ====================================================================
// RandomForestRegressor — fit / predict
// ====================================================================

#[test]
fn test_regressor_fit_creates_requested_trees() {
    let (x, y) = regression_data();
    let mut rf = RandomForestRegressor::new(5).with_random_state(42);
    rf.fit(&x, &y).expect("fit should succeed");
    assert_eq!(rf.trees().len(), 5);
    assert_eq!(rf.n_features_in(), Some(2));
}

#[test]
fn test_regressor_zero_estimators_rejected() {
    let (x, y) = regression_data();
    let err = RandomForestRegressor::new(0).fit(&x, &y).unwrap_err();
    assert!(matches!(
        err,
        DashboardError::InvalidHyperparameter { ref param, .. } if param == "n_estimators"
    ));
}

#[test]
fn test_regressor_predictions_within_target_range() {
    let (x, y) = regression_data();
    let mut rf = RandomForestRegressor::new(20).with_random_state(1);
    rf.fit(&x, &y).expect("fit should succeed");
    let preds = rf.predict(&x).expect("same feature count");
    assert_eq!(preds.len(), 8);
    for &p in preds.as_slice() {
        assert!((2.0..=9.0).contains(&p), "prediction {p} outside target range");
    }
}

#[test]
fn test_regressor_seeded_fit_is_reproducible() {
    let (x, y) = regression_data();
    let mut a = RandomForestRegressor::new(16).with_random_state(99);
    let mut b = RandomForestRegressor::new(16).with_random_state(99);
    a.fit(&x, &y).expect("fit should succeed");
    b.fit(&x, &y).expect("fit should succeed");
    assert_eq!(
        a.predict(&x).expect("same feature count"),
        b.predict(&x).expect("same feature count")
    );
    assert_eq!(a.oob_score(), b.oob_score());
}

#[test]
fn test_regressor_fits_training_data_well() {
    let (x, y) = step_data();
    let mut rf = RandomForestRegressor::new(30).with_random_state(5);
    rf.fit(&x, &y).expect("fit should succeed");
    let fitted = rf.predict(&x).expect("same feature count");
    let r2 = crate::metrics::r_squared(&fitted, &y);
    assert!(r2 > 0.5, "training R² too low: {r2}");
}

#[test]
fn test_regressor_predict_unfitted_is_error() {
    let (x, _) = regression_data();
    let err = RandomForestRegressor::new(3).predict(&x).unwrap_err();
    assert!(matches!(err, DashboardError::TrainingFailure(_)));
}

#[test]
fn test_regressor_predict_wrong_width_is_dimension_mismatch() {
    let (x, y) = regression_data();
    let mut rf = RandomForestRegressor::new(3).with_random_state(42);
    rf.fit(&x, &y).expect("fit should succeed");

    let narrow = Matrix::from_vec(1, 1, vec![1.0]).expect("1x1 matrix");
    let err = rf.predict(&narrow).unwrap_err();
    assert!(matches!(err, DashboardError::DimensionMismatch { .. }));
}

// ====================================================================
// RandomForestRegressor — OOB and importances
// ====================================================================

#[test]
fn test_regressor_oob_score_available_after_fit() {
    let (x, y) = regression_data();
    let mut rf = RandomForestRegressor::new(25).with_random_state(3);
    rf.fit(&x, &y).expect("fit should succeed");
    let oob = rf.oob_score().expect("some samples are out of bag");
    assert!(oob.is_finite());
    assert!(oob <= 1.0);
}

#[test]
fn test_regressor_oob_indices_exclude_bootstrap() {
    let (x, y) = regression_data();
    let mut rf = RandomForestRegressor::new(4).with_random_state(11);
    rf.fit(&x, &y).expect("fit should succeed");
    for (i, oob) in rf.oob_indices.iter().enumerate() {
        let bootstrap = bootstrap_sample(8, Some(11 + i as u64));
        assert!(oob.iter().all(|idx| !bootstrap.contains(idx)));
    }
}

#[test]
fn test_regressor_feature_importances_normalized() {
    let (x, y) = regression_data();
    let mut rf = RandomForestRegressor::new(10).with_random_state(42);
    rf.fit(&x, &y).expect("fit should succeed");
    let importances = rf.feature_importances().expect("fitted");
    assert_eq!(importances.len(), 2);
    let total: f32 = importances.iter().sum();
    assert!((total - 1.0).abs() < 1e-4);
    assert!(importances.iter().all(|&v| v >= 0.0));
}

#[test]
fn test_regressor_feature_importances_unfitted_is_none() {
    assert!(RandomForestRegressor::new(3).feature_importances().is_none());
}

#[test]
fn test_regressor_informative_feature_dominates() {
    // Column 0 carries the signal, column 1 is constant
    let x = Matrix::from_vec(
        6,
        2,
        vec![1.0, 0.0, 2.0, 0.0, 3.0, 0.0, 10.0, 0.0, 11.0, 0.0, 12.0, 0.0],
    )
    .expect("6x2 matrix");
    let y = Vector::from_slice(&[1.0, 1.0, 1.0, 9.0, 9.0, 9.0]);
    let mut rf = RandomForestRegressor::new(10).with_random_state(8);
    rf.fit(&x, &y).expect("fit should succeed");
    let importances = rf.feature_importances().expect("fitted");
    assert!(importances[1].abs() < 1e-6);
}
