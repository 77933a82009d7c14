//! Vector type for 1D numeric data.

use serde::{Deserialize, Serialize};
use std::ops::Index;

/// A 1D vector of values.
///
/// # Examples
///
/// ```
/// use housing_dashboard::primitives::Vector;
///
/// let v = Vector::from_slice(&[1.0, 2.0, 3.0]);
/// assert_eq!(v.len(), 3);
/// assert!((v.mean() - 2.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector<T> {
    data: Vec<T>,
}

impl<T: Copy> Vector<T> {
    /// Creates a vector from a slice.
    #[must_use]
    pub fn from_slice(data: &[T]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }

    /// Creates a vector taking ownership of `data`.
    #[must_use]
    pub fn from_vec(data: Vec<T>) -> Self {
        Self { data }
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the vector has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the underlying data as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Returns the element at `idx`, if any.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<T> {
        self.data.get(idx).copied()
    }
}

impl Vector<f32> {
    /// Sum of all elements.
    #[must_use]
    pub fn sum(&self) -> f32 {
        self.data.iter().sum()
    }

    /// Arithmetic mean (0.0 for an empty vector).
    #[must_use]
    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.sum() / self.data.len() as f32
    }

    /// Population variance (0.0 for fewer than two elements).
    #[must_use]
    pub fn variance(&self) -> f32 {
        if self.data.len() <= 1 {
            return 0.0;
        }
        let mean = self.mean();
        self.data.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / self.data.len() as f32
    }

    /// Smallest element, ignoring NaN.
    #[must_use]
    pub fn min(&self) -> Option<f32> {
        self.data
            .iter()
            .copied()
            .filter(|x| !x.is_nan())
            .reduce(f32::min)
    }

    /// Largest element, ignoring NaN.
    #[must_use]
    pub fn max(&self) -> Option<f32> {
        self.data
            .iter()
            .copied()
            .filter(|x| !x.is_nan())
            .reduce(f32::max)
    }
}

impl<T> Index<usize> for Vector<T> {
    type Output = T;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.data[idx]
    }
}
