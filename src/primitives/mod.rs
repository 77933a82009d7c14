//! Core compute primitives (Vector, Matrix).
//!
//! These types back the data table and the tree ensemble.

mod matrix;
mod vector;

pub use matrix::Matrix;
pub use vector::Vector;
