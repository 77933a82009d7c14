//! `DataFrame` module for named column containers.
//!
//! Provides the minimal table the dashboard needs: named `f32` columns,
//! selection, row filtering, head previews and conversion to a feature
//! matrix. CSV decoding lives in [`csv`](self::csv).

mod csv;

use crate::error::{DashboardError, Result};
use crate::primitives::{Matrix, Vector};
use serde::Serialize;

/// A minimal `DataFrame` with named columns.
///
/// This is a thin wrapper around `Vec<(String, Vector<f32>)>` with
/// convenience methods for ML workflows.
///
/// # Examples
///
/// ```
/// use housing_dashboard::data::DataFrame;
/// use housing_dashboard::primitives::Vector;
///
/// let columns = vec![
///     ("RM".to_string(), Vector::from_slice(&[6.0, 7.0, 8.0])),
///     ("MEDV".to_string(), Vector::from_slice(&[20.0, 25.0, 30.0])),
/// ];
/// let df = DataFrame::new(columns).expect("DataFrame creation should succeed with valid columns");
/// assert_eq!(df.shape(), (3, 2));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    columns: Vec<(String, Vector<f32>)>,
    /// Per column: every source cell was written as an integer
    integer: Vec<bool>,
    n_rows: usize,
}

impl DataFrame {
    /// Creates a new `DataFrame` from named columns.
    ///
    /// # Errors
    ///
    /// Returns an error if columns have different lengths, if a name is empty
    /// or duplicated, or if there are no columns.
    pub fn new(columns: Vec<(String, Vector<f32>)>) -> Result<Self> {
        if columns.is_empty() {
            return Err("DataFrame must have at least one column".into());
        }

        let n_rows = columns[0].1.len();

        for (name, col) in &columns {
            if col.len() != n_rows {
                return Err(DashboardError::dimension_mismatch(
                    &format!("rows in column '{name}'"),
                    n_rows,
                    col.len(),
                ));
            }
            if name.is_empty() {
                return Err("Column names cannot be empty".into());
            }
        }

        let mut names: Vec<&str> = columns.iter().map(|(n, _)| n.as_str()).collect();
        names.sort_unstable();
        if let Some(dup) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(format!("Duplicate column name: {}", dup[0]).into());
        }

        Ok(Self {
            integer: vec![false; columns.len()],
            columns,
            n_rows,
        })
    }

    /// Returns the shape as (`n_rows`, `n_cols`).
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.columns.len())
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Returns the column names in table order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Returns true if a column with this name exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    /// Returns true if every parsed cell of `name` was an integer literal.
    ///
    /// Frames built with [`new`](Self::new) have no integer columns.
    #[must_use]
    pub fn is_integer_column(&self, name: &str) -> bool {
        self.position(name).is_some_and(|i| self.integer[i])
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|(n, _)| n == name)
    }

    /// Returns a reference to a column by name.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::MissingColumn`] if the column doesn't exist.
    pub fn column(&self, name: &str) -> Result<&Vector<f32>> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| DashboardError::missing_column(name))
    }

    /// Selects multiple columns by name, returning a new `DataFrame`.
    ///
    /// # Errors
    ///
    /// Returns an error if any column doesn't exist or `names` is empty.
    pub fn select(&self, names: &[&str]) -> Result<Self> {
        if names.is_empty() {
            return Err("Must select at least one column".into());
        }

        let mut selected = Vec::with_capacity(names.len());
        let mut integer = Vec::with_capacity(names.len());

        for &name in names {
            let index = self
                .position(name)
                .ok_or_else(|| DashboardError::missing_column(name))?;
            selected.push((name.to_string(), self.columns[index].1.clone()));
            integer.push(self.integer[index]);
        }

        let mut frame = Self::new(selected)?;
        frame.integer = integer;
        Ok(frame)
    }

    /// Returns the first `n` rows (or all rows if there are fewer).
    #[must_use]
    pub fn head(&self, n: usize) -> Self {
        let take = n.min(self.n_rows);
        let columns = self
            .columns
            .iter()
            .map(|(name, col)| (name.clone(), Vector::from_slice(&col.as_slice()[..take])))
            .collect();
        Self {
            columns,
            integer: self.integer.clone(),
            n_rows: take,
        }
    }

    /// Keeps the rows whose index satisfies `keep`.
    #[must_use]
    pub fn filter_rows<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(usize) -> bool,
    {
        let kept: Vec<usize> = (0..self.n_rows).filter(|&i| keep(i)).collect();
        let columns = self
            .columns
            .iter()
            .map(|(name, col)| {
                let data = kept.iter().map(|&i| col[i]).collect();
                (name.clone(), Vector::from_vec(data))
            })
            .collect();
        Self {
            columns,
            integer: self.integer.clone(),
            n_rows: kept.len(),
        }
    }

    /// Keeps the rows where `column` lies in `[low, high]`, both ends inclusive.
    ///
    /// # Errors
    ///
    /// Returns an error if the column doesn't exist.
    pub fn filter_between(&self, column: &str, low: f32, high: f32) -> Result<Self> {
        let values = self.column(column)?.clone();
        Ok(self.filter_rows(|i| {
            let v = values[i];
            v >= low && v <= high
        }))
    }

    /// Converts the selected columns to a row-major Matrix.
    ///
    /// # Errors
    ///
    /// Returns an error if any column doesn't exist.
    pub fn to_matrix_of(&self, names: &[&str]) -> Result<Matrix<f32>> {
        let cols: Vec<&Vector<f32>> = names
            .iter()
            .map(|&name| self.column(name))
            .collect::<Result<_>>()?;

        let mut data = Vec::with_capacity(self.n_rows * cols.len());
        for row_idx in 0..self.n_rows {
            for col in &cols {
                data.push(col[row_idx]);
            }
        }

        Matrix::from_vec(self.n_rows, cols.len(), data)
            .map_err(|e| DashboardError::DimensionMismatch {
                expected: format!("{}x{}", self.n_rows, cols.len()),
                actual: e.to_string(),
            })
    }

    /// Returns an iterator over columns as (name, vector) pairs.
    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &Vector<f32>)> {
        self.columns.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Returns descriptive statistics for all columns.
    #[must_use]
    pub fn describe(&self) -> Vec<ColumnStats> {
        self.columns
            .iter()
            .map(|(name, col)| {
                let mean = col.mean();
                let std = col.variance().sqrt();

                let mut sorted: Vec<f32> = col.as_slice().to_vec();
                sorted.sort_by(f32::total_cmp);

                let min = sorted.first().copied().unwrap_or(0.0);
                let max = sorted.last().copied().unwrap_or(0.0);
                let median = if sorted.is_empty() {
                    0.0
                } else if sorted.len() % 2 == 0 {
                    (sorted[sorted.len() / 2 - 1] + sorted[sorted.len() / 2]) / 2.0
                } else {
                    sorted[sorted.len() / 2]
                };

                ColumnStats {
                    name: name.clone(),
                    count: col.len(),
                    mean,
                    std,
                    min,
                    median,
                    max,
                }
            })
            .collect()
    }
}

/// Descriptive statistics for a column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    /// Column name.
    pub name: String,
    /// Number of elements.
    pub count: usize,
    /// Mean value.
    pub mean: f32,
    /// Standard deviation.
    pub std: f32,
    /// Minimum value.
    pub min: f32,
    /// Median value.
    pub median: f32,
    /// Maximum value.
    pub max: f32,
}

#[cfg(test)]
#[path = "data_tests.rs"]
mod tests;
