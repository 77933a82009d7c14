//! CSV decoding into a [`DataFrame`].

use super::DataFrame;
use crate::error::{DashboardError, Result};
use crate::primitives::Vector;
use std::io::Read;

impl DataFrame {
    /// Parses comma-separated values with a header row.
    ///
    /// Every cell must be numeric. Leading/trailing whitespace is trimmed.
    /// A column whose cells are all integer literals (no decimal point or
    /// exponent) is flagged as an integer column.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::MalformedData`] for a missing header, a row
    /// whose width differs from the header, or a non-numeric cell.
    ///
    /// # Examples
    ///
    /// ```
    /// use housing_dashboard::data::DataFrame;
    ///
    /// let csv = "RM,MEDV\n6.5,24.0\n7.1,21.6\n";
    /// let df = DataFrame::from_csv_reader(csv.as_bytes()).expect("valid CSV");
    /// assert_eq!(df.shape(), (2, 2));
    /// ```
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(::csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| DashboardError::MalformedData {
                line: 1,
                message: format!("Failed to read headers: {e}"),
            })?
            .iter()
            .map(str::to_string)
            .collect();

        if headers.is_empty() || headers.iter().all(String::is_empty) {
            return Err(DashboardError::MalformedData {
                line: 1,
                message: "missing header row".to_string(),
            });
        }

        let mut values: Vec<Vec<f32>> = vec![Vec::new(); headers.len()];
        let mut integer = vec![true; headers.len()];

        for result in reader.records() {
            let record = result.map_err(|e| DashboardError::MalformedData {
                line: e.position().map_or(0, |p| p.line() as usize),
                message: format!("Failed to read row: {e}"),
            })?;
            let line = record.position().map_or(0, |p| p.line() as usize);

            for (col_idx, cell) in record.iter().enumerate() {
                let value = cell.parse::<f32>().map_err(|_| DashboardError::MalformedData {
                    line,
                    message: format!(
                        "non-numeric value '{cell}' in column '{}'",
                        headers[col_idx]
                    ),
                })?;
                integer[col_idx] &= cell.parse::<i64>().is_ok();
                values[col_idx].push(value);
            }
        }

        let columns = headers
            .into_iter()
            .zip(values)
            .map(|(name, data)| (name, Vector::from_vec(data)))
            .collect();

        let mut frame = Self::new(columns)?;
        frame.integer = integer;
        Ok(frame)
    }
}
