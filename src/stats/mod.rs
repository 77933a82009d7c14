//! Equal-width histograms for the price distribution chart.
//!
//! # Examples
//!
//! ```
//! use housing_dashboard::stats::Histogram;
//!
//! let hist = Histogram::equal_width(&[1.0, 2.0, 2.5, 4.0], 3).expect("valid bins");
//! assert_eq!(hist.counts, vec![1, 2, 1]);
//! assert_eq!(hist.bins.len(), 4);
//! ```

use crate::error::{DashboardError, Result};
use serde::Serialize;

/// Histogram representation with bin edges and counts.
///
/// Bins are `[edges[i], edges[i+1])` except the last, which is closed on
/// both sides.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    /// Bin edges (length = `n_bins` + 1, empty when there was no data)
    pub bins: Vec<f32>,
    /// Bin counts (length = `n_bins`)
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Builds `n_bins` equal-width bins spanning the data range.
    ///
    /// NaN values are ignored. An empty input yields a histogram with no
    /// bins rather than an error, so an empty price selection still renders.
    /// When every value is identical a single bin holds them all.
    ///
    /// # Errors
    ///
    /// Returns an error if `n_bins` is zero.
    pub fn equal_width(values: &[f32], n_bins: usize) -> Result<Self> {
        if n_bins == 0 {
            return Err(DashboardError::InvalidHyperparameter {
                param: "n_bins".to_string(),
                value: "0".to_string(),
                constraint: ">= 1".to_string(),
            });
        }

        let finite: Vec<f32> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        let Some(data_min) = finite.iter().copied().reduce(f32::min) else {
            return Ok(Self::empty());
        };
        let data_max = finite.iter().copied().fold(data_min, f32::max);

        // Handle case where all values are the same
        if data_min == data_max {
            return Ok(Self {
                bins: vec![data_min, data_max],
                counts: vec![finite.len()],
            });
        }

        let bin_width = (data_max - data_min) / n_bins as f32;
        let bins: Vec<f32> = (0..=n_bins)
            .map(|i| data_min + i as f32 * bin_width)
            .collect();

        let mut counts = vec![0usize; n_bins];
        for &value in &finite {
            // value == data_max goes in last bin
            let bin_idx = (((value - data_min) / bin_width) as usize).min(n_bins - 1);
            counts[bin_idx] += 1;
        }

        Ok(Self { bins, counts })
    }

    fn empty() -> Self {
        Self {
            bins: Vec::new(),
            counts: Vec::new(),
        }
    }

    /// Number of bins.
    #[must_use]
    pub fn n_bins(&self) -> usize {
        self.counts.len()
    }

    /// Total number of counted values.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Largest bin count (0 for an empty histogram).
    #[must_use]
    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// True if no values were counted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Iterates `(lower_edge, upper_edge, count)` per bin.
    pub fn iter_bins(&self) -> impl Iterator<Item = (f32, f32, usize)> + '_ {
        self.bins
            .windows(2)
            .zip(&self.counts)
            .map(|(edge, &count)| (edge[0], edge[1], count))
    }
}
