//! Summary statistics and trend fitting over metric series

use serde::Serialize;
use std::collections::BTreeMap;

/// Descriptive statistics of one series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub samples: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Keyed `p<quantile>`, e.g. `p95`
    pub quantiles: BTreeMap<String, f64>,
}

/// Summarize a series, `None` when it is empty
pub fn summarize(values: &[f64], quantiles: &[f64]) -> Option<Summary> {
    let mean = mean(values)?;
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    Some(Summary {
        samples: sorted.len(),
        mean,
        median: percentile_sorted(&sorted, 50.0),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        quantiles: quantiles
            .iter()
            .map(|q| (format!("p{}", q), percentile_sorted(&sorted, *q)))
            .collect(),
    })
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Linearly interpolated percentile of an ascending series, `p` in [0, 100]
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}

/// Least-squares line `y = intercept + slope * x`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn at(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fit a line through `(x, y)` points. `None` with fewer than two distinct x values.
pub fn linear_fit(points: &[(f64, f64)]) -> Option<LinearFit> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = points.iter().map(|(_, y)| y).sum();
    let sum_xy: f64 = points.iter().map(|(x, y)| x * y).sum();
    let sum_x2: f64 = points.iter().map(|(x, _)| x.powi(2)).sum();

    let denom = n * sum_x2 - sum_x.powi(2);
    if denom.abs() < f64::EPSILON {
        return None;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    Some(LinearFit {
        slope,
        intercept: (sum_y - slope * sum_x) / n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_of_known_series() {
        let values = [4.0, 1.0, 3.0, 2.0, 5.0];
        let summary = summarize(&values, &[90.0]).unwrap();

        assert_eq!(summary.samples, 5);
        assert_eq!(summary.mean, 3.0);
        assert_eq!(summary.median, 3.0);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 5.0);
        assert!((summary.quantiles["p90"] - 4.6).abs() < 1e-9);
    }

    #[test]
    fn test_even_length_median_interpolates() {
        let summary = summarize(&[1.0, 2.0, 3.0, 4.0], &[]).unwrap();
        assert_eq!(summary.median, 2.5);
        assert!(summary.quantiles.is_empty());
    }

    #[test]
    fn test_empty_series() {
        assert!(summarize(&[], &[50.0]).is_none());
        assert!(mean(&[]).is_none());
        assert!(linear_fit(&[]).is_none());
    }

    #[test]
    fn test_linear_fit_recovers_line() {
        let points: Vec<_> = (0..5).map(|x| (x as f64, 2.0 + 3.0 * x as f64)).collect();
        let fit = linear_fit(&points).unwrap();

        assert!((fit.slope - 3.0).abs() < 1e-9);
        assert!((fit.intercept - 2.0).abs() < 1e-9);
        assert!((fit.at(10.0) - 32.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_fit_needs_distinct_x() {
        assert!(linear_fit(&[(1.0, 1.0), (1.0, 5.0)]).is_none());
    }
}
