//! Sample statistics for score summaries
//!
//! Two-sided confidence intervals for the mean use the Student t quantile
//! with `n - 1` degrees of freedom:
//!
//! ```text
//! half_width = t(1 - alpha/2, n - 1) * s / sqrt(n)
//! ```
//!
//! where `s` is the sample standard deviation (Bessel-corrected).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Default significance level (95% coverage)
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Sample mean with a symmetric confidence interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanInterval {
    pub mean: f64,
    /// Distance from the mean to either interval bound
    pub half_width: f64,
    /// Number of values the estimate is based on
    pub count: usize,
    /// True when the interval could not be estimated from real data
    /// (a single value, or an all-missing group filled with zeros)
    pub estimated: bool,
}

impl MeanInterval {
    pub fn lower(&self) -> f64 {
        self.mean - self.half_width
    }

    pub fn upper(&self) -> f64 {
        self.mean + self.half_width
    }
}

pub fn sample_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Bessel-corrected standard deviation; needs at least two values
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = sample_mean(values)?;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    Some(variance.sqrt())
}

fn check_alpha(alpha: f64) -> Result<()> {
    if alpha > 0.0 && alpha < 1.0 {
        Ok(())
    } else {
        Err(Error::Statistics(format!(
            "significance level must be in (0, 1), got {}",
            alpha
        )))
    }
}

/// Two-sided t critical value for `alpha` and `df` degrees of freedom
pub fn t_critical(alpha: f64, df: usize) -> Result<f64> {
    check_alpha(alpha)?;
    let dist = StudentsT::new(0.0, 1.0, df as f64)
        .map_err(|e| Error::Statistics(format!("t distribution with df = {}: {}", df, e)))?;
    Ok(dist.inverse_cdf(1.0 - alpha / 2.0))
}

/// Mean and two-sided t confidence interval of a sample
///
/// A single value yields a zero-width interval flagged `estimated`.
///
/// # Errors
/// Empty sample, or `alpha` outside (0, 1).
pub fn t_interval(values: &[f64], alpha: f64) -> Result<MeanInterval> {
    check_alpha(alpha)?;
    let mean = sample_mean(values)
        .ok_or_else(|| Error::Statistics("cannot summarize an empty sample".to_string()))?;

    let n = values.len();
    if n == 1 {
        return Ok(MeanInterval {
            mean,
            half_width: 0.0,
            count: 1,
            estimated: true,
        });
    }

    let std_dev = sample_std_dev(values).unwrap_or(0.0);
    let half_width = if std_dev == 0.0 {
        0.0
    } else {
        t_critical(alpha, n - 1)? * std_dev / (n as f64).sqrt()
    };

    Ok(MeanInterval {
        mean,
        half_width,
        count: n,
        estimated: false,
    })
}

/// Interval over a column that may contain missing values
///
/// Missing values are ignored. When every value is missing the column is
/// treated as zeros (giving a zero interval) and the result is flagged
/// `estimated` instead of failing.
pub fn interval_ignoring_missing(values: &[Option<f64>], alpha: f64) -> Result<MeanInterval> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if !present.is_empty() {
        return t_interval(&present, alpha);
    }

    tracing::debug!(
        values = values.len(),
        "Results contain incomplete entries; substituting zeros for interval estimation"
    );
    let zeros = vec![0.0; values.len().max(1)];
    let mut interval = t_interval(&zeros, alpha)?;
    interval.estimated = true;
    Ok(interval)
}
