//! Closed-form statistics used by the fallback path

use crate::error::EngineError;
use crate::Result;

pub const MIN_POINTS_FOR_REGRESSION: usize = 2;
pub const MIN_POINTS_FOR_ANOMALIES: usize = 3;

/// Population mean and standard deviation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub mean: f64,
    pub std_dev: f64,
}

pub fn summarize(values: &[f64], operation: &'static str, required: usize) -> Result<Summary> {
    if values.len() < required || values.is_empty() {
        return Err(EngineError::InsufficientData {
            operation,
            required,
            actual: values.len(),
        });
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

    Ok(Summary {
        mean,
        std_dev: variance.sqrt(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Ordinary least squares of `values` against their index 0..n-1
pub fn linear_regression(values: &[f64]) -> Result<LinearFit> {
    if values.len() < MIN_POINTS_FOR_REGRESSION {
        return Err(EngineError::InsufficientData {
            operation: "revenue forecast",
            required: MIN_POINTS_FOR_REGRESSION,
            actual: values.len(),
        });
    }

    let n = values.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2) = (0.0_f64, 0.0_f64, 0.0_f64, 0.0_f64);

    for (i, &y) in values.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
    }

    // With n >= 2 distinct indices the denominator is strictly positive
    let denominator = n * sum_x2 - sum_x * sum_x;
    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;

    Ok(LinearFit { slope, intercept })
}

/// Level periodic payment for a fully amortizing loan.
/// `monthly_rate` is the periodic rate, `months` the number of payments.
pub fn annuity_payment(principal: f64, monthly_rate: f64, months: u32) -> f64 {
    if months == 0 {
        return principal.max(0.0);
    }

    let n = months as f64;
    if monthly_rate == 0.0 {
        return principal / n;
    }

    let growth = (1.0 + monthly_rate).powf(n);
    principal * (monthly_rate * growth) / (growth - 1.0)
}
