//! Survey-weighted estimation and margin-of-error propagation
//!
//! Weighted totals carry a 90% two-sided confidence interval from the
//! with-replacement Taylor-series variance estimator for a weights-only
//! design. Derived ratios and products propagate margins of error through
//! the named functions below rather than inline arithmetic, so the
//! variance-propagation contract is testable in isolation.

use serde::Serialize;

/// Critical value for a two-sided 90% confidence interval
pub const Z_90: f64 = 1.645;

/// A survey-weighted point estimate with its 90% margin of error
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Estimate {
    pub value: f64,
    pub moe: f64,
}

impl Estimate {
    pub fn new(value: f64, moe: f64) -> Self {
        Estimate { value, moe }
    }

    pub fn lower(&self) -> f64 {
        self.value - self.moe
    }

    pub fn upper(&self) -> f64 {
        self.value + self.moe
    }
}

/// Weighted total of `(value, weight)` pairs with its 90% MOE.
///
/// Domain estimates pass the full group with indicator-valued `value`
/// fields; units outside the domain contribute zero to the total but stay
/// in the variance computation.
///
/// Variance: se² = n/(n-1) · Σ(wᵢyᵢ - mean(wy))², the with-replacement
/// linearization for a total under a weights-only design.
pub fn weighted_total<I>(pairs: I) -> Estimate
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let wy: Vec<f64> = pairs.into_iter().map(|(value, weight)| value * weight).collect();
    let n = wy.len();
    let total: f64 = wy.iter().sum();

    if n < 2 {
        return Estimate::new(total, 0.0);
    }

    let mean = total / n as f64;
    let sum_sq: f64 = wy.iter().map(|v| (v - mean).powi(2)).sum();
    let variance = n as f64 / (n as f64 - 1.0) * sum_sq;

    Estimate::new(total, Z_90 * variance.sqrt())
}

/// Weighted mean of `(value, weight)` pairs: the ratio of the weighted
/// value total to the weight total, with ratio-propagated MOE.
pub fn weighted_mean<I>(pairs: I) -> Estimate
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let pairs: Vec<(f64, f64)> = pairs.into_iter().collect();
    let numerator = weighted_total(pairs.iter().copied());
    let denominator = weighted_total(pairs.iter().map(|&(_, w)| (1.0, w)));

    if denominator.value == 0.0 {
        return Estimate::default();
    }

    let moe = propagate_ratio_moe(
        numerator.value,
        denominator.value,
        numerator.moe,
        denominator.moe,
    );
    Estimate::new(numerator.value / denominator.value, moe)
}

/// MOE of the ratio numerator/denominator.
///
/// Uses the Census proportion formula when the numerator is a subset of
/// the denominator; falls back to the uncorrelated-ratio formula when the
/// radicand goes negative.
pub fn propagate_ratio_moe(numerator: f64, denominator: f64, moe_num: f64, moe_den: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let ratio = numerator / denominator;
    let mut radicand = moe_num.powi(2) - ratio.powi(2) * moe_den.powi(2);
    if radicand < 0.0 {
        radicand = moe_num.powi(2) + ratio.powi(2) * moe_den.powi(2);
    }
    radicand.sqrt() / denominator.abs()
}

/// MOE of the product a·b for independent estimates
pub fn propagate_product_moe(a: f64, b: f64, moe_a: f64, moe_b: f64) -> f64 {
    (a.powi(2) * moe_b.powi(2) + b.powi(2) * moe_a.powi(2)).sqrt()
}
