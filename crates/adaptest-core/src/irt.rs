//! Three-parameter logistic (3PL) item response model.
//!
//! `P(θ) = c + (1 - c) / (1 + e^(-a(θ - b)))`, where `a` is discrimination,
//! `b` difficulty, and `c` the guessing asymptote. All functions are pure.

use crate::model::IrtParameters;

/// Lower bound of the ability scale.
pub const THETA_MIN: f64 = -4.0;
/// Upper bound of the ability scale.
pub const THETA_MAX: f64 = 4.0;

/// Probability of a correct response at `theta`.
pub fn probability(theta: f64, params: &IrtParameters) -> f64 {
    let IrtParameters {
        difficulty: b,
        discrimination: a,
        guessing: c,
    } = *params;
    let logistic = 1.0 / (1.0 + (-a * (theta - b)).exp());
    c + (1.0 - c) * logistic
}

/// Fisher information of one item at `theta`.
///
/// `I(θ) = a² (P - c)² / ((1 - c)² P (1 - P))`. Returns `0.0` when the
/// denominator vanishes (`P` saturated at 0 or 1, or `c == 1`).
pub fn item_information(theta: f64, params: &IrtParameters) -> f64 {
    let p = probability(theta, params);
    let a = params.discrimination;
    let c = params.guessing;

    let numerator = a.powi(2) * (p - c).powi(2);
    let denominator = (1.0 - c).powi(2) * p * (1.0 - p);

    if denominator == 0.0 {
        return 0.0;
    }
    numerator / denominator
}

/// Test information: the sum of item information.
pub fn test_information(theta: f64, items: &[IrtParameters]) -> f64 {
    items.iter().map(|item| item_information(theta, item)).sum()
}

/// Standard error of a theta estimate, `1 / sqrt(I(θ))`.
///
/// Returns `f64::INFINITY` when there is no information yet (no items, or
/// only degenerate ones). That value means "no precision", not an error.
pub fn standard_error(theta: f64, items: &[IrtParameters]) -> f64 {
    let info = test_information(theta, items);
    if info <= 0.0 {
        return f64::INFINITY;
    }
    1.0 / info.sqrt()
}
