//! Ability estimation from a response history.
//!
//! Two estimators share one call surface: expected a posteriori (EAP) over a
//! fixed quadrature grid, and maximum likelihood (MLE) by Newton-Raphson.
//! `MAP` is an alias of EAP and uses the same standard-normal prior.

use std::f64::consts::PI;

use crate::irt::{item_information, probability, THETA_MAX, THETA_MIN};
use crate::model::{EstimationMethod, IrtParameters};

/// Quadrature points on `[THETA_MIN, THETA_MAX]`, a step of 0.1.
pub const EAP_GRID_POINTS: usize = 81;

/// Floor applied to response probabilities before taking logs.
const PROBABILITY_FLOOR: f64 = 1e-10;

/// Newton-Raphson iteration cap.
pub const MLE_MAX_ITERATIONS: usize = 100;

/// Newton-Raphson stops once a step is smaller than this.
pub const MLE_CONVERGENCE: f64 = 0.001;

/// Distance kept from the scale bounds for perfect response patterns.
const MLE_BOUNDARY_OFFSET: f64 = 0.5;

/// Estimate ability with the configured method.
///
/// `responses[i]` is the outcome of the item with parameters `items[i]`.
pub fn estimate_theta(
    method: EstimationMethod,
    responses: &[bool],
    items: &[IrtParameters],
) -> f64 {
    debug_assert_eq!(
        responses.len(),
        items.len(),
        "responses and items must have the same length"
    );

    match method {
        EstimationMethod::Eap | EstimationMethod::Map => estimate_theta_eap(responses, items),
        EstimationMethod::Mle => estimate_theta_mle(responses, items),
    }
}

/// Log-likelihood of a response pattern at `theta`.
fn log_likelihood(theta: f64, responses: &[bool], items: &[IrtParameters]) -> f64 {
    responses
        .iter()
        .zip(items)
        .map(|(&correct, item)| {
            let p = probability(theta, item);
            if correct {
                p.max(PROBABILITY_FLOOR).ln()
            } else {
                (1.0 - p).max(PROBABILITY_FLOOR).ln()
            }
        })
        .sum()
}

fn standard_normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Expected a posteriori estimate with a standard-normal prior.
///
/// Returns `0.0` if the posterior mass underflows to zero.
pub fn estimate_theta_eap(responses: &[bool], items: &[IrtParameters]) -> f64 {
    let mut numerator = 0.0;
    let mut denominator = 0.0;

    for i in 0..EAP_GRID_POINTS {
        let theta =
            THETA_MIN + (i as f64 / (EAP_GRID_POINTS - 1) as f64) * (THETA_MAX - THETA_MIN);
        let prior = standard_normal_pdf(theta);
        let posterior = log_likelihood(theta, responses, items).exp() * prior;

        numerator += theta * posterior;
        denominator += posterior;
    }

    if denominator == 0.0 {
        return 0.0;
    }
    numerator / denominator
}

/// Maximum likelihood estimate by Newton-Raphson, starting from 0.
///
/// Perfect patterns have no finite maximum, so all-correct returns
/// `THETA_MAX - 0.5` and all-incorrect `THETA_MIN + 0.5`. An empty history
/// returns `0.0`.
pub fn estimate_theta_mle(responses: &[bool], items: &[IrtParameters]) -> f64 {
    if responses.is_empty() {
        return 0.0;
    }
    if responses.iter().all(|&r| r) {
        return THETA_MAX - MLE_BOUNDARY_OFFSET;
    }
    if responses.iter().all(|&r| !r) {
        return THETA_MIN + MLE_BOUNDARY_OFFSET;
    }

    let mut theta = 0.0;

    for _ in 0..MLE_MAX_ITERATIONS {
        let mut first_derivative = 0.0;
        let mut second_derivative = 0.0;

        for (&correct, item) in responses.iter().zip(items) {
            let p = probability(theta, item);
            let a = item.discrimination;
            let c = item.guessing;
            let u = if correct { 1.0 } else { 0.0 };

            let p_star = (p - c) / (1.0 - c);
            first_derivative += a * (u - p) * p_star / p;
            second_derivative -= item_information(theta, item);
        }

        if second_derivative == 0.0 {
            break;
        }

        let delta = first_derivative / second_derivative;
        theta = (theta - delta).clamp(THETA_MIN, THETA_MAX);

        if delta.abs() < MLE_CONVERGENCE {
            break;
        }
    }

    theta
}
