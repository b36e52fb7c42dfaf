//! Reporting scale for ability estimates.
//!
//! Theta maps linearly onto a 0–1000 scale with mean 500 and SD 100; the
//! pass mark sits at 600.

use std::fmt;

use serde::{Deserialize, Serialize};

const SCALE_MEAN: f64 = 500.0;
const SCALE_SD: f64 = 100.0;

/// Scaled score required to pass.
pub const PASS_THRESHOLD: u32 = 600;

/// Convert theta to the 0–1000 reporting scale.
pub fn theta_to_scaled_score(theta: f64) -> u32 {
    (SCALE_MEAN + theta * SCALE_SD).clamp(0.0, 1000.0).round() as u32
}

/// Inverse of [`theta_to_scaled_score`], without clamping.
pub fn scaled_score_to_theta(score: f64) -> f64 {
    (score - SCALE_MEAN) / SCALE_SD
}

/// Standard normal CDF (Abramowitz & Stegun 7.1.26, |error| < 1.5e-7).
pub fn normal_cdf(z: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if z < 0.0 { -1.0 } else { 1.0 };
    let x = z.abs() / std::f64::consts::SQRT_2;
    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t * (-x * x).exp();

    0.5 * (1.0 + sign * y)
}

/// Probability that the true ability is at or above the pass mark, given
/// an estimate and its standard error.
///
/// With no precision yet (`se` infinite) this is a coin flip.
pub fn pass_probability(theta: f64, se: f64) -> f64 {
    if !se.is_finite() {
        return 0.5;
    }
    let pass_theta = scaled_score_to_theta(PASS_THRESHOLD as f64);
    if se <= 0.0 {
        return if theta >= pass_theta { 1.0 } else { 0.0 };
    }
    normal_cdf((theta - pass_theta) / se)
}

/// Coarse difficulty band of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyLevel {
    MuitoFacil,
    Facil,
    Medio,
    Dificil,
    MuitoDificil,
}

impl DifficultyLevel {
    /// All bands from easiest to hardest.
    pub const ALL: [DifficultyLevel; 5] = [
        DifficultyLevel::MuitoFacil,
        DifficultyLevel::Facil,
        DifficultyLevel::Medio,
        DifficultyLevel::Dificil,
        DifficultyLevel::MuitoDificil,
    ];

    /// Band for a difficulty (`b`) parameter.
    pub fn from_difficulty(b: f64) -> Self {
        if b < -1.5 {
            DifficultyLevel::MuitoFacil
        } else if b < -0.5 {
            DifficultyLevel::Facil
        } else if b < 0.5 {
            DifficultyLevel::Medio
        } else if b < 1.5 {
            DifficultyLevel::Dificil
        } else {
            DifficultyLevel::MuitoDificil
        }
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DifficultyLevel::MuitoFacil => write!(f, "muito_facil"),
            DifficultyLevel::Facil => write!(f, "facil"),
            DifficultyLevel::Medio => write!(f, "medio"),
            DifficultyLevel::Dificil => write!(f, "dificil"),
            DifficultyLevel::MuitoDificil => write!(f, "muito_dificil"),
        }
    }
}
