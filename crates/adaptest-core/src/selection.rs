//! Next-item selection.
//!
//! Candidates are narrowed in order: not yet administered, under the exposure
//! ceiling, in the most under-represented area. Each narrowing falls back to
//! the previous set when it would leave nothing, so selection only ends when
//! the bank itself is exhausted.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::exposure::{rate_of, ExposureTable};
use crate::irt::{item_information, probability};
use crate::model::{Area, CatConfig, Item, SelectionMethod};
use crate::session::CatSession;

/// Half-width multiplier of the KL integration window, `δ = z / sqrt(n)`.
const KL_WINDOW_Z: f64 = 3.0;

/// Quadrature points across the KL integration window.
const KL_POINTS: usize = 21;

/// Keeps log ratios finite when a probability saturates.
const KL_EPSILON: f64 = 1e-10;

/// Pick the next item, or `None` if every bank item was administered.
///
/// `Random` selection draws from the thread-local generator; use
/// [`select_next_item_with_rng`] for reproducible runs.
pub fn select_next_item<'a>(
    session: &CatSession,
    item_bank: &'a [Item],
    exposure: &ExposureTable,
    config: &CatConfig,
) -> Option<&'a Item> {
    select_next_item_with_rng(session, item_bank, exposure, config, &mut rand::thread_rng())
}

/// [`select_next_item`] with an explicit random source.
pub fn select_next_item_with_rng<'a, R: Rng + ?Sized>(
    session: &CatSession,
    item_bank: &'a [Item],
    exposure: &ExposureTable,
    config: &CatConfig,
    rng: &mut R,
) -> Option<&'a Item> {
    let remaining: Vec<&Item> = item_bank
        .iter()
        .filter(|item| !session.has_administered(&item.id))
        .collect();

    if remaining.is_empty() {
        return None;
    }

    let under_ceiling: Vec<&Item> = remaining
        .iter()
        .copied()
        .filter(|item| rate_of(exposure, &item.id) < config.max_exposure_rate)
        .collect();
    let eligible = if under_ceiling.is_empty() {
        tracing::warn!(
            candidates = remaining.len(),
            "all remaining items over exposure ceiling, ignoring exposure control"
        );
        remaining
    } else {
        under_ceiling
    };

    let candidates = if config.content_balancing && !session.is_empty() {
        match target_area(session, &config.area_targets) {
            Some(area) => {
                let in_area: Vec<&Item> = eligible
                    .iter()
                    .copied()
                    .filter(|item| item.area == area)
                    .collect();
                if in_area.is_empty() {
                    tracing::debug!(%area, "no eligible items in target area");
                    eligible
                } else {
                    in_area
                }
            }
            None => eligible,
        }
    } else {
        eligible
    };

    match config.selection_method {
        SelectionMethod::MaxFisherInformation => {
            first_max_by_score(&candidates, |item| item_information(session.theta, &item.irt))
        }
        SelectionMethod::KullbackLeibler => {
            let delta = KL_WINDOW_Z / (session.len().max(1) as f64).sqrt();
            first_max_by_score(&candidates, |item| {
                kl_information(session.theta, delta, item)
            })
        }
        SelectionMethod::Random => candidates.choose(rng).copied(),
    }
}

/// The area furthest below its target share, given the areas administered so
/// far. Ties go to the area listed first.
pub fn target_area(session: &CatSession, area_targets: &BTreeMap<Area, f64>) -> Option<Area> {
    let total = session.len();
    let mut counts: BTreeMap<Area, usize> = BTreeMap::new();
    for area in &session.item_areas {
        *counts.entry(*area).or_default() += 1;
    }

    let mut best: Option<(Area, f64)> = None;
    for (area, target) in area_targets {
        let current = if total > 0 {
            counts.get(area).copied().unwrap_or(0) as f64 / total as f64
        } else {
            0.0
        };
        let deviation = target - current;
        if best.map_or(true, |(_, d)| deviation > d) {
            best = Some((*area, deviation));
        }
    }
    best.map(|(area, _)| area)
}

/// Kullback-Leibler information of an item around `theta`.
///
/// Integrates `KL(P(θ̂) ‖ P(θ))` over `[θ̂ - δ, θ̂ + δ]` with the trapezoid
/// rule. Wider windows early in the test favour items that separate
/// distant abilities.
pub fn kl_information(theta: f64, delta: f64, item: &Item) -> f64 {
    let p0 = probability(theta, &item.irt).clamp(KL_EPSILON, 1.0 - KL_EPSILON);
    let step = 2.0 * delta / (KL_POINTS - 1) as f64;

    (0..KL_POINTS)
        .map(|i| {
            let t = theta - delta + i as f64 * step;
            let p = probability(t, &item.irt).clamp(KL_EPSILON, 1.0 - KL_EPSILON);
            let kl = p0 * (p0 / p).ln() + (1.0 - p0) * ((1.0 - p0) / (1.0 - p)).ln();
            let weight = if i == 0 || i == KL_POINTS - 1 { 0.5 } else { 1.0 };
            weight * kl * step
        })
        .sum()
}

/// Highest-scoring item; the earliest one wins ties.
fn first_max_by_score<'a>(
    candidates: &[&'a Item],
    score: impl Fn(&Item) -> f64,
) -> Option<&'a Item> {
    let mut best: Option<(&'a Item, f64)> = None;
    for &item in candidates {
        let value = score(item);
        if best.map_or(true, |(_, b)| value > b) {
            best = Some((item, value));
        }
    }
    best.map(|(item, _)| item)
}
