//! Aggregate statistics over a batch of administered exams.
//!
//! Recovery statistics (bias, RMSE, correlation) only cover records that carry
//! a generating ability, i.e. simulated examinees.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::exposure::ExposureTable;
use crate::model::Area;
use crate::report::{area_coverage, ExamRecord};
use crate::session::StoppingReason;

/// Batch-level summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Number of exams.
    pub sessions: usize,
    /// Mean test length.
    pub mean_items: f64,
    /// Shortest test.
    pub min_items: usize,
    /// Longest test.
    pub max_items: usize,
    /// Exams that stopped on the precision rule.
    pub stopped_by_se: usize,
    /// Exams that stopped on the length ceiling.
    pub stopped_by_max_items: usize,
    /// Exams that ran out of items before any rule fired.
    pub bank_exhausted: usize,
    /// Mean final standard error over exams with a finite one.
    #[serde(default)]
    pub mean_se: Option<f64>,
    /// Mean final ability estimate.
    pub mean_theta: f64,
    /// Mean of `estimate - true`.
    #[serde(default)]
    pub bias: Option<f64>,
    /// Root mean squared error against the generating ability.
    #[serde(default)]
    pub rmse: Option<f64>,
    /// Pearson correlation between estimate and generating ability.
    #[serde(default)]
    pub correlation: Option<f64>,
    /// Mean share of items per area.
    pub mean_area_share: BTreeMap<Area, f64>,
    /// Highest exposure rate in the table.
    pub max_exposure: f64,
    /// Items whose exposure exceeds the ceiling.
    pub overexposed_items: usize,
}

/// Summarize a batch of records against the final exposure table.
pub fn compute_batch_stats(
    records: &[ExamRecord],
    exposure: &ExposureTable,
    max_exposure_rate: f64,
) -> BatchStats {
    let max_exposure = exposure.values().copied().fold(0.0, f64::max);
    let overexposed_items = exposure
        .values()
        .filter(|rate| **rate > max_exposure_rate)
        .count();

    if records.is_empty() {
        return BatchStats {
            max_exposure,
            overexposed_items,
            ..BatchStats::default()
        };
    }

    let n = records.len() as f64;
    let lengths: Vec<usize> = records.iter().map(|r| r.session.len()).collect();
    let mean_items = lengths.iter().sum::<usize>() as f64 / n;

    let count_reason = |reason: StoppingReason| {
        records
            .iter()
            .filter(|r| r.session.stopping_reason == Some(reason))
            .count()
    };

    let finite_se: Vec<f64> = records
        .iter()
        .map(|r| r.session.se)
        .filter(|se| se.is_finite())
        .collect();
    let mean_se = mean(&finite_se);

    let thetas: Vec<f64> = records.iter().map(|r| r.session.theta).collect();
    let mean_theta = mean(&thetas).unwrap_or(0.0);

    let pairs: Vec<(f64, f64)> = records
        .iter()
        .filter_map(|r| r.true_theta.map(|t| (r.session.theta, t)))
        .collect();
    let errors: Vec<f64> = pairs.iter().map(|(est, truth)| est - truth).collect();
    let bias = mean(&errors);
    let rmse = mean(&errors.iter().map(|e| e * e).collect::<Vec<_>>()).map(f64::sqrt);
    let correlation = pearson(&pairs);

    let mut mean_area_share: BTreeMap<Area, f64> = Area::ALL.iter().map(|a| (*a, 0.0)).collect();
    for record in records {
        let total = record.session.len();
        if total == 0 {
            continue;
        }
        for (area, count) in area_coverage(&record.session) {
            *mean_area_share.entry(area).or_default() += count as f64 / total as f64 / n;
        }
    }

    BatchStats {
        sessions: records.len(),
        mean_items,
        min_items: lengths.iter().copied().min().unwrap_or(0),
        max_items: lengths.iter().copied().max().unwrap_or(0),
        stopped_by_se: count_reason(StoppingReason::SeThreshold),
        stopped_by_max_items: count_reason(StoppingReason::MaxItems),
        bank_exhausted: records.iter().filter(|r| r.bank_exhausted).count(),
        mean_se,
        mean_theta,
        bias,
        rmse,
        correlation,
        mean_area_share,
        max_exposure,
        overexposed_items,
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Pearson correlation; `None` with fewer than two pairs or zero variance.
fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in pairs {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CatSession;

    fn record(
        theta: f64,
        true_theta: Option<f64>,
        areas: Vec<Area>,
        reason: Option<StoppingReason>,
    ) -> ExamRecord {
        let n = areas.len();
        ExamRecord {
            examinee_id: format!("e{theta}"),
            true_theta,
            session: CatSession {
                theta,
                se: 0.3,
                items_administered: (0..n).map(|i| format!("q{i}")).collect(),
                responses: vec![true; n],
                item_areas: areas,
                is_complete: reason.is_some(),
                stopping_reason: reason,
                ..CatSession::new()
            },
            bank_exhausted: reason.is_none(),
            duration_ms: 1,
        }
    }

    #[test]
    fn empty_batch() {
        let exposure: ExposureTable = [("q1".to_string(), 0.4)].into_iter().collect();
        let stats = compute_batch_stats(&[], &exposure, 0.25);
        assert_eq!(stats.sessions, 0);
        assert_eq!(stats.max_exposure, 0.4);
        assert_eq!(stats.overexposed_items, 1);
        assert!(stats.bias.is_none());
    }

    #[test]
    fn counts_and_means() {
        let records = vec![
            record(
                1.0,
                Some(0.5),
                vec![Area::Cirurgia, Area::Pediatria],
                Some(StoppingReason::SeThreshold),
            ),
            record(
                -1.0,
                Some(-0.5),
                vec![Area::Cirurgia, Area::Cirurgia, Area::Cirurgia, Area::Pediatria],
                Some(StoppingReason::MaxItems),
            ),
            record(0.0, None, vec![Area::SaudeColetiva], None),
        ];
        let stats = compute_batch_stats(&records, &ExposureTable::new(), 0.25);

        assert_eq!(stats.sessions, 3);
        assert!((stats.mean_items - 7.0 / 3.0).abs() < 1e-12);
        assert_eq!(stats.min_items, 1);
        assert_eq!(stats.max_items, 4);
        assert_eq!(stats.stopped_by_se, 1);
        assert_eq!(stats.stopped_by_max_items, 1);
        assert_eq!(stats.bank_exhausted, 1);
        assert!((stats.mean_se.unwrap() - 0.3).abs() < 1e-12);
        // Errors +0.5 and -0.5.
        assert!(stats.bias.unwrap().abs() < 1e-12);
        assert!((stats.rmse.unwrap() - 0.5).abs() < 1e-12);
        assert!((stats.correlation.unwrap() - 1.0).abs() < 1e-12);

        let share_sum: f64 = stats.mean_area_share.values().sum();
        assert!((share_sum - 1.0).abs() < 1e-12);
        // (0.5 + 0.75 + 0) / 3
        assert!((stats.mean_area_share[&Area::Cirurgia] - 1.25 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn correlation_needs_variance() {
        assert!(pearson(&[(1.0, 1.0)]).is_none());
        assert!(pearson(&[(1.0, 1.0), (1.0, 2.0)]).is_none());
        let r = pearson(&[(1.0, 2.0), (2.0, 1.0), (3.0, 0.0)]).unwrap();
        assert!((r + 1.0).abs() < 1e-12);
    }
}
