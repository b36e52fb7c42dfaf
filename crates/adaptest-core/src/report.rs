//! Session reporting and batch report persistence.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::exposure::ExposureTable;
use crate::model::{Area, CatConfig};
use crate::scoring::theta_to_scaled_score;
use crate::session::CatSession;
use crate::statistics::BatchStats;

/// Largest gap between an area's share and its target that still counts as
/// balanced. Ten items split 2/2/2/2/2 against 0.2 targets are balanced; five
/// items split 4/1 are not.
pub const BALANCE_TOLERANCE: f64 = 0.05;

/// Items administered per area. All five areas are present.
pub fn area_coverage(session: &CatSession) -> BTreeMap<Area, usize> {
    let mut counts: BTreeMap<Area, usize> = Area::ALL.iter().map(|a| (*a, 0)).collect();
    for area in &session.item_areas {
        *counts.entry(*area).or_default() += 1;
    }
    counts
}

/// Whether every area's share is within [`BALANCE_TOLERANCE`] of its target.
///
/// An empty session is never balanced.
pub fn is_content_balanced(session: &CatSession, area_targets: &BTreeMap<Area, f64>) -> bool {
    let total = session.item_areas.len();
    if total == 0 {
        return false;
    }

    let coverage = area_coverage(session);
    area_targets.iter().all(|(area, target)| {
        let share = coverage.get(area).copied().unwrap_or(0) as f64 / total as f64;
        (share - target).abs() <= BALANCE_TOLERANCE
    })
}

/// Map a standard error onto a 0–100 precision gauge.
///
/// `100 - 300·se`, clamped. Passes through the calibration points
/// se 0.30 → 10, 0.20 → 40, 0.10 → 70, and 0 → 100; no precision yet
/// (infinite or NaN) reads 0.
pub fn precision_percentage(se: f64) -> f64 {
    if !se.is_finite() {
        return 0.0;
    }
    (100.0 - se * 300.0).clamp(0.0, 100.0)
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Human-readable summary of a session.
pub fn generate_report(session: &CatSession, _config: &CatConfig) -> String {
    let total = session.len();
    let correct = session.correct_count();
    let coverage = area_coverage(session);
    let stopping_reason = session
        .stopping_reason
        .map(|r| r.to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let mut out = String::new();
    out.push_str("CAT Session Report\n");
    out.push_str("==================\n\n");
    let _ = writeln!(out, "Items Administered: {total}");
    let _ = writeln!(
        out,
        "Correct Answers: {correct} / {total} ({:.0}%)\n",
        percent(correct, total)
    );
    let _ = writeln!(out, "Final Theta: {:.3}", session.theta);
    let _ = writeln!(out, "Standard Error: {:.3}", session.se);
    let _ = writeln!(out, "Precision: {:.1}%", precision_percentage(session.se));
    let _ = writeln!(out, "Scaled Score: {}\n", theta_to_scaled_score(session.theta));
    let _ = writeln!(out, "Stopping Reason: {stopping_reason}\n");
    out.push_str("Area Coverage:");
    for (area, count) in &coverage {
        let _ = write!(
            out,
            "\n- {}: {} ({:.1}%)",
            area.label(),
            count,
            percent(*count, total)
        );
    }
    out
}

/// Summary of an item bank (without the items).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankSummary {
    pub id: String,
    pub name: String,
    pub item_count: usize,
}

/// The outcome of one administered exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamRecord {
    /// Examinee identifier.
    pub examinee_id: String,
    /// Generating ability, when the examinee is simulated.
    #[serde(default)]
    pub true_theta: Option<f64>,
    /// Final session state.
    pub session: CatSession,
    /// The bank ran out before a stopping rule fired.
    #[serde(default)]
    pub bank_exhausted: bool,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// A complete batch report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    /// The bank the sessions drew from.
    pub bank: BankSummary,
    /// Config every session ran with.
    pub config: CatConfig,
    /// Individual exam outcomes.
    pub records: Vec<ExamRecord>,
    /// Aggregate statistics.
    pub stats: BatchStats,
    /// Exposure table after the batch.
    pub exposure: ExposureTable,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl BatchReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: BatchReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Find the record for an examinee.
    pub fn record(&self, examinee_id: &str) -> Option<&ExamRecord> {
        self.records.iter().find(|r| r.examinee_id == examinee_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StoppingReason;

    fn session_with_areas(areas: Vec<Area>) -> CatSession {
        CatSession {
            items_administered: (0..areas.len()).map(|i| format!("q{i}")).collect(),
            item_areas: areas,
            ..CatSession::new()
        }
    }

    #[test]
    fn coverage_counts_every_area() {
        let session = session_with_areas(vec![
            Area::ClinicaMedica,
            Area::ClinicaMedica,
            Area::Cirurgia,
            Area::Pediatria,
            Area::SaudeColetiva,
        ]);
        let coverage = area_coverage(&session);
        assert_eq!(coverage[&Area::ClinicaMedica], 2);
        assert_eq!(coverage[&Area::Cirurgia], 1);
        assert_eq!(coverage[&Area::GinecologiaObstetricia], 0);
        assert_eq!(coverage[&Area::Pediatria], 1);
        assert_eq!(coverage[&Area::SaudeColetiva], 1);
    }

    #[test]
    fn balance_check_reference_cases() {
        let targets = CatConfig::default().area_targets;
        let balanced = session_with_areas(
            Area::ALL.iter().flat_map(|a| [*a, *a]).collect(),
        );
        let unbalanced = session_with_areas(vec![
            Area::ClinicaMedica,
            Area::ClinicaMedica,
            Area::ClinicaMedica,
            Area::ClinicaMedica,
            Area::Cirurgia,
        ]);
        assert!(is_content_balanced(&balanced, &targets));
        assert!(!is_content_balanced(&unbalanced, &targets));
        assert!(!is_content_balanced(&CatSession::new(), &targets));
    }

    #[test]
    fn precision_calibration_points() {
        assert_eq!(precision_percentage(f64::INFINITY), 0.0);
        assert_eq!(precision_percentage(f64::NAN), 0.0);
        assert_eq!(precision_percentage(0.0), 100.0);
        assert!((precision_percentage(0.30) - 10.0).abs() < 0.5);
        assert!((precision_percentage(0.20) - 40.0).abs() < 0.5);
        assert!((precision_percentage(0.10) - 70.0).abs() < 0.5);
        assert_eq!(precision_percentage(2.0), 0.0);
        assert!(precision_percentage(0.15) > precision_percentage(0.25));
    }

    #[test]
    fn report_contains_summary_lines() {
        let session = CatSession {
            theta: 1.5,
            se: 0.25,
            items_administered: vec!["q1", "q2", "q3", "q4", "q5"]
                .into_iter()
                .map(String::from)
                .collect(),
            responses: vec![true, true, false, true, true],
            item_areas: Area::ALL.to_vec(),
            is_complete: true,
            stopping_reason: Some(StoppingReason::SeThreshold),
            ..CatSession::new()
        };

        let report = generate_report(&session, &CatConfig::default());

        assert!(report.contains("Items Administered: 5"));
        assert!(report.contains("Correct Answers: 4 / 5 (80%)"));
        assert!(report.contains("Final Theta: 1.500"));
        assert!(report.contains("Standard Error: 0.250"));
        assert!(report.contains("Stopping Reason: se_threshold"));
        assert!(report.contains("Scaled Score: 650"));
        assert!(report.contains("- Clínica Médica: 1 (20.0%)"));
        assert!(report.contains("- Saúde Coletiva: 1 (20.0%)"));
    }

    #[test]
    fn report_on_empty_session_has_no_nan() {
        let report = generate_report(&CatSession::new(), &CatConfig::default());
        assert!(report.contains("Correct Answers: 0 / 0 (0%)"));
        assert!(report.contains("Stopping Reason: N/A"));
        assert!(!report.contains("NaN"));
    }
}
