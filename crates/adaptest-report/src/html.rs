//! HTML report generator.
//!
//! Produces a self-contained HTML file with all CSS/JS inlined.

use anyhow::Result;
use std::path::Path;

use adaptest_core::exposure::ExposureTable;
use adaptest_core::report::{precision_percentage, BatchReport};
use adaptest_core::scoring::theta_to_scaled_score;

/// Items shown in the exposure chart.
const CHART_ITEMS: usize = 25;

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn fmt_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.3}"))
}

fn fmt_se(se: f64) -> String {
    if se.is_finite() {
        format!("{se:.3}")
    } else {
        "∞".to_string()
    }
}

/// Generate an HTML report from a batch report.
pub fn generate_html(report: &BatchReport) -> String {
    let stats = &report.stats;
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>adaptest report: {}</title>\n",
        html_escape(&report.bank.name)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    // Header
    html.push_str("<header>\n");
    html.push_str("<h1>adaptest report</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">Bank: <strong>{}</strong> | {} items | {} sessions | {} / {} | {}</p>\n",
        html_escape(&report.bank.name),
        report.bank.item_count,
        stats.sessions,
        report.config.estimation_method,
        report.config.selection_method,
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    // Summary dashboard
    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Summary</h2>\n");
    html.push_str("<table class=\"summary\">\n");
    html.push_str("<thead><tr><th>Metric</th><th>Value</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    let rows = [
        ("Mean items", format!("{:.1}", stats.mean_items)),
        (
            "Items (min / max)",
            format!("{} / {}", stats.min_items, stats.max_items),
        ),
        ("Stopped by SE", stats.stopped_by_se.to_string()),
        ("Stopped by max items", stats.stopped_by_max_items.to_string()),
        ("Bank exhausted", stats.bank_exhausted.to_string()),
        ("Mean SE", fmt_optional(stats.mean_se)),
        ("Mean theta", format!("{:.3}", stats.mean_theta)),
        ("Bias", fmt_optional(stats.bias)),
        ("RMSE", fmt_optional(stats.rmse)),
        ("Correlation", fmt_optional(stats.correlation)),
        ("Max exposure", format!("{:.1}%", stats.max_exposure * 100.0)),
        (
            "Items over exposure ceiling",
            format!(
                "{} (ceiling {:.0}%)",
                stats.overexposed_items,
                report.config.max_exposure_rate * 100.0
            ),
        ),
    ];
    for (label, value) in rows {
        html.push_str(&format!("<tr><td>{label}</td><td>{}</td></tr>\n", html_escape(&value)));
    }
    html.push_str("</tbody></table>\n");

    html.push_str("<h3>Area share</h3>\n<table class=\"summary\">\n");
    html.push_str("<thead><tr><th>Area</th><th>Target</th><th>Mean share</th></tr></thead>\n<tbody>\n");
    for (area, share) in &stats.mean_area_share {
        let target = report.config.area_targets.get(area).copied().unwrap_or(0.0);
        html.push_str(&format!(
            "<tr><td>{}</td><td>{:.1}%</td><td>{:.1}%</td></tr>\n",
            html_escape(area.label()),
            target * 100.0,
            share * 100.0
        ));
    }
    html.push_str("</tbody></table>\n");

    if !report.exposure.is_empty() {
        html.push_str("<h3>Most exposed items</h3>\n");
        html.push_str(&generate_exposure_chart(
            &report.exposure,
            report.config.max_exposure_rate,
        ));
    }

    html.push_str("</section>\n");

    // Per-session results
    html.push_str("<section class=\"results\">\n");
    html.push_str("<h2>Sessions</h2>\n");
    html.push_str("<table class=\"results-table\" id=\"results\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable(0)\">Examinee</th><th onclick=\"sortTable(1)\">True theta</th><th onclick=\"sortTable(2)\">Theta</th><th onclick=\"sortTable(3)\">SE</th><th onclick=\"sortTable(4)\">Precision</th><th onclick=\"sortTable(5)\">Items</th><th onclick=\"sortTable(6)\">Score</th><th onclick=\"sortTable(7)\">Stop</th></tr></thead>\n");
    html.push_str("<tbody>\n");

    for r in &report.records {
        let session = &r.session;
        let (row_class, stop_text) = match session.stopping_reason {
            Some(reason) => ("pass", reason.to_string()),
            None if r.bank_exhausted => ("fail", "bank_exhausted".to_string()),
            None => ("fail", "-".to_string()),
        };

        html.push_str(&format!(
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{:.3}</td><td>{}</td><td>{:.1}%</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            row_class,
            html_escape(&r.examinee_id),
            fmt_optional(r.true_theta),
            session.theta,
            fmt_se(session.se),
            precision_percentage(session.se),
            session.len(),
            theta_to_scaled_score(session.theta),
            stop_text
        ));
    }

    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(
        &serde_json::to_string_pretty(report)
            .unwrap_or_default()
            .replace('<', "&lt;")
            .replace('>', "&gt;"),
    );
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    // JavaScript for sorting
    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write an HTML report to a file.
pub fn write_html_report(report: &BatchReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    Ok(())
}

fn generate_exposure_chart(exposure: &ExposureTable, ceiling: f64) -> String {
    let bar_height = 18;
    let max_width = 400;
    let padding = 6;
    let label_width = 160;

    let mut items: Vec<(&String, f64)> = exposure.iter().map(|(id, r)| (id, *r)).collect();
    items.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    items.truncate(CHART_ITEMS);

    let total_height = items.len() * (bar_height + padding) + padding;

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        label_width + max_width + 60,
        total_height
    );

    for (i, (item_id, rate)) in items.iter().enumerate() {
        let y = i * (bar_height + padding) + padding;
        let width = (rate.clamp(0.0, 1.0) * max_width as f64) as usize;

        let color = if *rate > ceiling {
            "#ef4444"
        } else if *rate > ceiling * 0.8 {
            "#eab308"
        } else {
            "#22c55e"
        };

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>\n",
            label_width - 10,
            y + bar_height / 2,
            html_escape(item_id)
        ));
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" rx=\"3\"/>\n",
            label_width, y, width, bar_height, color
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"11\" fill=\"currentColor\" dominant-baseline=\"middle\">{:.1}%</text>\n",
            label_width + width + 8,
            y + bar_height / 2,
            rate * 100.0
        ));
    }

    let ceiling_x = label_width + (ceiling.clamp(0.0, 1.0) * max_width as f64) as usize;
    svg.push_str(&format!(
        "  <line x1=\"{ceiling_x}\" y1=\"0\" x2=\"{ceiling_x}\" y2=\"{total_height}\" stroke=\"currentColor\" stroke-dasharray=\"4 3\"/>\n"
    ));

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --fail: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --fail: #7f1d1d; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); cursor: pointer; }
.pass { background: var(--pass); }
.fail { background: var(--fail); }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(col) {
  const table = document.getElementById('results');
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col].textContent;
    const vb = b.cells[col].textContent;
    const na = parseFloat(va), nb = parseFloat(vb);
    const cmp = !isNaN(na) && !isNaN(nb) ? na - nb : va.localeCompare(vb);
    return asc ? cmp : -cmp;
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use adaptest_core::model::{Area, CatConfig};
    use adaptest_core::report::{BankSummary, ExamRecord};
    use adaptest_core::session::{CatSession, StoppingReason};
    use adaptest_core::statistics::compute_batch_stats;

    fn make_test_report() -> BatchReport {
        let records = vec![
            ExamRecord {
                examinee_id: "sim-0001".into(),
                true_theta: Some(0.8),
                session: CatSession {
                    theta: 0.75,
                    se: 0.28,
                    items_administered: vec!["cm-<1>".into(), "ci-2".into()],
                    responses: vec![true, false],
                    item_areas: vec![Area::ClinicaMedica, Area::Cirurgia],
                    is_complete: true,
                    stopping_reason: Some(StoppingReason::SeThreshold),
                    ..CatSession::new()
                },
                bank_exhausted: false,
                duration_ms: 3,
            },
            ExamRecord {
                examinee_id: "sim-0002".into(),
                true_theta: None,
                session: CatSession::new(),
                bank_exhausted: true,
                duration_ms: 1,
            },
        ];
        let exposure: ExposureTable = [("cm-<1>".to_string(), 0.5), ("ci-2".to_string(), 0.1)]
            .into_iter()
            .collect();
        let config = CatConfig::default();
        let stats = compute_batch_stats(&records, &exposure, config.max_exposure_rate);

        BatchReport {
            id: uuid::Uuid::nil(),
            created_at: chrono::Utc::now(),
            bank: BankSummary {
                id: "test-bank".into(),
                name: "Test Bank".into(),
                item_count: 2,
            },
            config,
            records,
            stats,
            exposure,
            duration_ms: 10,
        }
    }

    #[test]
    fn html_report_contains_required_elements() {
        let report = make_test_report();
        let html = generate_html(&report);

        assert!(html.contains("<html"));
        assert!(html.contains("</html>"));
        assert!(html.contains("Test Bank"));
        assert!(html.contains("sim-0001"));
        assert!(html.contains("se_threshold"));
        assert!(html.contains("bank_exhausted"));
        assert!(html.contains("Clínica Médica"));
        assert!(html.contains("<svg"));
        assert!(html.contains("∞"));
    }

    #[test]
    fn html_report_escapes_ids() {
        let html = generate_html(&make_test_report());
        assert!(html.contains("cm-&lt;1&gt;"));
        assert!(!html.contains("cm-<1>"));
    }

    #[test]
    fn exposure_chart_orders_by_rate() {
        let exposure: ExposureTable = [
            ("low".to_string(), 0.05),
            ("high".to_string(), 0.6),
            ("mid".to_string(), 0.2),
        ]
        .into_iter()
        .collect();
        let svg = generate_exposure_chart(&exposure, 0.25);
        let high = svg.find(">high<").unwrap();
        let mid = svg.find(">mid<").unwrap();
        let low = svg.find(">low<").unwrap();
        assert!(high < mid && mid < low);
        assert!(svg.contains("#ef4444"));
    }

    #[test]
    fn html_report_write_to_file() {
        let report = make_test_report();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.html");

        write_html_report(&report, &path).unwrap();
        assert!(path.exists());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<html"));
    }
}
