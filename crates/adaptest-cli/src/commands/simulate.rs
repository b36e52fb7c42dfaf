//! The `adaptest simulate` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use adaptest_core::config::load_config_from;
use adaptest_core::engine::{CatEngine, CatEngineConfig, ProgressReporter};
use adaptest_core::model::{EstimationMethod, SelectionMethod};
use adaptest_core::parser;
use adaptest_core::report::{BatchReport, ExamRecord};
use adaptest_core::scoring::theta_to_scaled_score;
use adaptest_core::session::CatSession;
use adaptest_core::simulation::sample_population;
use adaptest_report::html::write_html_report;

/// Arguments collected from the command line. `None` falls back to config.
pub struct SimulateArgs {
    pub bank: PathBuf,
    pub examinees: Option<usize>,
    pub parallelism: Option<usize>,
    pub seed: Option<u64>,
    pub estimation: Option<String>,
    pub selection: Option<String>,
    pub output: Option<PathBuf>,
    pub format: String,
    pub config: Option<PathBuf>,
    pub prior: Option<PathBuf>,
}

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_exam_start(&self, examinee_id: &str) {
        tracing::debug!("starting session for {examinee_id}");
    }

    fn on_item(&self, _examinee_id: &str, _session: &CatSession) {}

    fn on_exam_complete(&self, record: &ExamRecord) {
        let session = &record.session;
        let reason = match (&session.stopping_reason, record.bank_exhausted) {
            (Some(reason), _) => reason.to_string(),
            (None, true) => "bank_exhausted".to_string(),
            (None, false) => "-".to_string(),
        };
        eprintln!(
            "  Done: {} items {} theta {:.3} se {:.3} score {} [{}] ({}ms)",
            record.examinee_id,
            session.len(),
            session.theta,
            session.se,
            theta_to_scaled_score(session.theta),
            reason,
            record.duration_ms,
        );
    }

    fn on_exam_error(&self, examinee_id: &str, error: &str) {
        eprintln!("  ERROR: {examinee_id}: {error}");
    }

    fn on_batch_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {completed}/{total} succeeded, {failed} failed ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

pub async fn execute(args: SimulateArgs) -> Result<()> {
    let mut config = load_config_from(args.config.as_deref())?;

    if let Some(n) = args.examinees {
        config.simulation.examinees = n;
    }
    if let Some(p) = args.parallelism {
        config.simulation.parallelism = p;
    }
    if let Some(seed) = args.seed {
        config.simulation.seed = Some(seed);
    }
    if let Some(method) = &args.estimation {
        config.cat.estimation_method = method
            .parse::<EstimationMethod>()
            .map_err(|e| anyhow::anyhow!("{e}"))?;
    }
    if let Some(method) = &args.selection {
        config.cat.selection_method = method
            .parse::<SelectionMethod>()
            .map_err(|e| anyhow::anyhow!("{e}"))?;
    }
    let output = args
        .output
        .unwrap_or_else(|| config.simulation.output_dir.clone());

    anyhow::ensure!(
        config.simulation.parallelism >= 1,
        "parallelism must be at least 1"
    );
    anyhow::ensure!(
        config.simulation.examinees >= 1,
        "examinees must be at least 1"
    );

    let bank = parser::parse_item_bank(&args.bank)?;
    for w in parser::validate_item_bank(&bank) {
        let prefix = w
            .item_id
            .as_ref()
            .map(|id| format!("[{id}] "))
            .unwrap_or_default();
        eprintln!("Warning: {prefix}{}", w.message);
    }
    anyhow::ensure!(!bank.items.is_empty(), "item bank {} has no items", bank.id);

    let seed = config
        .simulation
        .seed
        .unwrap_or_else(|| chrono::Utc::now().timestamp_millis() as u64);
    let population = sample_population(
        config.simulation.examinees,
        config.simulation.theta_mean,
        config.simulation.theta_sd,
        seed,
    )?;

    eprintln!(
        "adaptest v{}: simulating {} examinees on {} ({} items), {} / {}",
        env!("CARGO_PKG_VERSION"),
        population.len(),
        bank.name,
        bank.items.len(),
        config.cat.estimation_method,
        config.cat.selection_method,
    );
    eprintln!();

    let engine = CatEngine::new(
        bank,
        config.cat.clone(),
        CatEngineConfig {
            parallelism: config.simulation.parallelism,
            seed: Some(seed),
        },
    )?;

    let engine = match &args.prior {
        Some(path) => {
            let prior = BatchReport::load_json(path)?;
            if prior.bank.id != engine.bank().id {
                eprintln!(
                    "Warning: prior report used bank {}, exposure only carries over for shared item IDs",
                    prior.bank.id
                );
            }
            eprintln!(
                "Exposure seeded from {} ({} sessions)",
                path.display(),
                prior.stats.sessions
            );
            engine.with_exposure(prior.exposure, prior.stats.sessions as u64)
        }
        None => engine,
    };

    let report = engine.run(&population, &ConsoleReporter).await?;

    print_summary(&report);

    std::fs::create_dir_all(&output)?;
    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");

    let formats: Vec<&str> = if args.format == "all" {
        vec!["json", "html"]
    } else {
        args.format.split(',').collect()
    };

    for fmt in &formats {
        match *fmt {
            "json" => {
                let path = output.join(format!("report-{timestamp}.json"));
                report.save_json(&path)?;
                eprintln!("Results saved to: {}", path.display());
            }
            "html" => {
                let path = output.join(format!("report-{timestamp}.html"));
                write_html_report(&report, &path)?;
                eprintln!("HTML report: {}", path.display());
            }
            _ => {
                eprintln!("Unknown format: {fmt}");
            }
        }
    }

    Ok(())
}

fn print_summary(report: &BatchReport) {
    use comfy_table::{Cell, Table};

    let stats = &report.stats;
    let fmt_opt = |v: Option<f64>| v.map(|x| format!("{x:.3}")).unwrap_or_else(|| "-".into());

    let mut table = Table::new();
    table.set_header(vec!["Metric", "Value"]);
    let rows = vec![
        ("Sessions", stats.sessions.to_string()),
        ("Mean items", format!("{:.1}", stats.mean_items)),
        (
            "Items (min / max)",
            format!("{} / {}", stats.min_items, stats.max_items),
        ),
        ("Stopped by SE", stats.stopped_by_se.to_string()),
        ("Stopped by max items", stats.stopped_by_max_items.to_string()),
        ("Bank exhausted", stats.bank_exhausted.to_string()),
        ("Mean SE", fmt_opt(stats.mean_se)),
        ("Mean theta", format!("{:.3}", stats.mean_theta)),
        ("Bias", fmt_opt(stats.bias)),
        ("RMSE", fmt_opt(stats.rmse)),
        ("Correlation", fmt_opt(stats.correlation)),
        ("Max exposure", format!("{:.1}%", stats.max_exposure * 100.0)),
        ("Overexposed items", stats.overexposed_items.to_string()),
    ];
    for (name, value) in rows {
        table.add_row(vec![Cell::new(name), Cell::new(value)]);
    }

    eprintln!("\n{table}");
}
