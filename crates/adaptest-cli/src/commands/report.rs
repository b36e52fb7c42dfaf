//! The `adaptest report` command.

use std::path::PathBuf;

use anyhow::Result;

use adaptest_core::report::{generate_report, BatchReport, ExamRecord};
use adaptest_core::scoring::{pass_probability, PASS_THRESHOLD};
use adaptest_report::html::write_html_report;

pub fn execute(input: PathBuf, examinee: Option<String>, html: Option<PathBuf>) -> Result<()> {
    let report = BatchReport::load_json(&input)?;

    let records: Vec<&ExamRecord> = match &examinee {
        Some(id) => match report.record(id) {
            Some(record) => vec![record],
            None => anyhow::bail!(
                "examinee '{id}' not found in {} ({} records)",
                input.display(),
                report.records.len()
            ),
        },
        None => report.records.iter().collect(),
    };

    println!(
        "Batch {} on {} ({} sessions)\n",
        report.id,
        report.bank.name,
        report.records.len()
    );

    for record in records {
        println!("Examinee: {}", record.examinee_id);
        if let Some(true_theta) = record.true_theta {
            println!("True Theta: {true_theta:.3}");
        }
        if record.bank_exhausted {
            println!("Bank exhausted before a stopping rule fired.");
        }
        println!(
            "Pass Probability (>= {PASS_THRESHOLD}): {:.1}%",
            pass_probability(record.session.theta, record.session.se) * 100.0
        );
        println!("{}\n", generate_report(&record.session, &report.config));
    }

    if let Some(path) = html {
        write_html_report(&report, &path)?;
        println!("HTML report: {}", path.display());
    }

    Ok(())
}
