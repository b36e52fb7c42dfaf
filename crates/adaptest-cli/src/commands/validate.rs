//! The `adaptest validate` command.

use std::path::PathBuf;

use anyhow::Result;

use adaptest_core::parser;
use adaptest_core::scoring::DifficultyLevel;

pub fn execute(bank_path: PathBuf) -> Result<()> {
    let banks = if bank_path.is_dir() {
        parser::load_bank_directory(&bank_path)?
    } else {
        vec![parser::parse_item_bank(&bank_path)?]
    };

    let mut total_warnings = 0;

    for bank in &banks {
        println!("Item bank: {} ({} items)", bank.name, bank.items.len());

        let counts = bank.area_counts();
        let breakdown: Vec<String> = counts
            .iter()
            .map(|(area, n)| format!("{}: {n}", area.label()))
            .collect();
        println!("  {}", breakdown.join(", "));

        let bands: Vec<String> = DifficultyLevel::ALL
            .iter()
            .map(|level| {
                let n = bank
                    .items
                    .iter()
                    .filter(|item| DifficultyLevel::from_difficulty(item.irt.difficulty) == *level)
                    .count();
                format!("{level}: {n}")
            })
            .collect();
        println!("  {}", bands.join(", "));

        let warnings = parser::validate_item_bank(bank);
        for w in &warnings {
            let prefix = w
                .item_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All item banks valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
