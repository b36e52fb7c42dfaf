//! TOML item bank parser.
//!
//! Loads item banks from TOML files and directories, and validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{Area, IrtParameters, Item, ItemBank, DEFAULT_GUESSING};

/// Accepted difficulty range.
pub const DIFFICULTY_BOUNDS: (f64, f64) = (-4.0, 4.0);
/// Accepted discrimination range.
pub const DISCRIMINATION_BOUNDS: (f64, f64) = (0.3, 2.5);
/// Accepted guessing range.
pub const GUESSING_BOUNDS: (f64, f64) = (0.0, 0.5);

/// Intermediate TOML structure for parsing item bank files.
#[derive(Debug, Deserialize)]
struct TomlBankFile {
    bank: TomlBankHeader,
    #[serde(default)]
    items: Vec<TomlItem>,
}

#[derive(Debug, Deserialize)]
struct TomlBankHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TomlItem {
    id: String,
    area: String,
    difficulty: f64,
    discrimination: f64,
    #[serde(default)]
    guessing: Option<f64>,
}

/// Parse a single TOML file into an `ItemBank`.
pub fn parse_item_bank(path: &Path) -> Result<ItemBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read item bank file: {}", path.display()))?;

    parse_item_bank_str(&content, path)
}

/// Parse a TOML string into an `ItemBank`.
pub fn parse_item_bank_str(content: &str, source_path: &Path) -> Result<ItemBank> {
    let parsed: TomlBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let items = parsed
        .items
        .into_iter()
        .map(|item| {
            let area: Area = item
                .area
                .parse()
                .map_err(|e: String| anyhow::anyhow!("item {}: {}", item.id, e))?;
            let irt = IrtParameters::new(item.difficulty, item.discrimination)
                .with_guessing(item.guessing.unwrap_or(DEFAULT_GUESSING));
            Ok(Item::new(item.id, area, irt))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ItemBank {
        id: parsed.bank.id,
        name: parsed.bank.name,
        description: parsed.bank.description,
        items,
    })
}

/// Recursively load all `.toml` item bank files from a directory.
pub fn load_bank_directory(dir: &Path) -> Result<Vec<ItemBank>> {
    let mut banks = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            banks.extend(load_bank_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_item_bank(&path) {
                Ok(bank) => banks.push(bank),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(banks)
}

/// A warning from item bank validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The item ID (if applicable).
    pub item_id: Option<String>,
    /// Warning message.
    pub message: String,
}

fn out_of_bounds(value: f64, (lo, hi): (f64, f64)) -> bool {
    !(lo..=hi).contains(&value)
}

/// Validate an item bank for common issues.
pub fn validate_item_bank(bank: &ItemBank) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if bank.items.is_empty() {
        warnings.push(ValidationWarning {
            item_id: None,
            message: "bank has no items".into(),
        });
        return warnings;
    }

    let mut seen_ids = HashSet::new();
    for item in &bank.items {
        if !seen_ids.insert(&item.id) {
            warnings.push(ValidationWarning {
                item_id: Some(item.id.clone()),
                message: format!("duplicate item ID: {}", item.id),
            });
        }
    }

    for item in &bank.items {
        let IrtParameters {
            difficulty,
            discrimination,
            guessing,
        } = item.irt;
        let checks = [
            ("difficulty", difficulty, DIFFICULTY_BOUNDS),
            ("discrimination", discrimination, DISCRIMINATION_BOUNDS),
            ("guessing", guessing, GUESSING_BOUNDS),
        ];
        for (name, value, bounds) in checks {
            if out_of_bounds(value, bounds) {
                warnings.push(ValidationWarning {
                    item_id: Some(item.id.clone()),
                    message: format!(
                        "{name} {value} outside [{}, {}]",
                        bounds.0, bounds.1
                    ),
                });
            }
        }
    }

    for (area, count) in bank.area_counts() {
        if count == 0 {
            warnings.push(ValidationWarning {
                item_id: None,
                message: format!("no items in area {}", area.label()),
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID_TOML: &str = r#"
[bank]
id = "revalida-mini"
name = "Mini bank"
description = "One item per area"

[[items]]
id = "cm-001"
area = "clinica_medica"
difficulty = -0.5
discrimination = 1.2
guessing = 0.2

[[items]]
id = "ci-001"
area = "cirurgia"
difficulty = 0.3
discrimination = 0.9

[[items]]
id = "go-001"
area = "ginecologia_obstetricia"
difficulty = 1.1
discrimination = 1.6

[[items]]
id = "pe-001"
area = "pediatria"
difficulty = 0.0
discrimination = 1.0

[[items]]
id = "sc-001"
area = "saude_coletiva"
difficulty = -1.4
discrimination = 0.8
"#;

    #[test]
    fn parse_valid_toml() {
        let bank = parse_item_bank_str(VALID_TOML, &PathBuf::from("bank.toml")).unwrap();
        assert_eq!(bank.id, "revalida-mini");
        assert_eq!(bank.items.len(), 5);
        assert_eq!(bank.items[0].irt.guessing, 0.2);
        assert_eq!(bank.items[1].irt.guessing, DEFAULT_GUESSING);
        assert_eq!(bank.items[2].area, Area::GinecologiaObstetricia);
        assert!(validate_item_bank(&bank).is_empty());
    }

    #[test]
    fn parse_unknown_area_fails() {
        let toml = r#"
[bank]
id = "bad"
name = "Bad"

[[items]]
id = "x1"
area = "dermatologia"
difficulty = 0.0
discrimination = 1.0
"#;
        let err = parse_item_bank_str(toml, &PathBuf::from("bad.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("unknown area"));
    }

    #[test]
    fn parse_malformed_toml() {
        let bad = "this is not [valid toml }{";
        assert!(parse_item_bank_str(bad, &PathBuf::from("bad.toml")).is_err());
    }

    #[test]
    fn validate_flags_duplicates_bounds_and_empty_areas() {
        let toml = r#"
[bank]
id = "dupes"
name = "Dupes"

[[items]]
id = "same"
area = "cirurgia"
difficulty = 5.0
discrimination = 1.0

[[items]]
id = "same"
area = "cirurgia"
difficulty = 0.0
discrimination = 3.0
guessing = 0.6
"#;
        let bank = parse_item_bank_str(toml, &PathBuf::from("dupes.toml")).unwrap();
        let warnings = validate_item_bank(&bank);
        let has = |needle: &str| warnings.iter().any(|w| w.message.contains(needle));

        assert!(has("duplicate item ID"));
        assert!(has("difficulty 5"));
        assert!(has("discrimination 3"));
        assert!(has("guessing 0.6"));
        assert!(has("no items in area Pediatria"));
        assert!(!has("no items in area Cirurgia"));
    }

    #[test]
    fn validate_empty_bank() {
        let toml = "[bank]\nid = \"empty\"\nname = \"Empty\"\n";
        let bank = parse_item_bank_str(toml, &PathBuf::from("empty.toml")).unwrap();
        let warnings = validate_item_bank(&bank);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message, "bank has no items");
    }

    #[test]
    fn load_directory_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.toml"), VALID_TOML).unwrap();
        std::fs::write(dir.path().join("broken.toml"), "not toml [").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("again.toml"), VALID_TOML).unwrap();

        let banks = load_bank_directory(dir.path()).unwrap();
        assert_eq!(banks.len(), 2);
        assert!(banks.iter().all(|b| b.id == "revalida-mini"));
    }

    #[test]
    fn load_directory_rejects_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bank.toml");
        std::fs::write(&file, VALID_TOML).unwrap();
        assert!(load_bank_directory(&file).is_err());
    }
}
