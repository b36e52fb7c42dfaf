//! The `adaptest init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("adaptest.toml").exists() {
        println!("adaptest.toml already exists, skipping.");
    } else {
        std::fs::write("adaptest.toml", SAMPLE_CONFIG)?;
        println!("Created adaptest.toml");
    }

    std::fs::create_dir_all("banks")?;
    let example_path = std::path::Path::new("banks/example.toml");
    if example_path.exists() {
        println!("banks/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_BANK)?;
        println!("Created banks/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Tune the [cat] table in adaptest.toml");
    println!("  2. Run: adaptest validate --bank banks/example.toml");
    println!("  3. Run: adaptest simulate --bank banks/example.toml --examinees 20");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# adaptest configuration

[cat]
min_items = 10
max_items = 20
se_threshold = 0.30
content_balancing = true
max_exposure_rate = 0.25
estimation_method = "EAP"
selection_method = "MFI"

[cat.area_targets]
clinica_medica = 0.2
cirurgia = 0.2
ginecologia_obstetricia = 0.2
pediatria = 0.2
saude_coletiva = 0.2

[simulation]
examinees = 100
parallelism = 4
theta_mean = 0.0
theta_sd = 1.0
output_dir = "./adaptest-results"
"#;

const EXAMPLE_BANK: &str = r#"[bank]
id = "example"
name = "Example Item Bank"
description = "A small example bank to get started"

[[items]]
id = "cm-001"
area = "clinica_medica"
difficulty = -2.54
discrimination = 1.22
guessing = 0.2

[[items]]
id = "cm-002"
area = "clinica_medica"
difficulty = -0.99
discrimination = 1.52

[[items]]
id = "cm-003"
area = "clinica_medica"
difficulty = 0.66
discrimination = 0.79

[[items]]
id = "cm-004"
area = "clinica_medica"
difficulty = 2.38
discrimination = 0.91
guessing = 0.2

[[items]]
id = "cir-001"
area = "cirurgia"
difficulty = -2.56
discrimination = 0.77
guessing = 0.2

[[items]]
id = "cir-002"
area = "cirurgia"
difficulty = -1.03
discrimination = 0.9

[[items]]
id = "cir-003"
area = "cirurgia"
difficulty = 0.67
discrimination = 1.17

[[items]]
id = "cir-004"
area = "cirurgia"
difficulty = 2.31
discrimination = 1.84
guessing = 0.2

[[items]]
id = "go-001"
area = "ginecologia_obstetricia"
difficulty = -2.45
discrimination = 0.89
guessing = 0.2

[[items]]
id = "go-002"
area = "ginecologia_obstetricia"
difficulty = -0.93
discrimination = 1.15

[[items]]
id = "go-003"
area = "ginecologia_obstetricia"
difficulty = 0.78
discrimination = 0.86

[[items]]
id = "go-004"
area = "ginecologia_obstetricia"
difficulty = 2.64
discrimination = 1.99
guessing = 0.2

[[items]]
id = "ped-001"
area = "pediatria"
difficulty = -2.51
discrimination = 1.33
guessing = 0.2

[[items]]
id = "ped-002"
area = "pediatria"
difficulty = -1.0
discrimination = 0.83

[[items]]
id = "ped-003"
area = "pediatria"
difficulty = 0.77
discrimination = 1.04

[[items]]
id = "ped-004"
area = "pediatria"
difficulty = 2.63
discrimination = 0.91
guessing = 0.2

[[items]]
id = "sc-001"
area = "saude_coletiva"
difficulty = -2.69
discrimination = 1.94
guessing = 0.2

[[items]]
id = "sc-002"
area = "saude_coletiva"
difficulty = -0.82
discrimination = 0.89

[[items]]
id = "sc-003"
area = "saude_coletiva"
difficulty = 0.85
discrimination = 0.74

[[items]]
id = "sc-004"
area = "saude_coletiva"
difficulty = 2.51
discrimination = 1.97
guessing = 0.2
"#;
