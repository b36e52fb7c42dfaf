//! Project configuration (`adaptest.toml`).

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::{Area, CatConfig, EstimationMethod, SelectionMethod};

/// Environment variable overriding `simulation.seed`.
pub const SEED_ENV_VAR: &str = "ADAPTEST_SEED";

/// Settings for simulated batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of simulated examinees.
    pub examinees: usize,
    /// Max concurrent sessions.
    pub parallelism: usize,
    /// Base seed; `None` draws from entropy.
    pub seed: Option<u64>,
    /// Mean of the generating ability distribution.
    pub theta_mean: f64,
    /// Standard deviation of the generating ability distribution.
    pub theta_sd: f64,
    /// Output directory for reports.
    pub output_dir: PathBuf,
}

fn default_examinees() -> usize {
    100
}
fn default_parallelism() -> usize {
    4
}
fn default_theta_sd() -> f64 {
    1.0
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./adaptest-results")
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            examinees: default_examinees(),
            parallelism: default_parallelism(),
            seed: None,
            theta_mean: 0.0,
            theta_sd: default_theta_sd(),
            output_dir: default_output_dir(),
        }
    }
}

/// Top-level adaptest configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdaptestConfig {
    pub cat: CatConfig,
    pub simulation: SimulationConfig,
}

/// Intermediate TOML structure; every field is optional and falls back to
/// the defaults.
#[derive(Debug, Default, Deserialize)]
struct TomlConfigFile {
    #[serde(default)]
    cat: TomlCatSection,
    #[serde(default)]
    simulation: TomlSimulationSection,
}

#[derive(Debug, Default, Deserialize)]
struct TomlCatSection {
    min_items: Option<usize>,
    max_items: Option<usize>,
    se_threshold: Option<f64>,
    content_balancing: Option<bool>,
    area_targets: Option<HashMap<String, f64>>,
    max_exposure_rate: Option<f64>,
    estimation_method: Option<String>,
    selection_method: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlSimulationSection {
    examinees: Option<usize>,
    parallelism: Option<usize>,
    seed: Option<u64>,
    theta_mean: Option<f64>,
    theta_sd: Option<f64>,
    output_dir: Option<PathBuf>,
}

/// Parse a config file's contents.
pub fn parse_config_str(content: &str, source_path: &Path) -> Result<AdaptestConfig> {
    let parsed: TomlConfigFile = toml::from_str(content)
        .with_context(|| format!("failed to parse config: {}", source_path.display()))?;

    let defaults = CatConfig::default();
    let cat = parsed.cat;

    let area_targets = match cat.area_targets {
        Some(raw) => raw
            .into_iter()
            .map(|(key, target)| {
                let area: Area = key.parse().map_err(|e: String| anyhow::anyhow!("{e}"))?;
                Ok((area, target))
            })
            .collect::<Result<BTreeMap<_, _>>>()?,
        None => defaults.area_targets,
    };

    let estimation_method = cat
        .estimation_method
        .map(|m| m.parse::<EstimationMethod>())
        .transpose()
        .map_err(|e| anyhow::anyhow!("{e}"))?
        .unwrap_or(defaults.estimation_method);

    let selection_method = cat
        .selection_method
        .map(|m| m.parse::<SelectionMethod>())
        .transpose()
        .map_err(|e| anyhow::anyhow!("{e}"))?
        .unwrap_or(defaults.selection_method);

    let cat_config = CatConfig {
        min_items: cat.min_items.unwrap_or(defaults.min_items),
        max_items: cat.max_items.unwrap_or(defaults.max_items),
        se_threshold: cat.se_threshold.unwrap_or(defaults.se_threshold),
        content_balancing: cat.content_balancing.unwrap_or(defaults.content_balancing),
        area_targets,
        max_exposure_rate: cat.max_exposure_rate.unwrap_or(defaults.max_exposure_rate),
        estimation_method,
        selection_method,
    };
    cat_config
        .validate()
        .with_context(|| format!("invalid [cat] table in {}", source_path.display()))?;

    let sim = parsed.simulation;
    let sim_defaults = SimulationConfig::default();
    let simulation = SimulationConfig {
        examinees: sim.examinees.unwrap_or(sim_defaults.examinees),
        parallelism: sim.parallelism.unwrap_or(sim_defaults.parallelism),
        seed: sim.seed.or(sim_defaults.seed),
        theta_mean: sim.theta_mean.unwrap_or(sim_defaults.theta_mean),
        theta_sd: sim.theta_sd.unwrap_or(sim_defaults.theta_sd),
        output_dir: sim.output_dir.unwrap_or(sim_defaults.output_dir),
    };

    Ok(AdaptestConfig {
        cat: cat_config,
        simulation,
    })
}

/// Load config from an explicit path, or search the well-known locations.
///
/// Search order without a path:
/// 1. `adaptest.toml` in the current directory
/// 2. `~/.config/adaptest/config.toml`
///
/// Environment variable override: `ADAPTEST_SEED`.
pub fn load_config_from(path: Option<&Path>) -> Result<AdaptestConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("adaptest.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|dir| dir.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config_str(&content, &path)?
        }
        None => AdaptestConfig::default(),
    };

    apply_seed_override(&mut config, std::env::var(SEED_ENV_VAR).ok().as_deref())?;

    Ok(config)
}

/// Apply an `ADAPTEST_SEED` value, if one is set.
pub fn apply_seed_override(config: &mut AdaptestConfig, value: Option<&str>) -> Result<()> {
    if let Some(raw) = value {
        let seed = raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{SEED_ENV_VAR} must be an unsigned integer, got {raw:?}"))?;
        config.simulation.seed = Some(seed);
    }
    Ok(())
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("adaptest"))
}
