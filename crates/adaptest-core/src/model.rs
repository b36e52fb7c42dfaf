//! Core data model types for adaptest.
//!
//! Items, item banks, and the CAT configuration that every engine call reads.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CatError;

/// Guessing parameter assumed for four-option items.
pub const DEFAULT_GUESSING: f64 = 0.25;

/// The five fixed content areas of the exam blueprint.
///
/// Declaration order is the iteration order used for reports and the
/// tie-break order used by content balancing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Area {
    ClinicaMedica,
    Cirurgia,
    GinecologiaObstetricia,
    Pediatria,
    SaudeColetiva,
}

impl Area {
    /// All areas in blueprint order.
    pub const ALL: [Area; 5] = [
        Area::ClinicaMedica,
        Area::Cirurgia,
        Area::GinecologiaObstetricia,
        Area::Pediatria,
        Area::SaudeColetiva,
    ];

    /// Localized display label.
    pub fn label(&self) -> &'static str {
        match self {
            Area::ClinicaMedica => "Clínica Médica",
            Area::Cirurgia => "Cirurgia",
            Area::GinecologiaObstetricia => "Ginecologia e Obstetrícia",
            Area::Pediatria => "Pediatria",
            Area::SaudeColetiva => "Saúde Coletiva",
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self {
            Area::ClinicaMedica => "clinica_medica",
            Area::Cirurgia => "cirurgia",
            Area::GinecologiaObstetricia => "ginecologia_obstetricia",
            Area::Pediatria => "pediatria",
            Area::SaudeColetiva => "saude_coletiva",
        };
        write!(f, "{key}")
    }
}

impl FromStr for Area {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "clinica_medica" => Ok(Area::ClinicaMedica),
            "cirurgia" => Ok(Area::Cirurgia),
            "ginecologia_obstetricia" | "go" => Ok(Area::GinecologiaObstetricia),
            "pediatria" => Ok(Area::Pediatria),
            "saude_coletiva" => Ok(Area::SaudeColetiva),
            other => Err(format!("unknown area: {other}")),
        }
    }
}

/// 3PL item parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrtParameters {
    /// Location on the ability scale (`b`).
    pub difficulty: f64,
    /// Slope at the inflection point (`a`).
    pub discrimination: f64,
    /// Lower asymptote (`c`).
    #[serde(default = "default_guessing")]
    pub guessing: f64,
}

fn default_guessing() -> f64 {
    DEFAULT_GUESSING
}

impl IrtParameters {
    /// Parameters with the default guessing value.
    pub fn new(difficulty: f64, discrimination: f64) -> Self {
        Self {
            difficulty,
            discrimination,
            guessing: DEFAULT_GUESSING,
        }
    }

    pub fn with_guessing(mut self, guessing: f64) -> Self {
        self.guessing = guessing;
        self
    }
}

/// A calibrated item from the bank. The engine only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique item identifier.
    pub id: String,
    /// Calibrated 3PL parameters.
    pub irt: IrtParameters,
    /// Content area the item belongs to.
    pub area: Area,
}

impl Item {
    pub fn new(id: impl Into<String>, area: Area, irt: IrtParameters) -> Self {
        Self {
            id: id.into(),
            irt,
            area,
        }
    }
}

/// A collection of calibrated items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemBank {
    /// Unique identifier for this bank.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Description of this bank.
    #[serde(default)]
    pub description: String,
    /// The items in this bank.
    #[serde(default)]
    pub items: Vec<Item>,
}

impl ItemBank {
    /// Look up an item by id.
    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Parameter map keyed by item id, as consumed by [`CatSession::update`].
    ///
    /// [`CatSession::update`]: crate::session::CatSession::update
    pub fn params_map(&self) -> HashMap<String, IrtParameters> {
        self.items
            .iter()
            .map(|item| (item.id.clone(), item.irt))
            .collect()
    }

    /// Number of items per area, all areas present.
    pub fn area_counts(&self) -> BTreeMap<Area, usize> {
        let mut counts: BTreeMap<Area, usize> = Area::ALL.iter().map(|a| (*a, 0)).collect();
        for item in &self.items {
            *counts.entry(item.area).or_default() += 1;
        }
        counts
    }
}

/// How ability is estimated after each response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EstimationMethod {
    /// Expected a posteriori over a fixed quadrature grid.
    #[serde(rename = "EAP")]
    Eap,
    /// Maximum likelihood via Newton-Raphson.
    #[serde(rename = "MLE")]
    Mle,
    /// Accepted for compatibility; computed exactly like EAP.
    #[serde(rename = "MAP")]
    Map,
}

impl fmt::Display for EstimationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimationMethod::Eap => write!(f, "EAP"),
            EstimationMethod::Mle => write!(f, "MLE"),
            EstimationMethod::Map => write!(f, "MAP"),
        }
    }
}

impl FromStr for EstimationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "EAP" => Ok(EstimationMethod::Eap),
            "MLE" => Ok(EstimationMethod::Mle),
            "MAP" => Ok(EstimationMethod::Map),
            other => Err(format!("unknown estimation method: {other}")),
        }
    }
}

/// How the next item is chosen among the eligible candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectionMethod {
    #[serde(rename = "MFI")]
    MaxFisherInformation,
    #[serde(rename = "KL")]
    KullbackLeibler,
    #[serde(rename = "RANDOM")]
    Random,
}

impl fmt::Display for SelectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionMethod::MaxFisherInformation => write!(f, "MFI"),
            SelectionMethod::KullbackLeibler => write!(f, "KL"),
            SelectionMethod::Random => write!(f, "RANDOM"),
        }
    }
}

impl FromStr for SelectionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MFI" | "MAX_FISHER_INFORMATION" | "MAXFISHERINFORMATION" => {
                Ok(SelectionMethod::MaxFisherInformation)
            }
            "KL" | "KULLBACK_LEIBLER" | "KULLBACKLEIBLER" => Ok(SelectionMethod::KullbackLeibler),
            "RANDOM" => Ok(SelectionMethod::Random),
            other => Err(format!("unknown selection method: {other}")),
        }
    }
}

/// Configuration for a CAT session. Never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatConfig {
    /// Floor below which the SE stop is not honored.
    pub min_items: usize,
    /// Hard ceiling on test length.
    pub max_items: usize,
    /// Target standard error for an early stop.
    pub se_threshold: f64,
    /// Whether selection follows the area targets.
    pub content_balancing: bool,
    /// Target proportion per area, expected to sum to 1.0.
    pub area_targets: BTreeMap<Area, f64>,
    /// Exposure rate at or above which an item is held back.
    pub max_exposure_rate: f64,
    pub estimation_method: EstimationMethod,
    pub selection_method: SelectionMethod,
}

impl Default for CatConfig {
    fn default() -> Self {
        Self {
            min_items: 30,
            max_items: 80,
            se_threshold: 0.30,
            content_balancing: true,
            area_targets: uniform_area_targets(),
            max_exposure_rate: 0.25,
            estimation_method: EstimationMethod::Eap,
            selection_method: SelectionMethod::MaxFisherInformation,
        }
    }
}

/// Equal share for every area.
pub fn uniform_area_targets() -> BTreeMap<Area, f64> {
    Area::ALL
        .iter()
        .map(|area| (*area, 1.0 / Area::ALL.len() as f64))
        .collect()
}

impl CatConfig {
    /// Check that the config can drive a session.
    ///
    /// Target proportions that do not sum to 1.0 only produce a warning; the
    /// selector still works with them.
    pub fn validate(&self) -> Result<(), CatError> {
        if self.max_items == 0 {
            return Err(CatError::InvalidConfig("max_items must be at least 1".into()));
        }
        if self.min_items > self.max_items {
            return Err(CatError::InvalidConfig(format!(
                "min_items ({}) exceeds max_items ({})",
                self.min_items, self.max_items
            )));
        }
        if self.se_threshold.is_nan() || self.se_threshold <= 0.0 {
            return Err(CatError::InvalidConfig(
                "se_threshold must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_exposure_rate) {
            return Err(CatError::InvalidConfig(format!(
                "max_exposure_rate must be within [0, 1], got {}",
                self.max_exposure_rate
            )));
        }
        if let Some((area, target)) = self.area_targets.iter().find(|(_, t)| **t < 0.0) {
            return Err(CatError::InvalidConfig(format!(
                "area target for {area} is negative ({target})"
            )));
        }

        let sum: f64 = self.area_targets.values().sum();
        if self.content_balancing && (sum - 1.0).abs() > 1e-6 {
            tracing::warn!("area targets sum to {sum:.3}, expected 1.0");
        }

        Ok(())
    }
}
