//! CAT session state machine.
//!
//! A session is a plain value. [`CatSession::update`] borrows the current
//! state and returns the next one, so every prior value stays valid as audit
//! history. States are `administering` and `complete(reason)`; `complete` is
//! terminal.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::CatError;
use crate::estimation::estimate_theta;
use crate::irt::standard_error;
use crate::model::{Area, CatConfig, IrtParameters};

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoppingReason {
    /// The standard error fell below the threshold after the minimum length.
    SeThreshold,
    /// The maximum test length was reached.
    MaxItems,
}

impl fmt::Display for StoppingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoppingReason::SeThreshold => write!(f, "se_threshold"),
            StoppingReason::MaxItems => write!(f, "max_items"),
        }
    }
}

/// Ability estimate recorded after an item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThetaPoint {
    /// 1-based position of the item in the session.
    pub item_num: usize,
    pub theta: f64,
    #[serde(with = "infinite_as_null")]
    pub se: f64,
}

/// One answered item as reported by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub item_id: String,
    pub correct: bool,
    pub area: Area,
}

impl Response {
    pub fn new(item_id: impl Into<String>, correct: bool, area: Area) -> Self {
        Self {
            item_id: item_id.into(),
            correct,
            area,
        }
    }
}

/// State of one examinee's adaptive test.
///
/// `items_administered`, `responses`, `item_areas` and `theta_history` always
/// have the same length, item ids never repeat, and `stopping_reason` is set
/// exactly when `is_complete` is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatSession {
    /// Current ability estimate.
    pub theta: f64,
    /// Standard error of `theta`; infinite before the first response.
    #[serde(with = "infinite_as_null")]
    pub se: f64,
    pub items_administered: Vec<String>,
    pub responses: Vec<bool>,
    pub item_areas: Vec<Area>,
    pub theta_history: Vec<ThetaPoint>,
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopping_reason: Option<StoppingReason>,
}

impl Default for CatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CatSession {
    /// A fresh session: `theta = 0`, `se = +inf`, nothing administered.
    pub fn new() -> Self {
        Self {
            theta: 0.0,
            se: f64::INFINITY,
            items_administered: Vec::new(),
            responses: Vec::new(),
            item_areas: Vec::new(),
            theta_history: Vec::new(),
            is_complete: false,
            stopping_reason: None,
        }
    }

    /// Number of items administered so far.
    pub fn len(&self) -> usize {
        self.items_administered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items_administered.is_empty()
    }

    pub fn correct_count(&self) -> usize {
        self.responses.iter().filter(|r| **r).count()
    }

    pub fn has_administered(&self, item_id: &str) -> bool {
        self.items_administered.iter().any(|id| id == item_id)
    }

    /// Record a response and return the next session state.
    ///
    /// Ability is re-estimated over the whole history every time. Every
    /// administered item, the new one included, must have an entry in
    /// `all_params`; a missing entry means the bank and the session have
    /// diverged and is returned as [`CatError::MissingItemParameters`].
    pub fn update(
        &self,
        response: &Response,
        all_params: &HashMap<String, IrtParameters>,
        config: &CatConfig,
    ) -> Result<CatSession, CatError> {
        if self.is_complete {
            return Err(CatError::SessionComplete);
        }
        if self.has_administered(&response.item_id) {
            return Err(CatError::DuplicateItem {
                item_id: response.item_id.clone(),
            });
        }

        let mut items_administered = self.items_administered.clone();
        items_administered.push(response.item_id.clone());
        let mut responses = self.responses.clone();
        responses.push(response.correct);
        let mut item_areas = self.item_areas.clone();
        item_areas.push(response.area);

        let params = items_administered
            .iter()
            .map(|id| {
                all_params
                    .get(id)
                    .copied()
                    .ok_or_else(|| CatError::MissingItemParameters {
                        item_id: id.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let theta = estimate_theta(config.estimation_method, &responses, &params);
        let se = standard_error(theta, &params);
        let n = items_administered.len();

        let mut theta_history = self.theta_history.clone();
        theta_history.push(ThetaPoint {
            item_num: n,
            theta,
            se,
        });

        let stopping_reason = check_stopping_rules(n, se, config);

        tracing::debug!(
            item = %response.item_id,
            correct = response.correct,
            n,
            theta,
            se,
            "session updated"
        );

        Ok(CatSession {
            theta,
            se,
            items_administered,
            responses,
            item_areas,
            theta_history,
            is_complete: stopping_reason.is_some(),
            stopping_reason,
        })
    }

    /// Check the structural invariants, returning a description of the first
    /// violation. Useful when loading sessions from external storage.
    pub fn check_invariants(&self) -> Result<(), String> {
        let n = self.items_administered.len();
        if self.responses.len() != n || self.item_areas.len() != n || self.theta_history.len() != n
        {
            return Err(format!(
                "length mismatch: {} items, {} responses, {} areas, {} history points",
                n,
                self.responses.len(),
                self.item_areas.len(),
                self.theta_history.len()
            ));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.items_administered.iter().find(|id| !seen.insert(*id)) {
            return Err(format!("item {dup} administered twice"));
        }
        if self.is_complete != self.stopping_reason.is_some() {
            return Err("is_complete and stopping_reason disagree".into());
        }
        Ok(())
    }

    /// Save the session as JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize session")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write session to {}", path.display()))?;
        Ok(())
    }

    /// Load a session from a JSON file, rejecting structurally broken ones.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read session from {}", path.display()))?;
        let session: CatSession =
            serde_json::from_str(&content).context("failed to parse session JSON")?;
        session
            .check_invariants()
            .map_err(|e| anyhow::anyhow!("invalid session in {}: {e}", path.display()))?;
        Ok(session)
    }
}

/// Evaluate the stopping rules for a session of `n` items.
///
/// The length ceiling wins over precision; the SE rule only applies once
/// `min_items` is reached.
pub fn check_stopping_rules(n: usize, se: f64, config: &CatConfig) -> Option<StoppingReason> {
    if n >= config.max_items {
        return Some(StoppingReason::MaxItems);
    }
    if n >= config.min_items && se < config.se_threshold {
        return Some(StoppingReason::SeThreshold);
    }
    None
}

/// JSON has no infinity; an infinite standard error is stored as `null`.
mod infinite_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params_map(items: &[(&str, f64, f64)]) -> HashMap<String, IrtParameters> {
        items
            .iter()
            .map(|(id, b, a)| (id.to_string(), IrtParameters::new(*b, *a)))
            .collect()
    }

    #[test]
    fn new_session_defaults() {
        let session = CatSession::new();
        assert_eq!(session.theta, 0.0);
        assert_eq!(session.se, f64::INFINITY);
        assert!(session.is_empty());
        assert!(session.theta_history.is_empty());
        assert!(!session.is_complete);
        assert!(session.stopping_reason.is_none());
    }

    #[test]
    fn correct_answer_raises_theta() {
        let session = CatSession::new();
        let params = params_map(&[("q1", 0.5, 1.0)]);
        let next = session
            .update(
                &Response::new("q1", true, Area::ClinicaMedica),
                &params,
                &CatConfig::default(),
            )
            .unwrap();

        assert_eq!(next.items_administered, vec!["q1"]);
        assert_eq!(next.responses, vec![true]);
        assert_eq!(next.item_areas, vec![Area::ClinicaMedica]);
        assert!(next.theta > session.theta);
        assert!(next.se.is_finite());
        // The prior value is untouched.
        assert!(session.is_empty());
    }

    #[test]
    fn incorrect_answer_lowers_theta() {
        let params = params_map(&[("q1", -0.5, 1.0)]);
        let next = CatSession::new()
            .update(
                &Response::new("q1", false, Area::Cirurgia),
                &params,
                &CatConfig::default(),
            )
            .unwrap();
        assert_eq!(next.responses, vec![false]);
        assert!(next.theta < 0.0);
    }

    #[test]
    fn history_numbers_items_from_one() {
        let params = params_map(&[("q1", 0.0, 1.0), ("q2", 0.0, 1.0), ("q3", 0.0, 1.0)]);
        let config = CatConfig::default();
        let mut session = CatSession::new();
        for id in ["q1", "q2", "q3"] {
            session = session
                .update(&Response::new(id, true, Area::Pediatria), &params, &config)
                .unwrap();
        }
        let nums: Vec<usize> = session.theta_history.iter().map(|p| p.item_num).collect();
        assert_eq!(nums, vec![1, 2, 3]);
        assert_eq!(session.theta_history[2].theta, session.theta);
    }

    #[test]
    fn missing_parameters_are_fatal() {
        let params = params_map(&[("q1", 0.0, 1.0)]);
        let config = CatConfig::default();
        let session = CatSession::new()
            .update(&Response::new("q1", true, Area::Pediatria), &params, &config)
            .unwrap();

        let err = session
            .update(&Response::new("q2", true, Area::Pediatria), &params, &config)
            .unwrap_err();
        assert_eq!(
            err,
            CatError::MissingItemParameters {
                item_id: "q2".into()
            }
        );

        // An earlier item vanishing from the map is caught too.
        let only_new = params_map(&[("q2", 0.0, 1.0)]);
        let err = session
            .update(&Response::new("q2", true, Area::Pediatria), &only_new, &config)
            .unwrap_err();
        assert!(err.is_desync());
    }

    #[test]
    fn duplicate_and_terminal_updates_rejected() {
        let params = params_map(&[("q1", 0.0, 1.0), ("q2", 0.0, 1.0)]);
        let config = CatConfig {
            min_items: 1,
            max_items: 1,
            ..CatConfig::default()
        };
        let open = CatSession::new();
        let done = open
            .update(&Response::new("q1", true, Area::Cirurgia), &params, &config)
            .unwrap();
        assert!(done.is_complete);
        assert_eq!(done.stopping_reason, Some(StoppingReason::MaxItems));
        assert_eq!(
            done.update(&Response::new("q2", true, Area::Cirurgia), &params, &config),
            Err(CatError::SessionComplete)
        );

        let relaxed = CatConfig::default();
        let once = open
            .update(&Response::new("q1", true, Area::Cirurgia), &params, &relaxed)
            .unwrap();
        assert!(matches!(
            once.update(&Response::new("q1", false, Area::Cirurgia), &params, &relaxed),
            Err(CatError::DuplicateItem { .. })
        ));
    }

    #[test]
    fn stopping_rules_priority() {
        let config = CatConfig {
            min_items: 30,
            max_items: 80,
            se_threshold: 0.3,
            ..CatConfig::default()
        };
        assert_eq!(check_stopping_rules(80, 1.0, &config), Some(StoppingReason::MaxItems));
        assert_eq!(check_stopping_rules(80, 0.1, &config), Some(StoppingReason::MaxItems));
        assert_eq!(check_stopping_rules(30, 0.29, &config), Some(StoppingReason::SeThreshold));
        assert_eq!(check_stopping_rules(29, 0.01, &config), None);
        assert_eq!(check_stopping_rules(40, 0.30, &config), None);
        assert_eq!(check_stopping_rules(0, f64::INFINITY, &config), None);
    }

    #[test]
    fn json_roundtrip_keeps_infinite_se() {
        let session = CatSession::new();
        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"se\":null"));
        let back: CatSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back.se, f64::INFINITY);
        assert_eq!(back, session);
    }

    #[test]
    fn save_and_load_preserve_every_field() {
        let params = params_map(&[("q1", 0.3, 1.1), ("q2", -0.7, 0.9)]);
        let config = CatConfig::default();
        let session = CatSession::new()
            .update(&Response::new("q1", true, Area::SaudeColetiva), &params, &config)
            .unwrap()
            .update(&Response::new("q2", false, Area::Cirurgia), &params, &config)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        session.save_json(&path).unwrap();
        let loaded = CatSession::load_json(&path).unwrap();
        assert_eq!(loaded, session);
        assert_eq!(loaded.theta.to_bits(), session.theta.to_bits());
    }

    #[test]
    fn load_rejects_mismatched_lists() {
        let broken = CatSession {
            items_administered: vec!["q1".into()],
            ..CatSession::new()
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, serde_json::to_string(&broken).unwrap()).unwrap();
        let err = CatSession::load_json(&path).unwrap_err();
        assert!(err.to_string().contains("length mismatch"));
    }
}
