//! Examinees for simulation and testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::irt::probability;
use crate::model::Item;
use crate::traits::Examinee;

/// An examinee whose answers follow the 3PL model at a fixed ability.
pub struct SimulatedExaminee {
    id: String,
    theta: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedExaminee {
    /// Create an examinee with its own seeded random stream.
    pub fn new(id: impl Into<String>, theta: f64, seed: u64) -> Self {
        Self {
            id: id.into(),
            theta,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }
}

#[async_trait]
impl Examinee for SimulatedExaminee {
    fn id(&self) -> &str {
        &self.id
    }

    async fn respond(&self, item: &Item) -> Result<bool> {
        let p = probability(self.theta, &item.irt);
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| anyhow::anyhow!("examinee {} random source poisoned", self.id))?;
        Ok(rng.gen::<f64>() < p)
    }

    fn true_theta(&self) -> Option<f64> {
        Some(self.theta)
    }
}

/// An examinee with fixed answers per item, for tests.
///
/// Items without a scripted answer get the default answer.
pub struct ScriptedExaminee {
    id: String,
    answers: HashMap<String, bool>,
    default_answer: bool,
    call_count: AtomicU32,
}

impl ScriptedExaminee {
    /// Create an examinee with per-item answers.
    pub fn new(id: impl Into<String>, answers: HashMap<String, bool>, default_answer: bool) -> Self {
        Self {
            id: id.into(),
            answers,
            default_answer,
            call_count: AtomicU32::new(0),
        }
    }

    /// An examinee that answers every item the same way.
    pub fn always(id: impl Into<String>, correct: bool) -> Self {
        Self::new(id, HashMap::new(), correct)
    }

    /// Number of items answered so far.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Examinee for ScriptedExaminee {
    fn id(&self) -> &str {
        &self.id
    }

    async fn respond(&self, item: &Item) -> Result<bool> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .answers
            .get(&item.id)
            .copied()
            .unwrap_or(self.default_answer))
    }
}

/// Draw `n` simulated examinees with abilities from `N(mean, sd)`.
///
/// Abilities are clamped to the estimation range. Each examinee gets a seed
/// derived from `seed` so a population is reproducible end to end.
pub fn sample_population(
    n: usize,
    mean: f64,
    sd: f64,
    seed: u64,
) -> Result<Vec<Arc<dyn Examinee>>> {
    let normal = Normal::new(mean, sd)
        .map_err(|e| anyhow::anyhow!("invalid ability distribution N({mean}, {sd}): {e}"))?;
    let mut rng = StdRng::seed_from_u64(seed);

    let population = (0..n)
        .map(|i| {
            let theta = normal
                .sample(&mut rng)
                .clamp(crate::irt::THETA_MIN, crate::irt::THETA_MAX);
            let examinee_seed = rng.gen::<u64>();
            Arc::new(SimulatedExaminee::new(
                format!("sim-{:04}", i + 1),
                theta,
                examinee_seed,
            )) as Arc<dyn Examinee>
        })
        .collect();

    Ok(population)
}
