//! Central CAT engine.
//!
//! Drives examinees through adaptive sessions against one item bank, with
//! bounded parallelism and a shared exposure table that is folded forward
//! after every finished session.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{RwLock, Semaphore};
use uuid::Uuid;

use crate::exposure::{update_exposure_rates, ExposureTable};
use crate::model::{CatConfig, IrtParameters, ItemBank};
use crate::report::{BankSummary, BatchReport, ExamRecord};
use crate::selection::select_next_item_with_rng;
use crate::session::{CatSession, Response};
use crate::statistics::compute_batch_stats;
use crate::traits::Examinee;

/// Configuration for the engine itself, as opposed to the per-session
/// [`CatConfig`].
#[derive(Debug, Clone)]
pub struct CatEngineConfig {
    /// Maximum concurrent sessions.
    pub parallelism: usize,
    /// Base seed for selection randomness. Session `i` uses `seed + i`.
    pub seed: Option<u64>,
}

impl Default for CatEngineConfig {
    fn default() -> Self {
        Self {
            parallelism: 4,
            seed: None,
        }
    }
}

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_exam_start(&self, examinee_id: &str);
    fn on_item(&self, examinee_id: &str, session: &CatSession);
    fn on_exam_complete(&self, record: &ExamRecord);
    fn on_exam_error(&self, examinee_id: &str, error: &str);
    fn on_batch_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_exam_start(&self, _: &str) {}
    fn on_item(&self, _: &str, _: &CatSession) {}
    fn on_exam_complete(&self, _: &ExamRecord) {}
    fn on_exam_error(&self, _: &str, _: &str) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

/// The central CAT engine.
pub struct CatEngine {
    bank: Arc<ItemBank>,
    params: HashMap<String, IrtParameters>,
    cat_config: CatConfig,
    config: CatEngineConfig,
    exposure: Arc<RwLock<ExposureTable>>,
    sessions_completed: AtomicU64,
}

impl CatEngine {
    /// Create an engine. Fails if `cat_config` cannot drive a session or the
    /// bank repeats an item id.
    pub fn new(bank: ItemBank, cat_config: CatConfig, config: CatEngineConfig) -> Result<Self> {
        cat_config.validate()?;
        if config.parallelism == 0 {
            anyhow::bail!("parallelism must be at least 1");
        }
        let params = bank.params_map();
        if params.len() != bank.items.len() {
            let mut seen = HashSet::new();
            let duplicate = bank
                .items
                .iter()
                .find(|item| !seen.insert(item.id.as_str()))
                .map(|item| item.id.as_str())
                .unwrap_or_default();
            anyhow::bail!(
                "item bank {} has duplicate item ID: {duplicate}",
                bank.id
            );
        }
        Ok(Self {
            bank: Arc::new(bank),
            params,
            cat_config,
            config,
            exposure: Arc::new(RwLock::new(ExposureTable::new())),
            sessions_completed: AtomicU64::new(0),
        })
    }

    /// Start from an existing exposure table, e.g. one saved by a previous
    /// batch that ran `prior_sessions` sessions.
    ///
    /// Entries for items that are not in the bank are dropped.
    pub fn with_exposure(mut self, mut exposure: ExposureTable, prior_sessions: u64) -> Self {
        exposure.retain(|id, _| self.params.contains_key(id));
        self.exposure = Arc::new(RwLock::new(exposure));
        self.sessions_completed = AtomicU64::new(prior_sessions);
        self
    }

    pub fn bank(&self) -> &ItemBank {
        &self.bank
    }

    pub fn cat_config(&self) -> &CatConfig {
        &self.cat_config
    }

    /// Copy of the current exposure table.
    pub async fn exposure_snapshot(&self) -> ExposureTable {
        self.exposure.read().await.clone()
    }

    /// Sessions folded into the exposure table so far.
    pub fn sessions_completed(&self) -> u64 {
        self.sessions_completed.load(Ordering::Relaxed)
    }

    /// Run one examinee through a full adaptive session.
    ///
    /// The session ends on a stopping rule or when the bank has nothing left
    /// to offer. Either way the exposure table is updated before returning.
    pub async fn administer(
        &self,
        examinee: &dyn Examinee,
        rng: &mut StdRng,
        progress: &dyn ProgressReporter,
    ) -> Result<ExamRecord> {
        let start = Instant::now();
        progress.on_exam_start(examinee.id());

        let mut session = CatSession::new();
        let mut bank_exhausted = false;

        while !session.is_complete {
            let next = {
                let exposure = self.exposure.read().await;
                select_next_item_with_rng(
                    &session,
                    &self.bank.items,
                    &exposure,
                    &self.cat_config,
                    rng,
                )
                .cloned()
            };

            let Some(item) = next else {
                tracing::warn!(
                    examinee = examinee.id(),
                    items = session.len(),
                    "item bank exhausted before a stopping rule fired"
                );
                bank_exhausted = true;
                break;
            };

            let correct = examinee.respond(&item).await?;
            session = session.update(
                &Response::new(item.id.clone(), correct, item.area),
                &self.params,
                &self.cat_config,
            )?;
            progress.on_item(examinee.id(), &session);
        }

        let total = self.sessions_completed.fetch_add(1, Ordering::Relaxed) + 1;
        {
            let mut exposure = self.exposure.write().await;
            *exposure = update_exposure_rates(&exposure, &session, total);
        }

        tracing::info!(
            examinee = examinee.id(),
            items = session.len(),
            theta = session.theta,
            se = session.se,
            "session finished"
        );

        Ok(ExamRecord {
            examinee_id: examinee.id().to_string(),
            true_theta: examinee.true_theta(),
            session,
            bank_exhausted,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Run a batch of examinees and aggregate the outcome.
    ///
    /// Failed sessions are logged and reported to `progress` but do not fail
    /// the batch. Records come back in examinee order.
    pub async fn run(
        &self,
        examinees: &[Arc<dyn Examinee>],
        progress: &dyn ProgressReporter,
    ) -> Result<BatchReport> {
        let start = Instant::now();
        let run_id = Uuid::new_v4();
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism));

        let mut futures = FuturesUnordered::new();

        for (index, examinee) in examinees.iter().enumerate() {
            let examinee = Arc::clone(examinee);
            let semaphore = Arc::clone(&semaphore);
            let mut rng = match self.config.seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
                None => StdRng::from_entropy(),
            };

            futures.push(async move {
                let inner = async {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .map_err(|_| anyhow::anyhow!("semaphore closed"))?;
                    self.administer(examinee.as_ref(), &mut rng, progress).await
                };
                let result = inner.await;
                (index, examinee.id().to_string(), result)
            });
        }

        let mut records = Vec::new();
        let mut completed = 0usize;
        let mut failed = 0usize;
        let total = futures.len();

        while let Some((index, examinee_id, result)) = futures.next().await {
            match result {
                Ok(record) => {
                    progress.on_exam_complete(&record);
                    records.push((index, record));
                    completed += 1;
                }
                Err(e) => {
                    tracing::error!("session failed for {examinee_id}: {e:#}");
                    progress.on_exam_error(&examinee_id, &e.to_string());
                    failed += 1;
                }
            }
        }

        records.sort_by_key(|(index, _)| *index);
        let records: Vec<ExamRecord> = records.into_iter().map(|(_, r)| r).collect();

        let elapsed = start.elapsed();
        progress.on_batch_complete(total, completed, failed, elapsed);
        tracing::info!(
            total,
            completed,
            failed,
            elapsed_ms = elapsed.as_millis() as u64,
            "batch finished"
        );

        let exposure = self.exposure_snapshot().await;
        let stats = compute_batch_stats(&records, &exposure, self.cat_config.max_exposure_rate);

        Ok(BatchReport {
            id: run_id,
            created_at: chrono::Utc::now(),
            bank: BankSummary {
                id: self.bank.id.clone(),
                name: self.bank.name.clone(),
                item_count: self.bank.items.len(),
            },
            config: self.cat_config.clone(),
            records,
            stats,
            exposure,
            duration_ms: elapsed.as_millis() as u64,
        })
    }
}
