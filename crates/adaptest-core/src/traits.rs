//! Core trait for anything that answers items.
//!
//! Implemented by the simulated and scripted examinees in
//! [`crate::simulation`]; a live delivery front end would implement it too.

use async_trait::async_trait;

use crate::model::Item;

/// Something that can sit an adaptive test.
#[async_trait]
pub trait Examinee: Send + Sync {
    /// Stable identifier used in reports.
    fn id(&self) -> &str;

    /// Answer an item, returning whether the answer was correct.
    async fn respond(&self, item: &Item) -> anyhow::Result<bool>;

    /// The generating ability, when known.
    fn true_theta(&self) -> Option<f64> {
        None
    }
}
