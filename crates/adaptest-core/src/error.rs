//! Engine error types.
//!
//! Numeric degeneracies are absorbed where they occur; only conditions that
//! leave a session in an inconsistent state surface here.

use thiserror::Error;

/// Errors raised by the session state machine and config validation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CatError {
    /// An administered item has no parameters in the supplied map. The item
    /// bank and the session are out of sync.
    #[error("IRT parameters not found for item {item_id}")]
    MissingItemParameters { item_id: String },

    /// The session already reached a stopping rule.
    #[error("session is complete, no further responses accepted")]
    SessionComplete,

    /// The item was already administered in this session.
    #[error("item {item_id} was already administered in this session")]
    DuplicateItem { item_id: String },

    /// The configuration cannot drive a session.
    #[error("invalid CAT config: {0}")]
    InvalidConfig(String),
}

impl CatError {
    /// Returns `true` if the error means the bank and session disagree.
    ///
    /// Such sessions should be discarded rather than retried.
    pub fn is_desync(&self) -> bool {
        matches!(self, CatError::MissingItemParameters { .. })
    }
}
