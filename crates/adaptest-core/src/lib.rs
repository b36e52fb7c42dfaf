//! adaptest-core: Computerized adaptive testing engine.
//!
//! This crate holds the 3PL item response model, the ability estimators, the
//! item selector, and the session state machine, plus the exposure and
//! reporting utilities built around them.

pub mod config;
pub mod engine;
pub mod error;
pub mod estimation;
pub mod exposure;
pub mod irt;
pub mod model;
pub mod parser;
pub mod report;
pub mod scoring;
pub mod selection;
pub mod session;
pub mod simulation;
pub mod statistics;
pub mod traits;
