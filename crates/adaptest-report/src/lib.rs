//! adaptest-report: Report generation for adaptest batch runs.

pub mod html;
