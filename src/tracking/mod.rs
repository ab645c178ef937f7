//! Wellness tracking: parameter history, trend analysis, insights
//!
//! `ParameterStore` owns write-time validation of readings, `TrendAnalyzer`
//! turns reading windows into persisted trend snapshots and severity
//! escalations, and `InsightEngine` summarizes a user's recent history.

pub mod analyzer;
pub mod insights;
pub mod store;

pub use analyzer::{Escalation, TrendAnalyzer};
pub use insights::InsightEngine;
pub use store::ParameterStore;
