//! Trend analysis over reading windows
//!
//! Pulls a bounded chronological window from storage, runs the statistics
//! kernel, and persists one trend snapshot per invocation. Also derives the
//! severity escalations the alert router acts on.

use crate::config::TrackingConfig;
use crate::error::{AsclepiusError, Result};
use crate::stats;
use crate::storage::StorageBackend;
use crate::types::{
    AlertPriority, ParameterDefinition, ParameterId, Reading, Trend, TrendId, UserId,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// A severity escalation derived from the recent reading window
#[derive(Debug, Clone, PartialEq)]
pub struct Escalation {
    pub severity: AlertPriority,
    pub concerns: Vec<String>,
}

/// Computes and persists trend snapshots
///
/// Each `analyze` call is one pass: collect, compute, persist, classify.
/// Fewer than the minimum readings is a normal "no result", not an error,
/// and persists nothing.
pub struct TrendAnalyzer {
    storage: Arc<dyn StorageBackend>,
    config: TrackingConfig,
}

impl TrendAnalyzer {
    pub fn new(storage: Arc<dyn StorageBackend>, config: TrackingConfig) -> Self {
        Self { storage, config }
    }

    /// Analyze the most recent window of a parameter's readings
    ///
    /// Pulls up to `analysis_window` readings. Returns `Ok(None)` when fewer
    /// than `min_readings` exist; otherwise persists and returns a new
    /// trend snapshot. Prior trends are never merged or updated.
    pub async fn analyze(&self, owner: UserId, parameter: ParameterId) -> Result<Option<Trend>> {
        let definition = self.storage.get_parameter(parameter).await?;
        if definition.owner != owner {
            return Err(AsclepiusError::NotFound(format!("parameter {}", parameter)));
        }

        let mut readings = self
            .storage
            .recent_readings(parameter, self.config.analysis_window)
            .await?;
        if readings.len() < self.config.min_readings {
            debug!(
                "insufficient data for '{}': {} reading(s)",
                definition.name,
                readings.len()
            );
            return Ok(None);
        }

        // Storage returns newest first; the kernel needs chronological order
        readings.reverse();
        let values: Vec<f64> = readings.iter().map(|r| r.value).collect();

        let direction = stats::classify_trend(&values);
        let confidence = stats::confidence(&values);
        // A zero-valued first reading is treated as 0% change rather than
        // an error, for compatibility with the behavior users already see
        let percent_change = match stats::percent_change(&values) {
            Ok(change) => change,
            Err(AsclepiusError::ZeroBaseline) => 0.0,
            Err(e) => return Err(e),
        };

        let trend = Trend {
            id: TrendId::new(),
            parameter_id: parameter,
            owner,
            direction,
            confidence,
            percent_change,
            window_len: values.len(),
            computed_at: Utc::now(),
        };
        self.storage.insert_trend(&trend).await?;
        debug!(
            "trend for '{}': {} ({:+.1}%, confidence {:.0})",
            definition.name, direction, percent_change, confidence
        );
        Ok(Some(trend))
    }

    /// Check whether a newly recorded reading escalates against the recent
    /// window
    ///
    /// Fetches up to `escalation_window` readings prior to the new one;
    /// at least 3 priors are required or no check runs.
    pub async fn check_escalation(
        &self,
        definition: &ParameterDefinition,
        new_reading: &Reading,
    ) -> Result<Option<Escalation>> {
        let prior: Vec<f64> = self
            .storage
            .recent_readings(definition.id, self.config.escalation_window + 1)
            .await?
            .into_iter()
            .filter(|r| r.id != new_reading.id)
            .take(self.config.escalation_window)
            .map(|r| r.value)
            .collect();

        Ok(self.escalation(&definition.name, &prior, new_reading.value))
    }

    /// Escalation rule over the prior window plus the new value
    pub fn escalation(
        &self,
        parameter_name: &str,
        prior: &[f64],
        new_value: f64,
    ) -> Option<Escalation> {
        escalation(&self.config, parameter_name, prior, new_value)
    }
}

/// Pure escalation rule over the prior window plus the new value
///
/// Requires at least 3 prior readings. Mood/energy escalate when the
/// combined mean and the new value both sit below the low band;
/// anxiety/depression when both sit above the high band.
pub fn escalation(
    config: &TrackingConfig,
    parameter_name: &str,
    prior: &[f64],
    new_value: f64,
) -> Option<Escalation> {
    if prior.len() < 3 {
        return None;
    }

    let mut combined = prior.to_vec();
    combined.push(new_value);
    let mean = stats::mean(&combined);

    match parameter_name.to_lowercase().as_str() {
        name @ ("mood" | "energy") => {
            if mean < config.low_band && new_value < config.low_band {
                Some(Escalation {
                    severity: AlertPriority::High,
                    concerns: vec![format!("low {} alert", name)],
                })
            } else {
                None
            }
        }
        "anxiety" | "depression" => {
            if mean > config.high_band && new_value > config.high_band {
                Some(Escalation {
                    severity: AlertPriority::High,
                    concerns: vec!["high distress alert".to_string()],
                })
            } else {
                None
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ConnectionMode, LibsqlStorage};

    fn analyzer_with(storage: Arc<dyn StorageBackend>) -> TrendAnalyzer {
        TrendAnalyzer::new(storage, TrackingConfig::default())
    }

    async fn in_memory() -> Arc<LibsqlStorage> {
        Arc::new(
            LibsqlStorage::new(ConnectionMode::InMemory)
                .await
                .expect("in-memory storage"),
        )
    }

    #[tokio::test]
    async fn analyze_returns_none_below_minimum_window() {
        let storage = in_memory().await;
        let store = crate::tracking::ParameterStore::new(storage.clone());
        let owner = UserId::new();
        let parameter = store
            .define(owner, "sleep_quality", None, Some(1.0), Some(10.0))
            .await
            .unwrap();

        store.record(owner, parameter.id, 6.0, None).await.unwrap();
        store.record(owner, parameter.id, 7.0, None).await.unwrap();

        let analyzer = analyzer_with(storage);
        let trend = analyzer.analyze(owner, parameter.id).await.unwrap();
        assert!(trend.is_none());
    }

    #[tokio::test]
    async fn analyze_persists_a_trend_snapshot() {
        let storage = in_memory().await;
        let store = crate::tracking::ParameterStore::new(storage.clone());
        let owner = UserId::new();
        let parameter = store
            .define(owner, "steps", Some("steps".to_string()), None, None)
            .await
            .unwrap();

        for value in [1000.0, 2000.0, 3000.0, 4000.0] {
            store.record(owner, parameter.id, value, None).await.unwrap();
        }

        let analyzer = analyzer_with(storage);
        let trend = analyzer
            .analyze(owner, parameter.id)
            .await
            .unwrap()
            .expect("trend");
        assert_eq!(trend.direction, crate::types::TrendDirection::Increasing);
        assert_eq!(trend.window_len, 4);
        assert!((trend.percent_change - 300.0).abs() < 1e-9);
        assert!(trend.confidence > 99.0);
    }

    #[tokio::test]
    async fn analyze_treats_zero_baseline_as_zero_change() {
        let storage = in_memory().await;
        let store = crate::tracking::ParameterStore::new(storage.clone());
        let owner = UserId::new();
        let parameter = store.define(owner, "steps", None, None, None).await.unwrap();

        for value in [0.0, 500.0, 1000.0] {
            store.record(owner, parameter.id, value, None).await.unwrap();
        }

        let analyzer = analyzer_with(storage);
        let trend = analyzer
            .analyze(owner, parameter.id)
            .await
            .unwrap()
            .expect("trend");
        assert_eq!(trend.percent_change, 0.0);
    }

    #[tokio::test]
    async fn analyze_rejects_foreign_parameters() {
        let storage = in_memory().await;
        let store = crate::tracking::ParameterStore::new(storage.clone());
        let owner = UserId::new();
        let stranger = UserId::new();
        let parameter = store.define(owner, "mood", None, None, None).await.unwrap();

        let analyzer = analyzer_with(storage);
        let err = analyzer.analyze(stranger, parameter.id).await.unwrap_err();
        assert!(matches!(err, AsclepiusError::NotFound(_)));
    }

    #[test]
    fn low_mood_escalates_high() {
        let config = TrackingConfig::default();
        let prior = vec![2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0];
        let result = escalation(&config, "mood", &prior, 1.5).expect("escalation");
        assert_eq!(result.severity, AlertPriority::High);
        assert_eq!(result.concerns, vec!["low mood alert".to_string()]);
    }

    #[test]
    fn high_anxiety_escalates_high() {
        let config = TrackingConfig::default();
        let prior = vec![8.0, 9.0, 8.5, 8.0];
        let result = escalation(&config, "anxiety", &prior, 9.0).expect("escalation");
        assert_eq!(result.severity, AlertPriority::High);
        assert_eq!(result.concerns, vec!["high distress alert".to_string()]);
    }

    #[test]
    fn escalation_requires_three_prior_readings() {
        let config = TrackingConfig::default();
        assert!(escalation(&config, "mood", &[1.0, 1.0], 1.0).is_none());
    }

    #[test]
    fn borderline_new_value_does_not_escalate() {
        let config = TrackingConfig::default();
        // Window mean is low but the new value sits at the band
        assert!(escalation(&config, "mood", &[2.0, 2.0, 2.0], 3.0).is_none());
        // New value is low but the combined mean is not
        assert!(escalation(&config, "energy", &[8.0, 8.0, 8.0], 2.0).is_none());
    }

    #[test]
    fn non_sensitive_parameters_never_escalate() {
        let config = TrackingConfig::default();
        assert!(escalation(&config, "general_steps", &[1.0, 1.0, 1.0], 1.0).is_none());
    }
}
