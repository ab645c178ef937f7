//! Insight reports over a user's recent history
//!
//! Summarizes each tracked parameter's window into concern, positive, or
//! observation entries and surfaces the strongest cross-parameter
//! correlations.

use crate::config::TrackingConfig;
use crate::error::{AsclepiusError, Result};
use crate::stats;
use crate::storage::StorageBackend;
use crate::types::{Insight, InsightKind, TrendDirection, UserId};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::debug;

/// Builds the per-user insights report
pub struct InsightEngine {
    storage: Arc<dyn StorageBackend>,
    config: TrackingConfig,
}

impl InsightEngine {
    pub fn new(storage: Arc<dyn StorageBackend>, config: TrackingConfig) -> Self {
        Self { storage, config }
    }

    /// Summarize all of a user's active parameters over the given window
    ///
    /// Parameters with fewer than the minimum readings are skipped
    /// silently. At most `max_correlations` strong correlations are
    /// appended after the per-parameter entries.
    pub async fn get_insights(&self, owner: UserId, window_days: i64) -> Result<Vec<Insight>> {
        let since = Utc::now() - Duration::days(window_days);
        let parameters = self.storage.list_parameters(owner).await?;

        let mut insights = Vec::new();
        let mut series: Vec<(String, Vec<f64>)> = Vec::new();

        for parameter in parameters.iter().filter(|p| p.active) {
            let mut readings = self.storage.readings_since(parameter.id, since).await?;
            if readings.len() < self.config.min_readings {
                continue;
            }
            readings.reverse();
            let values: Vec<f64> = readings.iter().map(|r| r.value).collect();

            let direction = stats::classify_trend(&values);
            let percent_change = match stats::percent_change(&values) {
                Ok(change) => change,
                Err(AsclepiusError::ZeroBaseline) => 0.0,
                Err(e) => return Err(e),
            };

            if let Some(insight) =
                parameter_insight(&parameter.name, direction, percent_change, window_days)
            {
                insights.push(insight);
            }
            series.push((parameter.name.clone(), values));
        }

        insights.extend(self.correlation_insights(&series));
        debug!("built {} insight(s) for {}", insights.len(), owner);
        Ok(insights)
    }

    /// Strongest pairwise correlations across the collected series
    ///
    /// Series are aligned index-to-index over their common tail; pairs
    /// shorter than the kernel's minimum are skipped. Only correlations
    /// past the strong threshold are reported, top ones first.
    fn correlation_insights(&self, series: &[(String, Vec<f64>)]) -> Vec<Insight> {
        let mut found: Vec<(f64, Insight)> = Vec::new();

        for i in 0..series.len() {
            for j in (i + 1)..series.len() {
                let (name_a, values_a) = &series[i];
                let (name_b, values_b) = &series[j];

                let common = values_a.len().min(values_b.len());
                let tail_a = &values_a[values_a.len() - common..];
                let tail_b = &values_b[values_b.len() - common..];

                let Some(r) = stats::correlate(tail_a, tail_b) else {
                    continue;
                };
                if r.abs() <= self.config.strong_correlation {
                    continue;
                }

                let message = if r > 0.0 {
                    format!(
                        "{} and {} tend to move together (r = {:.2}).",
                        name_a, name_b, r
                    )
                } else {
                    format!(
                        "{} and {} show an inverse relationship (r = {:.2}).",
                        name_a, name_b, r
                    )
                };
                found.push((
                    r.abs(),
                    Insight {
                        kind: InsightKind::Correlation,
                        parameter: None,
                        message,
                    },
                ));
            }
        }

        found.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        found
            .into_iter()
            .take(self.config.max_correlations)
            .map(|(_, insight)| insight)
            .collect()
    }
}

/// Classify one parameter's window into an insight entry, if noteworthy
fn parameter_insight(
    name: &str,
    direction: TrendDirection,
    percent_change: f64,
    window_days: i64,
) -> Option<Insight> {
    let lowered = name.to_lowercase();
    let wellbeing_low_is_bad = matches!(lowered.as_str(), "mood" | "energy" | "sleep_quality");
    let distress = matches!(lowered.as_str(), "anxiety" | "depression");

    let (kind, message) = match direction {
        TrendDirection::Decreasing if wellbeing_low_is_bad => (
            InsightKind::Concern,
            format!(
                "Your {} has been declining ({:+.1}% over the last {} days). It may be worth thinking about what changed.",
                name, percent_change, window_days
            ),
        ),
        TrendDirection::Increasing if distress => (
            InsightKind::Concern,
            format!(
                "Your {} has been rising ({:+.1}% over the last {} days). Consider what might be contributing.",
                name, percent_change, window_days
            ),
        ),
        TrendDirection::Increasing if wellbeing_low_is_bad => (
            InsightKind::Positive,
            format!(
                "Your {} has been improving ({:+.1}% over the last {} days). Keep it up!",
                name, percent_change, window_days
            ),
        ),
        TrendDirection::Decreasing if distress => (
            InsightKind::Positive,
            format!(
                "Your {} has been easing ({:+.1}% over the last {} days).",
                name, percent_change, window_days
            ),
        ),
        TrendDirection::Volatile => (
            InsightKind::Observation,
            format!(
                "Your {} has been fluctuating a lot over the last {} days.",
                name, window_days
            ),
        ),
        TrendDirection::Increasing | TrendDirection::Decreasing => (
            InsightKind::Observation,
            format!(
                "Your {} changed {:+.1}% over the last {} days.",
                name, percent_change, window_days
            ),
        ),
        TrendDirection::Stable => return None,
    };

    Some(Insight {
        kind,
        parameter: Some(name.to_string()),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declining_mood_is_a_concern() {
        let insight =
            parameter_insight("mood", TrendDirection::Decreasing, -40.0, 30).expect("insight");
        assert_eq!(insight.kind, InsightKind::Concern);
        assert_eq!(insight.parameter.as_deref(), Some("mood"));
    }

    #[test]
    fn rising_anxiety_is_a_concern_and_easing_is_positive() {
        let rising =
            parameter_insight("anxiety", TrendDirection::Increasing, 25.0, 14).expect("insight");
        assert_eq!(rising.kind, InsightKind::Concern);

        let easing =
            parameter_insight("anxiety", TrendDirection::Decreasing, -25.0, 14).expect("insight");
        assert_eq!(easing.kind, InsightKind::Positive);
    }

    #[test]
    fn stable_windows_produce_no_insight() {
        assert!(parameter_insight("mood", TrendDirection::Stable, 0.0, 30).is_none());
    }

    #[test]
    fn non_wellbeing_trends_are_observations() {
        let insight =
            parameter_insight("general_steps", TrendDirection::Increasing, 20.0, 30)
                .expect("insight");
        assert_eq!(insight.kind, InsightKind::Observation);
    }
}
