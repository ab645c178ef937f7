//! Engine configuration
//!
//! Thresholds and window sizes for trend analysis and alert routing.
//! Values can be loaded from a TOML file with `ASCLEPIUS_`-prefixed
//! environment overrides, or taken from defaults.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Tuning knobs for trend analysis and alert routing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Maximum readings pulled into one trend analysis window
    pub analysis_window: usize,

    /// Minimum readings required before a trend is produced
    pub min_readings: usize,

    /// Recent readings inspected for severity escalation
    pub escalation_window: usize,

    /// Absolute Pearson r above which a correlation is reported
    pub strong_correlation: f64,

    /// Maximum correlations surfaced per insights call
    pub max_correlations: usize,

    /// Mood/energy readings below this mark a low band
    pub low_band: f64,

    /// Anxiety/depression readings above this mark a high band
    pub high_band: f64,

    /// |percent change| above which a trend alert is high priority
    pub high_change_pct: f64,

    /// |percent change| above which a trend alert is medium priority
    pub medium_change_pct: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            analysis_window: 30,
            min_readings: 3,
            escalation_window: 7,
            strong_correlation: 0.7,
            max_correlations: 3,
            low_band: 3.0,
            high_band: 7.0,
            high_change_pct: 50.0,
            medium_change_pct: 30.0,
        }
    }
}

impl TrackingConfig {
    /// Load configuration from an optional TOML file, with environment
    /// overrides (`ASCLEPIUS_ANALYSIS_WINDOW=14` etc.) applied on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            debug!("loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("ASCLEPIUS").try_parsing(true))
            .build()?;

        // Missing keys fall back to defaults via #[serde(default)]
        let cfg: TrackingConfig = settings.try_deserialize()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_thresholds() {
        let cfg = TrackingConfig::default();
        assert_eq!(cfg.analysis_window, 30);
        assert_eq!(cfg.min_readings, 3);
        assert_eq!(cfg.escalation_window, 7);
        assert!((cfg.strong_correlation - 0.7).abs() < f64::EPSILON);
        assert_eq!(cfg.max_correlations, 3);
    }
}
