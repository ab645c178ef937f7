//! Append-only reading history with write-time validation

use crate::error::{AsclepiusError, Result};
use crate::storage::StorageBackend;
use crate::types::{ParameterDefinition, ParameterId, Reading, ReadingId, UserId};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::debug;

/// Per-user, per-parameter value history
///
/// Readings are validated against the parameter's declared range at write
/// time and never retroactively. Corrections are new readings; nothing is
/// ever rewritten.
pub struct ParameterStore {
    storage: Arc<dyn StorageBackend>,
}

impl ParameterStore {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Define a new tracked parameter for `owner`
    pub async fn define(
        &self,
        owner: UserId,
        name: &str,
        unit: Option<String>,
        min_value: Option<f64>,
        max_value: Option<f64>,
    ) -> Result<ParameterDefinition> {
        if name.trim().is_empty() {
            return Err(AsclepiusError::InvalidOperation(
                "parameter name cannot be empty".to_string(),
            ));
        }
        if let (Some(min), Some(max)) = (min_value, max_value) {
            if min > max {
                return Err(AsclepiusError::InvalidOperation(format!(
                    "declared range is inverted: [{}, {}]",
                    min, max
                )));
            }
        }

        let parameter = ParameterDefinition {
            id: ParameterId::new(),
            owner,
            name: name.trim().to_string(),
            unit,
            min_value,
            max_value,
            active: true,
            created_at: Utc::now(),
        };
        self.storage.create_parameter(&parameter).await?;
        debug!("defined parameter '{}' ({})", parameter.name, parameter.id);
        Ok(parameter)
    }

    /// Soft-deactivate a parameter; its history stays intact
    pub async fn deactivate(&self, owner: UserId, parameter: ParameterId) -> Result<()> {
        self.storage.deactivate_parameter(owner, parameter).await
    }

    /// Fetch a parameter and verify it belongs to `owner`
    pub async fn owned_parameter(
        &self,
        owner: UserId,
        parameter: ParameterId,
    ) -> Result<ParameterDefinition> {
        let definition = self.storage.get_parameter(parameter).await?;
        if definition.owner != owner {
            // Same answer as a missing parameter; ownership is not leaked
            return Err(AsclepiusError::NotFound(format!("parameter {}", parameter)));
        }
        Ok(definition)
    }

    /// Append a reading, enforcing the declared range
    ///
    /// Out-of-range values are rejected, never clamped. Inactive parameters
    /// reject new readings.
    pub async fn record(
        &self,
        owner: UserId,
        parameter: ParameterId,
        value: f64,
        note: Option<String>,
    ) -> Result<Reading> {
        let definition = self.owned_parameter(owner, parameter).await?;

        if !definition.active {
            return Err(AsclepiusError::InvalidOperation(format!(
                "parameter '{}' is deactivated",
                definition.name
            )));
        }
        if !definition.in_range(value) {
            return Err(AsclepiusError::OutOfRange {
                parameter: definition.name.clone(),
                value,
                min: definition.min_value.unwrap_or(f64::NEG_INFINITY),
                max: definition.max_value.unwrap_or(f64::INFINITY),
            });
        }

        let reading = Reading {
            id: ReadingId::new(),
            parameter_id: parameter,
            owner,
            value,
            note,
            recorded_at: Utc::now(),
        };
        self.storage.insert_reading(&reading).await?;
        debug!(
            "recorded {} = {} for {}",
            definition.name, value, owner
        );
        Ok(reading)
    }

    /// Readings of the last `window_days` days, newest first
    ///
    /// Display order. Callers feeding the statistics kernel must reverse
    /// into chronological order first.
    pub async fn history(
        &self,
        owner: UserId,
        parameter: ParameterId,
        window_days: i64,
    ) -> Result<Vec<Reading>> {
        self.owned_parameter(owner, parameter).await?;
        let since = Utc::now() - Duration::days(window_days);
        self.storage.readings_since(parameter, since).await
    }
}
