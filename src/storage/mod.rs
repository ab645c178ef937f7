//! Storage layer for the Asclepius wellness engine
//!
//! Provides the persistence abstraction the engine is built against, plus
//! the libSQL implementation. The engine itself never touches SQL; it is
//! handed a [`StorageBackend`] (and a [`crate::social::CircleGraph`]) at
//! construction time.

pub mod libsql;

use crate::error::Result;
use crate::types::{
    Alert, AlertId, ParameterDefinition, ParameterId, Reading, Trend, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use self::libsql::{ConnectionMode, LibsqlStorage};

/// Storage backend trait defining all persistence operations the engine needs
///
/// Each mutating call is a single transaction: a partially written Reading,
/// Trend, or Alert is never observable. The engine performs no retries;
/// failures propagate to the caller.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Create a parameter definition
    async fn create_parameter(&self, parameter: &ParameterDefinition) -> Result<()>;

    /// Fetch a parameter definition by id
    async fn get_parameter(&self, id: ParameterId) -> Result<ParameterDefinition>;

    /// List a user's parameter definitions, active ones first
    async fn list_parameters(&self, owner: UserId) -> Result<Vec<ParameterDefinition>>;

    /// Soft-deactivate a parameter; history is kept
    async fn deactivate_parameter(&self, owner: UserId, id: ParameterId) -> Result<()>;

    /// Append a reading
    async fn insert_reading(&self, reading: &Reading) -> Result<()>;

    /// Most recent readings of a parameter, newest first, capped at `limit`
    async fn recent_readings(&self, parameter: ParameterId, limit: usize) -> Result<Vec<Reading>>;

    /// Readings of a parameter recorded at or after `since`, newest first
    async fn readings_since(
        &self,
        parameter: ParameterId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Reading>>;

    /// Persist a trend snapshot
    async fn insert_trend(&self, trend: &Trend) -> Result<()>;

    /// Persist an alert
    async fn insert_alert(&self, alert: &Alert) -> Result<()>;

    /// One page of a user's alerts, newest first, plus the total count
    async fn alerts_page(
        &self,
        owner: UserId,
        page: usize,
        per_page: usize,
    ) -> Result<(Vec<Alert>, usize)>;

    /// Number of unread alerts for a user
    async fn unread_count(&self, owner: UserId) -> Result<usize>;

    /// Flip an alert to read; false when the alert does not belong to `owner`
    async fn mark_alert_read(&self, owner: UserId, alert: AlertId) -> Result<bool>;
}

/// Cipher applied to free-text fields at the storage boundary
///
/// The engine operates on plaintext; notes and alert messages are encrypted
/// on the way into the store and decrypted on the way out. The web layer
/// injects its own implementation; [`PlaintextCipher`] is the default.
pub trait FieldCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> String;
    fn decrypt(&self, ciphertext: &str) -> String;
}

/// Identity cipher for tests and deployments that encrypt elsewhere
#[derive(Debug, Default)]
pub struct PlaintextCipher;

impl FieldCipher for PlaintextCipher {
    fn encrypt(&self, plaintext: &str) -> String {
        plaintext.to_string()
    }

    fn decrypt(&self, ciphertext: &str) -> String {
        ciphertext.to_string()
    }
}
