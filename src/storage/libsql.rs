//! LibSQL storage backend implementation
//!
//! Persists parameters, readings, trends, and alerts, and serves the
//! read-only follow/circle graph. Free-text fields (reading notes, alert
//! messages) pass through the injected [`FieldCipher`] at this boundary.

use crate::error::{AsclepiusError, Result};
use crate::social::CircleGraph;
use crate::storage::{FieldCipher, PlaintextCipher, StorageBackend};
use crate::types::{
    Alert, AlertContext, AlertId, AlertPriority, CircleKind, ParameterDefinition, ParameterId,
    Reading, ReadingId, Trend, TrendDirection, TrendId, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{params, Builder, Connection};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Database connection mode
#[derive(Debug, Clone)]
pub enum ConnectionMode {
    /// Local file-based database
    Local(String),
    /// In-memory database (for testing)
    InMemory,
}

/// LibSQL storage backend
///
/// One connection is opened at construction and shared by every
/// operation. libsql in-memory databases are per-connection, so a
/// fresh connection would see an empty database.
pub struct LibsqlStorage {
    conn: Connection,
    cipher: Arc<dyn FieldCipher>,
}

impl LibsqlStorage {
    /// Create a storage backend with the identity cipher
    pub async fn new(mode: ConnectionMode) -> Result<Self> {
        Self::with_cipher(mode, Arc::new(PlaintextCipher)).await
    }

    /// Create a storage backend with an injected field cipher
    ///
    /// The schema is created on first use; reopening an existing database
    /// is a no-op.
    pub async fn with_cipher(mode: ConnectionMode, cipher: Arc<dyn FieldCipher>) -> Result<Self> {
        info!("connecting to libSQL database: {:?}", mode);

        let db = match mode {
            ConnectionMode::Local(ref path) => {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent).map_err(|e| {
                            AsclepiusError::Database(format!(
                                "failed to create database directory {}: {}",
                                parent.display(),
                                e
                            ))
                        })?;
                    }
                }
                Builder::new_local(path).build().await.map_err(|e| {
                    AsclepiusError::Database(format!("failed to open local database: {}", e))
                })?
            }
            ConnectionMode::InMemory => {
                Builder::new_local(":memory:").build().await.map_err(|e| {
                    AsclepiusError::Database(format!("failed to create in-memory database: {}", e))
                })?
            }
        };

        let conn = db
            .connect()
            .map_err(|e| AsclepiusError::Database(format!("failed to open connection: {}", e)))?;

        let storage = Self { conn, cipher };
        storage.initialize_schema().await?;
        Ok(storage)
    }

    fn get_conn(&self) -> Result<Connection> {
        Ok(self.conn.clone())
    }

    async fn initialize_schema(&self) -> Result<()> {
        let conn = self.get_conn()?;

        let statements = [
            "CREATE TABLE IF NOT EXISTS parameters (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                name TEXT NOT NULL,
                unit TEXT,
                min_value REAL,
                max_value REAL,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_parameters_owner ON parameters(owner)",
            "CREATE TABLE IF NOT EXISTS readings (
                id TEXT PRIMARY KEY,
                parameter_id TEXT NOT NULL REFERENCES parameters(id),
                owner TEXT NOT NULL,
                value REAL NOT NULL,
                note TEXT,
                recorded_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_readings_parameter
                ON readings(parameter_id, recorded_at)",
            "CREATE TABLE IF NOT EXISTS trends (
                id TEXT PRIMARY KEY,
                parameter_id TEXT NOT NULL REFERENCES parameters(id),
                owner TEXT NOT NULL,
                direction TEXT NOT NULL,
                confidence REAL NOT NULL,
                percent_change REAL NOT NULL,
                window_len INTEGER NOT NULL,
                computed_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_trends_parameter
                ON trends(parameter_id, computed_at)",
            "CREATE TABLE IF NOT EXISTS alerts (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                context TEXT NOT NULL,
                message TEXT NOT NULL,
                priority TEXT NOT NULL,
                read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_alerts_owner ON alerts(owner, created_at)",
            "CREATE TABLE IF NOT EXISTS follows (
                follower TEXT NOT NULL,
                followed TEXT NOT NULL,
                PRIMARY KEY (follower, followed)
            )",
            "CREATE INDEX IF NOT EXISTS idx_follows_followed ON follows(followed)",
            "CREATE TABLE IF NOT EXISTS circle_members (
                owner TEXT NOT NULL,
                kind TEXT NOT NULL,
                member TEXT NOT NULL,
                PRIMARY KEY (owner, kind, member)
            )",
        ];

        for statement in statements {
            conn.execute(statement, params![]).await?;
        }

        debug!("schema initialized");
        Ok(())
    }

    fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| AsclepiusError::Other(format!("invalid timestamp: {}", e)))
    }

    fn parse_direction(raw: &str) -> Result<TrendDirection> {
        match raw {
            "increasing" => Ok(TrendDirection::Increasing),
            "decreasing" => Ok(TrendDirection::Decreasing),
            "stable" => Ok(TrendDirection::Stable),
            "volatile" => Ok(TrendDirection::Volatile),
            other => Err(AsclepiusError::Other(format!(
                "unknown trend direction: {}",
                other
            ))),
        }
    }

    fn parse_priority(raw: &str) -> Result<AlertPriority> {
        match raw {
            "low" => Ok(AlertPriority::Low),
            "medium" => Ok(AlertPriority::Medium),
            "high" => Ok(AlertPriority::High),
            "critical" => Ok(AlertPriority::Critical),
            other => Err(AsclepiusError::Other(format!(
                "unknown alert priority: {}",
                other
            ))),
        }
    }

    fn row_to_parameter(row: &libsql::Row) -> Result<ParameterDefinition> {
        let id_str: String = row.get(0)?;
        let owner_str: String = row.get(1)?;
        let name: String = row.get(2)?;
        let unit: Option<String> = row.get(3)?;
        let min_value: Option<f64> = row.get(4)?;
        let max_value: Option<f64> = row.get(5)?;
        let active: i64 = row.get(6)?;
        let created_at: String = row.get(7)?;

        Ok(ParameterDefinition {
            id: ParameterId::from_string(&id_str)?,
            owner: UserId::from_string(&owner_str)?,
            name,
            unit,
            min_value,
            max_value,
            active: active != 0,
            created_at: Self::parse_timestamp(&created_at)?,
        })
    }

    fn row_to_reading(&self, row: &libsql::Row) -> Result<Reading> {
        let id_str: String = row.get(0)?;
        let parameter_str: String = row.get(1)?;
        let owner_str: String = row.get(2)?;
        let value: f64 = row.get(3)?;
        let note: Option<String> = row.get(4)?;
        let recorded_at: String = row.get(5)?;

        Ok(Reading {
            id: ReadingId::from_string(&id_str)?,
            parameter_id: ParameterId::from_string(&parameter_str)?,
            owner: UserId::from_string(&owner_str)?,
            value,
            note: note.map(|n| self.cipher.decrypt(&n)),
            recorded_at: Self::parse_timestamp(&recorded_at)?,
        })
    }

    fn row_to_alert(&self, row: &libsql::Row) -> Result<Alert> {
        let id_str: String = row.get(0)?;
        let owner_str: String = row.get(1)?;
        let context_json: String = row.get(2)?;
        let context: AlertContext = serde_json::from_str(&context_json)?;
        let message: String = row.get(3)?;
        let priority_str: String = row.get(4)?;
        let read: i64 = row.get(5)?;
        let created_at: String = row.get(6)?;

        Ok(Alert {
            id: AlertId::from_string(&id_str)?,
            owner: UserId::from_string(&owner_str)?,
            context,
            message: self.cipher.decrypt(&message),
            priority: Self::parse_priority(&priority_str)?,
            read: read != 0,
            created_at: Self::parse_timestamp(&created_at)?,
        })
    }

    async fn collect_user_ids(mut rows: libsql::Rows) -> Result<HashSet<UserId>> {
        let mut ids = HashSet::new();
        while let Some(row) = rows.next().await? {
            let id_str: String = row.get(0)?;
            ids.insert(UserId::from_string(&id_str)?);
        }
        Ok(ids)
    }

    /// Record that `follower` follows `followed` (setup/CLI helper;
    /// graph mutation is otherwise outside the engine)
    pub async fn add_follow(&self, follower: UserId, followed: UserId) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO follows (follower, followed) VALUES (?, ?)",
            params![follower.to_string(), followed.to_string()],
        )
        .await?;
        Ok(())
    }

    /// Put `member` into one of `owner`'s circles (setup/CLI helper)
    pub async fn add_circle_member(
        &self,
        owner: UserId,
        kind: CircleKind,
        member: UserId,
    ) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO circle_members (owner, kind, member) VALUES (?, ?, ?)",
            params![owner.to_string(), kind.as_str(), member.to_string()],
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LibsqlStorage {
    async fn create_parameter(&self, parameter: &ParameterDefinition) -> Result<()> {
        debug!("creating parameter '{}' for {}", parameter.name, parameter.owner);
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO parameters (id, owner, name, unit, min_value, max_value, active, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                parameter.id.to_string(),
                parameter.owner.to_string(),
                parameter.name.clone(),
                parameter.unit.clone(),
                parameter.min_value,
                parameter.max_value,
                if parameter.active { 1i64 } else { 0i64 },
                parameter.created_at.to_rfc3339(),
            ],
        )
        .await?;
        Ok(())
    }

    async fn get_parameter(&self, id: ParameterId) -> Result<ParameterDefinition> {
        let conn = self.get_conn()?;
        let mut rows = conn
            .query(
                "SELECT id, owner, name, unit, min_value, max_value, active, created_at
                 FROM parameters WHERE id = ?",
                params![id.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Self::row_to_parameter(&row),
            None => Err(AsclepiusError::NotFound(format!("parameter {}", id))),
        }
    }

    async fn list_parameters(&self, owner: UserId) -> Result<Vec<ParameterDefinition>> {
        let conn = self.get_conn()?;
        let mut rows = conn
            .query(
                "SELECT id, owner, name, unit, min_value, max_value, active, created_at
                 FROM parameters WHERE owner = ? ORDER BY active DESC, created_at ASC",
                params![owner.to_string()],
            )
            .await?;

        let mut parameters = Vec::new();
        while let Some(row) = rows.next().await? {
            parameters.push(Self::row_to_parameter(&row)?);
        }
        Ok(parameters)
    }

    async fn deactivate_parameter(&self, owner: UserId, id: ParameterId) -> Result<()> {
        let conn = self.get_conn()?;
        let affected = conn
            .execute(
                "UPDATE parameters SET active = 0 WHERE id = ? AND owner = ?",
                params![id.to_string(), owner.to_string()],
            )
            .await?;
        if affected == 0 {
            return Err(AsclepiusError::NotFound(format!("parameter {}", id)));
        }
        Ok(())
    }

    async fn insert_reading(&self, reading: &Reading) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO readings (id, parameter_id, owner, value, note, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                reading.id.to_string(),
                reading.parameter_id.to_string(),
                reading.owner.to_string(),
                reading.value,
                reading.note.as_ref().map(|n| self.cipher.encrypt(n)),
                reading.recorded_at.to_rfc3339(),
            ],
        )
        .await?;
        Ok(())
    }

    async fn recent_readings(&self, parameter: ParameterId, limit: usize) -> Result<Vec<Reading>> {
        let conn = self.get_conn()?;
        let mut rows = conn
            .query(
                "SELECT id, parameter_id, owner, value, note, recorded_at
                 FROM readings WHERE parameter_id = ?
                 ORDER BY recorded_at DESC LIMIT ?",
                params![parameter.to_string(), limit as i64],
            )
            .await?;

        let mut readings = Vec::new();
        while let Some(row) = rows.next().await? {
            readings.push(self.row_to_reading(&row)?);
        }
        Ok(readings)
    }

    async fn readings_since(
        &self,
        parameter: ParameterId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Reading>> {
        let conn = self.get_conn()?;
        let mut rows = conn
            .query(
                "SELECT id, parameter_id, owner, value, note, recorded_at
                 FROM readings WHERE parameter_id = ? AND recorded_at >= ?
                 ORDER BY recorded_at DESC",
                params![parameter.to_string(), since.to_rfc3339()],
            )
            .await?;

        let mut readings = Vec::new();
        while let Some(row) = rows.next().await? {
            readings.push(self.row_to_reading(&row)?);
        }
        Ok(readings)
    }

    async fn insert_trend(&self, trend: &Trend) -> Result<()> {
        debug!(
            "persisting trend {} for parameter {} ({})",
            trend.id, trend.parameter_id, trend.direction
        );
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO trends (id, parameter_id, owner, direction, confidence,
                                 percent_change, window_len, computed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                trend.id.to_string(),
                trend.parameter_id.to_string(),
                trend.owner.to_string(),
                trend.direction.as_str(),
                trend.confidence,
                trend.percent_change,
                trend.window_len as i64,
                trend.computed_at.to_rfc3339(),
            ],
        )
        .await?;
        Ok(())
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<()> {
        debug!("persisting {} alert for {}", alert.priority, alert.owner);
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO alerts (id, owner, context, message, priority, read, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                alert.id.to_string(),
                alert.owner.to_string(),
                serde_json::to_string(&alert.context)?,
                self.cipher.encrypt(&alert.message),
                alert.priority.as_str(),
                if alert.read { 1i64 } else { 0i64 },
                alert.created_at.to_rfc3339(),
            ],
        )
        .await?;
        Ok(())
    }

    async fn alerts_page(
        &self,
        owner: UserId,
        page: usize,
        per_page: usize,
    ) -> Result<(Vec<Alert>, usize)> {
        let conn = self.get_conn()?;

        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM alerts WHERE owner = ?",
                params![owner.to_string()],
            )
            .await?;
        let total = match rows.next().await? {
            Some(row) => row.get::<i64>(0)? as usize,
            None => 0,
        };

        let offset = page.saturating_sub(1) * per_page;
        let mut rows = conn
            .query(
                "SELECT id, owner, context, message, priority, read, created_at
                 FROM alerts WHERE owner = ?
                 ORDER BY created_at DESC LIMIT ? OFFSET ?",
                params![owner.to_string(), per_page as i64, offset as i64],
            )
            .await?;

        let mut alerts = Vec::new();
        while let Some(row) = rows.next().await? {
            alerts.push(self.row_to_alert(&row)?);
        }
        Ok((alerts, total))
    }

    async fn unread_count(&self, owner: UserId) -> Result<usize> {
        let conn = self.get_conn()?;
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM alerts WHERE owner = ? AND read = 0",
                params![owner.to_string()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? as usize),
            None => Ok(0),
        }
    }

    async fn mark_alert_read(&self, owner: UserId, alert: AlertId) -> Result<bool> {
        let conn = self.get_conn()?;
        let affected = conn
            .execute(
                "UPDATE alerts SET read = 1 WHERE id = ? AND owner = ?",
                params![alert.to_string(), owner.to_string()],
            )
            .await?;
        Ok(affected > 0)
    }
}

#[async_trait]
impl CircleGraph for LibsqlStorage {
    async fn circle_members(&self, owner: UserId, kind: CircleKind) -> Result<HashSet<UserId>> {
        let conn = self.get_conn()?;
        let rows = conn
            .query(
                "SELECT member FROM circle_members WHERE owner = ? AND kind = ?",
                params![owner.to_string(), kind.as_str()],
            )
            .await?;
        Self::collect_user_ids(rows).await
    }

    async fn followers(&self, owner: UserId) -> Result<HashSet<UserId>> {
        let conn = self.get_conn()?;
        let rows = conn
            .query(
                "SELECT follower FROM follows WHERE followed = ?",
                params![owner.to_string()],
            )
            .await?;
        Self::collect_user_ids(rows).await
    }

    async fn is_following(&self, follower: UserId, followed: UserId) -> Result<bool> {
        let conn = self.get_conn()?;
        let mut rows = conn
            .query(
                "SELECT 1 FROM follows WHERE follower = ? AND followed = ? LIMIT 1",
                params![follower.to_string(), followed.to_string()],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }
}
