//! Core data types for the Asclepius wellness engine
//!
//! This module defines the fundamental data structures used throughout the
//! engine: tracked parameters, readings, derived trends, circle membership,
//! and alert records. These types form the boundary between the engine and
//! the web/routing layer that consumes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Parameter names whose alerts are restricted to close circles
/// rather than all followers.
pub const SENSITIVE_PARAMETERS: &[&str] = &["mood", "anxiety", "depression"];

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random id
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse an id from a string
            pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id! {
    /// Unique identifier for users
    ///
    /// Wraps a UUID to provide type safety and prevent mixing user ids with
    /// other UUID-based identifiers in the system.
    UserId
}

entity_id! {
    /// Unique identifier for tracked parameters
    ParameterId
}

entity_id! {
    /// Unique identifier for readings
    ReadingId
}

entity_id! {
    /// Unique identifier for trend snapshots
    TrendId
}

entity_id! {
    /// Unique identifier for alerts
    AlertId
}

/// A tracked quantity owned by one user
///
/// Parameters are created at onboarding or first use and soft-deactivated
/// rather than deleted while reading history exists. Specific names
/// (mood, anxiety, depression) mark the parameter as sensitive and restrict
/// alert fan-out to close circles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub id: ParameterId,
    pub owner: UserId,
    /// Free-form name; lowercased membership in the sensitive set
    /// changes alert routing
    pub name: String,
    /// Optional display unit (e.g. "hours", "steps")
    pub unit: Option<String>,
    /// Optional inclusive lower bound enforced at write time
    pub min_value: Option<f64>,
    /// Optional inclusive upper bound enforced at write time
    pub max_value: Option<f64>,
    /// Soft-deactivation flag; inactive parameters reject new readings
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl ParameterDefinition {
    /// Whether alerts for this parameter are restricted to close circles
    pub fn is_sensitive(&self) -> bool {
        is_sensitive_name(&self.name)
    }

    /// Check a candidate value against the declared bounds, if any
    pub fn in_range(&self, value: f64) -> bool {
        if let Some(min) = self.min_value {
            if value < min {
                return false;
            }
        }
        if let Some(max) = self.max_value {
            if value > max {
                return false;
            }
        }
        true
    }
}

/// Whether a parameter name belongs to the sensitive set
pub fn is_sensitive_name(name: &str) -> bool {
    let lowered = name.to_lowercase();
    SENSITIVE_PARAMETERS.contains(&lowered.as_str())
}

/// One timestamped numeric observation of a parameter
///
/// Immutable once written; corrections are new readings. Multiple readings
/// per day are permitted at this layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub id: ReadingId,
    pub parameter_id: ParameterId,
    pub owner: UserId,
    pub value: f64,
    /// Optional free-text note; encrypted at rest by the storage layer
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Direction classification of a reading window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
    Volatile,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::Stable => "stable",
            TrendDirection::Volatile => "volatile",
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A derived, point-in-time snapshot of a reading window
///
/// Created each time the analyzer runs; never mutated. Historical trends are
/// kept for audit and never deduplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trend {
    pub id: TrendId,
    pub parameter_id: ParameterId,
    pub owner: UserId,
    pub direction: TrendDirection,
    /// Goodness of the linear fit, 0-100
    pub confidence: f64,
    /// Change from the first to the last value of the window, in percent
    pub percent_change: f64,
    /// Number of readings the snapshot was computed over
    pub window_len: usize,
    pub computed_at: DateTime<Utc>,
}

/// Circle kinds partitioning an owner's contacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircleKind {
    Family,
    CloseFriends,
    General,
}

impl CircleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircleKind::Family => "family",
            CircleKind::CloseFriends => "close_friends",
            CircleKind::General => "general",
        }
    }
}

impl std::str::FromStr for CircleKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "family" => Ok(CircleKind::Family),
            "close_friends" => Ok(CircleKind::CloseFriends),
            "general" => Ok(CircleKind::General),
            other => Err(format!("unknown circle kind: {}", other)),
        }
    }
}

impl std::fmt::Display for CircleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert urgency, also governing self-alert message tone
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertPriority::Low => "low",
            AlertPriority::Medium => "medium",
            AlertPriority::High => "high",
            AlertPriority::Critical => "critical",
        }
    }
}

impl std::fmt::Display for AlertPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single triggering event behind an alert
///
/// One variant per alert type; every alert is attributable to exactly one
/// trigger, never created speculatively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertContext {
    /// A trend snapshot crossed a routing rule
    TrendShift {
        trend_id: TrendId,
        parameter: String,
        direction: TrendDirection,
        percent_change: f64,
    },
    /// A reading escalated against the recent window
    SelfCare {
        reading_id: ReadingId,
        parameter: String,
        concerns: Vec<String>,
    },
    /// A critical self-alert fanned out to the family circle
    Emergency {
        reading_id: ReadingId,
        concerns: Vec<String>,
    },
}

/// A notification record
///
/// Created by the alert router; mutated only to flip the read flag.
/// Retention and deletion are external concerns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    /// Recipient of the alert
    pub owner: UserId,
    pub context: AlertContext,
    /// Human-readable message; encrypted at rest by the storage layer
    pub message: String,
    pub priority: AlertPriority,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Classification of an insight entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Concern,
    Positive,
    Observation,
    Correlation,
}

/// A single entry of the insights report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub kind: InsightKind,
    /// Parameter the insight is about; absent for cross-parameter entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    pub message: String,
}

/// Pagination metadata for alert listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub pages: usize,
}

/// One page of a user's alerts plus their unread count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertPage {
    pub alerts: Vec<Alert>,
    pub unread_count: usize,
    pub pagination: Pagination,
}
