//! Asclepius - Wellness Trend-Detection and Alerting Engine
//!
//! The core of a social wellness tracker: users log daily wellness
//! parameters (mood, energy, sleep quality, anxiety), the engine fits
//! trends over recent windows, and concerning patterns are routed as
//! alerts to the right audience with circle-aware privacy rules.
//!
//! # Architecture
//!
//! The engine is organized into several layers:
//! - **Types**: Core data structures (ParameterDefinition, Reading, Trend, Alert)
//! - **Stats**: Pure statistics kernel (trend fit, confidence, correlation)
//! - **Storage**: libSQL persistence behind the `StorageBackend` trait
//! - **Tracking**: Reading history, trend analysis, insight reports
//! - **Social**: Circle graph queries and circle-aware alert routing
//! - **Service**: The facade the web/routing layer consumes
//!
//! # Example
//!
//! ```ignore
//! use asclepius_core::{
//!     ConnectionMode, LibsqlStorage, TrackingConfig, UserId, WellnessService,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let storage = Arc::new(LibsqlStorage::new(ConnectionMode::Local("wellness.db".into())).await?);
//!     let service = WellnessService::new(
//!         storage.clone(),
//!         storage,
//!         None,
//!         TrackingConfig::default(),
//!     );
//!
//!     let user = UserId::new();
//!     let mood = service.define_parameter(user, "mood", None, Some(1.0), Some(10.0)).await?;
//!     service.record_reading(user, mood.id, 7.0, None).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod service;
pub mod social;
pub mod stats;
pub mod storage;
pub mod tracking;
pub mod types;

// Re-export commonly used types
pub use config::TrackingConfig;
pub use error::{AsclepiusError, Result};
pub use service::WellnessService;
pub use social::{AlertBroadcaster, AlertRouter, CircleGraph, RealtimePublisher};
pub use storage::{ConnectionMode, FieldCipher, LibsqlStorage, PlaintextCipher, StorageBackend};
pub use tracking::{Escalation, InsightEngine, ParameterStore, TrendAnalyzer};
pub use types::{
    Alert, AlertContext, AlertId, AlertPage, AlertPriority, CircleKind, Insight, InsightKind,
    Pagination, ParameterDefinition, ParameterId, Reading, ReadingId, Trend, TrendDirection,
    TrendId, UserId,
};
