//! Engine facade
//!
//! `WellnessService` wires the injected collaborators (storage, circle
//! graph, optional realtime publisher) into the record -> analyze ->
//! escalate -> route pipeline and exposes the operations the web layer
//! consumes.

use crate::config::TrackingConfig;
use crate::error::Result;
use crate::social::{AlertRouter, CircleGraph, RealtimePublisher};
use crate::storage::StorageBackend;
use crate::tracking::{InsightEngine, ParameterStore, TrendAnalyzer};
use crate::types::{
    Alert, AlertId, AlertPage, AlertPriority, Insight, Pagination, ParameterDefinition,
    ParameterId, Reading, Trend, TrendDirection, UserId,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Upper bound on alert page size
const MAX_PER_PAGE: usize = 100;

/// Facade over the tracking and alerting engine
///
/// One instance per process is typical, but nothing here is global; every
/// collaborator is passed in at construction.
pub struct WellnessService {
    store: ParameterStore,
    analyzer: TrendAnalyzer,
    insights: InsightEngine,
    router: AlertRouter,
    storage: Arc<dyn StorageBackend>,
}

impl WellnessService {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        circles: Arc<dyn CircleGraph>,
        publisher: Option<Arc<dyn RealtimePublisher>>,
        config: TrackingConfig,
    ) -> Self {
        Self {
            store: ParameterStore::new(storage.clone()),
            analyzer: TrendAnalyzer::new(storage.clone(), config.clone()),
            insights: InsightEngine::new(storage.clone(), config.clone()),
            router: AlertRouter::new(storage.clone(), circles, publisher, config),
            storage,
        }
    }

    /// Define a new tracked parameter
    pub async fn define_parameter(
        &self,
        user: UserId,
        name: &str,
        unit: Option<String>,
        min_value: Option<f64>,
        max_value: Option<f64>,
    ) -> Result<ParameterDefinition> {
        self.store.define(user, name, unit, min_value, max_value).await
    }

    /// Soft-deactivate a parameter
    pub async fn deactivate_parameter(&self, user: UserId, parameter: ParameterId) -> Result<()> {
        self.store.deactivate(user, parameter).await
    }

    /// List a user's parameters
    pub async fn list_parameters(&self, user: UserId) -> Result<Vec<ParameterDefinition>> {
        self.storage.list_parameters(user).await
    }

    /// Record a reading and run the full analysis/alerting pipeline
    ///
    /// The reading write is the operation the caller is told about; the
    /// downstream trend and alert writes are each atomic on their own but
    /// the pipeline as a whole is not. A downstream failure is logged and
    /// never un-records the reading.
    pub async fn record_reading(
        &self,
        user: UserId,
        parameter: ParameterId,
        value: f64,
        note: Option<String>,
    ) -> Result<Reading> {
        let definition = self.store.owned_parameter(user, parameter).await?;
        let reading = self.store.record(user, parameter, value, note).await?;

        if let Err(e) = self.run_pipeline(user, &definition, &reading).await {
            // The reading is persisted; analysis and routing report their
            // own failures
            warn!(
                "post-record pipeline failed for '{}': {}",
                definition.name, e
            );
        }

        Ok(reading)
    }

    async fn run_pipeline(
        &self,
        user: UserId,
        definition: &ParameterDefinition,
        reading: &Reading,
    ) -> Result<()> {
        if let Some(trend) = self.analyzer.analyze(user, definition.id).await? {
            // Stable windows are persisted for audit but not worth waking
            // anyone up over
            if trend.direction != TrendDirection::Stable {
                let created = self
                    .router
                    .route_trend_alert(user, &definition.name, &trend)
                    .await?;
                if !created.is_empty() {
                    info!(
                        "routed {} trend alert(s) for '{}'",
                        created.len(),
                        definition.name
                    );
                }
            }
        }

        if let Some(escalation) = self.analyzer.check_escalation(definition, reading).await? {
            let self_alert = self
                .router
                .route_self_alert(
                    user,
                    reading,
                    &definition.name,
                    escalation.concerns.clone(),
                    escalation.severity,
                )
                .await?;
            if self_alert.priority == AlertPriority::Critical {
                self.router
                    .route_emergency(user, reading, escalation.concerns)
                    .await?;
            }
        }

        Ok(())
    }

    /// Run trend analysis for one parameter on demand
    pub async fn analyze(&self, user: UserId, parameter: ParameterId) -> Result<Option<Trend>> {
        self.analyzer.analyze(user, parameter).await
    }

    /// Reading history, newest first
    pub async fn history(
        &self,
        user: UserId,
        parameter: ParameterId,
        window_days: i64,
    ) -> Result<Vec<Reading>> {
        self.store.history(user, parameter, window_days).await
    }

    /// Insights report over the given window
    pub async fn get_insights(&self, user: UserId, window_days: i64) -> Result<Vec<Insight>> {
        self.insights.get_insights(user, window_days).await
    }

    /// One page of the user's alerts, newest first
    pub async fn get_alerts(
        &self,
        user: UserId,
        page: usize,
        per_page: usize,
    ) -> Result<AlertPage> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PER_PAGE);

        let (alerts, total) = self.storage.alerts_page(user, page, per_page).await?;
        let unread_count = self.storage.unread_count(user).await?;

        Ok(AlertPage {
            alerts,
            unread_count,
            pagination: Pagination {
                page,
                per_page,
                total,
                // An empty listing is still one (empty) page
                pages: total.div_ceil(per_page).max(1),
            },
        })
    }

    /// Flip an alert to read; false when it does not belong to the user
    pub async fn mark_alert_read(&self, user: UserId, alert: AlertId) -> Result<bool> {
        self.storage.mark_alert_read(user, alert).await
    }

    /// Route a trend alert directly (re-analysis jobs layered on top of the
    /// engine call this after `analyze`)
    pub async fn route_trend_alert(
        &self,
        user: UserId,
        parameter_name: &str,
        trend: &Trend,
    ) -> Result<Vec<Alert>> {
        self.router.route_trend_alert(user, parameter_name, trend).await
    }
}
