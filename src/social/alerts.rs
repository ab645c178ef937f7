//! Alert routing with circle-aware fan-out
//!
//! Decides the audience for each alert (self, close circles, or all
//! followers), persists one alert record per recipient, and optionally
//! publishes each to a realtime channel. Publishing is fire-and-forget:
//! a failed publish never rolls back a persisted alert.

use crate::config::TrackingConfig;
use crate::error::Result;
use crate::social::CircleGraph;
use crate::storage::StorageBackend;
use crate::types::{
    is_sensitive_name, Alert, AlertContext, AlertId, AlertPriority, CircleKind, Reading, Trend,
    UserId,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

/// Appended to trend alerts for a decreasing mood/energy parameter
const SUPPORT_SUFFIX: &str = " They might appreciate you reaching out.";

/// Optional realtime delivery channel keyed by recipient
#[async_trait]
pub trait RealtimePublisher: Send + Sync {
    /// Deliver an alert to its recipient's live channel, if any
    async fn publish(&self, alert: &Alert) -> Result<()>;
}

/// In-process realtime channel backed by per-recipient broadcast senders
///
/// The web layer subscribes a receiver per connected user; alerts for users
/// without a live subscription are dropped (they remain persisted).
pub struct AlertBroadcaster {
    channels: RwLock<HashMap<UserId, broadcast::Sender<Alert>>>,
    capacity: usize,
}

impl AlertBroadcaster {
    /// Create a broadcaster with the given per-recipient channel capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Subscribe to a user's live alerts, creating the channel on demand
    pub async fn subscribe(&self, recipient: UserId) -> broadcast::Receiver<Alert> {
        let mut channels = self.channels.write().await;
        channels
            .entry(recipient)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }
}

impl Default for AlertBroadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl RealtimePublisher for AlertBroadcaster {
    async fn publish(&self, alert: &Alert) -> Result<()> {
        let channels = self.channels.read().await;
        if let Some(tx) = channels.get(&alert.owner) {
            // Send fails only when every receiver is gone; not an error here
            let _ = tx.send(alert.clone());
        }
        Ok(())
    }
}

/// Routes alerts to the right audience and persists them
///
/// Collaborators are injected; the router holds no global state. Repeated
/// qualifying events always produce new alerts; rate limiting, if any,
/// belongs to the ingestion layer.
pub struct AlertRouter {
    storage: Arc<dyn StorageBackend>,
    circles: Arc<dyn CircleGraph>,
    publisher: Option<Arc<dyn RealtimePublisher>>,
    config: TrackingConfig,
}

impl AlertRouter {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        circles: Arc<dyn CircleGraph>,
        publisher: Option<Arc<dyn RealtimePublisher>>,
        config: TrackingConfig,
    ) -> Self {
        Self {
            storage,
            circles,
            publisher,
            config,
        }
    }

    /// Fan a trend alert out to the owner's audience
    ///
    /// Sensitive parameter names (mood, anxiety, depression) restrict the
    /// audience to family and close friends who also follow the owner;
    /// anything else reaches all followers. The owner never receives an
    /// alert through this path.
    pub async fn route_trend_alert(
        &self,
        owner: UserId,
        parameter_name: &str,
        trend: &Trend,
    ) -> Result<Vec<Alert>> {
        let mut priority = self.baseline_priority(trend.percent_change);
        let mut message = format!(
            "A member of your circle's {} has been {} ({:+.1}% over {} readings).",
            parameter_name,
            trend.direction,
            trend.percent_change,
            trend.window_len
        );

        // Decreasing mood or energy always warrants urgency and a nudge
        // toward support, regardless of the size of the change
        let lowered = parameter_name.to_lowercase();
        if matches!(lowered.as_str(), "mood" | "energy")
            && trend.direction == crate::types::TrendDirection::Decreasing
        {
            priority = AlertPriority::High;
            message.push_str(SUPPORT_SUFFIX);
        }

        let audience = self.resolve_audience(owner, parameter_name).await?;
        debug!(
            "trend alert for '{}': {} recipient(s) at {}",
            parameter_name,
            audience.len(),
            priority
        );

        let mut created = Vec::with_capacity(audience.len());
        for recipient in audience {
            let alert = Alert {
                id: AlertId::new(),
                owner: recipient,
                context: AlertContext::TrendShift {
                    trend_id: trend.id,
                    parameter: parameter_name.to_string(),
                    direction: trend.direction,
                    percent_change: trend.percent_change,
                },
                message: message.clone(),
                priority,
                read: false,
                created_at: Utc::now(),
            };
            self.storage.insert_alert(&alert).await?;
            self.publish(&alert).await;
            created.push(alert);
        }
        Ok(created)
    }

    /// Create a single alert addressed to the owner themself
    ///
    /// Message tone follows severity: critical points at crisis resources,
    /// high suggests reaching out, anything else is a self-care note.
    pub async fn route_self_alert(
        &self,
        owner: UserId,
        trigger: &Reading,
        parameter_name: &str,
        concerns: Vec<String>,
        severity: AlertPriority,
    ) -> Result<Alert> {
        let message = match severity {
            AlertPriority::Critical => {
                "We're concerned about you. If you're in crisis, please contact a crisis line \
                 or emergency services right away."
                    .to_string()
            }
            AlertPriority::High => format!(
                "Your recent {} readings look tough. Consider reaching out to someone you trust.",
                parameter_name
            ),
            _ => format!(
                "Your {} readings have shifted lately. Taking a moment for yourself might help.",
                parameter_name
            ),
        };

        let alert = Alert {
            id: AlertId::new(),
            owner,
            context: AlertContext::SelfCare {
                reading_id: trigger.id,
                parameter: parameter_name.to_string(),
                concerns,
            },
            message,
            priority: severity,
            read: false,
            created_at: Utc::now(),
        };
        self.storage.insert_alert(&alert).await?;
        self.publish(&alert).await;
        Ok(alert)
    }

    /// Notify the owner's family circle after a critical self-alert
    ///
    /// Deliberately narrower than trend alerts: family only, not close
    /// friends, not followers. No family circle means no-op.
    pub async fn route_emergency(
        &self,
        owner: UserId,
        trigger: &Reading,
        concerns: Vec<String>,
    ) -> Result<Vec<Alert>> {
        let family = self.circles.circle_members(owner, CircleKind::Family).await?;
        if family.is_empty() {
            debug!("no family circle for {}; emergency fan-out skipped", owner);
            return Ok(Vec::new());
        }

        let message = format!(
            "Someone close to you may need support right now ({}). Please check in with them.",
            concerns.join(", ")
        );

        let mut created = Vec::with_capacity(family.len());
        for recipient in family {
            let alert = Alert {
                id: AlertId::new(),
                owner: recipient,
                context: AlertContext::Emergency {
                    reading_id: trigger.id,
                    concerns: concerns.clone(),
                },
                message: message.clone(),
                priority: AlertPriority::Critical,
                read: false,
                created_at: Utc::now(),
            };
            self.storage.insert_alert(&alert).await?;
            self.publish(&alert).await;
            created.push(alert);
        }
        Ok(created)
    }

    /// Baseline priority from the magnitude of the percent change
    fn baseline_priority(&self, percent_change: f64) -> AlertPriority {
        let magnitude = percent_change.abs();
        if magnitude > self.config.high_change_pct {
            AlertPriority::High
        } else if magnitude > self.config.medium_change_pct {
            AlertPriority::Medium
        } else {
            AlertPriority::Low
        }
    }

    /// Resolve who may see a trend alert for the given parameter
    async fn resolve_audience(
        &self,
        owner: UserId,
        parameter_name: &str,
    ) -> Result<HashSet<UserId>> {
        let mut followers = self.circles.followers(owner).await?;
        // The owner never hears about their own trend through fan-out
        followers.remove(&owner);

        if is_sensitive_name(parameter_name) {
            let mut close = self.circles.circle_members(owner, CircleKind::Family).await?;
            close.extend(
                self.circles
                    .circle_members(owner, CircleKind::CloseFriends)
                    .await?,
            );
            // A circle member who does not also follow the owner sees nothing
            Ok(close.intersection(&followers).copied().collect())
        } else {
            Ok(followers)
        }
    }

    async fn publish(&self, alert: &Alert) {
        if let Some(publisher) = &self.publisher {
            if let Err(e) = publisher.publish(alert).await {
                // Fire-and-forget: the persisted alert stands regardless
                warn!("realtime publish failed for alert {}: {}", alert.id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router_config() -> TrackingConfig {
        TrackingConfig::default()
    }

    struct EmptyGraph;

    #[async_trait]
    impl CircleGraph for EmptyGraph {
        async fn circle_members(&self, _: UserId, _: CircleKind) -> Result<HashSet<UserId>> {
            Ok(HashSet::new())
        }

        async fn followers(&self, _: UserId) -> Result<HashSet<UserId>> {
            Ok(HashSet::new())
        }

        async fn is_following(&self, _: UserId, _: UserId) -> Result<bool> {
            Ok(false)
        }
    }

    struct NullStorage;

    #[async_trait]
    impl StorageBackend for NullStorage {
        async fn create_parameter(&self, _: &crate::types::ParameterDefinition) -> Result<()> {
            Ok(())
        }
        async fn get_parameter(
            &self,
            id: crate::types::ParameterId,
        ) -> Result<crate::types::ParameterDefinition> {
            Err(crate::error::AsclepiusError::NotFound(id.to_string()))
        }
        async fn list_parameters(
            &self,
            _: UserId,
        ) -> Result<Vec<crate::types::ParameterDefinition>> {
            Ok(Vec::new())
        }
        async fn deactivate_parameter(
            &self,
            _: UserId,
            id: crate::types::ParameterId,
        ) -> Result<()> {
            Err(crate::error::AsclepiusError::NotFound(id.to_string()))
        }
        async fn insert_reading(&self, _: &Reading) -> Result<()> {
            Ok(())
        }
        async fn recent_readings(
            &self,
            _: crate::types::ParameterId,
            _: usize,
        ) -> Result<Vec<Reading>> {
            Ok(Vec::new())
        }
        async fn readings_since(
            &self,
            _: crate::types::ParameterId,
            _: chrono::DateTime<Utc>,
        ) -> Result<Vec<Reading>> {
            Ok(Vec::new())
        }
        async fn insert_trend(&self, _: &Trend) -> Result<()> {
            Ok(())
        }
        async fn insert_alert(&self, _: &Alert) -> Result<()> {
            Ok(())
        }
        async fn alerts_page(
            &self,
            _: UserId,
            _: usize,
            _: usize,
        ) -> Result<(Vec<Alert>, usize)> {
            Ok((Vec::new(), 0))
        }
        async fn unread_count(&self, _: UserId) -> Result<usize> {
            Ok(0)
        }
        async fn mark_alert_read(&self, _: UserId, _: AlertId) -> Result<bool> {
            Ok(false)
        }
    }

    fn test_router() -> AlertRouter {
        AlertRouter::new(
            Arc::new(NullStorage),
            Arc::new(EmptyGraph),
            None,
            router_config(),
        )
    }

    #[test]
    fn baseline_priority_tiers() {
        let router = test_router();
        assert_eq!(router.baseline_priority(60.0), AlertPriority::High);
        assert_eq!(router.baseline_priority(-55.0), AlertPriority::High);
        assert_eq!(router.baseline_priority(35.0), AlertPriority::Medium);
        assert_eq!(router.baseline_priority(20.0), AlertPriority::Low);
        assert_eq!(router.baseline_priority(0.0), AlertPriority::Low);
    }

    #[tokio::test]
    async fn emergency_without_family_circle_is_noop() {
        let router = test_router();
        let owner = UserId::new();
        let trigger = Reading {
            id: crate::types::ReadingId::new(),
            parameter_id: crate::types::ParameterId::new(),
            owner,
            value: 1.0,
            note: None,
            recorded_at: Utc::now(),
        };
        let created = router
            .route_emergency(owner, &trigger, vec!["low mood".to_string()])
            .await
            .unwrap();
        assert!(created.is_empty());
    }

    #[tokio::test]
    async fn broadcaster_delivers_to_subscriber() {
        let broadcaster = AlertBroadcaster::default();
        let recipient = UserId::new();
        let mut rx = broadcaster.subscribe(recipient).await;

        let alert = Alert {
            id: AlertId::new(),
            owner: recipient,
            context: AlertContext::SelfCare {
                reading_id: crate::types::ReadingId::new(),
                parameter: "mood".to_string(),
                concerns: vec![],
            },
            message: "test".to_string(),
            priority: AlertPriority::Low,
            read: false,
            created_at: Utc::now(),
        };
        broadcaster.publish(&alert).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, alert.id);
    }

    #[tokio::test]
    async fn broadcaster_ignores_recipients_without_channel() {
        let broadcaster = AlertBroadcaster::default();
        let alert = Alert {
            id: AlertId::new(),
            owner: UserId::new(),
            context: AlertContext::Emergency {
                reading_id: crate::types::ReadingId::new(),
                concerns: vec![],
            },
            message: "test".to_string(),
            priority: AlertPriority::Critical,
            read: false,
            created_at: Utc::now(),
        };
        // No subscriber; must still succeed
        broadcaster.publish(&alert).await.unwrap();
    }
}
