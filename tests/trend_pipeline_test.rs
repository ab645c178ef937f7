//! End-to-end pipeline tests against in-memory libSQL storage
//!
//! Exercise the record -> analyze -> escalate -> route flow through the
//! service facade, the way the web layer drives it.

use asclepius_core::{
    AsclepiusError, ConnectionMode, LibsqlStorage, TrackingConfig, TrendDirection, UserId,
    WellnessService,
};
use std::sync::Arc;

async fn service() -> (WellnessService, Arc<LibsqlStorage>) {
    let storage = Arc::new(
        LibsqlStorage::new(ConnectionMode::InMemory)
            .await
            .expect("in-memory storage"),
    );
    let service = WellnessService::new(
        storage.clone(),
        storage.clone(),
        None,
        TrackingConfig::default(),
    );
    (service, storage)
}

#[tokio::test]
async fn recorded_reading_round_trips_through_history() {
    let (service, _storage) = service().await;
    let user = UserId::new();
    let parameter = service
        .define_parameter(user, "sleep_quality", None, Some(1.0), Some(10.0))
        .await
        .unwrap();

    service
        .record_reading(user, parameter.id, 6.0, None)
        .await
        .unwrap();
    let latest = service
        .record_reading(user, parameter.id, 8.0, Some("slept in".to_string()))
        .await
        .unwrap();

    let history = service.history(user, parameter.id, 7).await.unwrap();
    assert_eq!(history.len(), 2);
    // Newest first for display
    assert_eq!(history[0].id, latest.id);
    assert_eq!(history[0].note.as_deref(), Some("slept in"));
    assert!(history[0].recorded_at >= history[1].recorded_at);
}

#[tokio::test]
async fn out_of_range_reading_is_rejected_and_never_stored() {
    let (service, _storage) = service().await;
    let user = UserId::new();
    let parameter = service
        .define_parameter(user, "mood", None, Some(1.0), Some(10.0))
        .await
        .unwrap();

    let err = service
        .record_reading(user, parameter.id, 11.0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AsclepiusError::OutOfRange { .. }));

    let history = service.history(user, parameter.id, 7).await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn foreign_parameter_is_not_found() {
    let (service, _storage) = service().await;
    let owner = UserId::new();
    let stranger = UserId::new();
    let parameter = service
        .define_parameter(owner, "mood", None, None, None)
        .await
        .unwrap();

    let err = service
        .record_reading(stranger, parameter.id, 5.0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AsclepiusError::NotFound(_)));
}

#[tokio::test]
async fn deactivated_parameter_rejects_new_readings() {
    let (service, _storage) = service().await;
    let user = UserId::new();
    let parameter = service
        .define_parameter(user, "mood", None, None, None)
        .await
        .unwrap();

    service.deactivate_parameter(user, parameter.id).await.unwrap();

    let err = service
        .record_reading(user, parameter.id, 5.0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AsclepiusError::InvalidOperation(_)));
}

#[tokio::test]
async fn analysis_is_silent_with_insufficient_data() {
    let (service, _storage) = service().await;
    let user = UserId::new();
    let parameter = service
        .define_parameter(user, "energy", None, Some(1.0), Some(10.0))
        .await
        .unwrap();

    service.record_reading(user, parameter.id, 5.0, None).await.unwrap();
    service.record_reading(user, parameter.id, 6.0, None).await.unwrap();

    assert!(service.analyze(user, parameter.id).await.unwrap().is_none());
    // No alerts should have been created along the way; an empty listing
    // still reports one page
    let page = service.get_alerts(user, 1, 20).await.unwrap();
    assert_eq!(page.pagination.total, 0);
    assert_eq!(page.pagination.pages, 1);
}

#[tokio::test]
async fn persistently_low_mood_triggers_a_high_self_alert() {
    let (service, _storage) = service().await;
    let user = UserId::new();
    let parameter = service
        .define_parameter(user, "mood", None, Some(1.0), Some(10.0))
        .await
        .unwrap();

    for _ in 0..7 {
        service.record_reading(user, parameter.id, 2.0, None).await.unwrap();
    }
    service.record_reading(user, parameter.id, 1.5, None).await.unwrap();

    let page = service.get_alerts(user, 1, 20).await.unwrap();
    assert!(page.unread_count >= 1, "expected a self-care alert");
    let self_alert = page
        .alerts
        .iter()
        .find(|a| a.priority == asclepius_core::AlertPriority::High)
        .expect("high-priority self alert");
    assert!(self_alert.message.contains("reaching out"));
}

#[tokio::test]
async fn declining_steps_fan_out_to_followers() {
    let (service, storage) = service().await;
    let owner = UserId::new();
    let follower = UserId::new();
    storage.add_follow(follower, owner).await.unwrap();

    let parameter = service
        .define_parameter(owner, "general_steps", Some("steps".to_string()), None, None)
        .await
        .unwrap();

    // Strongly decreasing series; the last record call runs the pipeline
    for value in [9000.0, 7000.0, 5000.0, 3000.0, 1000.0] {
        service.record_reading(owner, parameter.id, value, None).await.unwrap();
    }

    let trend = service.analyze(owner, parameter.id).await.unwrap().unwrap();
    assert_eq!(trend.direction, TrendDirection::Decreasing);

    // The non-sensitive trend alert reached the follower
    let page = service.get_alerts(follower, 1, 20).await.unwrap();
    assert!(page.pagination.total >= 1);
    // The owner gets nothing through the fan-out path
    let own_page = service.get_alerts(owner, 1, 20).await.unwrap();
    assert!(own_page
        .alerts
        .iter()
        .all(|a| !matches!(a.context, asclepius_core::AlertContext::TrendShift { .. })));
}

#[tokio::test]
async fn alert_pagination_and_read_state() {
    let (service, storage) = service().await;
    let owner = UserId::new();
    let follower = UserId::new();
    storage.add_follow(follower, owner).await.unwrap();

    let parameter = service
        .define_parameter(owner, "general_steps", None, None, None)
        .await
        .unwrap();
    for value in [1000.0, 3000.0, 5000.0, 8000.0, 12000.0] {
        service.record_reading(owner, parameter.id, value, None).await.unwrap();
    }

    let page = service.get_alerts(follower, 1, 2).await.unwrap();
    assert!(page.pagination.total >= 2);
    assert_eq!(page.pagination.per_page, 2);
    assert!(page.alerts.len() <= 2);
    assert_eq!(
        page.pagination.pages,
        page.pagination.total.div_ceil(2)
    );

    let first = page.alerts[0].clone();
    assert!(!first.read);

    // Another user cannot flip someone else's alert
    assert!(!service.mark_alert_read(owner, first.id).await.unwrap());
    assert!(service.mark_alert_read(follower, first.id).await.unwrap());

    let after = service.get_alerts(follower, 1, 20).await.unwrap();
    assert_eq!(after.unread_count, page.unread_count - 1);
}

#[tokio::test]
async fn file_backed_database_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let db_path = dir.path().join("wellness.db").to_string_lossy().to_string();
    let user = UserId::new();

    let parameter_id = {
        let storage = Arc::new(
            LibsqlStorage::new(ConnectionMode::Local(db_path.clone()))
                .await
                .unwrap(),
        );
        let service = WellnessService::new(
            storage.clone(),
            storage,
            None,
            TrackingConfig::default(),
        );
        let parameter = service
            .define_parameter(user, "mood", None, Some(1.0), Some(10.0))
            .await
            .unwrap();
        service.record_reading(user, parameter.id, 7.0, None).await.unwrap();
        parameter.id
    };

    // Reopen: schema creation is idempotent and the data is still there
    let storage = Arc::new(
        LibsqlStorage::new(ConnectionMode::Local(db_path)).await.unwrap(),
    );
    let service = WellnessService::new(
        storage.clone(),
        storage,
        None,
        TrackingConfig::default(),
    );
    let history = service.history(user, parameter_id, 7).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].value, 7.0);
}

#[tokio::test]
async fn insights_report_concerns_and_correlations() {
    let (service, _storage) = service().await;
    let user = UserId::new();

    let mood = service
        .define_parameter(user, "mood", None, Some(1.0), Some(10.0))
        .await
        .unwrap();
    let sleep = service
        .define_parameter(user, "sleep_quality", None, Some(1.0), Some(10.0))
        .await
        .unwrap();

    // Mood and sleep decline together
    for (m, s) in [(9.0, 9.0), (7.0, 7.5), (5.0, 5.5), (3.0, 3.0), (1.5, 2.0)] {
        service.record_reading(user, mood.id, m, None).await.unwrap();
        service.record_reading(user, sleep.id, s, None).await.unwrap();
    }

    let insights = service.get_insights(user, 30).await.unwrap();
    assert!(insights
        .iter()
        .any(|i| i.kind == asclepius_core::InsightKind::Concern
            && i.parameter.as_deref() == Some("mood")));
    assert!(insights
        .iter()
        .any(|i| i.kind == asclepius_core::InsightKind::Correlation
            && i.message.contains("move together")));
}

#[tokio::test]
async fn inversely_moving_parameters_report_an_inverse_relationship() {
    let (service, _storage) = service().await;
    let user = UserId::new();

    let mood = service
        .define_parameter(user, "mood", None, Some(1.0), Some(10.0))
        .await
        .unwrap();
    let anxiety = service
        .define_parameter(user, "anxiety", None, Some(1.0), Some(10.0))
        .await
        .unwrap();

    // Anxiety climbs while mood falls
    for (m, a) in [(9.0, 1.0), (7.0, 3.0), (5.0, 5.0), (3.0, 7.0), (1.5, 9.0)] {
        service.record_reading(user, mood.id, m, None).await.unwrap();
        service.record_reading(user, anxiety.id, a, None).await.unwrap();
    }

    let insights = service.get_insights(user, 30).await.unwrap();
    assert!(insights
        .iter()
        .any(|i| i.kind == asclepius_core::InsightKind::Correlation
            && i.message.contains("inverse relationship")));
}

#[tokio::test]
async fn weak_correlations_are_not_reported() {
    let (service, _storage) = service().await;
    let user = UserId::new();

    let steps = service
        .define_parameter(user, "general_steps", None, None, None)
        .await
        .unwrap();
    let hydration = service
        .define_parameter(user, "hydration", None, None, None)
        .await
        .unwrap();

    // Pairwise r is about 0.17, well under the strong threshold
    for (s, h) in [(5.0, 5.0), (6.0, 5.0), (5.0, 6.0), (6.0, 6.0), (5.0, 5.0)] {
        service.record_reading(user, steps.id, s, None).await.unwrap();
        service.record_reading(user, hydration.id, h, None).await.unwrap();
    }

    let insights = service.get_insights(user, 30).await.unwrap();
    assert!(insights
        .iter()
        .all(|i| i.kind != asclepius_core::InsightKind::Correlation));
}
