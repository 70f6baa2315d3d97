//! HTTP API tests using axum-test against an in-memory database.

use axum::http::StatusCode;
use axum_test::TestServer;
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use serde_json::{Value, json};
use sleep_notifications::AppResources;
use sleep_notifications::api::router;
use sleep_notifications::config::{AppConfig, NotificationsConfig};
use sleep_notifications::entity::notifications::NotificationKind;
use sleep_notifications::notifications::{NewHistoryEntry, NewUser, NotificationStore};
use std::sync::Arc;
use time::OffsetDateTime;

async fn setup() -> (TestServer, NotificationStore) {
    let db = Arc::new(Database::connect("sqlite::memory:").await.expect("connect"));
    Migrator::up(db.as_ref(), None).await.expect("migrate");

    let config = AppConfig {
        database_url: "sqlite::memory:".into(),
        listen_addr: "127.0.0.1:0".into(),
        notifications: NotificationsConfig::default(),
    };
    let resources = AppResources {
        db: db.clone(),
        config: Arc::new(config),
    };

    let server = TestServer::new(router(resources)).expect("create test server");
    (server, NotificationStore::new(db))
}

async fn register(store: &NotificationStore, telegram_user_id: i64) {
    store
        .register_user(NewUser {
            telegram_user_id,
            first_name: Some("Anna"),
            ..Default::default()
        })
        .await
        .expect("register user");
}

#[tokio::test]
async fn test_health_check() {
    let (server, _store) = setup().await;
    let response = server.get("/healthz").await;
    response.assert_status_ok();
    response.assert_text("ok");
}

#[tokio::test]
async fn test_unknown_user_is_404() {
    let (server, _store) = setup().await;
    let response = server.get("/api/users/99/notifications").await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_list_preferences() {
    let (server, store) = setup().await;
    register(&store, 10).await;

    let response = server.get("/api/users/10/notifications").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["telegram_user_id"], 10);
    let prefs = body["preferences"].as_array().unwrap();
    assert_eq!(prefs.len(), 3);
    assert!(prefs.iter().all(|p| p["enabled"] == json!(true)));
}

#[tokio::test]
async fn test_update_preference() {
    let (server, store) = setup().await;
    register(&store, 11).await;

    let response = server
        .put("/api/users/11/notifications/bedtime_alerts")
        .json(&json!({"enabled": false, "settings": {"lead_minutes": 20}}))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["notification_type"], "bedtime_alerts");
    assert_eq!(body["enabled"], false);
    assert_eq!(body["settings"]["lead_minutes"], 20);

    // Omitting settings keeps them.
    let response = server
        .put("/api/users/11/notifications/bedtime_alerts")
        .json(&json!({"enabled": true}))
        .await;
    let body: Value = response.json();
    assert_eq!(body["enabled"], true);
    assert_eq!(body["settings"]["lead_minutes"], 20);

    let user = store.require_user(11).await.unwrap();
    assert_eq!(store.get_user_notifications(user.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_update_preference_rejects_non_object_settings() {
    let (server, store) = setup().await;
    register(&store, 12).await;

    let response = server
        .put("/api/users/12/notifications/sleep_reminders")
        .json(&json!({"enabled": true, "settings": [1, 2]}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_history_endpoint() {
    let (server, store) = setup().await;
    register(&store, 13).await;
    let user = store.require_user(13).await.unwrap();
    let sleep = NotificationKind::SleepReminders;
    let wake = NotificationKind::WakeReminders;

    for kind in [&sleep, &sleep, &wake] {
        store
            .log_notification_sent(NewHistoryEntry {
                user_id: user.id,
                kind,
                child_id: None,
                message_text: Some("reminder"),
                success: true,
                error_message: None,
                telegram_message_id: Some(1),
                sent_at: OffsetDateTime::now_utc(),
            })
            .await
            .unwrap();
    }

    let response = server.get("/api/users/13/history").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["entries"].as_array().unwrap().len(), 3);

    let response = server
        .get("/api/users/13/history")
        .add_query_param("notification_type", "sleep_reminders")
        .add_query_param("limit", 1)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["notification_type"], "sleep_reminders");

    let response = server
        .get("/api/users/13/history")
        .add_query_param("limit", 0)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_subscribers_endpoint() {
    let (server, store) = setup().await;
    register(&store, 20).await;
    register(&store, 21).await;

    server
        .put("/api/users/21/notifications/wake_reminders")
        .json(&json!({"enabled": false}))
        .await
        .assert_status_ok();

    let response = server.get("/api/notifications/wake_reminders/subscribers").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["notification_type"], "wake_reminders");
    assert_eq!(body["total"], 1);
    assert_eq!(body["subscribers"][0]["telegram_user_id"], 20);
}

#[tokio::test]
async fn test_openapi_docs_are_served() {
    let (server, _store) = setup().await;
    server.get("/api-docs").await.assert_status_ok();
}
