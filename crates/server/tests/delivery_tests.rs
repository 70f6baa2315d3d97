//! Dispatcher behaviour with a scripted message sender.

use async_trait::async_trait;
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use sleep_notifications::config::NotificationsConfig;
use sleep_notifications::entity::notifications::NotificationKind;
use sleep_notifications::entity::users;
use sleep_notifications::notifications::{
    DeliveryOutcome, DeliveryRequest, Dispatcher, MessageSender, NewUser, NotificationStore,
    SendError,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Replays queued results; succeeds with increasing message ids once the queue is empty.
#[derive(Clone, Default)]
struct ScriptedSender {
    script: Arc<Mutex<VecDeque<Result<i32, SendError>>>>,
    calls: Arc<Mutex<Vec<(i64, String)>>>,
}

impl ScriptedSender {
    fn with_script(results: Vec<Result<i32, SendError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(results.into())),
            ..Default::default()
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl MessageSender for ScriptedSender {
    async fn send(&self, telegram_user_id: i64, text: &str) -> Result<i32, SendError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push((telegram_user_id, text.to_string()));
        let next_id = calls.len() as i32 + 100;
        drop(calls);

        self.script.lock().unwrap().pop_front().unwrap_or(Ok(next_id))
    }
}

async fn setup(sender: ScriptedSender) -> (Dispatcher<ScriptedSender>, NotificationStore, users::Model) {
    let db = Database::connect("sqlite::memory:").await.expect("connect");
    Migrator::up(&db, None).await.expect("migrate");
    let store = NotificationStore::new(Arc::new(db));
    let user = store
        .register_user(NewUser {
            telegram_user_id: 4242,
            first_name: Some("Anna"),
            ..Default::default()
        })
        .await
        .expect("register user");

    let config = NotificationsConfig {
        max_send_retries: 1,
        ..Default::default()
    };
    (Dispatcher::new(store.clone(), sender, config), store, user)
}

fn request<'a>(user: &'a users::Model, kind: &'a NotificationKind) -> DeliveryRequest<'a> {
    DeliveryRequest {
        user,
        kind,
        child_id: None,
        text: "Mia has been awake for 2 hours",
    }
}

#[tokio::test]
async fn test_delivered_notification_is_recorded() {
    let sender = ScriptedSender::with_script(vec![Ok(777)]);
    let (dispatcher, store, user) = setup(sender.clone()).await;
    let kind = NotificationKind::SleepReminders;

    let outcome = dispatcher.deliver(request(&user, &kind)).await.unwrap();

    let DeliveryOutcome::Delivered(entry) = outcome else {
        panic!("expected delivery, got {outcome:?}");
    };
    assert!(entry.success);
    assert_eq!(entry.telegram_message_id, Some(777));
    assert_eq!(entry.error_message, None);
    assert_eq!(entry.message_text.as_deref(), Some("Mia has been awake for 2 hours"));

    let calls = sender.calls.lock().unwrap().clone();
    assert_eq!(calls, vec![(4242, "Mia has been awake for 2 hours".to_string())]);

    let history = store.get_notification_history(user.id, None, 10).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_disabled_type_is_not_sent() {
    let sender = ScriptedSender::default();
    let (dispatcher, store, user) = setup(sender.clone()).await;
    let kind = NotificationKind::WakeReminders;
    store
        .set_notification_preference(user.id, &kind, false, None)
        .await
        .unwrap();

    let outcome = dispatcher.deliver(request(&user, &kind)).await.unwrap();

    assert_eq!(outcome, DeliveryOutcome::Disabled);
    assert_eq!(sender.call_count(), 0);
    assert!(
        store
            .get_notification_history(user.id, None, 10)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_second_delivery_is_throttled() {
    let sender = ScriptedSender::default();
    let (dispatcher, _store, user) = setup(sender.clone()).await;
    let kind = NotificationKind::BedtimeAlerts;

    let first = dispatcher.deliver(request(&user, &kind)).await.unwrap();
    assert!(matches!(first, DeliveryOutcome::Delivered(_)));

    let second = dispatcher.deliver(request(&user, &kind)).await.unwrap();
    assert_eq!(second, DeliveryOutcome::Throttled);
    assert_eq!(sender.call_count(), 1);
}

#[tokio::test]
async fn test_failed_delivery_is_recorded_and_not_throttled() {
    let sender = ScriptedSender::with_script(vec![Err(SendError::ChatNotFound)]);
    let (dispatcher, store, user) = setup(sender.clone()).await;
    let kind = NotificationKind::SleepReminders;

    let outcome = dispatcher.deliver(request(&user, &kind)).await.unwrap();
    let DeliveryOutcome::Failed(entry) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(!entry.success);
    assert_eq!(entry.telegram_message_id, None);
    assert_eq!(entry.error_message.as_deref(), Some("Chat not found"));

    // A failed attempt does not block the next one.
    let retry = dispatcher.deliver(request(&user, &kind)).await.unwrap();
    assert!(matches!(retry, DeliveryOutcome::Delivered(_)));

    let history = store.get_notification_history(user.id, None, 10).await.unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn test_rate_limit_is_retried_once() {
    let sender = ScriptedSender::with_script(vec![
        Err(SendError::RateLimited {
            retry_after: Duration::from_millis(10),
        }),
        Ok(901),
    ]);
    let (dispatcher, store, user) = setup(sender.clone()).await;
    let kind = NotificationKind::SleepReminders;

    let outcome = dispatcher.deliver(request(&user, &kind)).await.unwrap();

    let DeliveryOutcome::Delivered(entry) = outcome else {
        panic!("expected delivery, got {outcome:?}");
    };
    assert_eq!(entry.telegram_message_id, Some(901));
    assert_eq!(sender.call_count(), 2);
    // One attempt, one history row.
    assert_eq!(
        store
            .get_notification_history(user.id, None, 10)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_rate_limit_gives_up_after_retries() {
    let limited = || SendError::RateLimited {
        retry_after: Duration::from_millis(5),
    };
    let sender = ScriptedSender::with_script(vec![Err(limited()), Err(limited())]);
    let (dispatcher, _store, user) = setup(sender.clone()).await;
    let kind = NotificationKind::WakeReminders;

    let outcome = dispatcher.deliver(request(&user, &kind)).await.unwrap();

    let DeliveryOutcome::Failed(entry) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(entry.error_message.unwrap().starts_with("Rate limited"));
    assert_eq!(sender.call_count(), 2);
}
