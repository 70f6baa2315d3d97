//! Delivery recording.
//!
//! The messenger itself (Telegram) lives behind [`MessageSender`]. The [`Dispatcher`]
//! checks preferences and the throttle, hands the text to the sender and writes
//! exactly one history row per attempt that reached the sender.

use crate::config::NotificationsConfig;
use crate::entity::notifications::NotificationKind;
use crate::entity::{notification_history, users};
use crate::error::StoreError;
use crate::notifications::store::{NewHistoryEntry, NotificationStore};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
    /// The user blocked the bot or deleted the chat.
    #[error("Chat not found")]
    ChatNotFound,
    #[error("Send failed: {0}")]
    Other(String),
}

/// External messaging system: accepts a message and returns its message id.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, telegram_user_id: i64, text: &str) -> Result<i32, SendError>;
}

#[derive(Debug, Clone)]
pub struct DeliveryRequest<'a> {
    pub user: &'a users::Model,
    pub kind: &'a NotificationKind,
    pub child_id: Option<Uuid>,
    pub text: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    /// The user switched this notification type off.
    Disabled,
    /// A successful delivery happened too recently.
    Throttled,
    Delivered(notification_history::Model),
    Failed(notification_history::Model),
}

pub struct Dispatcher<S> {
    store: NotificationStore,
    sender: S,
    config: NotificationsConfig,
}

impl<S: MessageSender> Dispatcher<S> {
    pub fn new(store: NotificationStore, sender: S, config: NotificationsConfig) -> Self {
        Self {
            store,
            sender,
            config,
        }
    }

    #[tracing::instrument(
        skip(self, request),
        fields(
            telegram_user_id = request.user.telegram_user_id,
            kind = %request.kind,
            child_id = ?request.child_id
        )
    )]
    pub async fn deliver(
        &self,
        request: DeliveryRequest<'_>,
    ) -> Result<DeliveryOutcome, StoreError> {
        let user = request.user;

        if !self
            .store
            .is_notification_enabled(user.id, request.kind)
            .await?
        {
            tracing::debug!("Notification type disabled, skipping");
            return Ok(DeliveryOutcome::Disabled);
        }

        let allowed = self
            .store
            .should_send_notification(
                user.id,
                request.kind,
                request.child_id,
                self.config.min_interval(),
                OffsetDateTime::now_utc(),
            )
            .await?;
        if !allowed {
            tracing::info!("Skipping duplicate notification");
            return Ok(DeliveryOutcome::Throttled);
        }

        let result = self.send_with_retry(user.telegram_user_id, request.text).await;
        let sent_at = OffsetDateTime::now_utc();

        match result {
            Ok(message_id) => {
                let entry = self
                    .store
                    .log_notification_sent(NewHistoryEntry {
                        user_id: user.id,
                        kind: request.kind,
                        child_id: request.child_id,
                        message_text: Some(request.text),
                        success: true,
                        error_message: None,
                        telegram_message_id: Some(message_id),
                        sent_at,
                    })
                    .await?;
                tracing::info!(message_id, "Notification delivered");
                Ok(DeliveryOutcome::Delivered(entry))
            }
            Err(e) => {
                match &e {
                    SendError::ChatNotFound => tracing::warn!(
                        "Chat not found - user may have blocked the bot or deleted the account"
                    ),
                    other => tracing::error!(error = %other, "Notification delivery failed"),
                }
                let error_message = e.to_string();
                let entry = self
                    .store
                    .log_notification_sent(NewHistoryEntry {
                        user_id: user.id,
                        kind: request.kind,
                        child_id: request.child_id,
                        message_text: Some(request.text),
                        success: false,
                        error_message: Some(&error_message),
                        telegram_message_id: None,
                        sent_at,
                    })
                    .await?;
                Ok(DeliveryOutcome::Failed(entry))
            }
        }
    }

    async fn send_with_retry(&self, telegram_user_id: i64, text: &str) -> Result<i32, SendError> {
        let mut retries = 0;
        loop {
            match self.sender.send(telegram_user_id, text).await {
                Err(SendError::RateLimited { retry_after })
                    if retries < self.config.max_send_retries =>
                {
                    retries += 1;
                    tracing::warn!(
                        retry_after_ms = retry_after.as_millis() as u64,
                        attempt = retries,
                        "Rate limited by messenger, retrying"
                    );
                    tokio::time::sleep(retry_after).await;
                }
                other => return other,
            }
        }
    }
}
