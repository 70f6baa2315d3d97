//! Query layer over the `notifications` and `notification_history` tables.
//!
//! Constraint violations raised by the database surface as the matching
//! [`StoreError`] variant; nothing here retries or swallows them.

use crate::entity::notifications::NotificationKind;
use crate::entity::{notification_history, notifications, users};
use crate::error::StoreError;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection,
    DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::Serialize;
use serde_json::{Value as Json, json};
use std::sync::Arc;
use time::{OffsetDateTime, UtcOffset};
use utoipa::ToSchema;
use uuid::Uuid;

/// How many recent history rows the throttle looks at.
const THROTTLE_LOOKBACK: u64 = 10;

/// Parameters for registering (or refreshing) a bot user.
#[derive(Debug, Clone, Default)]
pub struct NewUser<'a> {
    pub telegram_user_id: i64,
    pub username: Option<&'a str>,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    /// Display name chosen by the user; falls back to `first_name`.
    pub custom_name: Option<&'a str>,
}

/// Parameters for one delivery attempt.
#[derive(Debug, Clone)]
pub struct NewHistoryEntry<'a> {
    pub user_id: Uuid,
    pub kind: &'a NotificationKind,
    pub child_id: Option<Uuid>,
    pub message_text: Option<&'a str>,
    pub success: bool,
    pub error_message: Option<&'a str>,
    pub telegram_message_id: Option<i32>,
    pub sent_at: OffsetDateTime,
}

/// A user with a given notification type enabled.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Subscriber {
    pub telegram_user_id: i64,
    pub custom_name: Option<String>,
    /// The user's legacy settings document
    #[schema(value_type = Object)]
    pub user_settings: Json,
    /// Settings stored on the preference row
    #[schema(value_type = Object)]
    pub notification_settings: Json,
}

/// Legacy settings written for freshly registered users.
pub fn default_legacy_settings() -> Json {
    json!({
        "notifications_enabled": true,
        "sleep_reminders": true,
        "wake_reminders": true,
        "last_reminder_sent": null,
    })
}

/// Service for reading and writing notification preferences and history.
#[derive(Clone)]
pub struct NotificationStore {
    db: Arc<DatabaseConnection>,
}

impl NotificationStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Register a new user or refresh the profile of an existing one, then make sure
    /// the default preferences exist.
    ///
    /// Existing legacy settings and existing preferences are left untouched.
    #[tracing::instrument(skip(self, params), fields(telegram_user_id = params.telegram_user_id))]
    pub async fn register_user(&self, params: NewUser<'_>) -> Result<users::Model, StoreError> {
        let custom_name = params.custom_name.or(params.first_name).map(String::from);

        let user = match self.find_user_by_telegram_id(params.telegram_user_id).await? {
            Some(existing) => {
                let mut active: users::ActiveModel = existing.into();
                active.username = Set(params.username.map(String::from));
                active.first_name = Set(params.first_name.map(String::from));
                active.last_name = Set(params.last_name.map(String::from));
                active.custom_name = Set(custom_name);
                active.update(self.db()).await?
            }
            None => {
                let mut active = users::ActiveModel::new();
                active.telegram_user_id = Set(params.telegram_user_id);
                active.username = Set(params.username.map(String::from));
                active.first_name = Set(params.first_name.map(String::from));
                active.last_name = Set(params.last_name.map(String::from));
                active.custom_name = Set(custom_name);
                active.settings = Set(default_legacy_settings());
                active.created_at = Set(OffsetDateTime::now_utc());
                active.insert(self.db()).await?
            }
        };

        let created = self.initialize_user_notifications(user.id).await?;
        tracing::info!(
            user_id = %user.id,
            created_preferences = created,
            "Registered user"
        );
        Ok(user)
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_user_by_telegram_id(
        &self,
        telegram_user_id: i64,
    ) -> Result<Option<users::Model>, StoreError> {
        Ok(users::Entity::find()
            .filter(users::Column::TelegramUserId.eq(telegram_user_id))
            .one(self.db())
            .await?)
    }

    /// Like [`Self::find_user_by_telegram_id`] but a missing user is an error.
    pub async fn require_user(&self, telegram_user_id: i64) -> Result<users::Model, StoreError> {
        self.find_user_by_telegram_id(telegram_user_id)
            .await?
            .ok_or(StoreError::UserNotFound(telegram_user_id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn all_users(&self) -> Result<Vec<users::Model>, StoreError> {
        Ok(users::Entity::find()
            .order_by_asc(users::Column::CreatedAt)
            .all(self.db())
            .await?)
    }

    pub async fn count_users(&self) -> Result<u64, StoreError> {
        Ok(users::Entity::find().count(self.db()).await?)
    }

    // =========================================================================
    // Preferences
    // =========================================================================

    #[tracing::instrument(skip(self))]
    pub async fn get_user_notifications(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<notifications::Model>, StoreError> {
        Ok(notifications::Entity::find()
            .filter(notifications::Column::UserId.eq(user_id))
            .order_by_asc(notifications::Column::NotificationType)
            .all(self.db())
            .await?)
    }

    #[tracing::instrument(skip(self), fields(kind = %kind))]
    pub async fn find_preference(
        &self,
        user_id: Uuid,
        kind: &NotificationKind,
    ) -> Result<Option<notifications::Model>, StoreError> {
        Ok(notifications::Entity::find()
            .filter(notifications::Column::UserId.eq(user_id))
            .filter(notifications::Column::NotificationType.eq(kind.to_string()))
            .one(self.db())
            .await?)
    }

    /// Whether `kind` is enabled for the user. Users without a stored preference are
    /// treated as opted in.
    #[tracing::instrument(skip(self), fields(kind = %kind))]
    pub async fn is_notification_enabled(
        &self,
        user_id: Uuid,
        kind: &NotificationKind,
    ) -> Result<bool, StoreError> {
        Ok(self
            .find_preference(user_id, kind)
            .await?
            .is_none_or(|pref| pref.enabled))
    }

    /// Insert a preference row. Fails with [`StoreError::UniqueViolation`] if the user
    /// already has one for `kind`.
    #[tracing::instrument(skip(self, settings), fields(kind = %kind))]
    pub async fn create_preference(
        &self,
        user_id: Uuid,
        kind: &NotificationKind,
        enabled: bool,
        settings: Option<Json>,
    ) -> Result<notifications::Model, StoreError> {
        let now = OffsetDateTime::now_utc();
        let mut active = notifications::ActiveModel::new();
        active.user_id = Set(user_id);
        active.notification_type = Set(kind.to_string());
        active.enabled = Set(enabled);
        active.settings = Set(Some(settings.unwrap_or_else(|| json!({}))));
        active.created_at = Set(Some(now));
        active.updated_at = Set(Some(now));
        Ok(active.insert(self.db()).await?)
    }

    /// Create or update the user's preference for `kind` in a single statement.
    ///
    /// `updated_at` is bumped on every call. `settings` replaces the stored document
    /// only when provided.
    #[tracing::instrument(skip(self, settings), fields(kind = %kind))]
    pub async fn set_notification_preference(
        &self,
        user_id: Uuid,
        kind: &NotificationKind,
        enabled: bool,
        settings: Option<Json>,
    ) -> Result<notifications::Model, StoreError> {
        let now = OffsetDateTime::now_utc();
        let mut update_columns = vec![
            notifications::Column::Enabled,
            notifications::Column::UpdatedAt,
        ];
        if settings.is_some() {
            update_columns.push(notifications::Column::Settings);
        }

        let mut active = notifications::ActiveModel::new();
        active.user_id = Set(user_id);
        active.notification_type = Set(kind.to_string());
        active.enabled = Set(enabled);
        active.settings = Set(Some(settings.unwrap_or_else(|| json!({}))));
        active.created_at = Set(Some(now));
        active.updated_at = Set(Some(now));

        notifications::Entity::insert(active)
            .on_conflict(
                OnConflict::columns([
                    notifications::Column::UserId,
                    notifications::Column::NotificationType,
                ])
                .update_columns(update_columns)
                .to_owned(),
            )
            .exec_without_returning(self.db())
            .await?;

        self.find_preference(user_id, kind).await?.ok_or_else(|| {
            StoreError::Database(DbErr::RecordNotFound(format!(
                "notification preference {kind} for user {user_id}"
            )))
        })
    }

    /// Create the default preferences (all enabled) that the user does not have yet.
    /// Returns how many rows were inserted.
    #[tracing::instrument(skip(self))]
    pub async fn initialize_user_notifications(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let now = OffsetDateTime::now_utc();
        let rows = NotificationKind::DEFAULTS.map(|kind| {
            let mut active = notifications::ActiveModel::new();
            active.user_id = Set(user_id);
            active.notification_type = Set(kind.to_string());
            active.enabled = Set(true);
            active.settings = Set(Some(json!({})));
            active.created_at = Set(Some(now));
            active.updated_at = Set(Some(now));
            active
        });

        let inserted = notifications::Entity::insert_many(rows)
            .on_conflict(
                OnConflict::columns([
                    notifications::Column::UserId,
                    notifications::Column::NotificationType,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(self.db())
            .await?;
        Ok(inserted)
    }

    /// Derive preference rows from the user's legacy JSON settings.
    ///
    /// The `sleep_reminders` flag drives both sleep reminders and bedtime alerts;
    /// missing flags count as enabled.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn migrate_user_settings(
        &self,
        user: &users::Model,
    ) -> Result<Vec<notifications::Model>, StoreError> {
        let sleep = user.legacy_flag("sleep_reminders");
        let wake = user.legacy_flag("wake_reminders");

        let mut migrated = Vec::with_capacity(3);
        for (kind, enabled) in [
            (NotificationKind::SleepReminders, sleep),
            (NotificationKind::BedtimeAlerts, sleep),
            (NotificationKind::WakeReminders, wake),
        ] {
            migrated.push(
                self.set_notification_preference(user.id, &kind, enabled, None)
                    .await?,
            );
        }
        Ok(migrated)
    }

    /// All users with `kind` enabled, joined with their profile.
    #[tracing::instrument(skip(self), fields(kind = %kind))]
    pub async fn get_users_for_notification_type(
        &self,
        kind: &NotificationKind,
    ) -> Result<Vec<Subscriber>, StoreError> {
        let rows = notifications::Entity::find()
            .filter(notifications::Column::NotificationType.eq(kind.to_string()))
            .filter(notifications::Column::Enabled.eq(true))
            .order_by_asc(notifications::Column::CreatedAt)
            .find_also_related(users::Entity)
            .all(self.db())
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(pref, user)| {
                user.map(|user| Subscriber {
                    telegram_user_id: user.telegram_user_id,
                    custom_name: user.custom_name,
                    user_settings: user.settings,
                    notification_settings: pref.settings.unwrap_or_else(|| json!({})),
                })
            })
            .collect())
    }

    pub async fn count_preferences(&self) -> Result<u64, StoreError> {
        Ok(notifications::Entity::find().count(self.db()).await?)
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Append one delivery attempt to the history.
    #[tracing::instrument(skip(self, entry), fields(user_id = %entry.user_id, kind = %entry.kind, success = entry.success))]
    pub async fn log_notification_sent(
        &self,
        entry: NewHistoryEntry<'_>,
    ) -> Result<notification_history::Model, StoreError> {
        let mut active = notification_history::ActiveModel::new();
        active.user_id = Set(entry.user_id);
        active.notification_type = Set(entry.kind.to_string());
        active.child_id = Set(entry.child_id);
        active.sent_at = Set(Some(entry.sent_at.to_offset(UtcOffset::UTC)));
        active.message_text = Set(entry.message_text.map(String::from));
        active.success = Set(entry.success);
        active.error_message = Set(entry.error_message.map(String::from));
        active.telegram_message_id = Set(entry.telegram_message_id);
        Ok(active.insert(self.db()).await?)
    }

    /// The user's most recent deliveries, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn get_notification_history(
        &self,
        user_id: Uuid,
        kind: Option<&NotificationKind>,
        limit: u64,
    ) -> Result<Vec<notification_history::Model>, StoreError> {
        let mut query = notification_history::Entity::find()
            .filter(notification_history::Column::UserId.eq(user_id));
        if let Some(kind) = kind {
            query = query.filter(notification_history::Column::NotificationType.eq(kind.to_string()));
        }
        Ok(query
            .order_by_desc(notification_history::Column::SentAt)
            .limit(limit)
            .all(self.db())
            .await?)
    }

    /// Every delivery at or after `since`, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn history_since(
        &self,
        since: OffsetDateTime,
    ) -> Result<Vec<notification_history::Model>, StoreError> {
        // SQLite compares the stored text, so the bound must use the same UTC offset as
        // every written row.
        let since = since.to_offset(UtcOffset::UTC);
        Ok(notification_history::Entity::find()
            .filter(notification_history::Column::SentAt.gte(since))
            .order_by_asc(notification_history::Column::SentAt)
            .all(self.db())
            .await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn history_for_child(
        &self,
        child_id: Uuid,
    ) -> Result<Vec<notification_history::Model>, StoreError> {
        Ok(notification_history::Entity::find()
            .filter(notification_history::Column::ChildId.eq(child_id))
            .order_by_desc(notification_history::Column::SentAt)
            .all(self.db())
            .await?)
    }

    /// Anti-spam check: `false` while the latest successful delivery of `kind` is
    /// younger than `min_interval`.
    ///
    /// Only the last few attempts are inspected and failed attempts never block. With a
    /// `child_id`, only deliveries about that child count.
    #[tracing::instrument(skip(self), fields(kind = %kind))]
    pub async fn should_send_notification(
        &self,
        user_id: Uuid,
        kind: &NotificationKind,
        child_id: Option<Uuid>,
        min_interval: time::Duration,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let recent = self
            .get_notification_history(user_id, Some(kind), THROTTLE_LOOKBACK)
            .await?;

        // Rows without a timestamp cannot be dated and never block.
        let last_success = recent
            .iter()
            .filter(|entry| entry.success)
            .filter(|entry| child_id.is_none() || entry.child_id == child_id)
            .find_map(|entry| entry.sent_at);

        Ok(match last_success {
            Some(sent_at) => now - sent_at >= min_interval,
            None => true,
        })
    }
}
