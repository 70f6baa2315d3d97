//! Notification preferences and delivery history.
//!
//! - `notifications`: one row per (user, notification type) with the enabled flag and
//!   type specific settings
//! - `notification_history`: append-only log of every delivery attempt
//!
//! Every statement is guarded so the migration can be reapplied safely.

use sea_orm_migration::sea_orm::{ConnectionTrait, DatabaseBackend};
use sea_orm_migration::{prelude::*, schema::*};

use crate::m20250801_000001_create_users_and_children::{Children, Users};
use crate::uuid_pk;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Postgres only, SQLite has no comment syntax.
const POSTGRES_COMMENTS: &[&str] = &[
    "COMMENT ON TABLE notifications IS 'User notification preferences, one row per user and notification type'",
    "COMMENT ON COLUMN notifications.notification_type IS 'Type of notification: sleep_reminders, bedtime_alerts, wake_reminders'",
    "COMMENT ON COLUMN notifications.settings IS 'Notification type specific settings'",
    "COMMENT ON TABLE notification_history IS 'Audit log of notifications sent to users'",
    "COMMENT ON COLUMN notification_history.telegram_message_id IS 'Telegram message id returned on successful delivery'",
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();

        manager
            .create_table(
                Table::create()
                    .table(Notifications::Table)
                    .if_not_exists()
                    .col(uuid_pk(backend, Notifications::Id))
                    .col(uuid(Notifications::UserId))
                    .col(text(Notifications::NotificationType))
                    .col(boolean(Notifications::Enabled).default(true))
                    .col(json_binary_null(Notifications::Settings).default(Expr::cust("'{}'")))
                    .col(
                        timestamp_with_time_zone_null(Notifications::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone_null(Notifications::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notifications_user_id")
                            .from(Notifications::Table, Notifications::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One preference row per user and type
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("notifications_user_id_notification_type_key")
                    .table(Notifications::Table)
                    .col(Notifications::UserId)
                    .col(Notifications::NotificationType)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_notifications_user_type")
                    .table(Notifications::Table)
                    .col(Notifications::UserId)
                    .col(Notifications::NotificationType)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_notifications_type_enabled")
                    .table(Notifications::Table)
                    .col(Notifications::NotificationType)
                    .col(Notifications::Enabled)
                    .to_owned(),
            )
            .await?;

        // Partial index over the enabled subset. sea-query has no builder for the WHERE
        // clause, the statement is valid on both Postgres and SQLite.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX IF NOT EXISTS idx_notifications_enabled \
                 ON notifications (enabled) WHERE enabled = TRUE",
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(NotificationHistory::Table)
                    .if_not_exists()
                    .col(uuid_pk(backend, NotificationHistory::Id))
                    .col(uuid(NotificationHistory::UserId))
                    .col(text(NotificationHistory::NotificationType))
                    .col(uuid_null(NotificationHistory::ChildId))
                    .col(
                        timestamp_with_time_zone_null(NotificationHistory::SentAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(text_null(NotificationHistory::MessageText))
                    .col(boolean(NotificationHistory::Success).default(true))
                    .col(text_null(NotificationHistory::ErrorMessage))
                    .col(integer_null(NotificationHistory::TelegramMessageId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_history_user_id")
                            .from(NotificationHistory::Table, NotificationHistory::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_history_child_id")
                            .from(NotificationHistory::Table, NotificationHistory::ChildId)
                            .to(Children::Table, Children::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_notification_history_user_type")
                    .table(NotificationHistory::Table)
                    .col(NotificationHistory::UserId)
                    .col(NotificationHistory::NotificationType)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_notification_history_sent_at")
                    .table(NotificationHistory::Table)
                    .col(NotificationHistory::SentAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_notification_history_child_id")
                    .table(NotificationHistory::Table)
                    .col(NotificationHistory::ChildId)
                    .to_owned(),
            )
            .await?;

        if backend == DatabaseBackend::Postgres {
            let conn = manager.get_connection();
            for statement in POSTGRES_COMMENTS {
                conn.execute_unprepared(statement).await?;
            }
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop indexes first
        for name in [
            "idx_notification_history_child_id",
            "idx_notification_history_sent_at",
            "idx_notification_history_user_type",
            "idx_notifications_enabled",
            "idx_notifications_type_enabled",
            "idx_notifications_user_type",
            "notifications_user_id_notification_type_key",
        ] {
            manager
                .drop_index(Index::drop().name(name).to_owned())
                .await?;
        }

        manager
            .drop_table(
                Table::drop()
                    .table(NotificationHistory::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Notifications::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Notifications {
    Table,
    Id,
    UserId,
    NotificationType,
    Enabled,
    Settings,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum NotificationHistory {
    Table,
    Id,
    UserId,
    NotificationType,
    ChildId,
    SentAt,
    MessageText,
    Success,
    ErrorMessage,
    TelegramMessageId,
}
