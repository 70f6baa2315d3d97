//! Notification preference entity - one row per user and notification type.
//!
//! The `(user_id, notification_type)` pair is unique. `updated_at` is not maintained by
//! the database, every writer sets it explicitly.

use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

/// Notification categories known to the bot.
///
/// The column itself is free text, so anything else round-trips through `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    /// Reminder to log a sleep session
    SleepReminders,
    /// Child's next nap is due soon
    BedtimeAlerts,
    /// Child should be woken up
    WakeReminders,
    Other(String),
}

impl NotificationKind {
    /// Categories every new user starts with, all enabled.
    pub const DEFAULTS: [NotificationKind; 3] = [
        NotificationKind::SleepReminders,
        NotificationKind::BedtimeAlerts,
        NotificationKind::WakeReminders,
    ];
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::SleepReminders => write!(f, "sleep_reminders"),
            NotificationKind::BedtimeAlerts => write!(f, "bedtime_alerts"),
            NotificationKind::WakeReminders => write!(f, "wake_reminders"),
            NotificationKind::Other(name) => write!(f, "{}", name),
        }
    }
}

impl From<&str> for NotificationKind {
    fn from(s: &str) -> Self {
        match s {
            "sleep_reminders" => NotificationKind::SleepReminders,
            "bedtime_alerts" => NotificationKind::BedtimeAlerts,
            "wake_reminders" => NotificationKind::WakeReminders,
            other => NotificationKind::Other(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "notifications")]
#[schema(as = NotificationPreference)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_type: String,
    pub enabled: bool,
    /// Type specific configuration. This service always writes a document (`{}` when
    /// unset); NULL only comes from other writers.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    #[schema(value_type = Option<Object>)]
    pub settings: Option<Json>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {
    fn new() -> Self {
        Self {
            id: Set(Uuid::new_v4()),
            ..ActiveModelTrait::default()
        }
    }
}
