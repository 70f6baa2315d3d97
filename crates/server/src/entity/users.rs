//! Bot users. Owned by the sleep tracker; notifications only reference it.

use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub telegram_user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub custom_name: Option<String>,
    /// Legacy per-user flags (`notifications_enabled`, `sleep_reminders`,
    /// `wake_reminders`), superseded by the `notifications` table.
    #[sea_orm(column_type = "JsonBinary")]
    pub settings: Json,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Model {
    /// Read a boolean flag from the legacy settings document, defaulting to enabled.
    pub fn legacy_flag(&self, key: &str) -> bool {
        self.settings
            .get(key)
            .and_then(Json::as_bool)
            .unwrap_or(true)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::children::Entity")]
    Children,
    #[sea_orm(has_many = "super::notifications::Entity")]
    Notifications,
    #[sea_orm(has_many = "super::notification_history::Entity")]
    NotificationHistory,
}

impl Related<super::children::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Children.def()
    }
}

impl Related<super::notifications::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notifications.def()
    }
}

impl Related<super::notification_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::NotificationHistory.def()
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
