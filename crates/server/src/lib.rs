//! Notification preferences and delivery history for the baby sleep tracker bot.
//!
//! Users choose per notification type whether the bot may message them. Every
//! delivery attempt is recorded, and the history drives throttling so the same
//! reminder is not sent twice within the configured interval.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;

pub mod api;
pub mod config;
pub mod entity;
pub mod error;
pub mod notifications;

#[derive(Clone, Debug)]
pub struct AppResources {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
}
