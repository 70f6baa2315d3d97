//! Backfill of preference rows from the legacy `users.settings` document.
//!
//! Safe to rerun: every write is an upsert on (user, notification type).

use crate::entity::notifications::NotificationKind;
use crate::error::StoreError;
use crate::notifications::store::NotificationStore;
use serde::Serialize;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub migrated: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub total_users: u64,
    pub total_preferences: u64,
}

impl VerifyReport {
    /// Every user should end up with one row per default notification type.
    pub fn expected(&self) -> u64 {
        self.total_users * NotificationKind::DEFAULTS.len() as u64
    }

    pub fn passed(&self) -> bool {
        self.total_preferences >= self.expected()
    }
}

/// Migrate every user's legacy settings. A failing user is counted and skipped.
#[tracing::instrument(skip_all)]
pub async fn backfill_all(store: &NotificationStore) -> Result<BackfillReport, StoreError> {
    let users = store.all_users().await?;
    tracing::info!(users = users.len(), "Starting notification backfill");

    let mut report = BackfillReport::default();
    for user in &users {
        match store.migrate_user_settings(user).await {
            Ok(preferences) => {
                report.migrated += 1;
                tracing::debug!(
                    telegram_user_id = user.telegram_user_id,
                    preferences = preferences.len(),
                    "Migrated user"
                );
            }
            Err(e) => {
                report.errors += 1;
                tracing::warn!(
                    telegram_user_id = user.telegram_user_id,
                    error = %e,
                    "Failed to migrate user"
                );
            }
        }
    }

    tracing::info!(
        migrated = report.migrated,
        errors = report.errors,
        "Notification backfill finished"
    );
    Ok(report)
}

#[tracing::instrument(skip_all)]
pub async fn verify_backfill(store: &NotificationStore) -> Result<VerifyReport, StoreError> {
    let report = VerifyReport {
        total_users: store.count_users().await?,
        total_preferences: store.count_preferences().await?,
    };
    tracing::info!(
        total_users = report.total_users,
        total_preferences = report.total_preferences,
        expected = report.expected(),
        passed = report.passed(),
        "Backfill verification"
    );
    Ok(report)
}
