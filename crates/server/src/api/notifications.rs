//! Notification settings API.
//!
//! Users are addressed by their Telegram id, the identifier the bot knows them by:
//! - `GET /users/{telegram_user_id}/notifications` - list preferences
//! - `PUT /users/{telegram_user_id}/notifications/{notification_type}` - toggle / configure
//! - `GET /users/{telegram_user_id}/history` - recent deliveries
//! - `GET /notifications/{notification_type}/subscribers` - users with a type enabled

use crate::AppResources;
use crate::api::error::ApiError;
use crate::entity::notifications::NotificationKind;
use crate::entity::{notification_history, notifications};
use crate::notifications::{NotificationStore, Subscriber};
use axum::{
    Extension, Json,
    extract::{Path, Query},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const NOTIFICATIONS_TAG: &str = "Notifications";

/// Upper bound for `limit` on history queries.
pub const MAX_HISTORY_LIMIT: u64 = 500;

#[derive(Debug, Serialize, ToSchema)]
pub struct PreferencesResponse {
    pub telegram_user_id: i64,
    pub preferences: Vec<notifications::Model>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePreferenceRequest {
    /// Whether notifications of this type should be sent
    pub enabled: bool,
    /// Replacement settings document; omit to keep the stored one
    #[schema(value_type = Option<Object>)]
    pub settings: Option<Value>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    /// Only return deliveries of this type
    pub notification_type: Option<String>,
    /// Maximum number of entries, newest first
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub telegram_user_id: i64,
    pub entries: Vec<notification_history::Model>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubscribersResponse {
    pub notification_type: String,
    pub subscribers: Vec<Subscriber>,
    pub total: usize,
}

/// Creates the notifications API router.
#[tracing::instrument(skip_all)]
pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(list_preferences))
        .routes(routes!(update_preference))
        .routes(routes!(list_history))
        .routes(routes!(list_subscribers))
}

fn parse_kind(notification_type: &str) -> Result<NotificationKind, ApiError> {
    let trimmed = notification_type.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request("Notification type cannot be empty"));
    }
    Ok(NotificationKind::from(trimmed))
}

/// List all notification preferences of a user.
#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/users/{telegram_user_id}/notifications",
    tag = NOTIFICATIONS_TAG,
    operation_id = "List Notification Preferences",
    summary = "List a user's notification preferences",
    description = "Returns the stored preference rows of the user.\n\n\
                   **Note:** A notification type without a stored row is treated as enabled.",
    params(("telegram_user_id" = i64, Path, description = "Telegram user id")),
    responses(
        (status = 200, description = "Stored preferences", body = PreferencesResponse),
        (status = 404, description = "Unknown user", body = ApiError),
    )
)]
async fn list_preferences(
    Extension(resources): Extension<AppResources>,
    Path(telegram_user_id): Path<i64>,
) -> Result<Json<PreferencesResponse>, ApiError> {
    let store = NotificationStore::new(resources.db.clone());
    let user = store.require_user(telegram_user_id).await?;
    let preferences = store.get_user_notifications(user.id).await?;

    Ok(Json(PreferencesResponse {
        telegram_user_id,
        preferences,
    }))
}

/// Create or update one notification preference.
#[tracing::instrument(skip(resources, payload), fields(enabled = payload.enabled))]
#[utoipa::path(
    put,
    path = "/users/{telegram_user_id}/notifications/{notification_type}",
    tag = NOTIFICATIONS_TAG,
    operation_id = "Set Notification Preference",
    summary = "Enable, disable or configure a notification type",
    description = "Upserts the preference for the user and notification type.\n\n\
                   Known types: `sleep_reminders`, `bedtime_alerts`, `wake_reminders`. Other \
                   values are stored as given.\n\n\
                   **Settings:** when `settings` is omitted the stored document is kept; \
                   when present it must be a JSON object and replaces the stored one.",
    params(
        ("telegram_user_id" = i64, Path, description = "Telegram user id"),
        ("notification_type" = String, Path, description = "Notification type", example = "sleep_reminders"),
    ),
    request_body(content = UpdatePreferenceRequest, description = "New preference state"),
    responses(
        (status = 200, description = "Preference after the update", body = notifications::Model),
        (status = 400, description = "Invalid notification type or settings", body = ApiError),
        (status = 404, description = "Unknown user", body = ApiError),
    )
)]
async fn update_preference(
    Extension(resources): Extension<AppResources>,
    Path((telegram_user_id, notification_type)): Path<(i64, String)>,
    Json(payload): Json<UpdatePreferenceRequest>,
) -> Result<Json<notifications::Model>, ApiError> {
    let kind = parse_kind(&notification_type)?;
    if payload.settings.as_ref().is_some_and(|s| !s.is_object()) {
        return Err(ApiError::bad_request("settings must be a JSON object"));
    }

    let store = NotificationStore::new(resources.db.clone());
    let user = store.require_user(telegram_user_id).await?;
    let preference = store
        .set_notification_preference(user.id, &kind, payload.enabled, payload.settings)
        .await?;

    tracing::info!(
        telegram_user_id,
        kind = %kind,
        enabled = preference.enabled,
        "Updated notification preference"
    );

    Ok(Json(preference))
}

/// Recent notification deliveries of a user.
#[tracing::instrument(skip(resources, params))]
#[utoipa::path(
    get,
    path = "/users/{telegram_user_id}/history",
    tag = NOTIFICATIONS_TAG,
    operation_id = "List Notification History",
    summary = "List a user's notification history",
    description = "Returns delivery attempts, newest first, including failed ones.",
    params(
        ("telegram_user_id" = i64, Path, description = "Telegram user id"),
        HistoryParams,
    ),
    responses(
        (status = 200, description = "Delivery history", body = HistoryResponse),
        (status = 400, description = "Invalid query", body = ApiError),
        (status = 404, description = "Unknown user", body = ApiError),
    )
)]
async fn list_history(
    Extension(resources): Extension<AppResources>,
    Path(telegram_user_id): Path<i64>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let kind = params
        .notification_type
        .as_deref()
        .map(parse_kind)
        .transpose()?;
    let limit = params
        .limit
        .unwrap_or(resources.config.notifications.history_limit);
    if limit == 0 || limit > MAX_HISTORY_LIMIT {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {MAX_HISTORY_LIMIT}"
        )));
    }

    let store = NotificationStore::new(resources.db.clone());
    let user = store.require_user(telegram_user_id).await?;
    let entries = store
        .get_notification_history(user.id, kind.as_ref(), limit)
        .await?;

    Ok(Json(HistoryResponse {
        telegram_user_id,
        entries,
    }))
}

/// Users with a notification type enabled.
#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/notifications/{notification_type}/subscribers",
    tag = NOTIFICATIONS_TAG,
    operation_id = "List Subscribers",
    summary = "List users with a notification type enabled",
    params(("notification_type" = String, Path, description = "Notification type", example = "bedtime_alerts")),
    responses(
        (status = 200, description = "Subscribed users", body = SubscribersResponse),
        (status = 400, description = "Invalid notification type", body = ApiError),
    )
)]
async fn list_subscribers(
    Extension(resources): Extension<AppResources>,
    Path(notification_type): Path<String>,
) -> Result<Json<SubscribersResponse>, ApiError> {
    let kind = parse_kind(&notification_type)?;
    let store = NotificationStore::new(resources.db.clone());
    let subscribers = store.get_users_for_notification_type(&kind).await?;

    Ok(Json(SubscribersResponse {
        notification_type: kind.to_string(),
        total: subscribers.len(),
        subscribers,
    }))
}
