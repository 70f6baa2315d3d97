//! OpenAPI/Utoipa configuration.

use crate::api::{health::MISC_TAG, notifications::NOTIFICATIONS_TAG};
use utoipa::OpenApi;

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sleep Notifications API",
        version = "1.0.0",
        description = "Per-user notification preferences and delivery history for the sleep tracking bot."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = NOTIFICATIONS_TAG, description = "Notification preference and history endpoints")
    )
)]
pub struct ApiDoc;
