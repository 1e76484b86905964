use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use super::common::{success_response, validate_input};
use crate::{
    auth::AuthenticatedActor, errors::ServiceError, notifications::Notification, AppState,
};

const DEFAULT_LIMIT: usize = 50;

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationQuery {
    /// Newest notifications returned, at most 200
    #[validate(range(min = 1, max = 200))]
    pub limit: Option<usize>,
}

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/:id/read", post(mark_notification_read))
}

/// Notifications addressed to the caller or the caller's role
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    params(NotificationQuery),
    responses(
        (status = 200, description = "Newest first", body = crate::ApiResponse<Vec<Notification>>)
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(query): Query<NotificationQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&query)?;
    let notifications = state
        .notifications
        .list_for(&actor, query.limit.unwrap_or(DEFAULT_LIMIT))
        .await?;
    Ok(success_response(notifications))
}

/// Mark a notification as read
#[utoipa::path(
    post,
    path = "/api/v1/notifications/{id}/read",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked", body = crate::ApiResponse<Notification>),
        (status = 404, description = "No such notification for the caller", body = crate::errors::ErrorResponse)
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let notification = state.notifications.mark_as_read(&actor, id).await?;
    Ok(success_response(notification))
}
