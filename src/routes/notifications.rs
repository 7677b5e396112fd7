use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::auth::Identity;
use crate::error::AppError;
use crate::startup::AppState;

/// GET /notifications, newest first
pub async fn list_notifications(
    identity: web::ReqData<Identity>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let notifications = state.notifications.list(identity.id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "notifications": notifications })))
}

/// POST /notifications/{id}/read
pub async fn mark_notification_read(
    identity: web::ReqData<Identity>,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state
        .notifications
        .mark_read(identity.id, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Notification marked as read" })))
}
