use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::auth::Identity;
use crate::error::AppError;
use crate::startup::AppState;

/// GET /favorites
pub async fn list_favorites(
    identity: web::ReqData<Identity>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let properties = state.favorites.list(&identity).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "properties": properties })))
}

/// POST /favorites/{property_id}
pub async fn add_favorite(
    identity: web::ReqData<Identity>,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.favorites.add(&identity, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Added to favorites" })))
}

/// DELETE /favorites/{property_id}
pub async fn remove_favorite(
    identity: web::ReqData<Identity>,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.favorites.remove(&identity, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Removed from favorites" })))
}
