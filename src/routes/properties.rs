use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::auth::Identity;
use crate::domain::{PropertyFilter, PropertyInput, PropertyPatch};
use crate::error::AppError;
use crate::startup::AppState;

/// GET /properties
///
/// Public search over approved listings. Newest first, paginated.
pub async fn list_properties(
    filter: web::Query<PropertyFilter>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let page = state.listings.list_public(&filter).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// POST /properties
///
/// Agents and admins only. The listing is owned by the caller and starts in
/// `pending` whatever the body says.
pub async fn create_property(
    identity: Identity,
    body: web::Json<PropertyInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let property = state.listings.create(&identity, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(serde_json::json!({ "property": property })))
}

/// GET /properties/mine
pub async fn list_my_properties(
    identity: Identity,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let properties = state.listings.list_mine(&identity).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "properties": properties })))
}

/// GET /properties/{id}
///
/// Anonymous callers only see approved listings; owners and admins also see
/// their non-approved ones. Anything else is a 404.
pub async fn get_property(
    identity: Option<Identity>,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let property = state
        .listings
        .get(identity.as_ref(), path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "property": property })))
}

/// PATCH /properties/{id}
pub async fn update_property(
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<PropertyPatch>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let property = state
        .listings
        .update(&identity, path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "property": property })))
}

/// DELETE /properties/{id}
pub async fn delete_property(
    identity: Identity,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.listings.delete(&identity, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Property deleted" })))
}

/// POST /properties/{id}/submit
pub async fn submit_property(
    identity: Identity,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let property = state.listings.submit(&identity, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "property": property })))
}
