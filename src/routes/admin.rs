//! Admin routes. Every handler here sits behind `JwtMiddleware` and
//! `RequireRole(Admin)`, so the identity is read from request data.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{CreateAgentRequest, Identity};
use crate::domain::{PropertyFilter, PublicUser};
use crate::error::AppError;
use crate::startup::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentResponse {
    pub agent: PublicUser,
    /// Shown once; only its hash is stored
    pub temp_password: String,
}

#[derive(Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

/// POST /admin/agents
pub async fn create_agent(
    admin: web::ReqData<Identity>,
    body: web::Json<CreateAgentRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let provisioned = state.auth.create_agent(&admin, body.into_inner()).await?;

    Ok(HttpResponse::Created().json(CreateAgentResponse {
        agent: provisioned.agent,
        temp_password: provisioned.temp_password,
    }))
}

/// GET /admin/properties?status=pending
pub async fn moderation_queue(
    admin: web::ReqData<Identity>,
    filter: web::Query<PropertyFilter>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let page = state.listings.list_for_moderation(&admin, &filter).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// POST /admin/properties/{id}/approve
pub async fn approve_property(
    admin: web::ReqData<Identity>,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let property = state.listings.approve(&admin, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "property": property })))
}

/// POST /admin/properties/{id}/reject
///
/// Body `{ "reason": "..." }`; a missing or blank reason is a 400.
pub async fn reject_property(
    admin: web::ReqData<Identity>,
    path: web::Path<Uuid>,
    body: Option<web::Json<RejectRequest>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let reason = body.and_then(|b| b.into_inner().reason);
    let property = state
        .listings
        .reject(&admin, path.into_inner(), &reason)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "property": property })))
}
