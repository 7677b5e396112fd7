//! Integration tests for admin-provisioned agent accounts

mod common;

use common::{listing_body, spawn_app};
use serde_json::{json, Value};

#[tokio::test]
async fn create_agent_requires_admin() {
    let app = spawn_app().await;
    let user = app.user_token("user@example.com").await;
    let body = json!({ "email": "agent@example.com", "firstName": "A", "lastName": "B" });

    let anonymous = app.post_json("/admin/agents", &body, None).await;
    assert_eq!(401, anonymous.status().as_u16());

    let as_user = app.post_json("/admin/agents", &body, Some(&user)).await;
    assert_eq!(403, as_user.status().as_u16());
}

#[tokio::test]
async fn create_agent_returns_temp_password_once() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let response = app
        .post_json(
            "/admin/agents",
            &json!({ "email": "Agent@Example.com", "firstName": "Ada", "lastName": "Lovelace" }),
            Some(&admin),
        )
        .await;

    assert_eq!(201, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["agent"]["email"], "agent@example.com");
    assert_eq!(body["agent"]["role"], "agent");
    assert_eq!(body["agent"]["mustChangePassword"], true);
    assert_eq!(body["agent"]["createdByAdmin"], true);
    assert_eq!(body["tempPassword"].as_str().unwrap().len(), 12);
}

#[tokio::test]
async fn create_agent_returns_409_for_existing_email() {
    let app = spawn_app().await;
    app.create_agent("twice@example.com").await;
    let admin = app.admin_token().await;

    let response = app
        .post_json(
            "/admin/agents",
            &json!({ "email": "twice@example.com", "firstName": "A", "lastName": "B" }),
            Some(&admin),
        )
        .await;

    assert_eq!(409, response.status().as_u16());
}

#[tokio::test]
async fn create_agent_returns_400_without_names() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let response = app
        .post_json(
            "/admin/agents",
            &json!({ "email": "nameless@example.com" }),
            Some(&admin),
        )
        .await;

    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
async fn flagged_agent_is_locked_until_password_reset() {
    let app = spawn_app().await;
    let temp_password = app.create_agent("fresh@example.com").await;

    let response = app.login("fresh@example.com", &temp_password).await;
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["mustChangePassword"], true);
    let token = body["token"].as_str().unwrap().to_string();

    let response = app
        .post_json("/properties", &listing_body("Locked", 1000.0), Some(&token))
        .await;
    assert_eq!(423, response.status().as_u16());

    let response = app.get("/properties/mine", Some(&token)).await;
    assert_eq!(423, response.status().as_u16());

    let response = app.reset_password("fresh@example.com", "agent-password").await;
    assert_eq!(200, response.status().as_u16());

    let (token, _) = app.login_tokens("fresh@example.com", "agent-password").await;
    let response = app
        .post_json("/properties", &listing_body("Unlocked", 1000.0), Some(&token))
        .await;
    assert_eq!(201, response.status().as_u16());
}

#[tokio::test]
async fn users_cannot_create_listings() {
    let app = spawn_app().await;
    let user = app.user_token("buyer@example.com").await;

    let response = app
        .post_json("/properties", &listing_body("Nope", 1000.0), Some(&user))
        .await;

    assert_eq!(403, response.status().as_u16());
}

#[tokio::test]
async fn moderation_queue_is_admin_only() {
    let app = spawn_app().await;
    let agent = app.ready_agent("queue-agent@example.com").await;

    let response = app.get("/admin/properties", Some(&agent)).await;
    assert_eq!(403, response.status().as_u16());

    let admin = app.admin_token().await;
    let response = app.get("/admin/properties", Some(&admin)).await;
    assert_eq!(200, response.status().as_u16());
}
