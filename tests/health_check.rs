//! Integration tests for the health check and fallback routes

mod common;

use common::spawn_app;

#[tokio::test]
async fn health_check_works() {
    let app = spawn_app().await;

    let response = app.get("/health_check", None).await;

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let app = spawn_app().await;

    let response = app.get("/health_check", None).await;

    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
}

#[tokio::test]
async fn unknown_route_returns_404_json() {
    let app = spawn_app().await;

    let response = app.get("/does-not-exist", None).await;

    assert_eq!(404, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn error_id_matches_request_id_header() {
    let app = spawn_app().await;

    // handler error and a rejection from the auth middleware
    for path in ["/does-not-exist", "/favorites"] {
        let response = app.get(path, None).await;
        assert!(response.status().is_client_error());

        let request_id = response.headers()["x-request-id"]
            .to_str()
            .unwrap()
            .to_string();
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error_id"], request_id.as_str(), "path {}", path);
    }
}

#[tokio::test]
async fn successful_responses_carry_request_id() {
    let app = spawn_app().await;

    let first = app.get("/health_check", None).await;
    let second = app.get("/health_check", None).await;

    assert_ne!(first.headers()["x-request-id"], second.headers()["x-request-id"]);
}
