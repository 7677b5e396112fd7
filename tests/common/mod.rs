//! Shared harness: an in-process server over the memory store.

#![allow(dead_code)]

use reqwest::{Client, Response};
use serde_json::{json, Value};
use std::net::TcpListener;
use std::sync::Arc;

use realty::configuration::{
    ApplicationSettings, AuthSettings, DatabaseSettings, Environment, JwtSettings, Settings,
};
use realty::startup::{run, AppState};
use realty::store::MemoryStore;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-password";

pub struct TestApp {
    pub address: String,
    pub client: Client,
}

fn test_settings() -> Settings {
    Settings {
        database: DatabaseSettings {
            username: "postgres".to_string(),
            password: "password".to_string(),
            port: 5432,
            host: "localhost".to_string(),
            database_name: "realty_test".to_string(),
            max_connections: 1,
        },
        application: ApplicationSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: Environment::Local,
        },
        jwt: JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            issuer: "test".to_string(),
            access_token_expiry: 15 * 60,
            refresh_token_expiry: 7 * 24 * 3600,
            remember_refresh_token_expiry: 30 * 24 * 3600,
        },
        auth: AuthSettings {
            bcrypt_cost: 4,
            ..AuthSettings::default()
        },
        email_client: None,
    }
}

pub async fn spawn_app() -> TestApp {
    let settings = test_settings();
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store, &settings).expect("Failed to build application state");

    state
        .auth
        .ensure_admin(ADMIN_EMAIL, ADMIN_PASSWORD)
        .await
        .expect("Failed to seed admin");

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let server = run(listener, state, settings.jwt.clone()).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: Client::new(),
    }
}

/// Value of the `refreshToken` cookie set by a response, if any.
pub fn refresh_cookie(response: &Response) -> Option<String> {
    refresh_cookie_header(response).and_then(|header| {
        header
            .split(';')
            .next()
            .and_then(|pair| pair.strip_prefix("refreshToken="))
            .map(str::to_string)
    })
}

/// Full `Set-Cookie` header for `refreshToken`.
pub fn refresh_cookie_header(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("refreshToken="))
        .map(str::to_string)
}

pub fn listing_body(title: &str, price: f64) -> Value {
    json!({
        "title": title,
        "description": "Two bedrooms close to the park",
        "price": price,
        "currency": "EUR",
        "listingType": "sale",
        "propertyType": "apartment",
        "bedrooms": 2,
        "address": {
            "line1": "12 Rue de la Paix",
            "city": "Paris",
            "country": "FR"
        }
    })
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn post_json(&self, path: &str, body: &Value, token: Option<&str>) -> Response {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request.")
    }

    pub async fn patch_json(&self, path: &str, body: &Value, token: &str) -> Response {
        self.client
            .patch(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Response {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request.")
    }

    pub async fn delete(&self, path: &str, token: &str) -> Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn register(&self, email: &str, password: &str) -> Response {
        self.post_json(
            "/auth/register",
            &json!({
                "email": email,
                "password": password,
                "firstName": "Test",
                "lastName": "User"
            }),
            None,
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Response {
        self.post_json(
            "/auth/login",
            &json!({ "email": email, "password": password }),
            None,
        )
        .await
    }

    /// Access token and refresh cookie for a successful login.
    pub async fn login_tokens(&self, email: &str, password: &str) -> (String, String) {
        let response = self.login(email, password).await;
        assert_eq!(200, response.status().as_u16(), "login failed for {}", email);
        let refresh = refresh_cookie(&response).expect("No refresh cookie set");
        let body: Value = response.json().await.expect("Failed to parse body");
        let token = body["token"].as_str().expect("No access token").to_string();
        (token, refresh)
    }

    pub async fn admin_token(&self) -> String {
        self.login_tokens(ADMIN_EMAIL, ADMIN_PASSWORD).await.0
    }

    /// Registers a plain user and returns an access token for it.
    pub async fn user_token(&self, email: &str) -> String {
        let response = self.register(email, "user-password").await;
        assert_eq!(201, response.status().as_u16());
        self.login_tokens(email, "user-password").await.0
    }

    /// Provisions an agent and returns its temporary password.
    pub async fn create_agent(&self, email: &str) -> String {
        let admin = self.admin_token().await;
        let response = self
            .post_json(
                "/admin/agents",
                &json!({ "email": email, "firstName": "Agent", "lastName": "Smith" }),
                Some(&admin),
            )
            .await;
        assert_eq!(201, response.status().as_u16());
        let body: Value = response.json().await.expect("Failed to parse body");
        body["tempPassword"]
            .as_str()
            .expect("No temporary password")
            .to_string()
    }

    /// Resets a password through the forgot/reset flow.
    pub async fn reset_password(&self, email: &str, new_password: &str) -> Response {
        let response = self
            .post_json("/auth/forgot-password", &json!({ "email": email }), None)
            .await;
        assert_eq!(200, response.status().as_u16());
        let body: Value = response.json().await.expect("Failed to parse body");
        let reset_token = body["resetToken"].as_str().expect("No reset token");

        self.post_json(
            "/auth/reset-password",
            &json!({ "token": reset_token, "newPassword": new_password }),
            None,
        )
        .await
    }

    /// An agent that has replaced its temporary password, logged in.
    pub async fn ready_agent(&self, email: &str) -> String {
        self.create_agent(email).await;
        let response = self.reset_password(email, "agent-password").await;
        assert_eq!(200, response.status().as_u16());
        self.login_tokens(email, "agent-password").await.0
    }

    /// Creates a listing as `token` and returns its id.
    pub async fn create_listing(&self, token: &str, title: &str, price: f64) -> String {
        let response = self
            .post_json("/properties", &listing_body(title, price), Some(token))
            .await;
        assert_eq!(201, response.status().as_u16());
        let body: Value = response.json().await.expect("Failed to parse body");
        body["property"]["id"]
            .as_str()
            .expect("No property id")
            .to_string()
    }
}
