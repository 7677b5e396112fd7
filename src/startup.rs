use actix_web::dev::Server;
use actix_web::{error::InternalError, web, App, HttpRequest, HttpResponse, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::configuration::{Environment, JwtSettings, Settings};
use crate::domain::Role;
use crate::email_client::EmailClient;
use crate::error::{AppError, ValidationError};
use crate::favorites::FavoriteService;
use crate::logger::LoggerMiddleware;
use crate::middleware::{JwtMiddleware, RequireRole};
use crate::moderation::ListingService;
use crate::notifications::NotificationService;
use crate::routes;
use crate::security;
use crate::store::{FavoriteStore, NotificationStore, PropertyStore, UserStore};

/// Services shared by every worker
pub struct AppState {
    pub auth: AuthService,
    pub listings: ListingService,
    pub favorites: FavoriteService,
    pub notifications: NotificationService,
    pub environment: Environment,
}

impl AppState {
    /// Wire every service to `store`.
    pub fn new<S>(store: Arc<S>, settings: &Settings) -> Result<Self, AppError>
    where
        S: UserStore + PropertyStore + FavoriteStore + NotificationStore + 'static,
    {
        let email_client = settings
            .email_client
            .as_ref()
            .map(EmailClient::from_settings)
            .transpose()?;

        let users: Arc<dyn UserStore> = store.clone();
        let properties: Arc<dyn PropertyStore> = store.clone();
        let favorites: Arc<dyn FavoriteStore> = store.clone();
        let notifications: Arc<dyn NotificationStore> = store;

        let notifier = NotificationService::new(
            favorites.clone(),
            notifications,
            users.clone(),
            email_client.clone(),
        );

        Ok(Self {
            auth: AuthService::new(
                users.clone(),
                settings.jwt.clone(),
                settings.auth.clone(),
                settings.application.environment,
                email_client,
            ),
            listings: ListingService::new(properties.clone(), users, notifier.clone()),
            favorites: FavoriteService::new(favorites, properties),
            notifications: notifier,
            environment: settings.application.environment,
        })
    }
}

fn json_error_handler(err: actix_web::error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(error = %err, "Malformed JSON body");
    let app_error = AppError::Validation(ValidationError::InvalidFormat("request body".to_string()));
    let response = actix_web::ResponseError::error_response(&app_error);
    InternalError::from_response(err, response).into()
}

fn query_error_handler(err: actix_web::error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(error = %err, "Malformed query string");
    let app_error = AppError::Validation(ValidationError::InvalidFormat("query".to_string()));
    let response = actix_web::ResponseError::error_response(&app_error);
    InternalError::from_response(err, response).into()
}

async fn not_found() -> HttpResponse {
    actix_web::ResponseError::error_response(&AppError::not_found("Route not found"))
}

pub fn run(
    listener: TcpListener,
    state: AppState,
    jwt_config: JwtSettings,
) -> Result<Server, std::io::Error> {
    let state = web::Data::new(state);
    let jwt_config_data = web::Data::new(jwt_config.clone());

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(security::default_headers())
            .wrap(LoggerMiddleware)
            // Shared state
            .app_data(state.clone())
            .app_data(jwt_config_data.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::QueryConfig::default().error_handler(query_error_handler))
            // Public routes
            .route("/health_check", web::get().to(routes::health_check))
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(routes::register))
                    .route("/login", web::post().to(routes::login))
                    .route("/refresh", web::post().to(routes::refresh))
                    .route("/logout", web::post().to(routes::logout))
                    .route("/profile", web::get().to(routes::get_profile))
                    .route("/forgot-password", web::post().to(routes::forgot_password))
                    .route("/reset-password", web::post().to(routes::reset_password))
                    .route("/verify-email", web::post().to(routes::verify_email)),
            )
            // Admin routes: JwtMiddleware runs first, then the role gate
            .service(
                web::scope("/admin")
                    .wrap(RequireRole::new(&[Role::Admin]))
                    .wrap(JwtMiddleware::new(jwt_config.clone()))
                    .route("/agents", web::post().to(routes::create_agent))
                    .route("/properties", web::get().to(routes::moderation_queue))
                    .route("/properties/{id}/approve", web::post().to(routes::approve_property))
                    .route("/properties/{id}/reject", web::post().to(routes::reject_property)),
            )
            // Listings mix anonymous and authenticated callers; handlers
            // extract the identity themselves
            .service(
                web::scope("/properties")
                    .route("", web::get().to(routes::list_properties))
                    .route("", web::post().to(routes::create_property))
                    .route("/mine", web::get().to(routes::list_my_properties))
                    .route("/{id}", web::get().to(routes::get_property))
                    .route("/{id}", web::patch().to(routes::update_property))
                    .route("/{id}", web::delete().to(routes::delete_property))
                    .route("/{id}/submit", web::post().to(routes::submit_property)),
            )
            .service(
                web::scope("/favorites")
                    .wrap(JwtMiddleware::new(jwt_config.clone()))
                    .route("", web::get().to(routes::list_favorites))
                    .route("/{property_id}", web::post().to(routes::add_favorite))
                    .route("/{property_id}", web::delete().to(routes::remove_favorite)),
            )
            .service(
                web::scope("/notifications")
                    .wrap(JwtMiddleware::new(jwt_config.clone()))
                    .route("", web::get().to(routes::list_notifications))
                    .route("/{id}/read", web::post().to(routes::mark_notification_read)),
            )
            .default_service(web::route().to(not_found))
    })
    .listen(listener)?
    .run();

    Ok(server)
}
