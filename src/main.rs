use realty::configuration::get_configuration;
use realty::startup::{run, AppState};
use realty::store::PgStore;
use realty::telemetry::init_telemetry;
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

fn startup_error(context: &str, e: impl std::fmt::Display) -> std::io::Error {
    tracing::error!(error = %e, "{}", context);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, e))
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry("realty");

    let configuration =
        get_configuration().map_err(|e| startup_error("Failed to read configuration", e))?;
    tracing::info!(
        environment = ?configuration.application.environment,
        "Configuration loaded"
    );

    let pool = PgPoolOptions::new()
        .max_connections(configuration.database.max_connections)
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| startup_error("Failed to create connection pool", e))?;
    tracing::info!("Database connection pool created");

    let store = Arc::new(PgStore::new(pool));
    store
        .migrate()
        .await
        .map_err(|e| startup_error("Failed to run migrations", e))?;

    let state = AppState::new(store, &configuration)
        .map_err(|e| startup_error("Failed to build application state", e))?;

    if let Some(admin) = &configuration.auth.bootstrap_admin {
        state
            .auth
            .ensure_admin(&admin.email, &admin.password)
            .await
            .map_err(|e| startup_error("Failed to bootstrap admin account", e))?;
    }

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!(address = %address, "Server listening");

    run(listener, state, configuration.jwt.clone())?.await
}
