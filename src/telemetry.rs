use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Build the JSON subscriber used by the server.
///
/// `RUST_LOG` wins over `default_filter` when set.
pub fn get_subscriber(default_filter: &str) -> impl Subscriber + Send + Sync {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .json()
        .flatten_event(true);

    Registry::default().with(env_filter).with(formatting_layer)
}

/// Install the subscriber globally. Call once, before the server starts.
pub fn init_telemetry(service: &str) {
    get_subscriber("info").init();
    tracing::info!(service = service, "Telemetry initialised");
}
