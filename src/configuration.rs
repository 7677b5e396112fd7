use config::ConfigError;
use serde::Deserialize;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub email_client: Option<EmailClientSettings>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub environment: Environment,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

/// Deployment environment. Outside production, recovery tokens are echoed
/// back in response bodies and cookies are not marked `Secure`.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    /// Server connection without a database, for creating one.
    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// JWT and refresh-session settings
#[derive(Deserialize, Clone, Debug)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    #[serde(default = "default_access_expiry")]
    pub access_token_expiry: i64, // seconds
    #[serde(default = "default_refresh_expiry")]
    pub refresh_token_expiry: i64, // seconds
    #[serde(default = "default_remember_expiry")]
    pub remember_refresh_token_expiry: i64, // seconds
}

fn default_access_expiry() -> i64 {
    15 * 60
}

fn default_refresh_expiry() -> i64 {
    7 * 24 * 60 * 60
}

fn default_remember_expiry() -> i64 {
    30 * 24 * 60 * 60
}

impl JwtSettings {
    /// Refresh-session lifetime for a login, in seconds.
    pub fn refresh_expiry(&self, remember: bool) -> i64 {
        if remember {
            self.remember_refresh_token_expiry
        } else {
            self.refresh_token_expiry
        }
    }
}

/// Account recovery, provisioning and hashing settings
#[derive(Deserialize, Clone, Debug)]
pub struct AuthSettings {
    #[serde(default = "default_reset_expiry")]
    pub reset_token_expiry: i64, // seconds
    #[serde(default = "default_verify_expiry")]
    pub verify_token_expiry: i64, // seconds
    #[serde(default = "default_temp_password_length")]
    pub temp_password_length: usize,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    #[serde(default = "default_forgot_max_requests")]
    pub forgot_password_max_requests: u32,
    #[serde(default = "default_forgot_window")]
    pub forgot_password_window: u64, // seconds
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

fn default_reset_expiry() -> i64 {
    30 * 60
}

fn default_verify_expiry() -> i64 {
    24 * 60 * 60
}

fn default_temp_password_length() -> usize {
    12
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_forgot_max_requests() -> u32 {
    5
}

fn default_forgot_window() -> u64 {
    15 * 60
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            reset_token_expiry: default_reset_expiry(),
            verify_token_expiry: default_verify_expiry(),
            temp_password_length: default_temp_password_length(),
            bcrypt_cost: default_bcrypt_cost(),
            forgot_password_max_requests: default_forgot_max_requests(),
            forgot_password_window: default_forgot_window(),
            bootstrap_admin: None,
        }
    }
}

/// Credentials for the admin account seeded at startup
#[derive(Deserialize, Clone, Debug)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct EmailClientSettings {
    pub base_url: String,
    pub sender_email: String,
    #[serde(default = "default_email_timeout")]
    pub timeout_milliseconds: u64,
}

fn default_email_timeout() -> u64 {
    10_000
}

impl EmailClientSettings {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_milliseconds)
    }
}

/// Load settings from `configuration.{yaml,toml,json}` (optional) overlaid
/// with `APP_`-prefixed environment variables, e.g. `APP_JWT__SECRET`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
