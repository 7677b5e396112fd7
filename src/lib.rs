pub mod audit;
pub mod auth;
pub mod configuration;
pub mod domain;
pub mod email_client;
pub mod error;
pub mod favorites;
pub mod logger;
pub mod middleware;
pub mod moderation;
pub mod notifications;
pub mod routes;
pub mod security;
pub mod startup;
pub mod store;
pub mod telemetry;
pub mod validators;
