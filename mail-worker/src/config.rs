//! Configuration module for environment variable parsing.
//!
//! Every setting is read from a `MAIL_SERVICE_*` environment variable and
//! falls back to a default suitable for local development.

use std::env;
use std::fmt;

use anyhow::{Context, Result};
use tracing::warn;
use url::Url;

use crate::delivery::MAILTRAP_SEND_URL;
use crate::queue::{DEFAULT_MAIL_EXCHANGE, DEFAULT_MAIL_QUEUE};

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Verbose logging and environment dump at startup
    pub debug: bool,

    /// RabbitMQ host
    pub rabbit_host: String,

    /// RabbitMQ port
    pub rabbit_port: u16,

    /// RabbitMQ username
    pub rabbit_username: String,

    /// RabbitMQ password
    pub rabbit_password: String,

    /// RabbitMQ virtual host
    pub rabbit_vhost: String,

    /// AMQP heartbeat interval in seconds
    pub rabbit_heartbeat_secs: u16,

    /// Durable direct exchange the mail queue is bound to
    pub exchange_name: String,

    /// Durable queue holding mail jobs
    pub queue_name: String,

    /// Routing key binding the queue to the exchange
    pub routing_key: String,

    /// Sender address for outgoing mail
    pub mailtrap_sender_email: String,

    /// Mailtrap API token
    pub mailtrap_api_key: String,

    /// Mailtrap send endpoint
    pub mailtrap_api_url: String,

    /// HTTP request timeout for the delivery call in milliseconds
    pub request_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let queue_name = string("MAIL_SERVICE_QUEUE_NAME", DEFAULT_MAIL_QUEUE);

        Config {
            debug: lookup("MAIL_SERVICE_DEBUG")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),

            rabbit_host: string("MAIL_SERVICE_RABBIT_HOST", "localhost"),

            rabbit_port: parse_number(&lookup, "MAIL_SERVICE_RABBIT_PORT", 5672),

            rabbit_username: string("MAIL_SERVICE_RABBIT_USERNAME", "root"),

            rabbit_password: string("MAIL_SERVICE_RABBIT_PASSWORD", "secret"),

            rabbit_vhost: string("MAIL_SERVICE_RABBIT_VHOST", "/"),

            rabbit_heartbeat_secs: parse_number(&lookup, "MAIL_SERVICE_RABBIT_HEARTBEAT", 600),

            exchange_name: string("MAIL_SERVICE_EXCHANGE_NAME", DEFAULT_MAIL_EXCHANGE),

            routing_key: string("MAIL_SERVICE_ROUTING_KEY", &queue_name),

            queue_name,

            mailtrap_sender_email: string("MAIL_SERVICE_MAILTRAP_EMAIL", ""),

            mailtrap_api_key: string("MAIL_SERVICE_MAILTRAP_API_KEY", ""),

            mailtrap_api_url: string("MAIL_SERVICE_MAILTRAP_API_URL", MAILTRAP_SEND_URL),

            request_timeout_ms: parse_number(&lookup, "MAIL_SERVICE_REQUEST_TIMEOUT_MS", 30_000),
        }
    }

    /// Build the AMQP connection URI, percent-encoding credentials and vhost.
    pub fn amqp_url(&self) -> Result<String> {
        let mut url = Url::parse(&format!("amqp://{}:{}", self.rabbit_host, self.rabbit_port))
            .with_context(|| format!("Invalid RabbitMQ host `{}`", self.rabbit_host))?;

        url.set_username(&self.rabbit_username)
            .map_err(|_| anyhow::anyhow!("Cannot set RabbitMQ username"))?;
        url.set_password(Some(&self.rabbit_password))
            .map_err(|_| anyhow::anyhow!("Cannot set RabbitMQ password"))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("RabbitMQ URL cannot carry a vhost"))?
            .push(&self.rabbit_vhost);
        url.query_pairs_mut()
            .append_pair("heartbeat", &self.rabbit_heartbeat_secs.to_string());

        Ok(url.to_string())
    }

    /// Whether both Mailtrap settings needed for real sends are present.
    pub fn mailtrap_configured(&self) -> bool {
        !self.mailtrap_sender_email.is_empty() && !self.mailtrap_api_key.is_empty()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("debug", &self.debug)
            .field("rabbit_host", &self.rabbit_host)
            .field("rabbit_port", &self.rabbit_port)
            .field("rabbit_username", &self.rabbit_username)
            .field("rabbit_password", &"<redacted>")
            .field("rabbit_vhost", &self.rabbit_vhost)
            .field("rabbit_heartbeat_secs", &self.rabbit_heartbeat_secs)
            .field("exchange_name", &self.exchange_name)
            .field("queue_name", &self.queue_name)
            .field("routing_key", &self.routing_key)
            .field("mailtrap_sender_email", &self.mailtrap_sender_email)
            .field("mailtrap_api_key", &"<redacted>")
            .field("mailtrap_api_url", &self.mailtrap_api_url)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

/// Interpret a boolean-ish flag such as "1", "true" or "on".
fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Parse a numeric variable, warning and falling back on bad input.
fn parse_number<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + Copy,
{
    let raw = match lookup(name) {
        Some(v) => v,
        None => return default,
    };

    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid numeric value, using default");
            default
        }
    }
}
