//! Logging setup.
//!
//! Library code only emits `tracing` events. The subscriber is built here,
//! once, by the binary.

use std::env;

use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Substrings marking an environment variable as sensitive.
const SECRET_MARKERS: &[&str] = &["PASSWORD", "SECRET", "TOKEN", "API_KEY", "APIKEY"];

/// Install structured JSON logging.
///
/// `RUST_LOG` wins when set; otherwise the level is `debug` or `info`
/// depending on `debug`.
pub fn init(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();
}

/// Dump the process environment at debug level, masking secrets.
pub fn log_environment() {
    let mut vars: Vec<(String, String)> = env::vars_os()
        .map(|(key, value)| {
            (
                key.to_string_lossy().into_owned(),
                value.to_string_lossy().into_owned(),
            )
        })
        .collect();
    vars.sort();

    for (key, value) in vars {
        let value = redact(&key, &value);
        debug!(key = %key, value = %value, "environment_variable");
    }
}

/// Mask the value of variables whose name looks sensitive.
fn redact<'a>(key: &str, value: &'a str) -> &'a str {
    let upper = key.to_ascii_uppercase();
    if SECRET_MARKERS.iter().any(|marker| upper.contains(marker)) {
        "<redacted>"
    } else {
        value
    }
}
