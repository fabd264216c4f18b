//! Email delivery through an external provider.
//!
//! The dispatcher talks to the provider only through [`DeliveryClient`];
//! [`MailtrapClient`] is the production implementation.

pub mod mailtrap;

use async_trait::async_trait;
use thiserror::Error;

pub use mailtrap::{MailtrapClient, MAILTRAP_SEND_URL};

/// A failed delivery attempt.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The request never got a response (connect, TLS, timeout, ...).
    #[error("delivery transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("delivery rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The provider accepted the request but reported failure.
    #[error("delivery unsuccessful: {0}")]
    Unsuccessful(String),
}

/// Sends a single plain-text email. One call, one attempt.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        category: &str,
    ) -> Result<(), DeliveryError>;
}
