//! Queue message types for the mail queue.
//!
//! Producers publish camelCase JSON objects:
//!
//! ```json
//! {
//!   "recipientEmail": "user@example.com",
//!   "messageSubject": "Confirm your account",
//!   "messageBody": "Click here",
//!   "messageCategory": "EMAIL_CONFIRMATION"
//! }
//! ```
//!
//! Unknown fields are ignored.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Default exchange the mail queue is bound to.
pub const DEFAULT_MAIL_EXCHANGE: &str = "mail-exchange";

/// Default queue name for mail jobs.
pub const DEFAULT_MAIL_QUEUE: &str = "mail-queue";

/// Why a raw payload could not be turned into a [`MailJob`].
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not a JSON object, or a field has the wrong type.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A required field is absent (or empty, for the recipient).
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
}

/// Mail job decoded from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailJob {
    /// Destination address
    pub recipient_email: String,
    /// Subject line
    pub message_subject: String,
    /// Plain text body
    pub message_body: String,
    /// Category tag, not yet validated against the registry
    pub message_category: String,
}

/// Wire shape with every field optional, so absence can be told apart from
/// structural errors.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMailJob {
    recipient_email: Option<String>,
    message_subject: Option<String>,
    message_body: Option<String>,
    message_category: Option<String>,
}

impl MailJob {
    /// Decode a raw queue payload.
    ///
    /// Category validation is left to the dispatcher.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        // Arrays would otherwise bind fields by position
        let object: Map<String, Value> = serde_json::from_slice(raw)?;
        let job: RawMailJob = serde_json::from_value(Value::Object(object))?;

        let recipient_email = job
            .recipient_email
            .filter(|email| !email.is_empty())
            .ok_or(DecodeError::MissingField("recipientEmail"))?;
        let message_subject = job
            .message_subject
            .ok_or(DecodeError::MissingField("messageSubject"))?;
        let message_body = job
            .message_body
            .ok_or(DecodeError::MissingField("messageBody"))?;
        let message_category = job
            .message_category
            .ok_or(DecodeError::MissingField("messageCategory"))?;

        Ok(Self {
            recipient_email,
            message_subject,
            message_body,
            message_category,
        })
    }
}
