//! Per-message dispatch: decode, validate, deliver.
//!
//! A message moves through
//!
//! ```text
//! Received → Decoded → Validated → Sent → Acknowledged
//!     └──────────┴──────────┴──→ Dropped
//! ```
//!
//! Every failure is terminal for that message. Dropped messages are still
//! acknowledged by the consumer, so nothing is requeued or retried.

use thiserror::Error;
use tracing::{debug, error, info};

use crate::category::MessageCategory;
use crate::delivery::{DeliveryClient, DeliveryError};
use crate::queue::{DecodeError, MailJob};

/// Stage reached by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Received,
    Decoded,
    Validated,
    Sent,
    Acknowledged,
    Dropped,
}

/// Reason a message was dropped.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("invalid message category `{0}`")]
    InvalidCategory(String),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl DispatchError {
    /// Short label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Decode(DecodeError::Malformed(_)) => "decode_error",
            DispatchError::Decode(DecodeError::MissingField(_)) => "missing_field",
            DispatchError::InvalidCategory(_) => "invalid_category",
            DispatchError::Delivery(_) => "delivery_error",
        }
    }
}

/// Outcome of dispatching one message.
#[derive(Debug)]
pub struct Disposition {
    trail: Vec<DispatchState>,
    error: Option<DispatchError>,
}

impl Disposition {
    /// States visited, in order.
    pub fn trail(&self) -> &[DispatchState] {
        &self.trail
    }

    /// Why the message was dropped, if it was.
    pub fn error(&self) -> Option<&DispatchError> {
        self.error.as_ref()
    }

    pub fn is_sent(&self) -> bool {
        self.error.is_none()
    }

    /// Record the broker acknowledgment of a sent message.
    pub fn mark_acknowledged(&mut self) {
        if self.is_sent() {
            self.trail.push(DispatchState::Acknowledged);
        }
    }
}

/// Turns raw queue payloads into delivery calls.
pub struct Dispatcher<D> {
    client: D,
}

impl<D: DeliveryClient> Dispatcher<D> {
    pub fn new(client: D) -> Self {
        Self { client }
    }

    /// Dispatch one raw message. Never fails; failures are reported in the
    /// returned [`Disposition`].
    pub async fn dispatch(&self, raw: &[u8]) -> Disposition {
        let mut trail = vec![DispatchState::Received];

        debug!(body = %String::from_utf8_lossy(raw), "mail_job_received");

        let error = match self.process(raw, &mut trail).await {
            Ok(()) => None,
            Err(e) => {
                error!(
                    reason = e.kind(),
                    stage = ?trail.last(),
                    error = %e,
                    "mail_job_dropped"
                );
                trail.push(DispatchState::Dropped);
                Some(e)
            }
        };

        Disposition { trail, error }
    }

    async fn process(
        &self,
        raw: &[u8],
        trail: &mut Vec<DispatchState>,
    ) -> Result<(), DispatchError> {
        let job = MailJob::decode(raw)?;
        trail.push(DispatchState::Decoded);

        let category = MessageCategory::parse(&job.message_category)
            .ok_or_else(|| DispatchError::InvalidCategory(job.message_category.clone()))?;
        trail.push(DispatchState::Validated);

        self.client
            .send(
                &job.recipient_email,
                &job.message_subject,
                &job.message_body,
                category.as_str(),
            )
            .await?;
        trail.push(DispatchState::Sent);

        info!(
            recipient = %job.recipient_email,
            category = %category,
            "mail_job_sent"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::DispatchState::*;
    use super::*;
    use crate::delivery::testing::{RecordingClient, SentMail};

    const CONFIRMATION: &[u8] = br#"{"recipientEmail":"a@example.com","messageSubject":"Confirm","messageBody":"Click here","messageCategory":"EMAIL_CONFIRMATION"}"#;

    #[tokio::test]
    async fn test_valid_job_is_sent_once() {
        let client = RecordingClient::new();
        let dispatcher = Dispatcher::new(client.clone());

        let mut disposition = dispatcher.dispatch(CONFIRMATION).await;
        disposition.mark_acknowledged();

        assert!(disposition.is_sent());
        assert_eq!(
            disposition.trail(),
            &[Received, Decoded, Validated, Sent, Acknowledged]
        );
        assert_eq!(
            client.calls(),
            vec![SentMail {
                recipient: "a@example.com".to_string(),
                subject: "Confirm".to_string(),
                body: "Click here".to_string(),
                category: "EMAIL_CONFIRMATION".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_numeric_category_dropped_at_validation() {
        let client = RecordingClient::new();
        let dispatcher = Dispatcher::new(client.clone());
        let raw = br#"{"recipientEmail":"a@example.com","messageSubject":"Hi","messageBody":"x","messageCategory":"3"}"#;

        let disposition = dispatcher.dispatch(raw).await;

        assert_eq!(disposition.trail(), &[Received, Decoded, Dropped]);
        assert!(matches!(
            disposition.error(),
            Some(DispatchError::InvalidCategory(tag)) if tag == "3"
        ));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_categories_never_delivered() {
        let client = RecordingClient::new();
        let dispatcher = Dispatcher::new(client.clone());

        for tag in ["1", "NEWSLETTER", "email_confirmation", ""] {
            let raw = format!(
                r#"{{"recipientEmail":"a@example.com","messageSubject":"Hi","messageBody":"x","messageCategory":"{tag}"}}"#
            );
            let disposition = dispatcher.dispatch(raw.as_bytes()).await;
            assert_eq!(disposition.error().map(|e| e.kind()), Some("invalid_category"));
        }

        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_body_dropped_at_decode() {
        let client = RecordingClient::new();
        let dispatcher = Dispatcher::new(client.clone());
        let raw = br#"{"recipientEmail":"a@example.com","messageSubject":"Hi","messageCategory":"PASSWORD_RESET"}"#;

        let mut disposition = dispatcher.dispatch(raw).await;
        disposition.mark_acknowledged();

        assert_eq!(disposition.trail(), &[Received, Dropped]);
        assert!(matches!(
            disposition.error(),
            Some(DispatchError::Decode(DecodeError::MissingField("messageBody")))
        ));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_dropped_at_decode() {
        let client = RecordingClient::new();
        let dispatcher = Dispatcher::new(client.clone());

        let disposition = dispatcher.dispatch(b"{not json").await;

        assert_eq!(disposition.trail(), &[Received, Dropped]);
        assert_eq!(disposition.error().map(|e| e.kind()), Some("decode_error"));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_is_single_attempt() {
        let client = RecordingClient::rejecting(500);
        let dispatcher = Dispatcher::new(client.clone());

        let disposition = dispatcher.dispatch(CONFIRMATION).await;

        assert_eq!(disposition.trail(), &[Received, Decoded, Validated, Dropped]);
        assert!(matches!(
            disposition.error(),
            Some(DispatchError::Delivery(DeliveryError::Rejected { status: 500, .. }))
        ));
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_redelivery_sends_again() {
        let client = RecordingClient::new();
        let dispatcher = Dispatcher::new(client.clone());

        let first = dispatcher.dispatch(CONFIRMATION).await;
        let second = dispatcher.dispatch(CONFIRMATION).await;

        assert!(first.is_sent());
        assert!(second.is_sent());
        let calls = client.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], calls[1]);
    }
}
