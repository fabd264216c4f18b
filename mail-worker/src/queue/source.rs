//! Pull-based message source abstraction.
//!
//! The consumer loop only sees this trait, so it runs the same way against
//! RabbitMQ and against an in-memory queue in tests.

use anyhow::Result;
use async_trait::async_trait;

/// A raw message handed out by a [`MessageSource`].
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Broker delivery tag, used to acknowledge the message
    pub delivery_tag: u64,
    /// Producer-assigned message id, if any
    pub message_id: Option<String>,
    /// Raw payload bytes
    pub body: Vec<u8>,
}

/// Yields one message at a time and accepts explicit acknowledgments.
#[async_trait]
pub trait MessageSource: Send {
    /// Wait for the next message. `None` means the source is closed.
    async fn next_message(&mut self) -> Option<Result<InboundMessage>>;

    /// Acknowledge a message so the broker will not redeliver it.
    async fn ack(&mut self, delivery_tag: u64) -> Result<()>;
}
