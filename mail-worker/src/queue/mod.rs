//! Queue module for RabbitMQ operations.
//!
//! This module provides:
//! - The mail job wire format and its decoder
//! - A pull-based [`MessageSource`] abstraction with explicit acks
//! - The lapin-backed connection manager
//!
//! ## Topology
//!
//! ```text
//! producer → mail-exchange (direct, durable) → mail-queue (durable) → worker
//! ```

pub mod connection;
pub mod source;
pub mod types;

pub use connection::{AmqpSource, ConnectionManager};
pub use source::{InboundMessage, MessageSource};
pub use types::{DecodeError, MailJob, DEFAULT_MAIL_EXCHANGE, DEFAULT_MAIL_QUEUE};

#[cfg(test)]
pub(crate) use source::testing;
