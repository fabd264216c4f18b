//! Mail Service - RabbitMQ consumer delivering notification emails.
//!
//! Jobs published to the mail queue are decoded, checked against the
//! category registry and sent through Mailtrap, one at a time.
//!
//! ## Architecture
//!
//! ```text
//! mail-queue → ConnectionManager → Consumer → Dispatcher → DeliveryClient → Mailtrap
//! ```

pub mod category;
pub mod config;
pub mod consumer;
pub mod delivery;
pub mod dispatch;
pub mod queue;
pub mod telemetry;

// Re-export commonly used types
pub use category::MessageCategory;
pub use config::Config;
pub use consumer::{shutdown_signal, Consumer, ConsumerStats};
pub use delivery::{DeliveryClient, DeliveryError, MailtrapClient};
pub use dispatch::{DispatchError, DispatchState, Dispatcher, Disposition};
pub use queue::{ConnectionManager, DecodeError, InboundMessage, MailJob, MessageSource};
