//! Consumption loop.
//!
//! Pulls one message at a time from a [`MessageSource`], dispatches it and
//! acknowledges it. A message that has been pulled always runs to
//! completion, including its acknowledgment, before a stop request is
//! honoured.

use std::future::Future;

use anyhow::Result;
use tokio::signal;
use tracing::{error, info, info_span, warn, Instrument};

use crate::delivery::DeliveryClient;
use crate::dispatch::Dispatcher;
use crate::queue::{InboundMessage, MessageSource};

/// Counters reported when the loop ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerStats {
    pub received: u64,
    pub sent: u64,
    pub dropped: u64,
    pub ack_failures: u64,
}

/// Single-flight consumer wiring a source to a dispatcher.
pub struct Consumer<S, D> {
    source: S,
    dispatcher: Dispatcher<D>,
    stats: ConsumerStats,
}

impl<S, D> Consumer<S, D>
where
    S: MessageSource,
    D: DeliveryClient,
{
    pub fn new(source: S, dispatcher: Dispatcher<D>) -> Self {
        Self {
            source,
            dispatcher,
            stats: ConsumerStats::default(),
        }
    }

    /// Consume until `shutdown` resolves or the source closes.
    pub async fn run<F>(mut self, shutdown: F) -> Result<ConsumerStats>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("consumer_stopping");
                    break;
                }
                delivery = self.source.next_message() => {
                    match delivery {
                        Some(Ok(message)) => self.handle(message).await,
                        Some(Err(e)) => {
                            error!(error = %e, "rabbitmq_delivery_error");
                        }
                        None => {
                            warn!("rabbitmq_consumer_closed");
                            break;
                        }
                    }
                }
            }
        }

        info!(
            received = self.stats.received,
            sent = self.stats.sent,
            dropped = self.stats.dropped,
            ack_failures = self.stats.ack_failures,
            "consumer_stopped"
        );

        Ok(self.stats)
    }

    async fn handle(&mut self, message: InboundMessage) {
        let delivery_tag = message.delivery_tag;
        let message_id = message.message_id.as_deref().unwrap_or("unknown").to_string();
        let span = info_span!("mail_job", delivery_tag, message_id = %message_id);

        async {
            self.stats.received += 1;
            info!(body_length = message.body.len(), "rabbitmq_job_received");

            let mut disposition = self.dispatcher.dispatch(&message.body).await;

            if disposition.is_sent() {
                self.stats.sent += 1;
            } else {
                self.stats.dropped += 1;
            }

            // Dropped messages are acknowledged too; nothing is requeued.
            match self.source.ack(delivery_tag).await {
                Ok(()) => {
                    disposition.mark_acknowledged();
                    info!(
                        sent = disposition.is_sent(),
                        trail = ?disposition.trail(),
                        "rabbitmq_job_completed"
                    );
                }
                Err(e) => {
                    self.stats.ack_failures += 1;
                    error!(error = %e, "rabbitmq_ack_failed");
                }
            }
        }
        .instrument(span)
        .await
    }
}

/// Resolve on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
