//! RabbitMQ connection management using lapin.
//!
//! Owns the single connection and channel, declares the mail topology and
//! hands out an [`AmqpSource`] for the consumer loop.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicQosOptions, ExchangeDeclareOptions,
        QueueBindOptions, QueueDeclareOptions,
    },
    types::FieldTable,
    Channel, Connection, ConnectionProperties, Consumer, ExchangeKind,
};
use tracing::{info, warn};

use super::source::{InboundMessage, MessageSource};
use crate::config::Config;

/// Only one unacknowledged message is handed out at a time.
pub const PREFETCH_COUNT: u16 = 1;

/// Consumer tag announced to the broker.
pub const CONSUMER_TAG: &str = "mail-service";

/// Holds the broker connection and channel for the lifetime of the worker.
pub struct ConnectionManager {
    connection: Connection,
    channel: Channel,
    exchange: String,
    queue: String,
    routing_key: String,
}

impl ConnectionManager {
    /// Connect, open a channel, set QoS and declare the topology.
    pub async fn connect(config: &Config) -> Result<Self> {
        let url = config.amqp_url()?;

        info!(
            host = %config.rabbit_host,
            port = config.rabbit_port,
            heartbeat_secs = config.rabbit_heartbeat_secs,
            "rabbitmq_connecting"
        );

        let connection = Connection::connect(&url, ConnectionProperties::default())
            .await
            .context("Failed to connect to RabbitMQ")?;

        info!("rabbitmq_connected");

        let channel = connection
            .create_channel()
            .await
            .context("Failed to create channel")?;

        info!("rabbitmq_channel_created");

        channel
            .basic_qos(PREFETCH_COUNT, BasicQosOptions::default())
            .await
            .context("Failed to set QoS")?;

        info!(prefetch_count = PREFETCH_COUNT, "rabbitmq_qos_set");

        let manager = Self {
            connection,
            channel,
            exchange: config.exchange_name.clone(),
            queue: config.queue_name.clone(),
            routing_key: config.routing_key.clone(),
        };

        manager.declare_topology().await?;

        Ok(manager)
    }

    /// Declare the durable direct exchange and queue and bind them
    /// (idempotent).
    async fn declare_topology(&self) -> Result<()> {
        self.channel
            .exchange_declare(
                &self.exchange,
                ExchangeKind::Direct,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .context("Failed to declare exchange")?;

        self.channel
            .queue_declare(
                &self.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .context("Failed to declare queue")?;

        self.channel
            .queue_bind(
                &self.queue,
                &self.exchange,
                &self.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .context("Failed to bind queue")?;

        info!(
            exchange = %self.exchange,
            queue = %self.queue,
            routing_key = %self.routing_key,
            "rabbitmq_topology_declared"
        );

        Ok(())
    }

    /// Start consuming the mail queue with explicit acknowledgments.
    pub async fn subscribe(&self) -> Result<AmqpSource> {
        let consumer = self
            .channel
            .basic_consume(
                &self.queue,
                CONSUMER_TAG,
                BasicConsumeOptions {
                    no_ack: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .context("Failed to start consumer")?;

        info!(queue = %self.queue, "rabbitmq_consumer_started");

        Ok(AmqpSource {
            channel: self.channel.clone(),
            consumer,
        })
    }

    /// Close the channel and connection gracefully.
    pub async fn close(self) {
        if let Err(e) = self.channel.close(200, "Normal shutdown").await {
            warn!(error = %e, "rabbitmq_channel_close_error");
        }

        if let Err(e) = self.connection.close(200, "Normal shutdown").await {
            warn!(error = %e, "rabbitmq_connection_close_error");
        }

        info!("rabbitmq_connection_closed");
    }
}

/// [`MessageSource`] backed by a lapin consumer.
pub struct AmqpSource {
    channel: Channel,
    consumer: Consumer,
}

#[async_trait]
impl MessageSource for AmqpSource {
    async fn next_message(&mut self) -> Option<Result<InboundMessage>> {
        let delivery = self.consumer.next().await?;

        Some(
            delivery
                .map(|delivery| InboundMessage {
                    delivery_tag: delivery.delivery_tag,
                    message_id: delivery
                        .properties
                        .message_id()
                        .as_ref()
                        .map(|s| s.to_string()),
                    body: delivery.data,
                })
                .context("RabbitMQ delivery failed"),
        )
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<()> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .context("Failed to acknowledge message")
    }
}
