//! Mail Service - consumes mail jobs from RabbitMQ and delivers them through
//! Mailtrap.
//!
//! Runs until SIGINT/SIGTERM. The message being processed when the signal
//! arrives is finished and acknowledged before the process exits.

use anyhow::Result;
use tracing::info;

use mail_service::{
    shutdown_signal, telemetry, Config, ConnectionManager, Consumer, Dispatcher, MailtrapClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from environment
    let config = Config::from_env();

    telemetry::init(config.debug);

    info!("mail_service_starting");

    if config.debug {
        telemetry::log_environment();
    }

    info!(
        rabbit_host = %config.rabbit_host,
        rabbit_port = config.rabbit_port,
        exchange = %config.exchange_name,
        queue = %config.queue_name,
        mailtrap_configured = config.mailtrap_configured(),
        "config_loaded"
    );

    let client = MailtrapClient::new(&config)?;

    // Connection or topology failure is fatal
    let manager = ConnectionManager::connect(&config).await?;
    let source = manager.subscribe().await?;

    info!(queue = %config.queue_name, "Waiting for messages. To exit press CTRL+C");

    let stats = Consumer::new(source, Dispatcher::new(client))
        .run(shutdown_signal())
        .await?;

    info!("Stopping application...");
    manager.close().await;

    info!(
        received = stats.received,
        sent = stats.sent,
        dropped = stats.dropped,
        "mail_service_shutdown_complete"
    );

    Ok(())
}
