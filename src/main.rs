use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use mail_sentry::client::{ImapSmtpGateway, MailGateway};
use mail_sentry::config::{self, MailConfig};
use mail_sentry::scheduler;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    println!("Starting Auto Email Responder...");

    config::load_env_file(Path::new(".env")).context("failed to load .env file")?;

    let config = MailConfig::from_env().context(
        "missing mailbox credentials; set EMAIL_ADDRESS and EMAIL_PASSWORD (see .env)",
    )?;
    let keywords = config.urgent_keywords.clone();
    let interval = config.check_interval;

    // Opens and closes one session of each kind; bad credentials stop the
    // process here, before anything is scheduled.
    let gateway: Arc<dyn MailGateway> = Arc::new(
        tokio::task::spawn_blocking(move || ImapSmtpGateway::new(config))
            .await?
            .context("failed to validate mailbox credentials")?,
    );
    info!("email gateway initialized successfully");

    // One pass right away; its failure is logged inside the cycle, never fatal.
    let stats = scheduler::run_cycle_blocking(Arc::clone(&gateway), keywords.clone()).await;
    info!(
        seen = stats.seen,
        replied = stats.replied,
        failed = stats.failed,
        "initial cycle complete"
    );

    let (timer, shutdown) = scheduler::spawn_cycle_scheduler(gateway, keywords, interval);

    info!("Auto Email Responder is now running. Press Ctrl+C to exit.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("Auto Email Responder stopped by user");
    if shutdown.send(true).is_err() {
        error!("scheduler task already gone");
    }
    let _ = timer.await;

    Ok(())
}
