//! PiggyBank host binary
//!
//! Opens the ledger as the configured owner and logs every notification as a
//! JSON line until Ctrl-C.

use anyhow::Context;
use piggybank_core::{Config, PiggyBank};
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting PiggyBank host");

    // Load configuration
    let config = match std::env::var("PIGGY_CONFIG") {
        Ok(path) => Config::from_file(&path)
            .with_context(|| format!("loading config from {}", path))?,
        Err(_) => Config::from_env()?,
    };

    let owner = config
        .owner
        .clone()
        .context("an owner identity is required (set `owner` or PIGGY_OWNER)")?;

    let bank = PiggyBank::open(owner, config).await?;
    tracing::info!(
        "Ledger opened for owner {} with balance {}",
        bank.owner().await?,
        bank.balance().await?
    );
    if let Some(ref path) = bank.config().snapshot.path {
        tracing::info!(
            "Snapshot at {:?} (restore: {}, save: {})",
            path,
            bank.config().snapshot.restore_on_open,
            bank.config().snapshot.save_on_shutdown
        );
    }

    let mut notifications = bank.subscribe();
    loop {
        tokio::select! {
            received = notifications.recv() => match received {
                Ok(notification) => {
                    println!("{}", serde_json::to_string(&notification)?);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Notification stream lagged, {} skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!("Shutting down PiggyBank host");
    bank.shutdown().await?;
    Ok(())
}
