//! StatusWatch - Console Status Relay
//!
//! Polls a remote status endpoint and relays every non-error status to the
//! Telegram chats that subscribed with `/start`.

use anyhow::Result;
use clap::Parser;
use statuswatch::{app::App, cli::Cli, config::Config};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            init_tracing("info");
            error!("Failed to load configuration: {:#}", err);
            std::process::exit(1);
        }
    };

    init_tracing(&config.core.log_level);

    info!("StatusWatch starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.core.log_level);
    info!("Status URL: {}", config.status.url);
    info!("Poll Interval: {}s", config.status.interval_seconds);
    info!("Request Timeout: {}s", config.status.request_timeout_seconds);
    info!("Subscriber Record: {}", config.store.path.display());
    info!("Telegram API: {}", config.telegram.api_url);
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let app = match App::builder(config).build(shutdown_rx).await {
        Ok(app) => app,
        Err(err) => {
            error!("Failed to start: {:#}", err);
            std::process::exit(1);
        }
    };

    let mut app_task = tokio::spawn(app.run());

    let finished = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            None
        }
        result = &mut app_task => Some(result),
    };

    let result = match finished {
        Some(result) => {
            info!("Inbound updates ended. Shutting down...");
            result
        }
        None => {
            info!("Shutdown signal received. Shutting down...");
            // Receivers may already be gone if every task has exited.
            let _ = shutdown_tx.send(true);
            app_task.await
        }
    };

    match result {
        Ok(Ok(())) => info!("All tasks shut down. Exiting."),
        Ok(Err(e)) => error!("Application finished with errors: {:#}", e),
        Err(e) => error!("Application task panicked: {:?}", e),
    }

    Ok(())
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
