//! PowerMate volume control for a Logitech Media Server player.

use anyhow::Result;
use btleplug::api::BDAddr;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use powermate_lms_bridge::{
    config, controller::KnobController, lms::LmsDirectory, powermate::Powermate,
};

/// Control a Logitech Media Server player with a PowerMate Bluetooth knob.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Bluetooth address of the PowerMate (XX:XX:XX:XX:XX:XX)
    #[arg(value_name = "bluetooth_addr")]
    address: BDAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "powermate_lms_bridge=debug,btleplug=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "PowerMate volume control for a Logitech Media Server player v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = config::load_config()?;
    tracing::info!("Media server: {}:{}", config.lms.host, config.lms.port);
    tracing::info!("Target player: {}", config.lms.player_name);

    let directory = LmsDirectory::new(&config.lms);
    let Some(controller) = KnobController::for_player(directory, &config.lms.player_name).await?
    else {
        // A missing player is a clean exit; a supervisor restarts the bridge
        // once the player powers up.
        tracing::info!("Player {} is not detected", config.lms.player_name);
        return Ok(());
    };

    let knob = Powermate::connect(cli.address, Box::new(controller)).await?;

    shutdown_signal().await;
    knob.stop().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
