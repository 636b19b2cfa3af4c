use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

use inimd::api;
use inimd::Config;
use inimd::Engine;

#[derive(Debug, Parser)]
#[command(name = "inimd", about = "Inim Cloud alarm panel daemon")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "inimd.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)?;

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::from(config.logging.level))
        .init();

    tracing::info!("inimd starting");
    tracing::info!("Loaded config from: {}", args.config.display());

    // Build the engine and register every enabled integration
    let mut engine = Engine::new();
    engine.register_integrations_from_config(&config)?;
    let engine = Arc::new(engine);

    // Start the HTTP API server
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let api_task = tokio::spawn(api::serve(
        config.api.listen.clone(),
        config.api.port,
        engine.clone(),
        shutdown_rx,
    ));

    // Run the engine event loop in the background
    let engine_task = {
        let engine = engine.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.run().await {
                tracing::error!("Engine error: {}", e);
            }
        })
    };

    tracing::info!("All integrations started, entering main loop");
    tracing::info!("Press Ctrl+C to exit");

    // Wait for Ctrl+C
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received shutdown signal");
        }
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    // Shut the API server down gracefully; integration tasks die with the
    // process.
    let _ = shutdown_tx.send(());
    if let Err(e) = api_task.await? {
        tracing::error!("API server error: {}", e);
    }
    engine_task.abort();

    tracing::info!("inimd shutdown complete");

    Ok(())
}
