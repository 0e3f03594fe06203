//! Tick Tape Analytics Server
//!
//! Serves tick history plus Hurst exponent and permutation entropy estimates
//! for a generated futures tape.

use std::sync::Arc;
use tape_analytics::CpuPool;
use tape_feed::{FeedConfig, MemoryTickStore, PriceGenerator};
use tape_server::{AppState, IoPool, Reactor, ServerConfig};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tape_server=debug")),
        )
        .init();

    info!("Starting Tick Tape Analytics Server");

    let config = ServerConfig::from_env()?;

    let io_pool = Arc::new(IoPool::new(config.io_workers)?);
    let cpu_pool = CpuPool::new(config.cpu_workers)?;
    info!(
        "I/O workers: {}, CPU threads: {}, allowed origin: {}",
        io_pool.workers(),
        cpu_pool.threads(),
        config.allowed_origin
    );

    // Tick store and background price generation
    let store = Arc::new(MemoryTickStore::with_instruments(
        config.instruments.iter().copied(),
    ));
    let generator = Arc::new(PriceGenerator::new(
        Arc::clone(&store),
        FeedConfig {
            tick_interval: config.tick_interval,
            ..FeedConfig::default()
        },
    ));
    generator.start(&io_pool.handle());

    let state = Arc::new(AppState::new(store, cpu_pool, &config));
    let reactor = Reactor::bind(
        config.socket_addr(),
        Arc::clone(&io_pool),
        state,
        config.reactor_options(),
    )?;

    // Stop the reactor on Ctrl-C
    let reactor_handle = reactor.handle();
    io_pool.handle().spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C");
                reactor_handle.shutdown();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    info!("Server listening on http://{}", reactor.local_addr());
    reactor.run()?;

    info!("Server stopped");
    Ok(())
}
