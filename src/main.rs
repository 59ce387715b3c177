use std::sync::Arc;

use tracing::info;

use roomhold::{BookingConfig, Engine, StoreConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let store = StoreConfig::from_env();
    roomhold::observability::init(store.metrics_port);

    // Property settings: JSON file named by ROOMHOLD_CONFIG, defaults otherwise.
    let config = match std::env::var("ROOMHOLD_CONFIG") {
        Ok(path) => BookingConfig::from_json(&std::fs::read_to_string(&path)?)?,
        Err(_) => {
            let config = BookingConfig::default();
            tracing::warn!(
                "ROOMHOLD_CONFIG not set, using built-in defaults ({} room at {} {}); \
                 holds are refused until a priced config is loaded",
                config.total_rooms,
                config.default_room_price,
                config.currency
            );
            config
        }
    };

    let engine = Arc::new(Engine::open(&store, config)?);
    roomhold::reaper::spawn_background_tasks(engine.clone(), store.compact_threshold);

    let active = engine.config().await;
    info!("roomhold running");
    info!("  data_dir: {}", store.data_dir.display());
    info!("  rooms: {} ({} config v{})", active.total_rooms, active.currency, active.version);
    info!("  compact_threshold: {}", store.compact_threshold);
    info!(
        "  metrics: {}",
        store
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("SIGTERM handler unavailable: {e}");
                    ctrl_c.await.ok();
                }
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    shutdown.await;

    // Every acknowledged write is already fsynced; compacting shortens the next replay.
    if let Err(e) = engine.compact_wal().await {
        tracing::warn!("compaction on shutdown failed: {e}");
    }
    info!("roomhold stopped");
    Ok(())
}
