use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use crate::engine::Engine;
use crate::observability;

const REAP_INTERVAL: Duration = Duration::from_secs(30);
const COMPACT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Fail every pending hold older than the configured TTL. Returns how many
/// were failed; a hold paid or cancelled in the meantime is skipped.
pub async fn reap_stale_holds(engine: &Engine) -> usize {
    let stale = engine.collect_stale_holds(Utc::now()).await;
    let mut reaped = 0;
    for id in stale {
        match engine.mark_failed(id).await {
            Ok(()) => {
                reaped += 1;
                info!("reaped stale hold {id}");
            }
            Err(e) => debug!("reaper skip {id}: {e}"),
        }
    }
    if reaped > 0 {
        metrics::counter!(observability::STALE_HOLDS_REAPED_TOTAL).increment(reaped as u64);
    }
    reaped
}

/// Background task that periodically fails stale pending holds.
pub async fn run_reaper(engine: Arc<Engine>) {
    let mut interval = tokio::time::interval(REAP_INTERVAL);
    loop {
        interval.tick().await;
        reap_stale_holds(&engine).await;
    }
}

/// Compact the WAL once `threshold` appends accumulated. Returns whether it ran.
pub async fn compact_if_due(engine: &Engine, threshold: u64) -> bool {
    let appends = engine.wal_appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match engine.compact_wal().await {
        Ok(()) => {
            metrics::counter!(observability::WAL_COMPACTIONS_TOTAL).increment(1);
            info!("compacted WAL after {appends} appends");
            true
        }
        Err(e) => {
            tracing::error!("WAL compaction failed: {e}");
            false
        }
    }
}

/// Background task that compacts the WAL when it grows past `threshold` appends.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(COMPACT_CHECK_INTERVAL);
    loop {
        interval.tick().await;
        compact_if_due(&engine, threshold).await;
    }
}

/// Spawn reaper + compactor for an engine.
pub fn spawn_background_tasks(engine: Arc<Engine>, compact_threshold: u64) {
    let reaper_engine = engine.clone();
    tokio::spawn(async move {
        run_reaper(reaper_engine).await;
    });
    tokio::spawn(async move {
        run_compactor(engine, compact_threshold).await;
    });
}
