mod availability;
mod error;
mod mutations;
mod pricing;
mod queries;
mod store;
mod validate;

pub use availability::{blocked_rooms, booked_counts, compute_availability, resolve_day_price};
pub use error::BookingError;
pub use pricing::{compute_total, night_total, room_night_price};
pub use store::{BookingState, CalendarState, Ledger};

use std::io;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc, oneshot};

use crate::config::{BookingConfig, StoreConfig};
use crate::model::Event;
use crate::notify::NotifyHub;
use crate::wal::Wal;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Drain every append already queued behind it.
/// 3. One flush_sync for the whole batch, then answer every sender.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }
                commit_batch(&mut wal, &mut batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        tracing::error!("WAL flush failed for batch of {}: {e}", batch.len());
    }
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let result = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event))
        .and_then(|()| wal.flush_sync());
    if result.is_err() {
        // Every sender in the batch is told it failed, so none of it may survive on disk.
        if let Err(e) = wal.rollback() {
            tracing::error!("WAL rollback failed, log may hold unacknowledged records: {e}");
        }
    }
    result
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// Availability reconciliation, pricing and reservation lifecycle over one property.
///
/// Calendar, ledger and active configuration sit behind one lock: every
/// validate+commit runs under the write guard, every read under the read guard.
pub struct Engine {
    pub(super) state: RwLock<BookingState>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
}

impl Engine {
    /// Replay the WAL at `wal_path` and start the group-commit writer.
    /// Must be called inside a tokio runtime.
    pub fn new(
        wal_path: &Path,
        config: BookingConfig,
        notify: Arc<NotifyHub>,
    ) -> Result<Self, BookingError> {
        config.validate()?;
        let events = Wal::recover(wal_path)?;
        let wal = Wal::open(wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let mut state = BookingState::new(Arc::new(config));
        for event in &events {
            state.apply(event);
        }
        tracing::info!(
            "replayed {} events from {}: {} reservations, {} overrides",
            events.len(),
            wal_path.display(),
            state.ledger.len(),
            state.calendar.override_count()
        );

        Ok(Self {
            state: RwLock::new(state),
            wal_tx,
            notify,
        })
    }

    /// Open the engine in `store.data_dir`, creating the directory if needed.
    pub fn open(store: &StoreConfig, config: BookingConfig) -> Result<Self, BookingError> {
        std::fs::create_dir_all(&store.data_dir)?;
        Self::new(&store.wal_path(), config, Arc::new(NotifyHub::new()))
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), BookingError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| BookingError::Persistence("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| BookingError::Persistence("WAL writer dropped response".into()))?
            .map_err(|e| BookingError::Persistence(e.to_string()))
    }

    /// WAL-append, then apply, then notify. Nothing is applied if the append fails.
    pub(super) async fn persist_and_apply(
        &self,
        state: &mut BookingState,
        event: Event,
    ) -> Result<(), BookingError> {
        if let Err(e) = self.wal_append(&event).await {
            tracing::warn!("rejected {:?} write: {e}", event.topic());
            return Err(e);
        }
        state.apply(&event);
        self.notify.send(&event);
        Ok(())
    }
}
