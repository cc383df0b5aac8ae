mod error;
mod mutations;
mod queries;

pub use error::EngineError;

use std::io;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{Local, NaiveDateTime};
use tokio::sync::{mpsc, oneshot, Mutex, MutexGuard};
use tracing::{info, warn};

use crate::audit::AuditLog;
use crate::model::Event;
use crate::scheduler::Scheduler;
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

/// Background task that owns the WAL and batches appends for group commit:
/// take the first append, drain whatever else is queued, one fsync for the
/// whole batch, then answer every sender.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut pending = None;
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                        Ok(other) => {
                            pending = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }
                commit_batch(&mut wal, batch);
                if let Some(cmd) = pending {
                    handle_non_append(&mut wal, cmd);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = Instant::now();

    let mut result = Ok(());
    for (event, _) in &batch {
        if let Err(e) = wal.append_buffered(event) {
            result = Err(e);
            break;
        }
    }
    let result = result.and_then(|()| wal.flush_sync());
    // A failed batch must not reach disk with the next one.
    if let Err(e) = &result {
        tracing::error!("WAL batch of {} failed: {e}", batch.len());
        if let Err(e) = wal.rollback() {
            tracing::error!("WAL rollback failed, refusing further appends: {e}");
        }
    }

    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());

    for (_, tx) in batch {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let _ = response.send(wal.compact(&events));
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// Local wall-clock time; appointments are local date-times.
pub(crate) fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Durable, audited front for the [`Scheduler`].
///
/// Every mutation runs validate → WAL append → apply under one mutex, so two
/// callers racing for the same doctor and time cannot both succeed, and a
/// failed append leaves memory untouched.
pub struct Engine {
    scheduler: Mutex<Scheduler>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    audit: AuditLog,
}

impl Engine {
    /// Replay the WAL at `wal_path` into a fresh scheduler and start the
    /// writer task. Must be called inside a tokio runtime.
    pub fn new(wal_path: PathBuf, audit: AuditLog) -> io::Result<Self> {
        let (events, valid_len) = Wal::replay(&wal_path)?;
        let dropped = Wal::truncate_tail(&wal_path, valid_len)?;
        if dropped > 0 {
            warn!("dropped {dropped} bytes of torn or corrupt WAL tail");
        }
        let scheduler = Scheduler::replay(&events);
        info!(
            "replayed {} events: {} people, {} appointments",
            events.len(),
            scheduler.directory().person_count(),
            scheduler.ledger().len()
        );
        crate::observability::record_state(
            scheduler.ledger().count_by_status(),
            scheduler.directory().person_count(),
        );

        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(1024);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        Ok(Self {
            scheduler: Mutex::new(scheduler),
            wal_tx,
            audit,
        })
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub(super) async fn lock(&self) -> MutexGuard<'_, Scheduler> {
        self.scheduler.lock().await
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// WAL-append then apply. The caller holds the scheduler lock and has
    /// already validated the event.
    pub(super) async fn persist_and_apply(
        &self,
        scheduler: &mut Scheduler,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        scheduler.apply(event);
        tracing::debug!("applied {}", event.label());
        crate::observability::record_state(
            scheduler.ledger().count_by_status(),
            scheduler.directory().person_count(),
        );
        Ok(())
    }

    /// Emit audit record and metrics for a finished operation.
    pub(super) fn finish<T>(
        &self,
        operation: &'static str,
        action: &'static str,
        started: Instant,
        result: &Result<T, EngineError>,
        details: impl FnOnce(&T) -> String,
    ) {
        crate::observability::record_operation(operation, result.is_ok(), started.elapsed().as_secs_f64());
        match result {
            Ok(value) => self.audit.record(action, Some(&details(value))),
            Err(e) => {
                tracing::warn!("{operation} failed: {e}");
                self.audit.record(&format!("{action}_FAILED"), Some(&e.to_string()));
            }
        }
    }
}
