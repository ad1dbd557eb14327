//! Offline Sync Engine
//!
//! ```text
//! submit(envelope) ── online + queue empty ──▶ transport ─ ok ─▶ Applied
//!        │                                        │ transient
//!        ▼                                        ▼
//!   OfflineQueue  ◀───────────────────────────────┘
//!        │ OFFLINE→ONLINE / tick
//!        ▼
//!     drain (FIFO, one at a time)
//!        ├─ ok        → remove, SyncEvent::Applied
//!        ├─ rejected  → remove, SyncEvent::Conflict     (never retried)
//!        ├─ transient → keep,   SyncEvent::Halted       (attempts + 1)
//!        ├─ 5xx       → keep,   SyncEvent::Halted       (server_errors + 1)
//!        │              └ at max_server_errors → dead letter, SyncEvent::DeadLettered
//!        └─ OFFLINE   → abort before the next item
//! ```
//!
//! The head item is removed only after a definitive result, so a crash at
//! any point replays it with the same client request id and the server
//! returns its stored result.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use shared::command::{CommandEnvelope, CommandOutcome};
use shared::error::ErrorBody;
use shared::models::Terminal;
use tokio::sync::{Mutex, broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::error::{ClientResult, TransportError};
use crate::queue::{OfflineQueue, QueuedMutation};
use crate::transport::CommandTransport;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Offline,
}

/// Operator-facing sync notifications
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Applied {
        seq: u64,
        client_request_id: String,
        outcome: CommandOutcome,
    },
    /// Server refused a queued command; it was dropped from the queue
    Conflict {
        seq: u64,
        client_request_id: String,
        envelope: CommandEnvelope,
        error: ErrorBody,
    },
    /// Server kept failing on a queued command; moved to the dead-letter table
    DeadLettered {
        seq: u64,
        client_request_id: String,
        envelope: CommandEnvelope,
        reason: String,
    },
    /// Drain stopped at `seq` and will retry
    Halted { seq: u64, reason: String },
    Drained { applied: usize, conflicts: usize },
}

/// Result of [`SyncEngine::submit`]
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitResult {
    Applied(CommandOutcome),
    Queued { seq: u64, client_request_id: String },
}

/// Result of one drain pass
///
/// `conflicts` counts items removed without being applied: rejections and
/// dead letters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Queue emptied
    Completed { applied: usize, conflicts: usize },
    /// Transient failure at `seq`; it stays at the head
    Halted { applied: usize, conflicts: usize, seq: u64 },
    /// Connectivity went OFFLINE mid-drain
    Aborted { applied: usize, conflicts: usize },
    AlreadyRunning,
    Offline,
}

/// Resets the running flag on every exit path
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncEngine<T: CommandTransport> {
    config: SyncConfig,
    queue: OfflineQueue,
    transport: T,
    connectivity: watch::Sender<Connectivity>,
    draining: AtomicBool,
    events: broadcast::Sender<SyncEvent>,
    terminal: Mutex<Option<Terminal>>,
}

impl<T: CommandTransport> std::fmt::Debug for SyncEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("terminal_code", &self.config.terminal_code)
            .field("connectivity", &self.connectivity())
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl<T: CommandTransport> SyncEngine<T> {
    /// Open the queue at `config.queue_path`; starts OFFLINE
    pub fn open(config: SyncConfig, transport: T) -> ClientResult<Self> {
        let queue = OfflineQueue::open(&config.queue_path)?;
        Ok(Self::with_queue(config, queue, transport))
    }

    pub fn with_queue(config: SyncConfig, queue: OfflineQueue, transport: T) -> Self {
        let (connectivity, _) = watch::channel(Connectivity::Offline);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            queue,
            transport,
            connectivity,
            draining: AtomicBool::new(false),
            events,
            terminal: Mutex::new(None),
        }
    }

    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn connectivity(&self) -> Connectivity {
        *self.connectivity.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.connectivity() == Connectivity::Online
    }

    /// Report a connectivity change; the run loop drains on OFFLINE→ONLINE
    pub fn set_connectivity(&self, state: Connectivity) {
        let previous = self.connectivity.send_replace(state);
        if previous != state {
            tracing::info!(terminal = %self.config.terminal_code, ?previous, current = ?state, "Connectivity changed");
        }
    }

    /// Last terminal registration seen by a drain
    pub async fn terminal(&self) -> Option<Terminal> {
        self.terminal.lock().await.clone()
    }

    /// Send a command now or queue it
    ///
    /// A missing client request id is assigned here so that the direct attempt
    /// and any later replay share the same key. Direct sends happen only when
    /// ONLINE and nothing is queued, which keeps submission order intact.
    /// A direct rejection is returned to the caller and never queued.
    pub async fn submit(&self, mut envelope: CommandEnvelope) -> ClientResult<SubmitResult> {
        if envelope.client_request_id.is_none() {
            envelope.client_request_id = Some(shared::util::new_id());
        }

        if self.is_online() && self.queue.is_empty()? {
            match self.transport.submit(&envelope).await {
                Ok(outcome) => return Ok(SubmitResult::Applied(outcome)),
                Err(e) if e.is_transient() => {
                    let reason = e.to_string();
                    tracing::warn!(
                        client_request_id = ?envelope.client_request_id,
                        reason = %reason,
                        "Direct send failed, queueing"
                    );
                }
                Err(rejected) => return Err(rejected.into()),
            }
        }

        let item = self.queue.enqueue(envelope)?;
        Ok(SubmitResult::Queued {
            seq: item.seq,
            client_request_id: item.client_request_id,
        })
    }

    /// Replay the queue strictly FIFO
    pub async fn drain(&self) -> ClientResult<DrainOutcome> {
        if !self.is_online() {
            return Ok(DrainOutcome::Offline);
        }
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Drain already running");
            return Ok(DrainOutcome::AlreadyRunning);
        }
        let _guard = DrainGuard(&self.draining);

        let (mut applied, mut conflicts) = (0, 0);

        if self.queue.is_empty()? {
            return Ok(DrainOutcome::Completed { applied, conflicts });
        }

        if let Err(e) = self.register().await {
            let seq = self.queue.peek()?.map(|m| m.seq).unwrap_or_default();
            return Ok(self.halt(seq, format!("terminal registration failed: {e}"), applied, conflicts));
        }

        while let Some(item) = self.queue.peek()? {
            if !self.is_online() {
                tracing::info!(remaining = self.queue.len()?, "Drain aborted, connectivity lost");
                return Ok(DrainOutcome::Aborted { applied, conflicts });
            }

            match self.transport.submit(&item.envelope).await {
                Ok(outcome) => {
                    self.queue.remove(item.seq)?;
                    applied += 1;
                    tracing::debug!(seq = item.seq, client_request_id = %item.client_request_id, "Queued command applied");
                    self.publish(SyncEvent::Applied {
                        seq: item.seq,
                        client_request_id: item.client_request_id,
                        outcome,
                    });
                }
                Err(TransportError::Rejected { status, body }) => {
                    self.queue.remove(item.seq)?;
                    conflicts += 1;
                    self.report_conflict(item, status, body);
                }
                Err(TransportError::Transient(reason)) => {
                    self.queue.record_attempt(item.seq)?;
                    return Ok(self.halt(item.seq, reason, applied, conflicts));
                }
                Err(e @ TransportError::Server { .. }) => {
                    let reason = e.to_string();
                    let failures = self
                        .queue
                        .record_server_error(item.seq)?
                        .map(|m| m.server_errors)
                        .unwrap_or_default();
                    if failures < self.config.max_server_errors {
                        return Ok(self.halt(item.seq, reason, applied, conflicts));
                    }
                    if self.queue.dead_letter(item.seq, &reason)?.is_some() {
                        conflicts += 1;
                        self.publish(SyncEvent::DeadLettered {
                            seq: item.seq,
                            client_request_id: item.client_request_id,
                            envelope: item.envelope,
                            reason,
                        });
                    }
                }
            }
        }

        tracing::info!(applied, conflicts, "Offline queue drained");
        self.publish(SyncEvent::Drained { applied, conflicts });
        Ok(DrainOutcome::Completed { applied, conflicts })
    }

    /// Drain on OFFLINE→ONLINE and on every tick until cancelled
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut connectivity = self.connectivity.subscribe();
        let mut tick = tokio::time::interval(self.config.tick_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::info!(terminal = %self.config.terminal_code, "Sync engine started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = connectivity.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let online = *connectivity.borrow_and_update() == Connectivity::Online;
                    if online {
                        self.drain_logged().await;
                    }
                }
                _ = tick.tick() => {
                    if self.is_online() && !self.queue.is_empty().unwrap_or(true) {
                        self.drain_logged().await;
                    }
                }
            }
        }

        tracing::info!("Sync engine stopped");
    }

    async fn drain_logged(&self) {
        if let Err(e) = self.drain().await {
            tracing::error!(error = %e, "Drain failed");
        }
    }

    async fn register(&self) -> Result<Terminal, TransportError> {
        let terminal = self.transport.register_terminal(&self.config.terminal_code).await?;
        *self.terminal.lock().await = Some(terminal.clone());
        Ok(terminal)
    }

    fn halt(&self, seq: u64, reason: String, applied: usize, conflicts: usize) -> DrainOutcome {
        tracing::warn!(seq, reason = %reason, "Drain halted, will retry");
        self.publish(SyncEvent::Halted { seq, reason });
        DrainOutcome::Halted { applied, conflicts, seq }
    }

    fn report_conflict(&self, item: QueuedMutation, status: u16, error: ErrorBody) {
        tracing::warn!(
            seq = item.seq,
            client_request_id = %item.client_request_id,
            status,
            code = %error.code,
            "Queued command rejected, needs operator attention"
        );
        self.publish(SyncEvent::Conflict {
            seq: item.seq,
            client_request_id: item.client_request_id,
            envelope: item.envelope,
            error,
        });
    }

    fn publish(&self, event: SyncEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
