//! Best-effort usage event recording
//!
//! [`EventRecorder::record`] is a one-way send into a bounded channel drained
//! by a single writer task. The caller never waits on storage and never sees
//! an error:
//! - invalid input is rejected and logged
//! - a full queue drops the event and logs (rate-limited)
//! - a persistence failure in the writer is logged and discarded
//!
//! Delivery is at-most-once. Dropping every recorder handle closes the
//! channel; the writer drains what is queued and then exits.
//!
//! # Examples
//!
//! ```no_run
//! use usagemeter::recorder::EventRecorder;
//! use usagemeter::store::InMemoryUsageStore;
//! use usagemeter::types::UsageEventInput;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let store = Arc::new(InMemoryUsageStore::new());
//! let (recorder, writer) = EventRecorder::spawn(store, 10_000);
//!
//! recorder.record(UsageEventInput::new("user-1", "gpt-4o", "openai").with_tokens(1200, 300));
//!
//! drop(recorder);
//! writer.await.ok();
//! # }
//! ```

use crate::types::{NewUsageEvent, UsageEventInput};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use usagemeter_core::store::UsageStore;

/// Counters describing what happened to recorded events
#[derive(Debug, Default)]
pub struct RecorderStats {
    written: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
}

impl RecorderStats {
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Cloneable handle that enqueues usage events for the writer task
#[derive(Debug, Clone)]
pub struct EventRecorder {
    sender: Sender<NewUsageEvent>,
    stats: Arc<RecorderStats>,
}

impl EventRecorder {
    /// Create a recorder and spawn its writer on the current tokio runtime.
    ///
    /// `capacity` bounds the number of queued events; a zero capacity is
    /// treated as one.
    pub fn spawn(store: Arc<dyn UsageStore>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let stats = Arc::new(RecorderStats::default());
        let writer = tokio::spawn(run_writer(store, receiver, Arc::clone(&stats)));
        (Self { sender, stats }, writer)
    }

    /// Record one event from raw call-site input. Never blocks, never fails.
    pub fn record(&self, input: UsageEventInput) {
        match input.validate() {
            Ok(event) => self.record_event(event),
            Err(e) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Rejected usage event");
            }
        }
    }

    /// Record an already-validated event. Never blocks, never fails.
    pub fn record_event(&self, event: NewUsageEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                let count = self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                if count % 100 == 0 {
                    warn!(
                        dropped_count = count + 1,
                        principal = %event.principal_id,
                        model = %event.model,
                        "Usage recorder queue full: dropping event"
                    );
                }
            }
            Err(TrySendError::Closed(event)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    principal = %event.principal_id,
                    model = %event.model,
                    "Usage recorder writer has stopped: dropping event"
                );
            }
        }
    }

    /// Shared counters; outlives the handle so they can be read after shutdown
    pub fn stats(&self) -> Arc<RecorderStats> {
        Arc::clone(&self.stats)
    }

    /// Events dropped because the queue was full or closed
    pub fn dropped_count(&self) -> u64 {
        self.stats.dropped()
    }

    /// Events that failed validation
    pub fn rejected_count(&self) -> u64 {
        self.stats.rejected()
    }
}

async fn run_writer(
    store: Arc<dyn UsageStore>,
    mut receiver: Receiver<NewUsageEvent>,
    stats: Arc<RecorderStats>,
) {
    while let Some(event) = receiver.recv().await {
        let principal = event.principal_id.clone();
        let model = event.model.clone();
        match store.insert(event).await {
            Ok(stored) => {
                stats.written.fetch_add(1, Ordering::Relaxed);
                debug!(id = %stored.id, principal = %principal, "Recorded usage event");
            }
            Err(e) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    principal = %principal,
                    model = %model,
                    error = %e,
                    "Failed to record usage event"
                );
            }
        }
    }
    debug!("Usage recorder writer shutting down");
}
