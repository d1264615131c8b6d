/// Background decode scheduling
///
/// One worker task drains a multi-producer queue of parse units. The
/// worker is spawned on demand by `enqueue`, stops after a run of empty
/// polls, and can be cancelled cooperatively between units.
///
/// # Lifecycle
///
/// The running flag, the current cancellation token and a restart request
/// live under one lock. `enqueue` either spawns the worker or records a
/// restart request; the worker re-checks the queue under that lock before
/// it stops, so an enqueue racing with shutdown is never lost and no second
/// worker is ever spawned.

pub mod context;
pub mod metrics;
mod worker;

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::conf::WorkerConfig;
use crate::unit::ParseUnit;

pub use context::ActiveContext;
pub use metrics::{MetricsSnapshot, SchedulerMetrics};

/// Called on the worker after a unit's decode result was stored and the
/// unit reports itself decoded.
pub type DecodedHook = Arc<dyn Fn(&Arc<ParseUnit>) + Send + Sync>;

struct Lifecycle {
    running: bool,
    /// Token handed to the next worker run
    token: CancellationToken,
    /// An enqueue arrived while a worker was running
    restart: bool,
}

pub(crate) struct Shared {
    tx: Sender<Arc<ParseUnit>>,
    rx: Receiver<Arc<ParseUnit>>,
    lifecycle: Mutex<Lifecycle>,
    context: Arc<ActiveContext>,
    config: WorkerConfig,
    metrics: Arc<SchedulerMetrics>,
    on_decoded: Option<DecodedHook>,
}

pub struct ParsingScheduler {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl ParsingScheduler {
    pub fn new(
        context: Arc<ActiveContext>,
        config: WorkerConfig,
        metrics: Arc<SchedulerMetrics>,
        on_decoded: Option<DecodedHook>,
        runtime: Handle,
    ) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            shared: Arc::new(Shared {
                tx,
                rx,
                lifecycle: Mutex::new(Lifecycle {
                    running: false,
                    token: CancellationToken::new(),
                    restart: false,
                }),
                context,
                config,
                metrics,
                on_decoded,
            }),
            runtime,
        }
    }

    /// Queue `unit` for decoding. Never blocks. Returns false when the unit
    /// is already queued or being decoded; a stopped worker is still
    /// restarted if the queue holds units.
    pub fn enqueue(&self, unit: Arc<ParseUnit>) -> bool {
        if !unit.try_schedule() {
            if !self.shared.rx.is_empty() {
                self.ensure_running();
            }
            return false;
        }

        let index = unit.index();
        if let Err(err) = self.shared.tx.send(unit) {
            // Receiver lives as long as `shared`; only reachable during teardown
            err.into_inner().unschedule();
            return false;
        }

        debug!(index, "Unit queued for decoding");
        self.shared.metrics.record_enqueued();
        self.ensure_running();
        true
    }

    /// Ask the worker to stop at its next check point. Queued units stay
    /// queued until the next `enqueue` restarts the worker.
    pub fn cancel(&self) {
        let mut lifecycle = self.shared.lifecycle.lock();
        lifecycle.token.cancel();
        lifecycle.token = CancellationToken::new();
        lifecycle.restart = false;
        debug!(pending = self.shared.rx.len(), "Decode worker cancellation requested");
    }

    pub fn is_running(&self) -> bool {
        self.shared.lifecycle.lock().running
    }

    /// Units waiting in the queue
    pub fn pending(&self) -> usize {
        self.shared.rx.len()
    }

    pub fn metrics(&self) -> &Arc<SchedulerMetrics> {
        &self.shared.metrics
    }

    fn ensure_running(&self) {
        let token = {
            let mut lifecycle = self.shared.lifecycle.lock();
            if lifecycle.running {
                lifecycle.restart = true;
                return;
            }
            lifecycle.running = true;
            lifecycle.restart = false;
            lifecycle.token.clone()
        };

        self.shared.metrics.record_worker_start();
        info!(pending = self.shared.rx.len(), "Starting decode worker");
        self.runtime.spawn(worker::run(Arc::clone(&self.shared), token));
    }
}

impl Drop for ParsingScheduler {
    fn drop(&mut self) {
        self.shared.lifecycle.lock().token.cancel();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExitReason {
    Idle,
    Cancelled,
}

impl Shared {
    /// Decide whether the worker keeps going after leaving its drain loop.
    /// Returns the token for the next run, or marks the worker stopped.
    fn finish(&self, reason: ExitReason, token: &CancellationToken) -> Option<CancellationToken> {
        let mut lifecycle = self.lifecycle.lock();
        let wanted = !token.is_cancelled() || lifecycle.restart;
        if wanted && !self.rx.is_empty() {
            lifecycle.restart = false;
            debug!(?reason, pending = self.rx.len(), "Decode worker resuming");
            return Some(lifecycle.token.clone());
        }

        lifecycle.running = false;
        info!(?reason, pending = self.rx.len(), "Decode worker stopped");
        None
    }
}
