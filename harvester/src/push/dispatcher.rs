//! Single-worker push dispatch.
//!
//! Guarantees:
//! - exactly one worker task; jobs run strictly one at a time, in submission order
//! - bounded backlog: `submit` waits for free capacity instead of dropping
//! - after `stop()`, new submissions are rejected; queued jobs still drain
//!
//! Delivery failures are logged and counted, never retried here.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::backend::Pusher;
use crate::error::HarvestError;
use crate::metrics::HarvestCounters;
use crate::push::types::PushJob;

pub struct PushDispatcher {
    tx: Mutex<Option<Sender<PushJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    counters: HarvestCounters,
}

impl PushDispatcher {
    /// Starts the worker on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn(pusher: Arc<dyn Pusher>, capacity: usize, counters: HarvestCounters) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        let worker = PushWorker {
            pusher,
            counters: counters.clone(),
        };
        let handle = tokio::spawn(worker.run(rx));

        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(handle)),
            counters,
        }
    }

    /// Queues a job, waiting while the queue is full.
    pub async fn submit(&self, job: PushJob) -> Result<(), HarvestError> {
        let tx = self.tx.lock().clone();

        let Some(tx) = tx else {
            HarvestCounters::bump(&self.counters.pushes_rejected);
            return Err(HarvestError::DispatcherClosed {
                query: job.query().map(str::to_string),
            });
        };

        if let Err(e) = tx.send(job).await {
            HarvestCounters::bump(&self.counters.pushes_rejected);
            return Err(HarvestError::DispatcherClosed {
                query: e.0.timeline.query,
            });
        }

        HarvestCounters::bump(&self.counters.pushes_submitted);
        Ok(())
    }

    /// Closes the queue. Idempotent.
    pub fn stop(&self) {
        if self.tx.lock().take().is_some() {
            info!(component = "push", event = "shutdown", "push dispatcher stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.tx.lock().is_none()
    }

    /// Waits for the worker to drain and exit. Call after [`stop`](Self::stop).
    pub async fn join(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = ?e, "push worker terminated abnormally");
            }
        }
    }
}

/// Delivers jobs sequentially. This is the only place pushes happen.
struct PushWorker {
    pusher: Arc<dyn Pusher>,
    counters: HarvestCounters,
}

impl PushWorker {
    async fn run(self, mut rx: Receiver<PushJob>) {
        info!(component = "push", event = "startup", "push worker started");

        while let Some(job) = rx.recv().await {
            let span = info_span!(
                "push_job",
                query = job.query().unwrap_or(""),
                items = job.timeline.len()
            );
            self.deliver(job).instrument(span).await;
        }

        warn!(component = "push", "push queue closed; worker exiting");
    }

    async fn deliver(&self, job: PushJob) {
        // One target at a time keeps a single push in flight.
        for target in job.targets.iter() {
            match self.pusher.push(target, &job.timeline).await {
                Ok(receipt) => {
                    HarvestCounters::bump(&self.counters.pushes_delivered);
                    debug!(
                        peer = %target,
                        records = receipt.records,
                        new = receipt.new,
                        "push delivered"
                    );
                }
                Err(e) => {
                    HarvestCounters::bump(&self.counters.pushes_failed);
                    error!(peer = %target, error = %e, "push to backend failed");
                }
            }
        }
    }
}
