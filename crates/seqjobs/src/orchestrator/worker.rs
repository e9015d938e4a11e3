use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info};
use tracing::info_span;

use crate::analyst::{AnalysisOutcome, AnalysisParams, AnalystRegistry};
use crate::error::{AnalysisError, SubmitError};
use crate::sanitize::redact_path;

/// A queued analysis run.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub job_id: String,
    pub analyst_name: String,
    pub params: AnalysisParams,
}

/// Lifecycle report sent from a worker to the reconciler.
#[derive(Debug)]
pub enum WorkerMessage {
    Started {
        job_id: String,
        at: DateTime<Utc>,
    },
    Finished {
        job_id: String,
        result: Result<AnalysisOutcome, String>,
        at: DateTime<Utc>,
    },
}

/// Fixed pool of analysis threads fed by an unbounded FIFO queue.
pub struct WorkerPool {
    job_sender: Mutex<Option<Sender<WorkItem>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts `worker_count` workers reporting to `messages`.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn new(
        registry: Arc<AnalystRegistry>,
        worker_count: usize,
        messages: Sender<WorkerMessage>,
    ) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        let (job_sender, job_receiver) = unbounded::<WorkItem>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let message_tx = messages.clone();
            let worker_registry = Arc::clone(&registry);

            let handle = thread::spawn(move || {
                run_worker(worker_id, job_rx, message_tx, worker_registry);
            });
            workers.push(handle);
        }

        info!("Started {} analysis workers", worker_count);

        Self {
            job_sender: Mutex::new(Some(job_sender)),
            workers: Mutex::new(workers),
            shutdown,
        }
    }

    pub fn submit(&self, item: WorkItem) -> Result<(), SubmitError> {
        self.submit_with(item, || Ok(()))
    }

    /// Runs `admit` and enqueues `item` while holding the queue, so a
    /// concurrent [`shutdown`](Self::shutdown) either happens before `admit`
    /// runs or after `item` is queued. Nothing is enqueued if `admit` fails.
    pub fn submit_with<F>(&self, item: WorkItem, admit: F) -> Result<(), SubmitError>
    where
        F: FnOnce() -> Result<(), SubmitError>,
    {
        let sender = self.job_sender.lock().unwrap_or_else(|p| p.into_inner());
        let sender = match sender.as_ref() {
            Some(sender) if !self.is_shutdown() => sender,
            _ => return Err(SubmitError::ShuttingDown),
        };

        admit()?;
        sender.send(item).map_err(|_| SubmitError::ShuttingDown)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Stops accepting work, lets queued items drain, and joins the workers.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::Relaxed) {
            return;
        }
        info!("Shutting down worker pool...");

        // Dropping the sender lets workers exit once the queue is empty.
        drop(
            self.job_sender
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .take(),
        );

        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(|p| p.into_inner()));
        for (i, worker) in workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<WorkItem>,
    messages: Sender<WorkerMessage>,
    registry: Arc<AnalystRegistry>,
) {
    debug!("Worker {} started", worker_id);

    // recv drains queued items before reporting disconnection.
    while let Ok(item) = job_receiver.recv() {
        debug!("Worker {} picked up job {}", worker_id, item.job_id);

        let started = WorkerMessage::Started {
            job_id: item.job_id.clone(),
            at: Utc::now(),
        };
        if messages.send(started).is_err() {
            error!("Worker {} lost its reconciler", worker_id);
            break;
        }

        let result = run_item(&registry, &item);

        let finished = WorkerMessage::Finished {
            job_id: item.job_id,
            result,
            at: Utc::now(),
        };
        if messages.send(finished).is_err() {
            error!("Worker {} lost its reconciler", worker_id);
            break;
        }
    }

    debug!("Worker {} stopped", worker_id);
}

/// Runs one item, turning errors and panics into a failure cause.
fn run_item(registry: &AnalystRegistry, item: &WorkItem) -> Result<AnalysisOutcome, String> {
    let input = item
        .params
        .input_file()
        .map(|u| redact_path(&u.source_path))
        .unwrap_or_default();
    let _span = info_span!(
        "analysis",
        job_id = %item.job_id,
        analyst = %item.analyst_name,
        input = %input
    )
    .entered();

    let dispatched = panic::catch_unwind(AssertUnwindSafe(|| {
        registry.dispatch(&item.analyst_name, &item.params)
    }));

    match dispatched {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            error!("Analyst {} panicked on job {}: {}", item.analyst_name, item.job_id, reason);
            Err(AnalysisError::Panicked(reason).to_string())
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
