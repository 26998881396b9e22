//! Model server core: load gating, the serial job loop, and submission.
//!
//! A [`ModelServer`] owns one [`ModelService`] and processes submitted jobs
//! strictly one at a time, in submission order. Nothing executes before the
//! service's load step succeeds; submissions made earlier just wait in the
//! queue. Callers talk to the server through a cloneable [`ServerHandle`].

mod image;

pub use self::image::{ImageToImageService, OUTPUT_CLEANED, OUTPUT_IMAGES};

use crate::config::ModelKind;
use crate::error::{GantryError, Result};
use crate::observability;
use crate::task::{InferenceJob, InferenceTask, InferenceTaskResult, TaskStatus};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

/// A model family's serving capability: a one-time load step and a
/// per-job processing step.
///
/// `process` must absorb per-item failures and always produce a result;
/// dropping items is reported through the result's finished reason, never
/// by failing the job.
#[async_trait::async_trait]
pub trait ModelService: Send + Sync + 'static {
    /// Which task family this service implements.
    fn kind(&self) -> ModelKind;

    /// Load and prepare the model. Called once before any processing;
    /// failure is fatal to the server.
    async fn load(&mut self) -> Result<()>;

    /// Process one task end to end.
    async fn process(&self, task: &InferenceTask) -> InferenceTaskResult;
}

/// A task paired with the channel its result goes back on.
struct SubmittedJob {
    task: InferenceTask,
    respond: oneshot::Sender<InferenceTaskResult>,
}

/// Cloneable submission handle for a running [`ModelServer`].
#[derive(Clone)]
pub struct ServerHandle {
    tx: mpsc::Sender<SubmittedJob>,
    ready: watch::Receiver<bool>,
}

impl ServerHandle {
    /// Submit a job and wait for its result.
    ///
    /// The job queues until the server loop picks it up; queueing is allowed
    /// before the model finishes loading.
    pub async fn submit(&self, id: String, job: InferenceJob) -> Result<InferenceTaskResult> {
        let (respond, rx) = oneshot::channel();
        let task = InferenceTask::new(id, job);

        self.tx
            .send(SubmittedJob { task, respond })
            .await
            .map_err(|_| GantryError::Unavailable("model server is not running".to_string()))?;

        rx.await
            .map_err(|_| GantryError::Unavailable("model server dropped the task".to_string()))
    }

    /// Whether the model has been loaded.
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }
}

/// Hosts one model service and drains its job queue.
pub struct ModelServer<S: ModelService> {
    service: S,
    queue: mpsc::Receiver<SubmittedJob>,
    ready_tx: watch::Sender<bool>,
    loaded: bool,
}

impl<S: ModelService> ModelServer<S> {
    /// Create a server and its submission handle. `queue_depth` bounds how
    /// many jobs may wait; submissions beyond it apply backpressure.
    pub fn new(service: S, queue_depth: usize) -> (Self, ServerHandle) {
        let (tx, queue) = mpsc::channel(queue_depth.max(1));
        let (ready_tx, ready) = watch::channel(false);

        let server = Self {
            service,
            queue,
            ready_tx,
            loaded: false,
        };
        (server, ServerHandle { tx, ready })
    }

    /// Run the service's load step. Idempotent; an error aborts startup.
    pub async fn load(&mut self) -> Result<()> {
        if self.loaded {
            return Ok(());
        }

        let started = Instant::now();
        info!(kind = %self.service.kind(), "loading model service");
        self.service.load().await?;
        self.loaded = true;
        let _ = self.ready_tx.send(true);
        observability::set_model_loaded(self.service.kind());

        info!(
            kind = %self.service.kind(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model service ready"
        );
        Ok(())
    }

    /// Load if needed, then process jobs until every handle is dropped.
    pub async fn run(mut self) -> Result<()> {
        self.load().await?;

        while let Some(SubmittedJob { mut task, respond }) = self.queue.recv().await {
            task.status = TaskStatus::Running;
            let queued_ms = task.queued_at.elapsed().as_millis() as u64;
            debug!(
                task = %task.id,
                items = task.job.items.len(),
                queued_ms,
                "processing inference task"
            );

            let started = Instant::now();
            let result = self.service.process(&task).await;
            task.status = TaskStatus::Finished;

            observability::record_task(result.finished_reason, started.elapsed());
            info!(
                task = %task.id,
                finished_reason = %result.finished_reason,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "inference task finished"
            );

            if respond.send(result).is_err() {
                debug!(task = %task.id, "submitter went away before the result");
            }
        }

        info!("job queue closed, model server stopping");
        Ok(())
    }
}
