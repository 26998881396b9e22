//! Inference task types: jobs, items, statuses, and completion policy.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Instant;

/// How a finished job relates to what was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishedReason {
    /// Every submitted item produced output.
    Completed,
    /// Some items were dropped along the way.
    Partial,
    /// No item produced output.
    Failed,
}

impl FinishedReason {
    /// Derive the completion reason from submitted and produced item counts.
    ///
    /// An empty job counts as completed: nothing was asked for, nothing was
    /// dropped.
    pub fn from_counts(submitted: usize, produced: usize) -> Self {
        if produced == submitted {
            FinishedReason::Completed
        } else if produced == 0 {
            FinishedReason::Failed
        } else {
            FinishedReason::Partial
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FinishedReason::Completed => "completed",
            FinishedReason::Partial => "partial",
            FinishedReason::Failed => "failed",
        }
    }
}

impl std::fmt::Display for FinishedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work inside a job: either a reference to fetch or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemRef {
    /// A storage locator, bare object key, or HTTP(S) URL.
    Uri(String),
    /// Payload carried inline with the request.
    Data(Vec<u8>),
}

impl ItemRef {
    /// Deterministic stem used to derive output storage keys for this item.
    ///
    /// URI items keep their reference string. Inline items get a stem from a
    /// content digest, so resubmitting the same bytes lands on the same keys.
    pub fn storage_stem(&self) -> String {
        match self {
            ItemRef::Uri(uri) => uri.clone(),
            ItemRef::Data(bytes) => {
                let digest = Sha256::digest(bytes);
                format!("inline_{:x}", digest)[..23].to_string()
            }
        }
    }
}

impl std::fmt::Display for ItemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemRef::Uri(uri) => f.write_str(uri),
            ItemRef::Data(bytes) => write!(f, "inline ({} bytes)", bytes.len()),
        }
    }
}

/// Keyword parameters forwarded to the model at inference time.
pub type GenerationParams = BTreeMap<String, serde_json::Value>;

/// Named output lists produced by a model service.
pub type JobOutput = BTreeMap<String, Vec<String>>;

/// A batch of items submitted for inference, plus per-job parameters.
#[derive(Debug, Clone, Default)]
pub struct InferenceJob {
    /// Items to process, in submission order.
    pub items: Vec<ItemRef>,
    /// Request-level parameters, merged over the configured defaults.
    pub params: GenerationParams,
}

impl InferenceJob {
    pub fn new(items: Vec<ItemRef>, params: GenerationParams) -> Self {
        Self { items, params }
    }
}

/// Lifecycle state of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Queued, not yet picked up by the server loop.
    Pending,
    /// Currently being processed.
    Running,
    /// Processing finished and the result was produced.
    Finished,
}

/// One tracked inference request flowing through the server.
#[derive(Debug)]
pub struct InferenceTask {
    /// Request identifier assigned at submission.
    pub id: String,
    /// The submitted work.
    pub job: InferenceJob,
    /// Current lifecycle state.
    pub status: TaskStatus,
    /// When the task entered the queue.
    pub queued_at: Instant,
}

impl InferenceTask {
    pub fn new(id: String, job: InferenceJob) -> Self {
        Self {
            id,
            job,
            status: TaskStatus::Pending,
            queued_at: Instant::now(),
        }
    }
}

/// Final outcome of a task: completion reason plus named output lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceTaskResult {
    pub finished_reason: FinishedReason,
    pub result: JobOutput,
}

impl InferenceTaskResult {
    /// A result carrying no output, used when every item was dropped.
    pub fn empty(finished_reason: FinishedReason) -> Self {
        Self {
            finished_reason,
            result: BTreeMap::new(),
        }
    }
}
