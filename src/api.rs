//! Request identifiers and the public response envelope.
//!
//! Every API exposed by the server replies with the same four-field JSON
//! envelope, so clients can share response handling across task families.

use crate::task::{FinishedReason, InferenceTaskResult, JobOutput};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a request identifier: the API name joined to a random hex suffix.
///
/// Identifiers look like `image_to_image_9bf3a1...` and are unique per call.
pub fn gen_request_id(api_name: &str) -> String {
    format!("{}_{}", api_name, Uuid::new_v4().simple())
}

/// The JSON envelope returned by every inference API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Server-local creation timestamp.
    pub created: String,
    /// Request identifier echoed back to the caller.
    pub id: String,
    /// Job completion policy outcome.
    pub finished_reason: FinishedReason,
    /// Named output lists produced by the model service.
    pub result: JobOutput,
}

/// Assemble the response envelope for a finished task.
pub fn build_response(request_id: &str, outcome: InferenceTaskResult) -> ResponseEnvelope {
    ResponseEnvelope {
        created: chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S%.6f")
            .to_string(),
        id: request_id.to_string(),
        finished_reason: outcome.finished_reason,
        result: outcome.result,
    }
}
