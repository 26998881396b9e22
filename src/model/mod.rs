//! Model lifecycle: artifact loading, preparation, and the inference seam.
//!
//! Loading follows a fixed order: deserialize the artifact, zero denormal
//! parameters at full precision, reduce to half precision while binding to
//! the execution target, then flip the model into inference mode. The types
//! enforce the order: cleanup only exists on [`ModelArtifact`], and
//! conversion consumes it.

mod artifact;

pub use artifact::{ArtifactStats, ModelArtifact, ParamTensor, DENORMAL_EPS};

use crate::config::ModelSettings;
use crate::error::{GantryError, Result};
use crate::storage::StorageClient;
use crate::task::GenerationParams;
use crate::tensor::ImageTensor;
use half::f16;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

/// The inference capability bound into an image service.
///
/// Implementations hold prepared weights and must be safe to call from the
/// serving loop; per-call failures surface as errors and are absorbed by the
/// pipeline as per-item drops.
pub trait ImageModel: Send + Sync {
    /// Run the model over one preprocessed input tensor.
    fn infer(&self, input: &ImageTensor, params: &GenerationParams) -> Result<ImageTensor>;
}

/// One named parameter tensor at reduced precision.
#[derive(Debug, Clone)]
pub struct HalfTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f16>,
}

/// A prepared model: half-precision parameters bound to a device.
#[derive(Debug)]
pub struct LoadedModel {
    params: BTreeMap<String, HalfTensor>,
    device: String,
    inference_mode: bool,
}

impl LoadedModel {
    /// Reduce an artifact's parameters to half precision and bind them to an
    /// execution target. The result starts outside inference mode.
    pub(crate) fn from_artifact(artifact: ModelArtifact, device: &str) -> Self {
        let mut params = BTreeMap::new();
        for (name, tensor) in artifact.params() {
            params.insert(
                name.clone(),
                HalfTensor {
                    shape: tensor.shape.clone(),
                    data: tensor.data.iter().map(|&v| f16::from_f32(v)).collect(),
                },
            );
        }
        Self {
            params,
            device: device.to_string(),
            inference_mode: false,
        }
    }

    /// Flip the model in or out of inference mode.
    pub fn set_inference_mode(&mut self, enabled: bool) {
        self.inference_mode = enabled;
    }

    pub fn inference_mode(&self) -> bool {
        self.inference_mode
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn param(&self, name: &str) -> Option<&HalfTensor> {
        self.params.get(name)
    }

    pub fn tensor_count(&self) -> usize {
        self.params.len()
    }

    /// Run the full load sequence for the configured artifact.
    ///
    /// Resolution mirrors the artifact URI: locators in the client's scheme
    /// come from object storage, anything else is read as a local path. Any
    /// failure here is fatal to startup.
    pub async fn load(settings: &ModelSettings, storage: &StorageClient) -> Result<Self> {
        let started = Instant::now();

        let bytes = if storage.owns_uri(&settings.uri) {
            let locator = settings.uri.parse()?;
            storage.get(&locator).await.map_err(|e| {
                GantryError::ModelLoad(format!("failed to fetch artifact {}: {e}", settings.uri))
            })?
        } else {
            tokio::fs::read(&settings.uri).await.map_err(|e| {
                GantryError::ModelLoad(format!("failed to read artifact {}: {e}", settings.uri))
            })?
        };

        let mut artifact = ModelArtifact::from_bytes(&bytes)
            .map_err(|e| GantryError::ModelLoad(format!("failed to deserialize artifact: {e}")))?;

        let zeroed = artifact.zero_denormals(DENORMAL_EPS);
        let stats = artifact.stats();
        info!(
            tensors = stats.tensors,
            elements = stats.elements,
            min = stats.min,
            max = stats.max,
            zeroed,
            "model artifact prepared"
        );

        let mut model = artifact.into_loaded(&settings.device);
        model.set_inference_mode(true);

        info!(
            device = %model.device,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model loaded"
        );
        Ok(model)
    }
}

impl ImageModel for LoadedModel {
    // Reference runtime: forwards the prepared input unchanged. Real
    // backends implement ImageModel themselves and get bound at service
    // construction.
    fn infer(&self, input: &ImageTensor, _params: &GenerationParams) -> Result<ImageTensor> {
        if !self.inference_mode {
            return Err(GantryError::Inference(
                "model is not in inference mode".to_string(),
            ));
        }
        Ok(input.clone())
    }
}
