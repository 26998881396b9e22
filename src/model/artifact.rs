//! Serialized model artifacts and full-precision parameter cleanup.
//!
//! Artifacts carry named parameter tensors at full (`f32`) precision.
//! Denormal cleanup happens here, before any precision reduction, so values
//! destined to vanish are zeroed exactly instead of surviving as subnormal
//! noise in the reduced representation.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Threshold below which parameter magnitudes are treated as denormal noise.
pub const DENORMAL_EPS: f32 = 1e-5;

/// One named parameter tensor at full precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamTensor {
    /// Tensor dimensions, row-major.
    pub shape: Vec<usize>,
    /// Flat element data.
    pub data: Vec<f32>,
}

impl ParamTensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self { shape, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Summary statistics over an artifact's parameters, logged at load time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArtifactStats {
    pub tensors: usize,
    pub elements: usize,
    pub min: f32,
    pub max: f32,
}

/// A deserialized model artifact: named parameter tensors at `f32`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelArtifact {
    params: BTreeMap<String, ParamTensor>,
}

impl ModelArtifact {
    pub fn new(params: BTreeMap<String, ParamTensor>) -> Self {
        Self { params }
    }

    /// Deserialize an artifact from its wire form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Serialize the artifact to its wire form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn param(&self, name: &str) -> Option<&ParamTensor> {
        self.params.get(name)
    }

    pub fn params(&self) -> impl Iterator<Item = (&String, &ParamTensor)> {
        self.params.iter()
    }

    pub fn tensor_count(&self) -> usize {
        self.params.len()
    }

    /// Zero every parameter whose magnitude is strictly below `eps`.
    ///
    /// Values exactly at `eps` survive, as do NaNs and values already zero.
    /// Returns how many elements were changed.
    pub fn zero_denormals(&mut self, eps: f32) -> usize {
        let mut zeroed = 0;
        for tensor in self.params.values_mut() {
            for value in &mut tensor.data {
                if value.abs() < eps && *value != 0.0 {
                    *value = 0.0;
                    zeroed += 1;
                }
            }
        }
        zeroed
    }

    /// Parameter statistics for startup logging.
    pub fn stats(&self) -> ArtifactStats {
        let mut elements = 0;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;

        for tensor in self.params.values() {
            elements += tensor.len();
            for &value in &tensor.data {
                min = min.min(value);
                max = max.max(value);
            }
        }

        if elements == 0 {
            min = 0.0;
            max = 0.0;
        }

        ArtifactStats {
            tensors: self.params.len(),
            elements,
            min,
            max,
        }
    }

    /// Consume the artifact, reducing parameters to half precision and
    /// binding them to an execution target.
    ///
    /// This is deliberately only reachable from the full-precision form:
    /// cleanup must already have happened by the time precision drops.
    pub fn into_loaded(self, device: &str) -> super::LoadedModel {
        super::LoadedModel::from_artifact(self, device)
    }
}
