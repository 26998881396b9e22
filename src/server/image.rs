//! Image-to-image model service: fetch, preprocess, infer, persist.

use crate::config::{ModelKind, ModelSettings};
use crate::error::Result;
use crate::fetch::AssetFetcher;
use crate::model::{ImageModel, LoadedModel};
use crate::observability;
use crate::storage::StorageClient;
use crate::task::{
    FinishedReason, GenerationParams, InferenceTask, InferenceTaskResult, ItemRef,
};
use crate::tensor::ImageTensor;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Output list holding locators of the stored pre-inference images.
pub const OUTPUT_IMAGES: &str = "images_uri";
/// Output list holding locators of the stored predictions.
pub const OUTPUT_CLEANED: &str = "cleaned_images_uri";

const ORIGINAL_SUFFIX: &str = "_original.png";
const PREDICTED_SUFFIX: &str = "_predicted.png";

/// Serves one image-to-image model over object-storage-backed assets.
///
/// Per item: decode the payload into a normalized tensor, resize it into the
/// configured bounds, run the model, and persist both the original and the
/// predicted image next to each other. Items failing any step are dropped
/// with a log line; the two output lists stay parallel.
pub struct ImageToImageService {
    settings: ModelSettings,
    storage: StorageClient,
    fetcher: AssetFetcher,
    model: Option<Box<dyn ImageModel>>,
}

impl ImageToImageService {
    pub fn new(settings: ModelSettings, storage: StorageClient, fetcher: AssetFetcher) -> Self {
        Self {
            settings,
            storage,
            fetcher,
            model: None,
        }
    }

    /// Construct with a pre-bound model, skipping artifact loading. Used to
    /// serve externally prepared backends.
    pub fn with_model(
        settings: ModelSettings,
        storage: StorageClient,
        fetcher: AssetFetcher,
        model: Box<dyn ImageModel>,
    ) -> Self {
        Self {
            settings,
            storage,
            fetcher,
            model: Some(model),
        }
    }

    /// Job parameters merged over the configured defaults.
    fn effective_params(&self, job_params: &GenerationParams) -> GenerationParams {
        let mut params = self.settings.generation_params.clone();
        params.extend(job_params.clone());
        params
    }

    /// Run one item through the pipeline. Returns the stored locator pair,
    /// or `None` when the item is dropped at any step.
    async fn process_item(
        &self,
        model: &dyn ImageModel,
        task_id: &str,
        item: &ItemRef,
        payload: Vec<u8>,
        params: &GenerationParams,
    ) -> Option<(String, String)> {
        let tensor = match ImageTensor::from_bytes(&payload) {
            Ok(tensor) => tensor,
            Err(e) => {
                warn!(task = %task_id, item = %item, error = %e, "failed to decode image");
                observability::record_item_dropped("decode");
                return None;
            }
        };

        let tensor = tensor.resize_to_bounds(self.settings.resize_min, self.settings.resize_max);

        let started = Instant::now();
        let predicted = match model.infer(&tensor, params) {
            Ok(predicted) => predicted,
            Err(e) => {
                warn!(task = %task_id, item = %item, error = %e, "inference failed");
                observability::record_item_dropped("inference");
                return None;
            }
        };
        observability::record_inference(started.elapsed());
        debug!(
            task = %task_id,
            item = %item,
            width = tensor.width(),
            height = tensor.height(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "inference complete"
        );

        let (original_png, predicted_png) = match (tensor.to_png(), predicted.to_png()) {
            (Ok(original), Ok(predicted)) => (original, predicted),
            (Err(e), _) | (_, Err(e)) => {
                warn!(task = %task_id, item = %item, error = %e, "failed to encode output");
                observability::record_item_dropped("encode");
                return None;
            }
        };

        let stem = item.storage_stem();
        let original_uri = self
            .storage
            .try_put(&format!("{stem}{ORIGINAL_SUFFIX}"), original_png)
            .await;
        let predicted_uri = self
            .storage
            .try_put(&format!("{stem}{PREDICTED_SUFFIX}"), predicted_png)
            .await;

        match (original_uri, predicted_uri) {
            (Some(original), Some(predicted)) => {
                observability::record_item_processed();
                Some((original, predicted))
            }
            // Partial persistence drops the item so the output lists stay
            // parallel; the failed upload is already logged.
            _ => {
                observability::record_item_dropped("persist");
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl super::ModelService for ImageToImageService {
    fn kind(&self) -> ModelKind {
        self.settings.kind
    }

    async fn load(&mut self) -> Result<()> {
        if self.model.is_some() {
            return Ok(());
        }

        let model = LoadedModel::load(&self.settings, &self.storage).await?;
        info!(uri = %self.settings.uri, device = %self.settings.device, "image model bound");
        self.model = Some(Box::new(model));
        Ok(())
    }

    async fn process(&self, task: &InferenceTask) -> InferenceTaskResult {
        let Some(model) = self.model.as_deref() else {
            error!(task = %task.id, "process called before load");
            return InferenceTaskResult::empty(FinishedReason::Failed);
        };

        let submitted = task.job.items.len();
        let params = self.effective_params(&task.job.params);

        let mut originals = Vec::with_capacity(submitted);
        let mut cleaned = Vec::with_capacity(submitted);

        let mut outcomes = self.fetcher.fetch_all(task.job.items.clone());
        while let Some(outcome) = outcomes.recv().await {
            let Some(payload) = outcome.payload else {
                continue; // fetch layer already logged the drop
            };
            if let Some((original, predicted)) = self
                .process_item(model, &task.id, &outcome.item, payload, &params)
                .await
            {
                originals.push(original);
                cleaned.push(predicted);
            }
        }

        let produced = originals.len();
        let finished_reason = FinishedReason::from_counts(submitted, produced);
        if produced < submitted {
            warn!(
                task = %task.id,
                submitted,
                produced,
                "task finished with dropped items"
            );
        }

        let mut result = BTreeMap::new();
        result.insert(OUTPUT_IMAGES.to_string(), originals);
        result.insert(OUTPUT_CLEANED.to_string(), cleaned);

        InferenceTaskResult {
            finished_reason,
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use crate::error::GantryError;
    use crate::server::ModelService;
    use crate::storage::{MemoryStore, ObjectStore};
    use crate::task::InferenceJob;
    use image::DynamicImage;
    use std::io::Cursor;
    use std::sync::Arc;

    /// Inverts pixel values, so predictions differ from originals.
    struct InvertModel;

    impl ImageModel for InvertModel {
        fn infer(&self, input: &ImageTensor, _params: &GenerationParams) -> Result<ImageTensor> {
            let data = input.data().iter().map(|v| 1.0 - v).collect();
            ImageTensor::new(input.channels(), input.height(), input.width(), data)
        }
    }

    struct FailingModel;

    impl ImageModel for FailingModel {
        fn infer(&self, _input: &ImageTensor, _params: &GenerationParams) -> Result<ImageTensor> {
            Err(GantryError::Inference("backend exploded".to_string()))
        }
    }

    /// Store that rejects writes to keys containing a marker.
    struct PickyStore {
        inner: MemoryStore,
        reject_substring: String,
    }

    #[async_trait::async_trait]
    impl ObjectStore for PickyStore {
        async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
            self.inner.get(bucket, key).await
        }

        async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
            if key.contains(&self.reject_substring) {
                return Err(GantryError::Storage("write rejected".to_string()));
            }
            self.inner.put(bucket, key, data).await
        }
    }

    fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let buf = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(buf)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn service_over(store: Arc<dyn ObjectStore>, model: Box<dyn ImageModel>) -> ImageToImageService {
        let client = StorageClient::new(store, "s3", "assets");
        let fetcher = AssetFetcher::new(client.clone(), &FetchConfig::default()).unwrap();
        ImageToImageService::with_model(ModelSettings::default(), client, fetcher, model)
    }

    fn task_of(items: Vec<ItemRef>) -> InferenceTask {
        InferenceTask::new("image_to_image_test".to_string(), InferenceJob::new(items, GenerationParams::new()))
    }

    #[tokio::test]
    async fn test_outputs_mirror_item_stems() {
        let store = Arc::new(MemoryStore::new());
        store
            .put("assets", "photos/dog", png_bytes(8, 8, [10, 20, 30]))
            .await
            .unwrap();
        let service = service_over(store.clone(), Box::new(InvertModel));

        let result = service
            .process(&task_of(vec![ItemRef::Uri("photos/dog".to_string())]))
            .await;

        assert_eq!(result.finished_reason, FinishedReason::Completed);
        assert_eq!(
            result.result[OUTPUT_IMAGES],
            vec!["s3://assets/photos/dog_original.png".to_string()]
        );
        assert_eq!(
            result.result[OUTPUT_CLEANED],
            vec!["s3://assets/photos/dog_predicted.png".to_string()]
        );

        let original = store
            .get("assets", "photos/dog_original.png")
            .await
            .unwrap()
            .unwrap();
        let predicted = store
            .get("assets", "photos/dog_predicted.png")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(original, predicted, "prediction differs from original");
    }

    #[tokio::test]
    async fn test_undecodable_payload_drops_item() {
        let service = service_over(Arc::new(MemoryStore::new()), Box::new(InvertModel));

        let result = service
            .process(&task_of(vec![
                ItemRef::Data(png_bytes(4, 4, [1, 2, 3])),
                ItemRef::Data(vec![0xde, 0xad]),
            ]))
            .await;

        assert_eq!(result.finished_reason, FinishedReason::Partial);
        assert_eq!(result.result[OUTPUT_IMAGES].len(), 1);
        assert_eq!(result.result[OUTPUT_CLEANED].len(), 1);
    }

    #[tokio::test]
    async fn test_inference_failure_drops_item_not_job() {
        let service = service_over(Arc::new(MemoryStore::new()), Box::new(FailingModel));

        let result = service
            .process(&task_of(vec![ItemRef::Data(png_bytes(4, 4, [9, 9, 9]))]))
            .await;

        assert_eq!(result.finished_reason, FinishedReason::Failed);
        assert!(result.result[OUTPUT_IMAGES].is_empty());
        assert!(result.result[OUTPUT_CLEANED].is_empty());
    }

    #[tokio::test]
    async fn test_partial_persistence_drops_item() {
        let store = Arc::new(PickyStore {
            inner: MemoryStore::new(),
            reject_substring: PREDICTED_SUFFIX.to_string(),
        });
        let service = service_over(store, Box::new(InvertModel));

        let result = service
            .process(&task_of(vec![ItemRef::Data(png_bytes(4, 4, [5, 5, 5]))]))
            .await;

        assert_eq!(result.finished_reason, FinishedReason::Failed);
        assert!(result.result[OUTPUT_IMAGES].is_empty());
        assert!(result.result[OUTPUT_CLEANED].is_empty());
    }

    #[tokio::test]
    async fn test_empty_job_completes_with_empty_lists() {
        let service = service_over(Arc::new(MemoryStore::new()), Box::new(InvertModel));

        let result = service.process(&task_of(Vec::new())).await;

        assert_eq!(result.finished_reason, FinishedReason::Completed);
        assert!(result.result[OUTPUT_IMAGES].is_empty());
        assert!(result.result[OUTPUT_CLEANED].is_empty());
    }

    #[tokio::test]
    async fn test_request_params_override_defaults() {
        let mut settings = ModelSettings::default();
        settings
            .generation_params
            .insert("strength".to_string(), serde_json::json!(0.2));
        settings
            .generation_params
            .insert("steps".to_string(), serde_json::json!(10));

        let client = StorageClient::new(Arc::new(MemoryStore::new()), "s3", "assets");
        let fetcher = AssetFetcher::new(client.clone(), &FetchConfig::default()).unwrap();
        let service =
            ImageToImageService::with_model(settings, client, fetcher, Box::new(InvertModel));

        let mut job_params = GenerationParams::new();
        job_params.insert("strength".to_string(), serde_json::json!(0.9));

        let merged = service.effective_params(&job_params);
        assert_eq!(merged["strength"], serde_json::json!(0.9));
        assert_eq!(merged["steps"], serde_json::json!(10));
    }
}
