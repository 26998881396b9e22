//! End-to-end pipeline tests: submit jobs through a running model server
//! and check completion policy, output lists, and stored objects.

#[allow(dead_code)]
mod common;

use common::{memory_client, InvertModel, TestImageGenerator};
use gantry::api::{build_response, gen_request_id, ResponseEnvelope};
use gantry::config::{FetchConfig, ModelSettings};
use gantry::fetch::AssetFetcher;
use gantry::server::{ImageToImageService, ModelServer, ServerHandle, OUTPUT_CLEANED, OUTPUT_IMAGES};
use gantry::storage::ObjectStore;
use gantry::task::{FinishedReason, InferenceJob, ItemRef};

async fn start_server(bucket: &str) -> (std::sync::Arc<gantry::storage::MemoryStore>, ServerHandle) {
    let (store, client) = memory_client(bucket);
    let fetcher = AssetFetcher::new(client.clone(), &FetchConfig::default()).unwrap();
    let service = ImageToImageService::with_model(
        ModelSettings::default(),
        client,
        fetcher,
        Box::new(InvertModel),
    );

    let (mut server, handle) = ModelServer::new(service, 8);
    server.load().await.unwrap();
    tokio::spawn(server.run());

    (store, handle)
}

fn job_of(items: Vec<ItemRef>) -> InferenceJob {
    InferenceJob::new(items, Default::default())
}

#[tokio::test]
async fn test_all_items_valid_completes() {
    let (store, handle) = start_server("assets").await;
    let mut images = TestImageGenerator::new(7);
    for key in ["img1", "img2", "img3"] {
        store
            .put("assets", key, images.noise_png(900, 800))
            .await
            .unwrap();
    }

    let items = vec![
        ItemRef::Uri("img1".to_string()),
        ItemRef::Uri("img2".to_string()),
        ItemRef::Uri("img3".to_string()),
    ];
    let result = handle
        .submit(gen_request_id("image_to_image"), job_of(items))
        .await
        .unwrap();

    assert_eq!(result.finished_reason, FinishedReason::Completed);
    assert_eq!(result.result[OUTPUT_IMAGES].len(), 3);
    assert_eq!(result.result[OUTPUT_CLEANED].len(), 3);

    // Both representations were persisted for every item.
    for key in ["img1", "img2", "img3"] {
        for suffix in ["_original.png", "_predicted.png"] {
            let stored = store
                .get("assets", &format!("{key}{suffix}"))
                .await
                .unwrap();
            assert!(stored.is_some(), "missing {key}{suffix}");
        }
    }
}

#[tokio::test]
async fn test_locators_point_back_into_storage() {
    let (store, handle) = start_server("assets").await;
    store
        .put("assets", "photo", TestImageGenerator::new(3).noise_png(64, 64))
        .await
        .unwrap();

    let result = handle
        .submit(
            gen_request_id("image_to_image"),
            job_of(vec![ItemRef::Uri("photo".to_string())]),
        )
        .await
        .unwrap();

    assert_eq!(
        result.result[OUTPUT_IMAGES],
        vec!["s3://assets/photo_original.png".to_string()]
    );
    assert_eq!(
        result.result[OUTPUT_CLEANED],
        vec!["s3://assets/photo_predicted.png".to_string()]
    );
}

#[tokio::test]
async fn test_some_items_fail_is_partial() {
    let (store, handle) = start_server("assets").await;
    let mut images = TestImageGenerator::new(11);
    store
        .put("assets", "good1", images.noise_png(128, 128))
        .await
        .unwrap();
    store
        .put("assets", "good2", images.noise_png(128, 128))
        .await
        .unwrap();

    let items = vec![
        ItemRef::Uri("good1".to_string()),
        ItemRef::Uri("missing1".to_string()),
        ItemRef::Uri("good2".to_string()),
        ItemRef::Uri("missing2".to_string()),
    ];
    let result = handle
        .submit(gen_request_id("image_to_image"), job_of(items))
        .await
        .unwrap();

    assert_eq!(result.finished_reason, FinishedReason::Partial);
    assert_eq!(result.result[OUTPUT_IMAGES].len(), 2);
    assert_eq!(result.result[OUTPUT_CLEANED].len(), 2);
}

#[tokio::test]
async fn test_all_items_fail_returns_failed_not_error() {
    let (_store, handle) = start_server("assets").await;

    let items = vec![
        ItemRef::Uri("missing1".to_string()),
        ItemRef::Uri("missing2".to_string()),
    ];
    let result = handle
        .submit(gen_request_id("image_to_image"), job_of(items))
        .await
        .unwrap();

    assert_eq!(result.finished_reason, FinishedReason::Failed);
    assert!(result.result[OUTPUT_IMAGES].is_empty());
    assert!(result.result[OUTPUT_CLEANED].is_empty());
}

#[tokio::test]
async fn test_inline_items_round_trip() {
    let (store, handle) = start_server("assets").await;
    let payload = common::solid_png(32, 32, [200, 100, 50]);

    let result = handle
        .submit(
            gen_request_id("image_to_image"),
            job_of(vec![ItemRef::Data(payload.clone())]),
        )
        .await
        .unwrap();

    assert_eq!(result.finished_reason, FinishedReason::Completed);

    // Inline items land under a content-addressed stem.
    let stem = ItemRef::Data(payload).storage_stem();
    let stored = store
        .get("assets", &format!("{stem}_original.png"))
        .await
        .unwrap();
    assert!(stored.is_some());
}

#[tokio::test]
async fn test_oversized_input_is_downscaled_before_inference() {
    let (store, handle) = start_server("assets").await;
    store
        .put(
            "assets",
            "big",
            TestImageGenerator::new(5).noise_png(2048, 1536),
        )
        .await
        .unwrap();

    let result = handle
        .submit(
            gen_request_id("image_to_image"),
            job_of(vec![ItemRef::Uri("big".to_string())]),
        )
        .await
        .unwrap();
    assert_eq!(result.finished_reason, FinishedReason::Completed);

    let stored = store
        .get("assets", "big_original.png")
        .await
        .unwrap()
        .unwrap();
    let decoded = image::load_from_memory(&stored).unwrap();
    assert_eq!(
        (decoded.width(), decoded.height()),
        (1024, 768),
        "persisted original reflects the resize policy"
    );
}

#[tokio::test]
async fn test_envelope_matches_task_result() {
    let (store, handle) = start_server("assets").await;
    store
        .put("assets", "one", TestImageGenerator::new(9).noise_png(50, 50))
        .await
        .unwrap();

    let request_id = gen_request_id("image_to_image");
    let result = handle
        .submit(
            request_id.clone(),
            job_of(vec![
                ItemRef::Uri("one".to_string()),
                ItemRef::Uri("gone".to_string()),
            ]),
        )
        .await
        .unwrap();

    let envelope = build_response(&request_id, result);
    let text = serde_json::to_string(&envelope).unwrap();
    let parsed: ResponseEnvelope = serde_json::from_str(&text).unwrap();

    assert_eq!(parsed.id, request_id);
    assert_eq!(parsed.finished_reason, FinishedReason::Partial);
    assert_eq!(parsed.result[OUTPUT_IMAGES].len(), 1);
    assert_eq!(parsed.result[OUTPUT_CLEANED].len(), 1);
}
