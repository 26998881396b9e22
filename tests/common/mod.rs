//! Common test utilities for integration tests.

use gantry::error::Result;
use gantry::model::ImageModel;
use gantry::storage::{MemoryStore, StorageClient};
use gantry::task::GenerationParams;
use gantry::tensor::ImageTensor;
use image::DynamicImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Cursor;
use std::net::TcpListener;
use std::sync::Arc;

/// Find an available port for testing.
pub fn find_available_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to port");
    listener.local_addr().unwrap().port()
}

/// Deterministic image generator for reproducible tests.
pub struct TestImageGenerator {
    rng: StdRng,
}

impl TestImageGenerator {
    /// Creates a new generator with a fixed seed for reproducibility.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generates PNG bytes for a noise image of the given dimensions.
    pub fn noise_png(&mut self, width: u32, height: u32) -> Vec<u8> {
        let mut buf = image::RgbImage::new(width, height);
        for pixel in buf.pixels_mut() {
            *pixel = image::Rgb([self.rng.gen(), self.rng.gen(), self.rng.gen()]);
        }
        encode_png(DynamicImage::ImageRgb8(buf))
    }
}

/// PNG bytes for a solid-color image.
pub fn solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let buf = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    encode_png(DynamicImage::ImageRgb8(buf))
}

fn encode_png(img: DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("png encoding");
    bytes
}

/// Storage client over a fresh in-memory store.
pub fn memory_client(bucket: &str) -> (Arc<MemoryStore>, StorageClient) {
    let store = Arc::new(MemoryStore::new());
    let client = StorageClient::new(store.clone(), "s3", bucket);
    (store, client)
}

/// Model that inverts pixel values, so predictions differ from inputs.
pub struct InvertModel;

impl ImageModel for InvertModel {
    fn infer(&self, input: &ImageTensor, _params: &GenerationParams) -> Result<ImageTensor> {
        let data = input.data().iter().map(|v| 1.0 - v).collect();
        ImageTensor::new(input.channels(), input.height(), input.width(), data)
    }
}
