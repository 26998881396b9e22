//! Benchmarks for the image preprocessing path.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gantry::model::{ModelArtifact, ParamTensor, DENORMAL_EPS};
use gantry::tensor::ImageTensor;
use std::collections::BTreeMap;

fn gradient_tensor(width: usize, height: usize) -> ImageTensor {
    let mut data = Vec::with_capacity(3 * height * width);
    for c in 0..3usize {
        for y in 0..height {
            for x in 0..width {
                data.push(((x + y + c) % 256) as f32 / 255.0);
            }
        }
    }
    ImageTensor::new(3, height, width, data).unwrap()
}

fn bench_resize(c: &mut Criterion) {
    let mut group = c.benchmark_group("resize_to_bounds");

    for (w, h) in [(512, 400), (1600, 1200), (2048, 1536), (4096, 3072)].iter() {
        let tensor = gradient_tensor(*w, *h);

        group.throughput(Throughput::Elements((w * h) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", w, h)),
            &tensor,
            |b, t| b.iter(|| black_box(t.clone()).resize_to_bounds(768, 1024)),
        );
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_png");

    for (w, h) in [(256, 256), (1024, 768), (2048, 1536)].iter() {
        let png = gradient_tensor(*w, *h).to_png().unwrap();

        group.throughput(Throughput::Bytes(png.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", w, h)),
            &png,
            |b, bytes| b.iter(|| ImageTensor::from_bytes(black_box(bytes))),
        );
    }
    group.finish();
}

fn bench_zero_denormals(c: &mut Criterion) {
    let mut group = c.benchmark_group("zero_denormals");

    for elements in [65_536usize, 1_048_576].iter() {
        let values: Vec<f32> = (0..*elements)
            .map(|i| if i % 7 == 0 { 1e-7 } else { 0.5 })
            .collect();
        let mut params = BTreeMap::new();
        params.insert(
            "weight".to_string(),
            ParamTensor::new(vec![*elements], values),
        );
        let artifact = ModelArtifact::new(params);

        group.throughput(Throughput::Elements(*elements as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(elements),
            &artifact,
            |b, a| {
                b.iter(|| {
                    let mut scratch = a.clone();
                    scratch.zero_denormals(black_box(DENORMAL_EPS))
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_resize, bench_decode, bench_zero_denormals);
criterion_main!(benches);
