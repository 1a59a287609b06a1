use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use quarry_core::config::EmbeddingConfig;
use quarry_core::models::{fields, Record};
use quarry_core::traits::IEncoder;
use quarry_core::CancellationToken;
use quarry_embeddings::{BatchEncoder, EncodeCache, HashingEncoder};

fn corpus(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| {
            let f = fields([("text", format!("benchmark passage {i} about retrieval and ranking"))]);
            Record {
                id: i as u64 + 1,
                content_hash: Record::compute_content_hash(&f).unwrap(),
                fields: f,
            }
        })
        .collect()
}

fn bench_hashing_encoder(c: &mut Criterion) {
    let encoder = HashingEncoder::new(384);
    let texts: Vec<String> = (0..64)
        .map(|i| format!("some moderately long passage number {i} for hashing"))
        .collect();
    c.bench_function("hashing_encode_64", |b| b.iter(|| encoder.encode_batch(&texts).unwrap()));
}

fn bench_batch_encoder_cold(c: &mut Criterion) {
    let config = EmbeddingConfig {
        l2_cache_enabled: false,
        ..EmbeddingConfig::default()
    };
    let records = corpus(2_000);
    c.bench_function("batch_encode_2000_cold", |b| {
        b.iter(|| {
            let cache = Arc::new(EncodeCache::memory_only(10_000));
            let encoder = BatchEncoder::new(
                Arc::new(HashingEncoder::new(384)),
                cache,
                &config,
                vec!["text".to_string()],
            )
            .unwrap();
            encoder
                .run(records.iter().cloned().map(Ok), |_| Ok(()), &CancellationToken::new())
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_hashing_encoder, bench_batch_encoder_cold);
criterion_main!(benches);
