// Engram hot-path benchmarks: hashing, table lookup, mixing, fingerprinting.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use engram_core::atoms::engram_types::EngramConfig;
use engram_core::engine::engram::{EngramModule, FingerprintExtractor, Tokenizer};
use std::sync::Arc;

fn token_stream(len: usize, vocab: u32) -> Vec<u32> {
    (0..len as u64)
        .map(|i| (i.wrapping_mul(0x9E37_79B9).rotate_left(7) % vocab as u64) as u32)
        .collect()
}

fn bench_hash_windows(c: &mut Criterion) {
    let config = EngramConfig::default();
    let module = EngramModule::new(config.clone(), config.hidden_size).unwrap();
    let hasher = module.hasher();

    let mut group = c.benchmark_group("hash_windows");
    for len in [128usize, 2048] {
        let tokens = token_stream(len, config.vocab_size);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &tokens, |b, tokens| {
            b.iter(|| hasher.hash_all_orders(black_box(tokens)).unwrap())
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let config = EngramConfig::default();
    let module = EngramModule::new(config.clone(), config.hidden_size).unwrap();
    let tokens = token_stream(512, config.vocab_size);

    c.bench_function("ngram_embeddings_512", |b| {
        b.iter(|| module.ngram_embeddings(black_box(&tokens)).unwrap())
    });
}

fn bench_mix(c: &mut Criterion) {
    let config = EngramConfig::default();
    let module = EngramModule::new(config.clone(), config.hidden_size).unwrap();
    let tokens = token_stream(64, config.vocab_size);
    let hidden: Vec<f32> = (0..tokens.len() * config.hidden_size)
        .map(|i| (i as f32 * 0.001).sin())
        .collect();
    let layer = config.layer_ids[0];

    c.bench_function("forward_layer_64", |b| {
        b.iter(|| {
            module
                .forward_layer(layer, black_box(&tokens), black_box(&hidden))
                .unwrap()
        })
    });
}

fn bench_fingerprint(c: &mut Criterion) {
    let config = EngramConfig::default();
    let module = EngramModule::new(config.clone(), config.hidden_size).unwrap();
    let extractor =
        FingerprintExtractor::from_module(&module, Arc::new(Tokenizer::lexical(config.vocab_size)))
            .unwrap();
    let source = "fn main() {\n    let x = 42;\n    println!(\"{}\", x);\n}\n".repeat(200);

    c.bench_function("fingerprint_8kb", |b| {
        b.iter(|| extractor.extract("main.rs", black_box(&source)).unwrap())
    });
}

criterion_group!(benches, bench_hash_windows, bench_lookup, bench_mix, bench_fingerprint);
criterion_main!(benches);
