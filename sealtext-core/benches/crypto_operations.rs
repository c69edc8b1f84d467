use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sealtext_core::core_crypto::{derive_key, MessageCipher, MnemonicLanguage};
use sealtext_core::core_message::chain::{ChainCursor, HashChainer};
use sealtext_core::core_message::types::{MessageDraft, PlaintextMessage};

const MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

fn record(size: usize) -> PlaintextMessage {
    HashChainer::seal(
        MessageDraft::new("x".repeat(size), "alice", "2025-01-01T00:00:00.000000Z"),
        None,
    )
}

fn bench_key_derivation(c: &mut Criterion) {
    c.bench_function("derive_key", |b| {
        b.iter(|| derive_key(black_box(MNEMONIC), MnemonicLanguage::English).unwrap());
    });
}

fn bench_seal_open(c: &mut Criterion) {
    let cipher = MessageCipher::from_mnemonic(MNEMONIC, MnemonicLanguage::English).unwrap();
    let mut group = c.benchmark_group("cipher");

    for size in [32, 1024, 16384].iter() {
        let message = record(*size);
        let token = cipher.seal(&message).unwrap();
        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::new("seal", size), &message, |b, m| {
            b.iter(|| cipher.seal(black_box(m)).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("open", size), &token, |b, t| {
            b.iter(|| cipher.open(black_box(t)).unwrap());
        });
    }

    group.finish();
}

fn bench_chain_verification(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_verify");

    for len in [10, 100, 1000].iter() {
        let mut prev = None;
        let records: Vec<PlaintextMessage> = (0..*len)
            .map(|i| {
                let r = HashChainer::seal(
                    MessageDraft::new(format!("message {}", i), "alice", format!("t{:06}", i)),
                    prev.clone(),
                );
                prev = Some(r.hash.clone());
                r
            })
            .collect();

        group.throughput(Throughput::Elements(*len as u64));
        group.bench_with_input(BenchmarkId::new("records", len), &records, |b, records| {
            b.iter(|| {
                let mut cursor = ChainCursor::new();
                for r in records {
                    cursor.advance(black_box(r)).unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_key_derivation, bench_seal_open, bench_chain_verification);
criterion_main!(benches);
