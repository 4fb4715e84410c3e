//! # Cipher-Server Benchmarks
//!
//! | Group | What | Why it matters |
//! |-------|------|----------------|
//! | block-step | One CBC block on the engine | Work done per budget unit |
//! | cursor | Publish and read of the double-buffered cursor | Overhead added to every block |
//! | request | Full request through kernel, server and reply | End-to-end cost per block |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use cs_01_cipher_server::{
    double_buffered_cursor, CipherClient, CipherServer, ServerConfig, SharedRegion, Snapshot,
};
use rand::RngCore;
use shared_crypto::{CbcEngine, CipherKey};
use shared_types::{BudgetGrant, SchedulingPort, BLOCK_SIZE};
use sim_kernel::SimKernel;
use std::sync::Arc;
use std::time::Duration;

fn bench_block_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("block-step");
    let engine = CbcEngine::new(&CipherKey::generate());
    let vector = [0x24u8; BLOCK_SIZE];
    let plaintext = [0x42u8; BLOCK_SIZE];

    group.throughput(Throughput::Bytes(BLOCK_SIZE as u64));
    group.bench_function("encrypt_block", |b| {
        b.iter(|| black_box(engine.encrypt_block(black_box(&vector), black_box(&plaintext))))
    });
    group.finish();
}

fn bench_cursor(c: &mut Criterion) {
    let mut group = c.benchmark_group("cursor");
    let (mut writer, reader) = double_buffered_cursor();
    let snapshot = Snapshot {
        vector: [7u8; BLOCK_SIZE],
        plaintext_cursor: 0,
        ciphertext_cursor: 0,
        remaining: 1 << 20,
    };
    writer.publish(snapshot);

    group.bench_function("publish", |b| {
        b.iter(|| writer.publish(black_box(snapshot)))
    });
    group.bench_function("read_active", |b| b.iter(|| black_box(reader.read_active())));
    group.finish();
}

fn bench_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("request");
    group.measurement_time(Duration::from_secs(10));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    for blocks in [1usize, 16, 256] {
        let client = runtime.block_on(async {
            let kernel = Arc::new(SimKernel::new());
            let server_thread = kernel.create_thread("cipher-server");
            let client_thread = kernel.create_thread("client");
            let context = kernel
                .create_sched_context(BudgetGrant::new(u64::MAX, u64::MAX))
                .unwrap();
            kernel.bind(context, client_thread).unwrap();

            let server = CipherServer::new(
                kernel.clone(),
                server_thread,
                &CipherKey::generate(),
                ServerConfig::default(),
                Arc::new(SharedRegion::new()),
            );
            let handle = server.handle();
            tokio::spawn(server.run());
            CipherClient::new(kernel, client_thread, handle)
        });

        let mut plaintext = vec![0u8; blocks * BLOCK_SIZE];
        rand::thread_rng().fill_bytes(&mut plaintext);

        group.throughput(Throughput::Bytes(plaintext.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("passive_submit", blocks),
            &plaintext,
            |b, plaintext| {
                b.iter(|| {
                    runtime
                        .block_on(client.submit(plaintext))
                        .expect("request failed")
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_block_step, bench_cursor, bench_request);
criterion_main!(benches);
