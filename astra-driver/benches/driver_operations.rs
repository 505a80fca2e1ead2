//! Benchmarks for connection-string parsing and session reuse.
//!
//! These run without a database: sessions come from an in-memory connector.

use std::hint::black_box;
use std::sync::Arc;

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use astra_driver::{
    AstraDriver, AstraResult, AstraUrl, ConsistencyLevel, CqlSession, DatabaseRef, Properties,
    SessionConnector, SessionRequest, SharedSession, StaticControlPlane,
};

#[derive(Debug)]
struct IdleSession;

#[async_trait]
impl CqlSession for IdleSession {
    fn keyspace(&self) -> &str {
        "bench"
    }

    async fn execute(&self, _cql: &str, _consistency: ConsistencyLevel) -> AstraResult<()> {
        Ok(())
    }

    async fn close(&self) {}
}

struct IdleConnector;

#[async_trait]
impl SessionConnector for IdleConnector {
    async fn open_session(&self, _request: SessionRequest) -> AstraResult<SharedSession> {
        Ok(Arc::new(IdleSession))
    }
}

/// Benchmark URL parsing
fn bench_url_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("astra_url");

    let urls = [
        "astra://orders/sales?token=AstraCS:abc",
        "astra://orders/sales?token=AstraCS:abc&region=us-east-1&consistency-level=ONE",
        "astra://3ed83de7-d97f-4fb6-bf9f-82e9f7eafa23/sales?user=client&password=secret&request-timeout=5000&debug=true",
    ];

    for url in &urls {
        group.bench_with_input(BenchmarkId::new("parse", url.len()), url, |b, url| {
            b.iter(|| black_box(AstraUrl::parse(black_box(url))));
        });
    }

    group.bench_function("to_url", |b| {
        let url = AstraUrl::parse(urls[1]).unwrap();
        b.iter(|| black_box(url.to_url()));
    });

    group.finish();
}

/// Benchmark connects answered from the session cache
fn bench_cached_connect(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let plane = StaticControlPlane::new();
    plane
        .register(DatabaseRef::new("id-1", "orders"))
        .register_bundle("id-1", None, b"bundle".to_vec());
    let driver = AstraDriver::new(Arc::new(plane), Arc::new(IdleConnector));
    let props = Properties::new();
    let url = "astra://orders/sales?token=t";

    runtime.block_on(driver.connect(url, &props)).unwrap();

    c.bench_function("connect_cached", |b| {
        b.iter(|| black_box(runtime.block_on(driver.connect(black_box(url), &props))));
    });
}

criterion_group!(benches, bench_url_parsing, bench_cached_connect);
criterion_main!(benches);
