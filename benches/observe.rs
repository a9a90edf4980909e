//! Performance benchmarks for a3s-audit
//!
//! Run with: cargo bench

use a3s_audit::{
    connect_send_audit_observers, handler_fn, AuditDirection, DefaultOutboundMetadataFactory,
    MemoryAuditStore, MemoryBus, MessageContext, MessageFilter, OutboundMetadataFactory,
    SendAuditOptions,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;

fn sample_context() -> MessageContext {
    MessageContext::from_json(
        "OrderPlaced",
        serde_json::json!({"orderId": "o-1", "amount": 120, "currency": "USD"}),
    )
    .with_source("loopback://local/checkout")
    .with_destination("loopback://local/orders")
    .with_correlation_id("corr-1")
}

fn bench_filter(c: &mut Criterion) {
    let ctx = sample_context();

    let all = MessageFilter::all();
    c.bench_function("filter match-all", |b| b.iter(|| all.matches(&ctx)));

    let typed = MessageFilter::configure(|f| {
        f.include_types(["OrderPlaced", "OrderShipped"])
            .exclude_when(|ctx| ctx.headers.contains_key("no-audit"));
    })
    .unwrap();
    c.bench_function("filter include set + predicate", |b| b.iter(|| typed.matches(&ctx)));
}

fn bench_metadata(c: &mut Criterion) {
    let ctx = sample_context();

    let plain = DefaultOutboundMetadataFactory::new();
    c.bench_function("default outbound metadata", |b| {
        b.iter(|| plain.create(&ctx, AuditDirection::Sent))
    });

    let with_fields = DefaultOutboundMetadataFactory::new().with_payload_fields(["orderId", "amount"]);
    c.bench_function("outbound metadata with payload fields", |b| {
        b.iter(|| with_fields.create(&ctx, AuditDirection::Sent))
    });
}

fn bench_audited_send(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let (bus, audited_bus) = rt.block_on(async {
        let bus = MemoryBus::new("loopback://local/checkout");
        bus.receive_endpoint("loopback://local/orders", handler_fn(|_ctx| async { Ok(()) }))
            .await;

        let audited_bus = MemoryBus::new("loopback://local/checkout");
        audited_bus
            .receive_endpoint("loopback://local/orders", handler_fn(|_ctx| async { Ok(()) }))
            .await;
        let options = SendAuditOptions::builder()
            .store(Arc::new(MemoryAuditStore::new(1_000)))
            .build()
            .unwrap();
        connect_send_audit_observers(&audited_bus, options);

        (bus, audited_bus)
    });

    c.bench_function("MemoryBus send (no audit)", |b| {
        b.to_async(&rt).iter(|| async {
            bus.send_context("loopback://local/orders", sample_context())
                .await
                .unwrap()
        });
    });

    c.bench_function("MemoryBus send (audited)", |b| {
        b.to_async(&rt).iter(|| async {
            audited_bus
                .send_context("loopback://local/orders", sample_context())
                .await
                .unwrap()
        });
    });
}

criterion_group!(benches, bench_filter, bench_metadata, bench_audited_send);
criterion_main!(benches);
