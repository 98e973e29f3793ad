/// Benchmarks for the inbound hot path: envelope parsing and subscriber fan-out.
use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use preipo_client_sdk::ws::{Callback, Dispatcher, Envelope, Event, WILDCARD};
use serde_json::json;

fn bench_envelope_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope/parse");

    let small = r#"{"type":"pong","data":null,"timestamp":1760000000000}"#;
    group.throughput(Throughput::Bytes(small.len() as u64));
    group.bench_function("pong", |b| {
        b.iter(|| {
            let envelope = Envelope::parse(black_box(small)).expect("valid envelope");
            black_box(envelope.is_pong());
        });
    });

    let order = r#"{
        "type": "order:update",
        "data": {
            "id": "ord_8f2c",
            "company": "Acme Robotics",
            "side": "buy",
            "shares": 1200,
            "price_per_share": "14.25",
            "status": "pending_allocation",
            "fills": [{"shares": 400, "price": "14.10"}, {"shares": 800, "price": "14.32"}]
        },
        "timestamp": 1760000000000
    }"#;
    group.throughput(Throughput::Bytes(order.len() as u64));
    group.bench_function("order_update", |b| {
        b.iter(|| {
            let envelope = Envelope::parse(black_box(order)).expect("valid envelope");
            black_box(Event::from(envelope));
        });
    });

    let malformed = r#"{"data":{"id":1},"timestamp":1}"#;
    group.throughput(Throughput::Bytes(malformed.len() as u64));
    group.bench_function("missing_type", |b| {
        b.iter(|| {
            assert!(Envelope::parse(black_box(malformed)).is_err());
        });
    });

    group.finish();
}

fn counting_callback(counter: &Arc<AtomicU64>) -> Callback {
    let counter = Arc::clone(counter);
    Arc::new(move |event: &Event| {
        black_box(&event.data);
        counter.fetch_add(1, Ordering::Relaxed);
    })
}

fn bench_dispatch_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatcher/fan_out");
    let event = Event::new("order:update", json!({ "id": 42, "shares": 100 }));

    for subscribers in [1_usize, 8, 64] {
        let dispatcher = Dispatcher::new();
        let counter = Arc::new(AtomicU64::new(0));
        let subscriptions: Vec<_> = (0..subscribers)
            .map(|_| dispatcher.on("order:update", counting_callback(&counter)))
            .collect();
        let _wildcard = dispatcher.on(WILDCARD, counting_callback(&counter));

        group.throughput(Throughput::Elements(subscribers as u64 + 1));
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &event,
            |b, event| b.iter(|| dispatcher.dispatch(black_box(event))),
        );

        drop(subscriptions);
    }

    group.finish();
}

fn bench_dispatch_unrouted(c: &mut Criterion) {
    let dispatcher = Dispatcher::new();
    let counter = Arc::new(AtomicU64::new(0));
    for i in 0..32 {
        let _subscription = dispatcher.on(format!("topic:{i}"), counting_callback(&counter));
    }
    let event = Event::new("order:update", json!(null));

    c.bench_function("dispatcher/unrouted", |b| {
        b.iter(|| dispatcher.dispatch(black_box(&event)));
    });
}

criterion_group!(
    dispatch_benches,
    bench_envelope_parse,
    bench_dispatch_fan_out,
    bench_dispatch_unrouted
);
criterion_main!(dispatch_benches);
