//! Codec benchmarks for parley-protocol.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use parley_protocol::{codec, ServerEvent};
use serde_json::json;

fn message_event() -> ServerEvent {
    ServerEvent::MessageReceived(json!({
        "_id": "m1",
        "chat": {
            "_id": "c1",
            "users": [{"_id": "u1"}, {"_id": "u2"}, {"_id": "u3"}]
        },
        "sender": {"_id": "u1", "name": "Ada"},
        "content": "a".repeat(128)
    }))
}

fn bench_encode(c: &mut Criterion) {
    let event = message_event();
    let encoded_len = codec::encode(&event).unwrap().len();

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(encoded_len as u64));
    group.bench_function("message_received", |b| {
        b.iter(|| codec::encode(black_box(&event)))
    });
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let frame = format!(
        r#"{{"event":"new message","data":{{"chat":{{"users":[{{"_id":"u1"}},{{"_id":"u2"}}]}},"sender":{{"_id":"u1"}},"content":"{}"}}}}"#,
        "a".repeat(128)
    );

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("new_message", |b| b.iter(|| codec::decode(black_box(&frame))));
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
