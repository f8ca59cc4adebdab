use criterion::{Criterion, criterion_group, criterion_main};
use ledger::{
    AppendOptions, InMemoryLedger, LedgerEntry, LedgerQuery, LedgerStore, LedgerStoreExt,
    StreamKey,
};

fn make_entry(stream: &StreamKey, key: Option<String>) -> LedgerEntry {
    let mut builder = LedgerEntry::builder()
        .entry_type("StockAdjusted")
        .stream(stream.clone())
        .payload_raw(serde_json::json!({
            "direction": "OUT",
            "quantity": 3,
            "reason": "Transfer pick"
        }));
    if let Some(key) = key {
        builder = builder.idempotency_key(key);
    }
    builder.build().unwrap()
}

fn bench_append_single_entry(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("ledger/append_single_entry", |b| {
        b.iter(|| {
            rt.block_on(async {
                let ledger = InMemoryLedger::new();
                let stream = StreamKey::new("product", 1);
                ledger
                    .append(vec![make_entry(&stream, None)], AppendOptions::new())
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_duplicate_key_rejection(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = InMemoryLedger::new();
    let stream = StreamKey::new("job", 1);

    rt.block_on(async {
        for i in 0..1_000 {
            ledger
                .append_entry(make_entry(&stream, Some(format!("chain:{i}"))))
                .await
                .unwrap();
        }
    });

    c.bench_function("ledger/duplicate_key_rejection", |b| {
        b.iter(|| {
            rt.block_on(async {
                let outcome = ledger
                    .append_entry(make_entry(&stream, Some("chain:500".to_string())))
                    .await
                    .unwrap();
                assert!(outcome.is_duplicate());
            });
        });
    });
}

fn bench_query_stream_kind(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = InMemoryLedger::new();

    rt.block_on(async {
        for i in 0..1_000 {
            let kind = if i % 2 == 0 { "product" } else { "worker" };
            ledger
                .append_entry(make_entry(&StreamKey::new(kind, i), None))
                .await
                .unwrap();
        }
    });

    c.bench_function("ledger/query_stream_kind_1000", |b| {
        b.iter(|| {
            rt.block_on(async {
                ledger
                    .query(LedgerQuery::new().stream_kind("product"))
                    .await
                    .unwrap()
            })
        });
    });
}

criterion_group!(
    benches,
    bench_append_single_entry,
    bench_duplicate_key_rejection,
    bench_query_stream_kind
);
criterion_main!(benches);
