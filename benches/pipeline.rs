//! Benchmarks for the end-to-end pipeline.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

use flowgraph::content::{ContentItem, SourceCategory};
use flowgraph::diagnostics::Diagnostics;
use flowgraph::extract::ActionExtractor;
use flowgraph::normalize::SourceRecord;
use flowgraph::pipeline::Pipeline;
use flowgraph::topic::TopicTable;

const TEXTS: &[&str] = &[
    "ASAP: Fix the login bug before the release!",
    "TODO: Update the API documentation and the readme.",
    "Don't forget to buy milk and batteries on the way home.",
    "Maybe book a flight and a hotel for the conference someday.",
    "We should review the budget and pay the invoice this week.",
    "Lovely weather at the beach today, nothing to do.",
];

fn synthetic_batch(n: usize) -> Vec<SourceRecord> {
    (0..n)
        .map(|i| {
            let data = if i % 3 == 0 {
                json!({
                    "id": format!("m{i}"),
                    "message": TEXTS[i % TEXTS.len()],
                    "sender": format!("user{}", i % 7),
                    "conversation_id": format!("c{}", i % 25),
                    "timestamp": 1_700_000_000 + i as i64,
                })
            } else {
                json!({
                    "id": format!("p{i}"),
                    "full_text": TEXTS[i % TEXTS.len()],
                    "created_at": "Wed Oct 10 20:19:24 +0000 2018",
                    "in_reply_to_status_id": (i > 1).then(|| format!("p{}", i - 1)),
                })
            };
            SourceRecord::new(data)
        })
        .collect()
}

fn bench_run(c: &mut Criterion) {
    let pipeline = Pipeline::default();
    let records = synthetic_batch(1_000);

    c.bench_function("run_1k_records", |bench| {
        bench.iter(|| black_box(pipeline.run(&records).stats()))
    });
}

fn bench_extract(c: &mut Criterion) {
    let extractor = ActionExtractor::default();
    let item = ContentItem::new("n1", TEXTS.join(" "), SourceCategory::Note);

    c.bench_function("extract_mixed_tiers", |bench| {
        bench.iter(|| {
            let mut diags = Diagnostics::new();
            black_box(extractor.extract(&item, &mut diags))
        })
    });
}

fn bench_classify(c: &mut Criterion) {
    let table = TopicTable::builtin();

    c.bench_function("classify_builtin_table", |bench| {
        bench.iter(|| {
            for text in TEXTS {
                black_box(table.classify(text));
            }
        })
    });
}

criterion_group!(benches, bench_run, bench_extract, bench_classify);
criterion_main!(benches);
