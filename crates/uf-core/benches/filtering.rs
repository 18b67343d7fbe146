use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use uf_core::dom::Document;
use uf_core::{ActionMode, FilterConfig, FilterEngine, KeywordMatcher, MemoryDocument};

const FILTERS: &[&str] = &["Trump", "Musk", "election", "crypto", "celebrity"];

fn bench_matcher(c: &mut Criterion) {
    let matcher = KeywordMatcher::new(FILTERS).expect("filters compile");
    let clean = "A long post about gardening, tomatoes and the best soil for raised beds in spring.";
    let dirty = "Breaking: the election results are in and everyone is talking about Trump's reaction.";

    c.bench_function("matcher/no_match", |b| b.iter(|| matcher.is_match(black_box(clean))));
    c.bench_function("matcher/match", |b| b.iter(|| matcher.is_match(black_box(dirty))));
}

/// Append `count` feed items under a wrapper, every `match_every`th one filtered.
fn append_page(doc: &mut MemoryDocument, count: usize, match_every: usize) {
    let body = doc.body().expect("body");
    let wrapper = doc.create_element("div").expect("element");
    for i in 0..count {
        let item = doc.append_element(wrapper, "ytd-rich-item-renderer", &[]).expect("append");
        let title = doc.append_element(item, "h3", &[]).expect("append");
        let text = if i % match_every == 0 { "Trump interview" } else { "Cooking with cast iron" };
        doc.append_text(title, text).expect("append");
    }
    doc.append_child(body, wrapper).expect("append");
}

fn bench_batches(c: &mut Criterion) {
    let config = FilterConfig::new(
        vec!["ytd-rich-item-renderer".to_string()],
        FILTERS.iter().map(|s| s.to_string()).collect(),
        ActionMode::Remove,
    );

    c.bench_function("engine/batch_of_20_on_grown_page", |b| {
        b.iter_batched(
            || {
                let mut doc = MemoryDocument::new();
                let mut engine: FilterEngine<MemoryDocument> =
                    FilterEngine::with_config(config.clone()).expect("engine");
                engine.start(&mut doc);
                for _ in 0..50 {
                    append_page(&mut doc, 20, 7);
                    for batch in doc.take_batches() {
                        engine.handle_mutations(&mut doc, &batch);
                    }
                }
                append_page(&mut doc, 20, 7);
                (doc, engine)
            },
            |(mut doc, mut engine)| {
                for batch in doc.take_batches() {
                    black_box(engine.handle_mutations(&mut doc, &batch));
                }
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_matcher, bench_batches);
criterion_main!(benches);
