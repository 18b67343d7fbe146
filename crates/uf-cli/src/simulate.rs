//! Infinite-scroll simulation
//!
//! Grows a feed batch by batch against the in-memory document and times how
//! long the engine takes per mutation batch. Per-batch cost should track the
//! batch size, not the page size.

use std::time::Instant;

use uf_core::{ActionMode, Document, FilterConfig, FilterEngine, MemoryDocument, NodeId, RemovalCounter};

const DEFAULT_SEED: u32 = 0x5eed;

const CLEAN_TITLES: &[&str] = &[
    "Cast iron care for beginners",
    "Ten minute stretches",
    "Why sourdough needs patience",
    "Birdwatching on a budget",
    "The quiet joy of crosswords",
];

const FILTERED_TITLES: &[&str] = &[
    "Trump rally draws crowds",
    "What Trump's speech means",
    "Trumps and the tariff question",
];

pub struct SimulateOptions {
    pub batches: usize,
    pub batch_size: usize,
    pub match_every: usize,
    pub seed: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulateResult {
    pub batches: usize,
    pub items: usize,
    pub removed: u64,
    pub mean_us: f64,
    pub p50_us: f64,
    pub p99_us: f64,
    pub first_decile_us: f64,
    pub last_decile_us: f64,
}

pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let idx = ((values.len() as f64) * p).ceil() as usize;
    let idx = idx.saturating_sub(1).min(values.len() - 1);
    values[idx]
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn create_rng(seed: u32) -> impl FnMut() -> f64 {
    let mut state = seed;
    move || {
        state = state.wrapping_mul(1664525).wrapping_add(1013904223);
        (state as f64) / (u32::MAX as f64)
    }
}

fn pick<'a>(items: &[&'a str], rand: &mut impl FnMut() -> f64) -> &'a str {
    let idx = (rand() * items.len() as f64).floor() as usize;
    items[idx.min(items.len() - 1)]
}

/// Append one feed item: `<article class="post"><h3>title</h3><p>..</p></article>`.
fn append_item(doc: &mut MemoryDocument, feed: NodeId, title: &str) -> Result<(), String> {
    let build = |doc: &mut MemoryDocument| -> Result<(), uf_core::DomError> {
        let item = doc.create_element_with_attrs("article", &[("class", "post")])?;
        let heading = doc.append_element(item, "h3", &[])?;
        doc.append_text(heading, title)?;
        let blurb = doc.append_element(item, "p", &[])?;
        doc.append_text(blurb, "Posted 2 hours ago")?;
        doc.append_child(feed, item)
    };
    build(doc).map_err(|e| format!("Failed to grow feed: {}", e))
}

pub fn run(opts: &SimulateOptions) -> Result<SimulateResult, String> {
    if opts.batches == 0 || opts.batch_size == 0 {
        return Err("Batches and batch size must be positive".to_string());
    }
    let match_every = opts.match_every.max(1);

    let config = FilterConfig::new(
        vec!["article.post".to_string()],
        vec!["Trump".to_string()],
        ActionMode::Remove,
    );
    let mut engine: FilterEngine<MemoryDocument, RemovalCounter> =
        FilterEngine::new(config, RemovalCounter::new()).map_err(|e| format!("Invalid keyword: {}", e))?;

    let mut doc = MemoryDocument::new();
    let body = doc.body().ok_or("Document has no body")?;
    let feed = doc
        .append_element(body, "div", &[("id", "feed")])
        .map_err(|e| format!("Failed to create feed: {}", e))?;
    engine.start(&mut doc);

    let mut rand = create_rng(opts.seed.unwrap_or(DEFAULT_SEED));
    let mut samples = Vec::with_capacity(opts.batches);
    let mut items = 0usize;

    for _ in 0..opts.batches {
        for _ in 0..opts.batch_size {
            let title = if items % match_every == 0 {
                pick(FILTERED_TITLES, &mut rand)
            } else {
                pick(CLEAN_TITLES, &mut rand)
            };
            append_item(&mut doc, feed, title)?;
            items += 1;
        }

        let start = Instant::now();
        for batch in doc.take_batches() {
            engine.handle_mutations(&mut doc, &batch);
        }
        samples.push(start.elapsed().as_secs_f64() * 1_000_000.0);
    }

    // Removals queue records of their own; drain them so the count is final.
    for batch in doc.take_batches() {
        engine.handle_mutations(&mut doc, &batch);
    }

    let decile = (samples.len() / 10).max(1);
    let first_decile_us = mean(&samples[..decile]);
    let last_decile_us = mean(&samples[samples.len() - decile..]);
    let mean_us = mean(&samples);

    let mut sorted = samples;
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    Ok(SimulateResult {
        batches: opts.batches,
        items,
        removed: engine.sink().count(),
        mean_us,
        p50_us: percentile(&sorted, 0.50),
        p99_us: percentile(&sorted, 0.99),
        first_decile_us,
        last_decile_us,
    })
}

pub fn format_result(result: &SimulateResult) -> String {
    let growth = if result.first_decile_us > 0.0 {
        result.last_decile_us / result.first_decile_us
    } else {
        0.0
    };
    format!(
        "Batches:   {}\n\
         Items:     {} ({} removed)\n\
         Per batch: mean {:.1}µs, p50 {:.1}µs, p99 {:.1}µs\n\
         Growth:    first 10% {:.1}µs -> last 10% {:.1}µs ({:.2}x)",
        result.batches,
        result.items,
        result.removed,
        result.mean_us,
        result.p50_us,
        result.p99_us,
        result.first_decile_us,
        result.last_decile_us,
        growth,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        assert_eq!(percentile(&values, 0.5), 5.0);
        assert_eq!(percentile(&values, 0.99), 10.0);
        assert_eq!(percentile(&[], 0.5), 0.0);
    }

    #[test]
    fn test_rng_is_deterministic() {
        let mut a = create_rng(7);
        let mut b = create_rng(7);
        for _ in 0..10 {
            let x = a();
            assert_eq!(x, b());
            assert!((0.0..=1.0).contains(&x));
        }
    }

    #[test]
    fn test_run_removes_every_kth_item() {
        let result = run(&SimulateOptions {
            batches: 10,
            batch_size: 6,
            match_every: 3,
            seed: Some(1),
        })
        .unwrap();
        assert_eq!(result.items, 60);
        assert_eq!(result.removed, 20);
        assert!(result.p99_us >= result.p50_us);
    }

    #[test]
    fn test_run_rejects_empty() {
        let opts = SimulateOptions {
            batches: 0,
            batch_size: 5,
            match_every: 1,
            seed: None,
        };
        assert!(run(&opts).is_err());
    }
}
