//! Filter Engine
//!
//! Owns the site's selectors, the compiled keyword set and the action mode.
//! The host calls [`FilterEngine::start`] once and then feeds every mutation
//! batch it receives to [`FilterEngine::handle_mutations`].
//!
//! Subscriptions are only created through [`FilterEngine::attach_subscription`]:
//! once for the document body at startup, then once per encapsulation
//! boundary the first time its host is seen being inserted.

use std::collections::HashSet;
use std::hash::Hash;

use crate::dom::{Document, DomError, MutationRecord, ObserveFlags};
use crate::matcher::{KeywordMatcher, MatchError};
use crate::telemetry::{ActionSink, NoopSink};
use crate::text::extract_text;
use crate::types::{ActionMode, FilterConfig, PassReport};

/// Outline applied by the mark treatment.
pub const MARK_OUTLINE: &str = "2px solid #FA8072";
/// Opacity applied by the mark treatment.
pub const MARK_OPACITY: &str = "0.35";

/// Attribute written by the mark treatment. In mark mode records for it are
/// our own and are skipped, so a page restyling a unit is not noticed there.
const STYLE_ATTRIBUTE: &str = "style";

/// Registry size below which disconnected scopes are never pruned.
const REGISTRY_PRUNE_FLOOR: usize = 64;

// =============================================================================
// Subscription Registry
// =============================================================================

/// Observed scopes keyed by identity.
#[derive(Debug)]
pub struct SubscriptionRegistry<N> {
    scopes: HashSet<N>,
    prune_at: usize,
}

impl<N: Clone + Eq + Hash> Default for SubscriptionRegistry<N> {
    fn default() -> Self {
        Self {
            scopes: HashSet::new(),
            prune_at: REGISTRY_PRUNE_FLOOR,
        }
    }
}

impl<N: Clone + Eq + Hash> SubscriptionRegistry<N> {
    pub fn contains(&self, scope: &N) -> bool {
        self.scopes.contains(scope)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Record `scope`. Once the registry outgrows its watermark, scopes that
    /// `is_live` rejects are dropped and the watermark moves to twice the
    /// surviving size.
    fn insert(&mut self, scope: N, is_live: impl Fn(&N) -> bool) {
        self.scopes.insert(scope);
        if self.scopes.len() > self.prune_at {
            let before = self.scopes.len();
            self.scopes.retain(|s| is_live(s));
            self.prune_at = (self.scopes.len() * 2).max(REGISTRY_PRUNE_FLOOR);
            log::debug!(
                "Pruned subscription registry: {} -> {} scopes (next prune at {})",
                before,
                self.scopes.len(),
                self.prune_at
            );
        }
    }
}

// =============================================================================
// Candidate Set
// =============================================================================

/// Insertion-ordered, deduplicated candidates for one pass.
struct CandidateSet<N> {
    order: Vec<N>,
    seen: HashSet<N>,
}

impl<N: Clone + Eq + Hash> CandidateSet<N> {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn insert(&mut self, node: N) {
        if self.seen.insert(node.clone()) {
            self.order.push(node);
        }
    }

    fn extend(&mut self, nodes: impl IntoIterator<Item = N>) {
        for node in nodes {
            self.insert(node);
        }
    }
}

// =============================================================================
// FilterEngine
// =============================================================================

pub struct FilterEngine<D: Document, S: ActionSink = NoopSink> {
    selectors: Vec<String>,
    /// `selectors` joined into one selector list
    selector_list: String,
    matcher: KeywordMatcher,
    action_mode: ActionMode,
    subscriptions: SubscriptionRegistry<D::Node>,
    sink: S,
}

impl<D: Document> FilterEngine<D, NoopSink> {
    /// Engine without telemetry.
    pub fn with_config(config: FilterConfig) -> Result<Self, MatchError> {
        Self::new(config, NoopSink)
    }
}

impl<D: Document, S: ActionSink> FilterEngine<D, S> {
    pub fn new(config: FilterConfig, sink: S) -> Result<Self, MatchError> {
        let matcher = KeywordMatcher::new(&config.filters)?;
        let selectors: Vec<String> = config
            .selectors
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let selector_list = selectors.join(",");

        Ok(Self {
            selectors,
            selector_list,
            matcher,
            action_mode: config.action_mode,
            subscriptions: SubscriptionRegistry::default(),
            sink,
        })
    }

    /// No selectors for this site. An empty keyword set is not inert: the
    /// engine keeps observing so a later [`FilterEngine::replace_filters`]
    /// applies to new content.
    pub fn is_inert(&self) -> bool {
        self.selectors.is_empty()
    }

    pub fn selectors(&self) -> &[String] {
        &self.selectors
    }

    pub fn action_mode(&self) -> ActionMode {
        self.action_mode
    }

    pub fn matcher(&self) -> &KeywordMatcher {
        &self.matcher
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_subscribed(&self, scope: &D::Node) -> bool {
        self.subscriptions.contains(scope)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Replace the whole filter set. Already-processed units are not
    /// revisited; the new set applies from the next batch on.
    pub fn replace_filters<F: AsRef<str>>(&mut self, filters: &[F]) -> Result<(), MatchError> {
        self.matcher = KeywordMatcher::new(filters)?;
        log::info!("Filter set replaced ({} keywords)", self.matcher.len());
        Ok(())
    }

    /// Sweep the document, then subscribe to the body.
    ///
    /// Does nothing on an inert engine. Without a body the sweep still runs
    /// but no subscription is made.
    pub fn start(&mut self, doc: &mut D) -> PassReport {
        if self.is_inert() {
            log::info!("Engine inert (no selectors)");
            return PassReport::default();
        }
        if self.matcher.is_empty() {
            log::info!("No keywords yet; observing without filtering");
        }

        let mut report = self.sweep(doc);

        match doc.body() {
            Some(body) => match self.attach_subscription(doc, &body) {
                Ok(true) => report.subscriptions += 1,
                Ok(false) => {}
                Err(e) => log::error!("Failed to observe document body: {}", e),
            },
            None => log::debug!("Document has no body yet; not subscribing"),
        }

        report
    }

    /// One synchronous pass over every unit currently in the document.
    pub fn sweep(&mut self, doc: &mut D) -> PassReport {
        let mut report = PassReport::default();
        if self.is_inert() {
            return report;
        }

        let root = doc.document_root();
        let units = doc.query_selector_all(&root, &self.selector_list);
        for unit in &units {
            self.process_unit(doc, unit, &mut report);
        }

        log::debug!(
            "Sweep: {} units, {} matched, {} removed, {} marked",
            report.candidates,
            report.matched,
            report.removed,
            report.marked
        );
        report
    }

    /// Observe `scope` unless it is already observed. Returns whether a new
    /// subscription was made.
    pub fn attach_subscription(&mut self, doc: &mut D, scope: &D::Node) -> Result<bool, DomError> {
        if self.subscriptions.contains(scope) {
            return Ok(false);
        }

        doc.observe(scope, ObserveFlags::ALL)?;
        let view: &D = doc;
        self.subscriptions.insert(scope.clone(), |s| view.is_connected(s));
        log::trace!("Subscribed to {:?}", scope);
        Ok(true)
    }

    /// React to one batch of mutation records from any observed scope.
    ///
    /// Never fails: per-node problems are logged and the batch continues.
    pub fn handle_mutations(&mut self, doc: &mut D, records: &[MutationRecord<D::Node>]) -> PassReport {
        let mut report = PassReport::default();
        if self.is_inert() {
            return report;
        }

        let mut candidates = CandidateSet::new();

        for record in records {
            match record {
                MutationRecord::Attributes { target, name } => {
                    if self.action_mode == ActionMode::Mark && name == STYLE_ATTRIBUTE {
                        continue;
                    }
                    if doc.matches_selector(target, &self.selector_list) {
                        candidates.insert(target.clone());
                    }
                }
                MutationRecord::ChildList { added, .. } => {
                    for node in added {
                        if !doc.is_element(node) {
                            continue;
                        }

                        if let Some(boundary) = doc.shadow_root(node) {
                            match self.attach_subscription(doc, &boundary) {
                                Ok(true) => report.subscriptions += 1,
                                Ok(false) => {}
                                Err(e) => log::warn!("Failed to observe boundary of {:?}: {}", node, e),
                            }
                        }

                        if doc.matches_selector(node, &self.selector_list) {
                            candidates.insert(node.clone());
                        }
                        candidates.extend(doc.query_selector_all(node, &self.selector_list));
                    }
                }
            }
        }

        for unit in &candidates.order {
            self.process_unit(doc, unit, &mut report);
        }

        if report.candidates > 0 || report.subscriptions > 0 {
            log::debug!(
                "Batch of {} records: {} candidates, {} matched, {} stale, {} new subscriptions",
                records.len(),
                report.candidates,
                report.matched,
                report.stale,
                report.subscriptions
            );
        }
        report
    }

    /// Extract, match and act on one unit.
    fn process_unit(&mut self, doc: &mut D, unit: &D::Node, report: &mut PassReport) {
        report.candidates += 1;

        if !doc.is_connected(unit) {
            log::trace!("Skipping detached unit {:?}", unit);
            report.stale += 1;
            return;
        }
        if self.matcher.is_empty() || self.is_marked(doc, unit) {
            return;
        }

        let text = extract_text(doc, unit);
        let Some(keyword) = self.matcher.find_keyword(&text) else {
            return;
        };
        report.matched += 1;
        log::trace!("Unit {:?} matched keyword '{}'", unit, keyword);

        self.apply_action(doc, unit, report);
    }

    /// A unit already carrying the mark treatment. Other attribute changes on
    /// it come back as candidates and must not be counted again.
    fn is_marked(&self, doc: &D, unit: &D::Node) -> bool {
        self.action_mode == ActionMode::Mark && doc.style(unit, "opacity").as_deref() == Some(MARK_OPACITY)
    }

    fn apply_action(&mut self, doc: &mut D, unit: &D::Node, report: &mut PassReport) {
        match self.action_mode {
            ActionMode::Remove => {
                if doc.remove(unit) {
                    report.removed += 1;
                    self.sink.record_action();
                } else {
                    report.stale += 1;
                }
            }
            ActionMode::Mark => {
                let result = doc
                    .set_style(unit, "outline", MARK_OUTLINE)
                    .and_then(|_| doc.set_style(unit, "opacity", MARK_OPACITY));
                match result {
                    Ok(()) => {
                        report.marked += 1;
                        self.sink.record_action();
                    }
                    Err(e) => log::warn!("Failed to mark {:?}: {}", unit, e),
                }
            }
        }
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::memory::{MemoryDocument, NodeId};
    use crate::telemetry::RemovalCounter;

    fn config(selectors: &[&str], filters: &[&str], mode: ActionMode) -> FilterConfig {
        FilterConfig::new(
            selectors.iter().map(|s| s.to_string()).collect(),
            filters.iter().map(|s| s.to_string()).collect(),
            mode,
        )
    }

    fn engine(selectors: &[&str], mode: ActionMode) -> FilterEngine<MemoryDocument, RemovalCounter> {
        FilterEngine::new(config(selectors, &["Trump"], mode), RemovalCounter::new()).unwrap()
    }

    /// Deliver batches until the document goes quiet.
    fn pump<S: ActionSink>(engine: &mut FilterEngine<MemoryDocument, S>, doc: &mut MemoryDocument) -> PassReport {
        let mut total = PassReport::default();
        for _ in 0..16 {
            let batches = doc.take_batches();
            if batches.is_empty() {
                break;
            }
            for batch in batches {
                total.merge(&engine.handle_mutations(doc, &batch));
            }
        }
        total
    }

    fn post(doc: &mut MemoryDocument, parent: NodeId, tag: &str, text: &str) -> NodeId {
        let id = doc.append_element(parent, tag, &[]).unwrap();
        doc.append_text(id, text).unwrap();
        id
    }

    #[test]
    fn test_sweep_applies_action_to_matching_units_only() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let texts = ["Trump rally", "weather today", "The Trumps", "trumpet solo", "sports"];
        let units: Vec<NodeId> = texts.iter().map(|t| post(&mut doc, body, "article", t)).collect();
        doc.append_element(body, "aside", &[]).unwrap();

        let mut engine = engine(&["article"], ActionMode::Remove);
        let report = engine.start(&mut doc);

        assert_eq!(report.candidates, 5);
        assert_eq!(report.matched, 2);
        assert_eq!(report.removed, 2);
        assert_eq!(engine.sink().count(), 2);
        let remaining = doc.query_selector_all(&doc.document_root(), "article");
        assert_eq!(remaining, vec![units[1], units[3], units[4]]);
    }

    #[test]
    fn test_selectors_are_ored() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        post(&mut doc, body, "article", "Trump");
        post(&mut doc, body, "li", "Trump");
        post(&mut doc, body, "p", "Trump");

        let mut engine = engine(&["article", "li"], ActionMode::Remove);
        let report = engine.start(&mut doc);
        assert_eq!(report.removed, 2);
        assert_eq!(doc.elements_by_tag(body, "p").len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let unit = post(&mut doc, body, "article", "Trump");

        let mut engine = engine(&["article"], ActionMode::Remove);
        engine.start(&mut doc);
        assert!(!doc.is_connected(&unit));
        let html_after_first = doc.to_html(doc.document_root());

        let replay = vec![MutationRecord::ChildList { target: body, added: vec![unit], removed: vec![] }];
        let report = engine.handle_mutations(&mut doc, &replay);
        assert_eq!(report.removed, 0);
        assert_eq!(report.stale, 1);
        assert_eq!(doc.to_html(doc.document_root()), html_after_first);
        assert_eq!(engine.sink().count(), 1);
    }

    #[test]
    fn test_nested_units_are_processed_once() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let article = doc.append_element(body, "article", &[]).unwrap();
        let list = doc.append_element(article, "ul", &[]).unwrap();
        post(&mut doc, list, "li", "Trump comment");

        let mut engine = engine(&["article", "li"], ActionMode::Remove);
        let report = engine.start(&mut doc);
        assert_eq!(report.removed, 1);
        assert_eq!(report.stale, 1);
        assert!(!doc.is_connected(&article));
    }

    #[test]
    fn test_incremental_discovery_of_deep_descendant() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        for i in 0..4 {
            post(&mut doc, body, "article", &format!("story {i}"));
        }

        let mut engine = engine(&["article"], ActionMode::Remove);
        let sweep = engine.start(&mut doc);
        assert_eq!(sweep.candidates, 4);

        // wrapper > div > section > article, built detached then inserted
        let wrapper = doc.create_element("div").unwrap();
        let level1 = doc.append_element(wrapper, "div", &[]).unwrap();
        let level2 = doc.append_element(level1, "section", &[]).unwrap();
        let unit = post(&mut doc, level2, "article", "Trump's speech");
        doc.append_child(body, wrapper).unwrap();

        let report = pump(&mut engine, &mut doc);
        assert_eq!(report.candidates, 1);
        assert_eq!(report.removed, 1);
        assert!(!doc.is_connected(&unit));
        assert!(doc.is_connected(&wrapper));
        assert_eq!(doc.query_selector_all(&doc.document_root(), "article").len(), 4);
    }

    #[test]
    fn test_boundary_subscription_catches_inner_insertions() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let mut engine = engine(&["article"], ActionMode::Remove);
        engine.start(&mut doc);
        assert_eq!(engine.subscription_count(), 1);

        let host = doc.create_element("x-feed").unwrap();
        let shadow = doc.attach_shadow(host).unwrap();
        doc.append_child(body, host).unwrap();

        let report = pump(&mut engine, &mut doc);
        assert_eq!(report.subscriptions, 1);
        assert!(engine.is_subscribed(&shadow));
        assert_eq!(doc.observer_count(), 2);

        let inner = post(&mut doc, shadow, "article", "Trump");
        let keep = post(&mut doc, shadow, "article", "gardening");
        let report = pump(&mut engine, &mut doc);
        assert_eq!(report.removed, 1);
        assert!(!doc.is_connected(&inner));
        assert!(doc.is_connected(&keep));

        // Re-inserting the host does not subscribe twice
        doc.append_child(body, host).unwrap();
        let report = pump(&mut engine, &mut doc);
        assert_eq!(report.subscriptions, 0);
        assert_eq!(doc.observer_count(), 2);
    }

    #[test]
    fn test_nested_boundaries() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let mut engine = engine(&["article"], ActionMode::Remove);
        engine.start(&mut doc);

        let outer = doc.create_element("x-outer").unwrap();
        let outer_root = doc.attach_shadow(outer).unwrap();
        doc.append_child(body, outer).unwrap();
        pump(&mut engine, &mut doc);

        let inner = doc.create_element("x-inner").unwrap();
        let inner_root = doc.attach_shadow(inner).unwrap();
        doc.append_child(outer_root, inner).unwrap();
        pump(&mut engine, &mut doc);
        assert!(engine.is_subscribed(&inner_root));

        let unit = post(&mut doc, inner_root, "article", "TRUMP");
        pump(&mut engine, &mut doc);
        assert!(!doc.is_connected(&unit));
        assert_eq!(engine.subscription_count(), 3);
    }

    #[test]
    fn test_mark_mode_is_non_destructive() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let unit = post(&mut doc, body, "article", "Trump");
        let other = post(&mut doc, body, "article", "cats");

        let mut engine = engine(&["article"], ActionMode::Mark);
        let report = engine.start(&mut doc);
        assert_eq!(report.marked, 1);
        assert_eq!(report.removed, 0);
        assert!(doc.is_connected(&unit));
        assert_eq!(doc.style_property(unit, "outline").as_deref(), Some(MARK_OUTLINE));
        assert_eq!(doc.style_property(unit, "opacity").as_deref(), Some(MARK_OPACITY));
        assert_eq!(doc.style_property(other, "opacity"), None);

        // Marking inside a batch writes `style`; those records do not feed back in
        let late = post(&mut doc, body, "article", "Trump again");
        let report = pump(&mut engine, &mut doc);
        assert_eq!(report.candidates, 1);
        assert_eq!(report.marked, 1);
        assert!(doc.is_connected(&late));
        assert_eq!(engine.sink().count(), 2);
    }

    #[test]
    fn test_attribute_change_makes_unit_match() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let div = post(&mut doc, body, "div", "Trump");

        let mut engine = engine(&[".post"], ActionMode::Remove);
        assert_eq!(engine.start(&mut doc).candidates, 0);

        doc.set_attribute(div, "class", "post").unwrap();
        let report = pump(&mut engine, &mut doc);
        assert_eq!(report.removed, 1);
        assert!(!doc.is_connected(&div));
    }

    #[test]
    fn test_batch_deduplicates_candidates() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let mut engine = engine(&["article"], ActionMode::Mark);
        engine.start(&mut doc);

        let unit = post(&mut doc, body, "article", "Trump");
        doc.set_attribute(unit, "data-id", "1").unwrap();
        let batches = doc.take_batches();
        assert_eq!(batches.len(), 1);
        // unit added, its text added, unit attribute changed
        assert_eq!(batches[0].len(), 3);

        let report = engine.handle_mutations(&mut doc, &batches[0]);
        assert_eq!(report.candidates, 1);
        assert_eq!(report.marked, 1);
    }

    #[test]
    fn test_unit_detached_before_delivery_is_stale() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let mut engine = engine(&["article"], ActionMode::Remove);
        engine.start(&mut doc);

        let wrapper = doc.append_element(body, "div", &[]).unwrap();
        post(&mut doc, wrapper, "article", "Trump");
        doc.remove_node(wrapper);

        let report = pump(&mut engine, &mut doc);
        assert_eq!(report.candidates, 1);
        assert_eq!(report.stale, 1);
        assert_eq!(report.removed, 0);
        assert_eq!(engine.sink().count(), 0);
    }

    #[test]
    fn test_text_change_is_caught_in_later_batch() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let mut engine = engine(&["article"], ActionMode::Remove);
        engine.start(&mut doc);

        let unit = post(&mut doc, body, "article", "loading");
        assert_eq!(pump(&mut engine, &mut doc).removed, 0);

        doc.append_element(unit, "span", &[]).and_then(|span| doc.append_text(span, "Trump")).unwrap();
        let report = pump(&mut engine, &mut doc);
        // The span is inserted inside the unit, not as a unit itself
        assert_eq!(report.candidates, 0);
        assert!(doc.is_connected(&unit));

        doc.set_attribute(unit, "class", "loaded").unwrap();
        assert_eq!(pump(&mut engine, &mut doc).removed, 1);
    }

    #[test]
    fn test_inert_without_selectors() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        post(&mut doc, body, "article", "Trump");

        let mut engine: FilterEngine<MemoryDocument> =
            FilterEngine::with_config(config(&[], &["Trump"], ActionMode::Remove)).unwrap();
        assert!(engine.is_inert());
        assert_eq!(engine.start(&mut doc), PassReport::default());
        assert_eq!(doc.observer_count(), 0);
        assert_eq!(doc.elements_by_tag(body, "article").len(), 1);
    }

    #[test]
    fn test_empty_keywords_keep_observing() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let early = post(&mut doc, body, "article", "Trump");

        let mut engine: FilterEngine<MemoryDocument> =
            FilterEngine::with_config(config(&["article"], &[" "], ActionMode::Remove)).unwrap();
        assert!(!engine.is_inert());
        let report = engine.start(&mut doc);
        assert_eq!(report.subscriptions, 1);
        assert_eq!(report.matched, 0);
        assert!(doc.is_connected(&early));

        engine.replace_filters(&["Trump"]).unwrap();
        let late = post(&mut doc, body, "article", "Trump");
        let report = pump(&mut engine, &mut doc);
        assert_eq!(report.removed, 1);
        assert!(!doc.is_connected(&late));
        assert!(doc.is_connected(&early));
    }

    #[test]
    fn test_boundaries_attach_while_keywords_are_empty() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let mut engine = engine(&["article"], ActionMode::Remove);
        engine.start(&mut doc);

        engine.replace_filters::<&str>(&[]).unwrap();
        let host = doc.create_element("x-card").unwrap();
        let shadow = doc.attach_shadow(host).unwrap();
        doc.append_child(body, host).unwrap();
        let report = pump(&mut engine, &mut doc);
        assert_eq!(report.subscriptions, 1);
        assert!(engine.is_subscribed(&shadow));

        engine.replace_filters(&["Trump"]).unwrap();
        let unit = post(&mut doc, shadow, "article", "Trump");
        let report = pump(&mut engine, &mut doc);
        assert_eq!(report.removed, 1);
        assert!(!doc.is_connected(&unit));
    }

    #[test]
    fn test_no_body_means_no_subscription() {
        let mut doc = MemoryDocument::without_body();
        let mut engine = engine(&["article"], ActionMode::Remove);
        let report = engine.start(&mut doc);
        assert_eq!(report.subscriptions, 0);
        assert_eq!(engine.subscription_count(), 0);
        assert_eq!(doc.observer_count(), 0);
    }

    #[test]
    fn test_replace_filters_applies_to_later_batches() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let early = post(&mut doc, body, "article", "Biden");
        let mut engine = engine(&["article"], ActionMode::Remove);
        engine.start(&mut doc);

        engine.replace_filters(&["Biden"]).unwrap();
        let late = post(&mut doc, body, "article", "Biden again");
        pump(&mut engine, &mut doc);
        assert!(doc.is_connected(&early));
        assert!(!doc.is_connected(&late));
    }

    #[test]
    fn test_registry_prunes_disconnected_boundaries() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let mut engine = engine(&["article"], ActionMode::Remove);
        engine.start(&mut doc);

        let mut hosts = Vec::new();
        for _ in 0..70 {
            let host = doc.create_element("x-card").unwrap();
            doc.attach_shadow(host).unwrap();
            doc.append_child(body, host).unwrap();
            hosts.push(host);
        }
        pump(&mut engine, &mut doc);
        assert_eq!(engine.subscription_count(), 71);

        for host in hosts {
            doc.remove_node(host);
        }
        for _ in 0..70 {
            let host = doc.create_element("x-card").unwrap();
            doc.attach_shadow(host).unwrap();
            doc.append_child(body, host).unwrap();
        }
        pump(&mut engine, &mut doc);
        assert_eq!(engine.subscription_count(), 71);
    }

    #[test]
    fn test_reinserted_boundary_after_prune_is_observed_once() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let mut engine = engine(&["article"], ActionMode::Mark);
        engine.start(&mut doc);

        let host = doc.create_element("x-card").unwrap();
        let shadow = doc.attach_shadow(host).unwrap();
        doc.append_child(body, host).unwrap();
        pump(&mut engine, &mut doc);
        doc.remove_node(host);
        pump(&mut engine, &mut doc);

        for _ in 0..70 {
            let other = doc.create_element("x-card").unwrap();
            doc.attach_shadow(other).unwrap();
            doc.append_child(body, other).unwrap();
        }
        pump(&mut engine, &mut doc);
        assert!(!engine.is_subscribed(&shadow));
        assert_eq!(doc.observer_count(), 72);

        doc.append_child(body, host).unwrap();
        let report = pump(&mut engine, &mut doc);
        assert_eq!(report.subscriptions, 1);
        assert_eq!(doc.observer_count(), 72);

        post(&mut doc, shadow, "article", "Trump");
        let report = pump(&mut engine, &mut doc);
        assert_eq!(report.candidates, 1);
        assert_eq!(report.marked, 1);
        assert_eq!(engine.sink().count(), 1);
    }

    #[test]
    fn test_style_change_is_a_candidate_in_remove_mode() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let mut engine = engine(&["article"], ActionMode::Remove);
        engine.start(&mut doc);

        let unit = post(&mut doc, body, "article", "loading");
        pump(&mut engine, &mut doc);
        doc.append_element(unit, "span", &[]).and_then(|span| doc.append_text(span, "Trump")).unwrap();
        pump(&mut engine, &mut doc);
        assert!(doc.is_connected(&unit));

        doc.set_attribute(unit, "style", "display: block").unwrap();
        let report = pump(&mut engine, &mut doc);
        assert_eq!(report.removed, 1);
        assert!(!doc.is_connected(&unit));
    }

    #[test]
    fn test_marked_unit_is_not_marked_again() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let unit = post(&mut doc, body, "article", "Trump");
        let mut engine = engine(&["article"], ActionMode::Mark);
        assert_eq!(engine.start(&mut doc).marked, 1);

        doc.set_attribute(unit, "class", "seen").unwrap();
        doc.set_attribute(unit, "data-id", "7").unwrap();
        let report = pump(&mut engine, &mut doc);
        assert_eq!(report.candidates, 1);
        assert_eq!(report.marked, 0);
        assert_eq!(engine.sink().count(), 1);
    }

    #[test]
    fn test_registry_watermark() {
        let mut registry: SubscriptionRegistry<u32> = SubscriptionRegistry::default();
        for n in 0..=REGISTRY_PRUNE_FLOOR as u32 {
            registry.insert(n, |s| s % 2 == 0);
        }
        assert_eq!(registry.len(), REGISTRY_PRUNE_FLOOR / 2 + 1);
        assert!(registry.contains(&0));
        assert!(!registry.contains(&1));
    }
}
