//! WebAssembly bindings for Unfeed
//!
//! The content script calls [`start`] once per page load. It resolves the
//! configuration from `localStorage` and the remote selector map, builds the
//! engine for the current hostname, sweeps the page and keeps a
//! `MutationObserver` feeding batches to the engine until the page unloads.

pub mod dom;
pub mod fetch;
pub mod logging;
pub mod storage;

use std::cell::RefCell;
use std::rc::Rc;

use uf_config::{ConfigProvider, FetchPolicy};
use uf_core::{FilterEngine, PassReport};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::MutationObserver;

use crate::dom::{convert_records, WebDocument};
use crate::fetch::FetchSource;
use crate::storage::{LocalStorage, LocalStorageCounter};

struct Session {
    engine: FilterEngine<WebDocument, LocalStorageCounter>,
    doc: WebDocument,
    host: String,
}

thread_local! {
    static SESSION: RefCell<Option<Rc<RefCell<Session>>>> = const { RefCell::new(None) };
}

fn set_field(target: &js_sys::Object, key: &str, value: JsValue) {
    let _ = js_sys::Reflect::set(target, &key.into(), &value);
}

fn report_to_js(host: &str, source: &str, report: &PassReport) -> JsValue {
    let result = js_sys::Object::new();
    set_field(&result, "host", JsValue::from_str(host));
    set_field(&result, "source", JsValue::from_str(source));
    set_field(&result, "candidates", JsValue::from(report.candidates as u32));
    set_field(&result, "matched", JsValue::from(report.matched as u32));
    set_field(&result, "removed", JsValue::from(report.removed as u32));
    set_field(&result, "marked", JsValue::from(report.marked as u32));
    set_field(&result, "subscriptions", JsValue::from(report.subscriptions as u32));
    result.into()
}

fn parse_keywords(keywords_json: &str) -> Result<Vec<String>, JsValue> {
    let value = js_sys::JSON::parse(keywords_json)
        .map_err(|_| JsValue::from_str("Keywords must be a JSON array of strings"))?;
    let array = value
        .dyn_into::<js_sys::Array>()
        .map_err(|_| JsValue::from_str("Keywords must be a JSON array of strings"))?;
    array
        .iter()
        .map(|v| v.as_string().ok_or_else(|| JsValue::from_str("Keyword must be a string")))
        .collect()
}

/// Resolve configuration, sweep the page and start observing it.
///
/// Resolves to a report object. `running` is false on unsupported sites.
#[wasm_bindgen]
pub async fn start(force_refresh: bool, verbose: bool) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    logging::init(if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Warn });

    if is_running() {
        return Err(JsValue::from_str("Already running. Reload the page to restart."));
    }

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
    let document = window.document().ok_or_else(|| JsValue::from_str("No document"))?;
    let host = window.location().hostname()?;

    let storage = LocalStorage::open().map_err(|e| JsValue::from_str(&e.to_string()))?;
    let mut provider = ConfigProvider::new(storage);
    let policy = if force_refresh {
        FetchPolicy::ForceRemote
    } else {
        FetchPolicy::CachedOrRemote
    };
    let now_ms = js_sys::Date::now() as u64;
    let resolution = provider.resolve(&FetchSource::default(), policy, now_ms).await;
    let source = resolution.source.as_str();

    let engine: FilterEngine<WebDocument, _> = FilterEngine::new(resolution.config.for_host(&host), LocalStorageCounter::open())
        .map_err(|e| JsValue::from_str(&format!("Invalid keyword: {}", e)))?;
    if engine.is_inert() {
        log::info!("No selectors for {}", host);
        let result = report_to_js(&host, source, &PassReport::default());
        set_field(result.unchecked_ref(), "running", JsValue::FALSE);
        return Ok(result);
    }

    let session = Rc::new(RefCell::new(Session {
        engine,
        doc: WebDocument::new(document),
        host,
    }));

    let callback_session = Rc::clone(&session);
    let callback = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(
        move |records: js_sys::Array, _observer: MutationObserver| {
            let Ok(mut guard) = callback_session.try_borrow_mut() else {
                log::warn!("Mutation batch arrived while the engine was busy");
                return;
            };
            let Session { engine, doc, .. } = &mut *guard;
            let report = engine.handle_mutations(doc, &convert_records(&records));
            if report.actions() > 0 {
                log::debug!("Batch: {} candidates, {} actions", report.candidates, report.actions());
            }
        },
    );
    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
    // The observer lives as long as the page.
    callback.forget();

    let result = {
        let mut guard = session.borrow_mut();
        let Session { engine, doc, host } = &mut *guard;
        doc.set_observer(observer);
        let report = engine.start(doc);
        report_to_js(host, source, &report)
    };
    set_field(result.unchecked_ref(), "running", JsValue::TRUE);

    SESSION.with(|cell| *cell.borrow_mut() = Some(session));
    Ok(result)
}

#[wasm_bindgen]
pub fn is_running() -> bool {
    SESSION.with(|cell| cell.borrow().is_some())
}

/// Swap the keyword set of the running engine. Already-processed content is
/// not revisited.
#[wasm_bindgen]
pub fn update_keywords(keywords_json: &str) -> Result<(), JsValue> {
    let keywords = parse_keywords(keywords_json)?;
    let session = SESSION
        .with(|cell| cell.borrow().clone())
        .ok_or_else(|| JsValue::from_str("Not running"))?;
    let mut guard = session.try_borrow_mut().map_err(|_| JsValue::from_str("Engine busy"))?;
    guard
        .engine
        .replace_filters(keywords.as_slice())
        .map_err(|e| JsValue::from_str(&format!("Invalid keyword: {}", e)))
}

/// Disconnect the observer and drop the engine.
#[wasm_bindgen]
pub fn stop() {
    if let Some(session) = SESSION.with(|cell| cell.borrow_mut().take()) {
        if let Ok(mut guard) = session.try_borrow_mut() {
            log::info!("Stopping on {}", guard.host);
            guard.doc.disconnect();
        }
    }
}

#[wasm_bindgen]
pub fn removal_count() -> f64 {
    LocalStorageCounter::open().count() as f64
}

/// Whether `text` mentions any of `keywords` (a JSON array of strings).
#[wasm_bindgen]
pub fn check_text(text: &str, keywords_json: &str) -> Result<bool, JsValue> {
    let keywords = parse_keywords(keywords_json)?;
    Ok(uf_core::matches(text, keywords.as_slice()))
}
