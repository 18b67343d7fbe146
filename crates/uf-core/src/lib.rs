//! Unfeed Core Library
//!
//! This crate provides the incremental keyword filtering engine for Unfeed.
//! It does no I/O: the host supplies a fully resolved [`FilterConfig`] and a
//! [`Document`] to run against.
//!
//! # Architecture
//!
//! The engine sweeps the document once for content units (nodes matching the
//! site's selectors), then reacts to mutation batches delivered by the host.
//! Each batch is reduced to a deduplicated candidate set which goes through
//! the same extract -> match -> act pipeline as the sweep.
//!
//! # Modules
//!
//! - `types`: Shared type definitions
//! - `matcher`: Whole-word keyword matching with plural/possessive variants
//! - `text`: Aggregated text extraction
//! - `dom`: Host document abstraction and mutation records
//! - `memory`: In-memory document over a `scraper` tree
//! - `telemetry`: Action sinks (removal counter)
//! - `engine`: The Filter Engine

pub mod dom;
pub mod engine;
pub mod matcher;
#[cfg(feature = "memory")]
pub mod memory;
pub mod telemetry;
pub mod text;
pub mod types;

// Re-export commonly used types
pub use dom::{Document, DomError, MutationRecord, ObserveFlags};
pub use engine::FilterEngine;
pub use matcher::{matches, KeywordMatcher, MatchError};
#[cfg(feature = "memory")]
pub use memory::{MemoryDocument, NodeId};
pub use telemetry::{ActionSink, NoopSink, RemovalCounter};
pub use text::extract_text;
pub use types::{ActionMode, FilterConfig, PassReport};
