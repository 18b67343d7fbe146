//! Host document abstraction
//!
//! The engine never owns the document. Everything it needs from the host
//! (a browser DOM, or [`crate::memory::MemoryDocument`]) goes through the
//! [`Document`] trait, and changes come back as [`MutationRecord`] batches
//! delivered by the host for each observed scope.

use std::fmt;
use std::hash::Hash;

bitflags::bitflags! {
    /// What an observation scope watches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ObserveFlags: u8 {
        /// Children added to or removed from a watched node
        const CHILD_LIST = 1 << 0;
        /// Attribute changes on a watched node
        const ATTRIBUTES = 1 << 1;
        /// Extend the watch to every descendant of the scope
        const SUBTREE = 1 << 2;

        /// The engine's subscription: structure and attributes, whole subtree
        const ALL = Self::CHILD_LIST.bits() | Self::ATTRIBUTES.bits() | Self::SUBTREE.bits();
    }
}

/// One change record, as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord<N> {
    /// Children of `target` changed
    ChildList {
        target: N,
        added: Vec<N>,
        removed: Vec<N>,
    },
    /// Attribute `name` of `target` changed
    Attributes { target: N, name: String },
}

impl<N> MutationRecord<N> {
    pub fn target(&self) -> &N {
        match self {
            Self::ChildList { target, .. } | Self::Attributes { target, .. } => target,
        }
    }
}

/// Error type for host document operations.
#[derive(Debug, thiserror::Error)]
pub enum DomError {
    #[error("Node is not an element")]
    NotAnElement,
    #[error("Invalid tree operation: {0}")]
    Hierarchy(String),
    #[error("Failed to observe scope: {0}")]
    Observe(String),
    #[error("Failed to update style: {0}")]
    Style(String),
}

/// The host document surface the engine consumes.
///
/// `Node` is a handle into the host's tree. Equality must be node identity,
/// and `Hash` must agree with it; the engine uses both to deduplicate
/// candidates within a batch and to key its subscription registry.
pub trait Document {
    type Node: Clone + Eq + Hash + fmt::Debug;

    /// The top of the document, used as the sweep scope.
    fn document_root(&self) -> Self::Node;

    /// The body element, if the document has one yet.
    fn body(&self) -> Option<Self::Node>;

    /// Every element under `scope` (exclusive) matching the selector list,
    /// in document order. Encapsulation boundaries are not entered.
    fn query_selector_all(&self, scope: &Self::Node, selectors: &str) -> Vec<Self::Node>;

    /// Whether `node` itself matches the selector list.
    fn matches_selector(&self, node: &Self::Node, selectors: &str) -> bool;

    fn is_element(&self, node: &Self::Node) -> bool;

    /// The character data of a text node, `None` for anything else.
    fn text_data(&self, node: &Self::Node) -> Option<String>;

    /// Child nodes in order. Does not include a shadow root.
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// The encapsulation boundary hosted by `node`, if any.
    fn shadow_root(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Whether `node` is still attached to the document, crossing boundaries
    /// through their hosts.
    fn is_connected(&self, node: &Self::Node) -> bool;

    /// Detach `node` and its subtree. Returns false if it had no parent.
    fn remove(&mut self, node: &Self::Node) -> bool;

    /// Inline style property of `node`, `None` if unset or not an element.
    fn style(&self, node: &Self::Node, property: &str) -> Option<String>;

    fn set_style(&mut self, node: &Self::Node, property: &str, value: &str) -> Result<(), DomError>;

    /// Start delivering mutation records for `scope`.
    fn observe(&mut self, scope: &Self::Node, flags: ObserveFlags) -> Result<(), DomError>;
}
