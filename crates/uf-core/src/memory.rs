//! In-memory document over a `scraper` tree
//!
//! Nodes live in an `ego_tree::Tree<scraper::Node>`, so parsing and selector
//! matching are scraper's. On top of that the document adds shadow roots and
//! per-observer mutation queues. Tests, the CLI and the benches drive the
//! engine against it.
//!
//! Records are queued per observer the way a browser queues them per
//! `MutationObserver`: a change is recorded for every observer whose scope is
//! the changed node or, with `SUBTREE`, one of its tree ancestors. A shadow
//! root is an orphan fragment node, so tree ancestry stops there and an
//! observer on the document does not see changes inside a boundary.

use std::cell::RefCell;
use std::collections::HashMap;

use ego_tree::Tree;
use scraper::node::Text;
use scraper::{ElementRef, Html, Node, Selector};

use crate::dom::{Document, DomError, MutationRecord, ObserveFlags};

/// Handle to a node in a [`MemoryDocument`].
pub use ego_tree::NodeId;

struct Observer {
    scope: NodeId,
    flags: ObserveFlags,
    queue: Vec<MutationRecord<NodeId>>,
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

// =============================================================================
// MemoryDocument
// =============================================================================

pub struct MemoryDocument {
    tree: Tree<Node>,
    body: Option<NodeId>,
    /// host -> shadow root
    shadow_roots: HashMap<NodeId, NodeId>,
    /// shadow root -> host
    hosts: HashMap<NodeId, NodeId>,
    observers: Vec<Observer>,
    selector_cache: RefCell<HashMap<String, Option<Selector>>>,
    prototypes: RefCell<HashMap<String, Node>>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// A document with `html`, `head` and an empty `body`.
    pub fn new() -> Self {
        Self::from_html("")
    }

    /// Parse a full HTML page. Comments and the doctype stay in the tree but
    /// are not serialized by [`MemoryDocument::to_html`].
    pub fn from_html(html: &str) -> Self {
        let tree = Html::parse_document(html).tree;
        let mut doc = Self {
            tree,
            body: None,
            shadow_roots: HashMap::new(),
            hosts: HashMap::new(),
            observers: Vec::new(),
            selector_cache: RefCell::new(HashMap::new()),
            prototypes: RefCell::new(HashMap::new()),
        };
        let root = doc.document_root();
        doc.body = doc
            .child_element(root, "html")
            .and_then(|html| doc.child_element(html, "body"));
        doc
    }

    /// A document whose body has not been parsed yet.
    pub fn without_body() -> Self {
        let mut doc = Self::new();
        if let Some(body) = doc.body.take() {
            if let Some(mut node) = doc.tree.get_mut(body) {
                node.detach();
            }
        }
        doc
    }

    pub fn node_count(&self) -> usize {
        self.tree.nodes().count()
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.tree.get(id).map(|n| n.value())
    }

    fn child_element(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.tree
            .get(parent)?
            .children()
            .find(|c| matches!(c.value(), Node::Element(e) if e.name() == name))
            .map(|c| c.id())
    }

    // =========================================================================
    // Construction
    // =========================================================================

    pub fn create_element(&mut self, tag: &str) -> Result<NodeId, DomError> {
        self.create_element_with_attrs(tag, &[])
    }

    /// Create a detached element. The HTML parser builds it, so tags it only
    /// accepts inside a specific parent (`tr`, `td`, `body`) are rejected.
    pub fn create_element_with_attrs(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<NodeId, DomError> {
        let node = self.element_node(tag, attrs)?;
        Ok(self.tree.orphan(node).id())
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.tree.orphan(Node::Text(Text { text: text.into() })).id()
    }

    fn element_node(&self, tag: &str, attrs: &[(&str, &str)]) -> Result<Node, DomError> {
        if !is_valid_tag(tag) {
            return Err(DomError::Hierarchy(format!("invalid tag name '{}'", tag)));
        }
        if let Some((name, _)) = attrs.iter().find(|(name, _)| !is_valid_attribute(name)) {
            return Err(DomError::Hierarchy(format!("invalid attribute name '{}'", name)));
        }

        // Start tag only: `</br>` would parse as a second `<br>`.
        let mut markup = String::new();
        markup.push('<');
        markup.push_str(tag);
        for (name, value) in attrs {
            markup.push(' ');
            markup.push_str(name);
            markup.push_str("=\"");
            escape_into(value, true, &mut markup);
            markup.push('"');
        }
        markup.push('>');

        let mut prototypes = self.prototypes.borrow_mut();
        if let Some(node) = prototypes.get(&markup) {
            return Ok(node.clone());
        }
        let fragment = Html::parse_fragment(&markup);
        let node = fragment
            .root_element()
            .children()
            .find_map(ElementRef::wrap)
            .filter(|e| e.value().name().eq_ignore_ascii_case(tag))
            .map(|e| Node::Element(e.value().clone()))
            .ok_or_else(|| DomError::Hierarchy(format!("<{}> cannot be created outside its parent", tag)))?;
        prototypes.insert(markup, node.clone());
        Ok(node)
    }

    /// Append `child` to `parent`, moving it if it is already attached.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        match self.node(parent) {
            Some(Node::Element(_) | Node::Document | Node::Fragment) => {}
            Some(_) => return Err(DomError::Hierarchy("node cannot have children".into())),
            None => return Err(DomError::Hierarchy("unknown parent".into())),
        }
        match self.node(child) {
            Some(Node::Document | Node::Fragment) => {
                return Err(DomError::Hierarchy("document and shadow roots cannot be inserted".into()))
            }
            Some(_) => {}
            None => return Err(DomError::Hierarchy("unknown child".into())),
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::Hierarchy("node would become its own ancestor".into()));
        }

        self.remove_node(child);
        if let Some(mut node) = self.tree.get_mut(parent) {
            node.append_id(child);
        }
        self.notify(
            parent,
            ObserveFlags::CHILD_LIST,
            MutationRecord::ChildList {
                target: parent,
                added: vec![child],
                removed: Vec::new(),
            },
        );
        Ok(())
    }

    /// Create an element and append it in one step.
    pub fn append_element(
        &mut self,
        parent: NodeId,
        tag: &str,
        attrs: &[(&str, &str)],
    ) -> Result<NodeId, DomError> {
        let id = self.create_element_with_attrs(tag, attrs)?;
        self.append_child(parent, id)?;
        Ok(id)
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> Result<NodeId, DomError> {
        let id = self.create_text(text);
        self.append_child(parent, id)?;
        Ok(id)
    }

    /// Detach `id` from its parent. Returns false if it had none.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.parent(id) else {
            return false;
        };
        if let Some(mut node) = self.tree.get_mut(id) {
            node.detach();
        }
        self.notify(
            parent,
            ObserveFlags::CHILD_LIST,
            MutationRecord::ChildList {
                target: parent,
                added: Vec::new(),
                removed: vec![id],
            },
        );
        true
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let Some(Node::Element(element)) = self.node(id) else {
            return Err(DomError::NotAnElement);
        };
        let tag = element.name().to_string();
        let mut attrs: Vec<(String, String)> = element
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        attrs.sort();
        match attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => attrs.push((name.to_string(), value.to_string())),
        }

        let borrowed: Vec<(&str, &str)> = attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let replacement = self.element_node(&tag, &borrowed)?;
        if let Some(mut node) = self.tree.get_mut(id) {
            *node.value() = replacement;
        }
        self.notify(
            id,
            ObserveFlags::ATTRIBUTES,
            MutationRecord::Attributes {
                target: id,
                name: name.to_string(),
            },
        );
        Ok(())
    }

    /// Give `host` an encapsulation boundary. Like the browser, this does not
    /// produce a mutation record.
    pub fn attach_shadow(&mut self, host: NodeId) -> Result<NodeId, DomError> {
        if !matches!(self.node(host), Some(Node::Element(_))) {
            return Err(DomError::NotAnElement);
        }
        if self.shadow_roots.contains_key(&host) {
            return Err(DomError::Hierarchy("element already hosts a shadow root".into()));
        }
        let root = self.tree.orphan(Node::Fragment).id();
        self.shadow_roots.insert(host, root);
        self.hosts.insert(root, host);
        Ok(root)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.tree.get(id)?.parent().map(|p| p.id())
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.node(id)? {
            Node::Element(e) => Some(e.name()),
            _ => None,
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match self.node(id)? {
            Node::Element(e) => e.attr(name),
            _ => None,
        }
    }

    /// A single property from the inline `style` attribute.
    pub fn style_property(&self, id: NodeId, property: &str) -> Option<String> {
        let style = self.attribute(id, "style")?;
        parse_style(style)
            .into_iter()
            .find(|(k, _)| k == property)
            .map(|(_, v)| v)
    }

    /// Elements under `scope` with the given tag, in document order.
    pub fn elements_by_tag(&self, scope: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|id| self.tag(*id).map_or(false, |t| t.eq_ignore_ascii_case(tag)))
            .collect()
    }

    /// Descendants of `scope` in document order, not entering shadow roots.
    fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        match self.tree.get(scope) {
            Some(node) => node.descendants().skip(1).map(|n| n.id()).collect(),
            None => Vec::new(),
        }
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    // =========================================================================
    // Observation
    // =========================================================================

    fn notify(&mut self, target: NodeId, kind: ObserveFlags, record: MutationRecord<NodeId>) {
        if self.observers.is_empty() {
            return;
        }
        for idx in 0..self.observers.len() {
            let (scope, flags) = (self.observers[idx].scope, self.observers[idx].flags);
            if !flags.contains(kind) {
                continue;
            }
            let in_scope = target == scope
                || (flags.contains(ObserveFlags::SUBTREE) && self.is_inclusive_ancestor(scope, target));
            if in_scope {
                self.observers[idx].queue.push(record.clone());
            }
        }
    }

    /// Drain every observer's queue, one batch per observer with records.
    pub fn take_batches(&mut self) -> Vec<Vec<MutationRecord<NodeId>>> {
        self.observers
            .iter_mut()
            .filter(|o| !o.queue.is_empty())
            .map(|o| std::mem::take(&mut o.queue))
            .collect()
    }

    pub fn pending_records(&self) -> usize {
        self.observers.iter().map(|o| o.queue.len()).sum()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn observed_scopes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.observers.iter().map(|o| o.scope)
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Serialize `id` as HTML. Documents and shadow roots serialize their
    /// children; shadow content is not included in its host's markup.
    /// Attributes are written in name order.
    pub fn to_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, false, &mut out);
        out
    }

    fn write_html(&self, id: NodeId, raw: bool, out: &mut String) {
        let Some(node) = self.tree.get(id) else {
            return;
        };
        match node.value() {
            Node::Document | Node::Fragment => {
                for child in node.children() {
                    self.write_html(child.id(), false, out);
                }
            }
            Node::Text(text) if raw => out.push_str(&text.text),
            Node::Text(text) => escape_into(&text.text, false, out),
            Node::Element(e) => {
                let tag = e.name();
                let mut attrs: Vec<(&str, &str)> = e.attrs().collect();
                attrs.sort();
                out.push('<');
                out.push_str(tag);
                for (k, v) in attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    escape_into(v, true, out);
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag) {
                    return;
                }
                let raw = RAW_TEXT_ELEMENTS.contains(&tag);
                for child in node.children() {
                    self.write_html(child.id(), raw, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            _ => {}
        }
    }

    fn with_selector<R>(&self, selectors: &str, f: impl FnOnce(&Selector) -> R) -> Option<R> {
        let mut cache = self.selector_cache.borrow_mut();
        let entry = cache.entry(selectors.to_string()).or_insert_with(|| match Selector::parse(selectors) {
            Ok(selector) => Some(selector),
            Err(e) => {
                log::warn!("Ignoring selector '{}': {:?}", selectors, e);
                None
            }
        });
        entry.as_ref().map(f)
    }

    fn element_ref(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.tree.get(id).and_then(ElementRef::wrap)
    }
}

fn is_valid_tag(tag: &str) -> bool {
    tag.chars().next().map_or(false, |c| c.is_ascii_alphabetic())
        && tag.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
}

fn is_valid_attribute(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '<' | '>' | '/' | '='))
}

fn escape_into(text: &str, attr: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' if !attr => out.push_str("&lt;"),
            '>' if !attr => out.push_str("&gt;"),
            '"' if attr => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (k, v) = decl.split_once(':')?;
            let k = k.trim();
            (!k.is_empty()).then(|| (k.to_ascii_lowercase(), v.trim().to_string()))
        })
        .collect()
}

fn format_style(decls: &[(String, String)]) -> String {
    decls
        .iter()
        .map(|(k, v)| format!("{}: {};", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// Document
// =============================================================================

impl Document for MemoryDocument {
    type Node = NodeId;

    fn document_root(&self) -> NodeId {
        self.tree.root().id()
    }

    fn body(&self) -> Option<NodeId> {
        self.body
    }

    fn query_selector_all(&self, scope: &NodeId, selectors: &str) -> Vec<NodeId> {
        self.with_selector(selectors, |selector| {
            self.descendants(*scope)
                .into_iter()
                .filter(|id| self.element_ref(*id).map_or(false, |e| selector.matches(&e)))
                .collect()
        })
        .unwrap_or_default()
    }

    fn matches_selector(&self, node: &NodeId, selectors: &str) -> bool {
        let Some(element) = self.element_ref(*node) else {
            return false;
        };
        self.with_selector(selectors, |selector| selector.matches(&element))
            .unwrap_or(false)
    }

    fn is_element(&self, node: &NodeId) -> bool {
        matches!(self.node(*node), Some(Node::Element(_)))
    }

    fn text_data(&self, node: &NodeId) -> Option<String> {
        match self.node(*node)? {
            Node::Text(text) => Some(text.text.to_string()),
            _ => None,
        }
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        match self.tree.get(*node) {
            Some(n) => n.children().map(|c| c.id()).collect(),
            None => Vec::new(),
        }
    }

    fn shadow_root(&self, node: &NodeId) -> Option<NodeId> {
        self.shadow_roots.get(node).copied()
    }

    fn is_connected(&self, node: &NodeId) -> bool {
        let root = self.document_root();
        let mut current = *node;
        loop {
            if current == root {
                return true;
            }
            current = match (self.parent(current), self.hosts.get(&current)) {
                (Some(parent), _) => parent,
                (None, Some(host)) => *host,
                (None, None) => return false,
            };
        }
    }

    fn remove(&mut self, node: &NodeId) -> bool {
        self.remove_node(*node)
    }

    fn style(&self, node: &NodeId, property: &str) -> Option<String> {
        self.style_property(*node, &property.to_ascii_lowercase())
    }

    fn set_style(&mut self, node: &NodeId, property: &str, value: &str) -> Result<(), DomError> {
        if !self.is_element(node) {
            return Err(DomError::NotAnElement);
        }
        let mut decls = self.attribute(*node, "style").map(parse_style).unwrap_or_default();
        let property = property.to_ascii_lowercase();
        match decls.iter_mut().find(|(k, _)| *k == property) {
            Some((_, v)) if *v == value => return Ok(()),
            Some((_, v)) => *v = value.to_string(),
            None => decls.push((property, value.to_string())),
        }
        self.set_attribute(*node, "style", &format_style(&decls))
    }

    /// Observing a scope that already has an observer replaces its flags.
    fn observe(&mut self, scope: &NodeId, flags: ObserveFlags) -> Result<(), DomError> {
        if !matches!(self.node(*scope), Some(Node::Element(_) | Node::Document | Node::Fragment)) {
            return Err(DomError::Observe("scope must be an element, document or shadow root".into()));
        }
        match self.observers.iter_mut().find(|o| o.scope == *scope) {
            Some(observer) => observer.flags = flags,
            None => self.observers.push(Observer {
                scope: *scope,
                flags,
                queue: Vec::new(),
            }),
        }
        Ok(())
    }
}
