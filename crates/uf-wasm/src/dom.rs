//! Browser DOM as a [`Document`]

use std::cell::Cell;
use std::hash::{Hash, Hasher};

use uf_core::{Document, DomError, MutationRecord, ObserveFlags};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{DocumentFragment, Element, HtmlElement, MutationObserver, MutationObserverInit, Node, NodeList};

/// Expando property carrying a node's identity.
const NODE_ID_KEY: &str = "__unfeedId";

thread_local! {
    static NEXT_NODE_ID: Cell<u32> = const { Cell::new(1) };
}

/// A browser node with a stable identity.
///
/// JS object identity is not hashable from Rust, so each element, document
/// or fragment is tagged with a numeric id the first time it is wrapped and
/// compared by that id. Text and comment nodes are only walked for text and
/// never keyed, so they stay untagged (id 0) and compare by `isSameNode`.
#[derive(Clone, Debug)]
pub struct DomNode {
    node: Node,
    id: u32,
}

impl DomNode {
    pub fn wrap(node: Node) -> Self {
        if is_character_data(&node) {
            return Self { node, id: 0 };
        }
        let key = JsValue::from_str(NODE_ID_KEY);
        let existing = js_sys::Reflect::get(&node, &key).ok().and_then(|v| v.as_f64());
        let id = match existing {
            Some(id) => id as u32,
            None => {
                let id = NEXT_NODE_ID.with(|next| {
                    let id = next.get();
                    next.set(id.wrapping_add(1).max(1));
                    id
                });
                if js_sys::Reflect::set(&node, &key, &JsValue::from(id)).is_err() {
                    log::trace!("Could not tag node {}", id);
                }
                id
            }
        };
        Self { node, id }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Identity tag, 0 for untagged text and comment nodes.
    pub fn id(&self) -> u32 {
        self.id
    }
}

fn is_character_data(node: &Node) -> bool {
    matches!(
        node.node_type(),
        Node::TEXT_NODE | Node::COMMENT_NODE | Node::CDATA_SECTION_NODE | Node::PROCESSING_INSTRUCTION_NODE
    )
}

impl PartialEq for DomNode {
    fn eq(&self, other: &Self) -> bool {
        if self.id == 0 || other.id == 0 {
            return self.node.is_same_node(Some(&other.node));
        }
        self.id == other.id
    }
}

impl Eq for DomNode {}

impl Hash for DomNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

fn node_list(list: &NodeList) -> Vec<DomNode> {
    (0..list.length()).filter_map(|i| list.get(i)).map(DomNode::wrap).collect()
}

fn js_error(e: JsValue) -> String {
    e.as_string().unwrap_or_else(|| format!("{:?}", e))
}

/// Convert a `MutationObserver` callback batch.
pub fn convert_records(records: &js_sys::Array) -> Vec<MutationRecord<DomNode>> {
    records
        .iter()
        .filter_map(|value| {
            let record = value.dyn_into::<web_sys::MutationRecord>().ok()?;
            let target = DomNode::wrap(record.target()?);
            match record.type_().as_str() {
                "childList" => Some(MutationRecord::ChildList {
                    target,
                    added: node_list(&record.added_nodes()),
                    removed: node_list(&record.removed_nodes()),
                }),
                "attributes" => Some(MutationRecord::Attributes {
                    target,
                    name: record.attribute_name()?,
                }),
                _ => None,
            }
        })
        .collect()
}

/// The page document plus the one observer every scope is attached to.
pub struct WebDocument {
    document: web_sys::Document,
    observer: Option<MutationObserver>,
}

impl WebDocument {
    pub fn new(document: web_sys::Document) -> Self {
        Self { document, observer: None }
    }

    pub fn set_observer(&mut self, observer: MutationObserver) {
        self.observer = Some(observer);
    }

    pub fn disconnect(&mut self) {
        if let Some(observer) = self.observer.take() {
            observer.disconnect();
        }
    }
}

impl Document for WebDocument {
    type Node = DomNode;

    fn document_root(&self) -> DomNode {
        DomNode::wrap(self.document.clone().into())
    }

    fn body(&self) -> Option<DomNode> {
        self.document.body().map(|body| DomNode::wrap(body.into()))
    }

    fn query_selector_all(&self, scope: &DomNode, selectors: &str) -> Vec<DomNode> {
        let node = scope.node();
        let result = if let Some(element) = node.dyn_ref::<Element>() {
            element.query_selector_all(selectors)
        } else if let Some(document) = node.dyn_ref::<web_sys::Document>() {
            document.query_selector_all(selectors)
        } else if let Some(fragment) = node.dyn_ref::<DocumentFragment>() {
            fragment.query_selector_all(selectors)
        } else {
            return Vec::new();
        };
        match result {
            Ok(list) => node_list(&list),
            Err(e) => {
                log::warn!("querySelectorAll('{}') failed: {}", selectors, js_error(e));
                Vec::new()
            }
        }
    }

    fn matches_selector(&self, node: &DomNode, selectors: &str) -> bool {
        node.node()
            .dyn_ref::<Element>()
            .is_some_and(|element| element.matches(selectors).unwrap_or(false))
    }

    fn is_element(&self, node: &DomNode) -> bool {
        node.node().node_type() == Node::ELEMENT_NODE
    }

    fn text_data(&self, node: &DomNode) -> Option<String> {
        match node.node().node_type() {
            Node::TEXT_NODE => node.node().node_value(),
            _ => None,
        }
    }

    fn children(&self, node: &DomNode) -> Vec<DomNode> {
        node_list(&node.node().child_nodes())
    }

    fn shadow_root(&self, node: &DomNode) -> Option<DomNode> {
        node.node()
            .dyn_ref::<Element>()
            .and_then(Element::shadow_root)
            .map(|root| DomNode::wrap(root.into()))
    }

    fn is_connected(&self, node: &DomNode) -> bool {
        node.node().is_connected()
    }

    fn remove(&mut self, node: &DomNode) -> bool {
        let Some(parent) = node.node().parent_node() else {
            return false;
        };
        match parent.remove_child(node.node()) {
            Ok(_) => true,
            Err(e) => {
                log::debug!("removeChild failed: {}", js_error(e));
                false
            }
        }
    }

    fn style(&self, node: &DomNode, property: &str) -> Option<String> {
        let element = node.node().dyn_ref::<HtmlElement>()?;
        element
            .style()
            .get_property_value(property)
            .ok()
            .filter(|value| !value.is_empty())
    }

    fn set_style(&mut self, node: &DomNode, property: &str, value: &str) -> Result<(), DomError> {
        let element = node.node().dyn_ref::<HtmlElement>().ok_or(DomError::NotAnElement)?;
        element
            .style()
            .set_property(property, value)
            .map_err(|e| DomError::Style(js_error(e)))
    }

    fn observe(&mut self, scope: &DomNode, flags: ObserveFlags) -> Result<(), DomError> {
        let observer = self
            .observer
            .as_ref()
            .ok_or_else(|| DomError::Observe("no observer installed".to_string()))?;
        let init = MutationObserverInit::new();
        init.set_child_list(flags.contains(ObserveFlags::CHILD_LIST));
        init.set_attributes(flags.contains(ObserveFlags::ATTRIBUTES));
        init.set_subtree(flags.contains(ObserveFlags::SUBTREE));
        observer
            .observe_with_options(scope.node(), &init)
            .map_err(|e| DomError::Observe(js_error(e)))
    }
}
