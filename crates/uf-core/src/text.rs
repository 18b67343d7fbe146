//! Aggregated text extraction
//!
//! A text leaf contributes its trimmed data; an element contributes the
//! single-space join of its children's contributions, empty ones dropped.
//! Flattened, that is every non-empty trimmed text leaf under the node in
//! document order, joined by one space, which is what the walk below builds.

use crate::dom::Document;

/// Aggregated text of `node`. Shadow-root content is not part of it.
pub fn extract_text<D: Document + ?Sized>(doc: &D, node: &D::Node) -> String {
    let mut out = String::new();
    let mut stack = vec![node.clone()];

    while let Some(current) = stack.pop() {
        if let Some(data) = doc.text_data(&current) {
            let trimmed = data.trim();
            if !trimmed.is_empty() {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(trimmed);
            }
            continue;
        }
        stack.extend(doc.children(&current).into_iter().rev());
    }

    out
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::memory::MemoryDocument;

    #[test]
    fn test_joins_nested_text() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let post = doc.append_element(body, "article", &[]).unwrap();
        let h = doc.append_element(post, "h2", &[]).unwrap();
        doc.append_text(h, "  Breaking:  ").unwrap();
        let p = doc.append_element(post, "p", &[]).unwrap();
        let b = doc.append_element(p, "b", &[]).unwrap();
        doc.append_text(b, "Trump").unwrap();
        doc.append_text(p, "speaks").unwrap();

        assert_eq!(extract_text(&doc, &post), "Breaking: Trump speaks");
    }

    #[test]
    fn test_drops_empty_contributions() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let post = doc.append_element(body, "div", &[]).unwrap();
        doc.append_text(post, "   ").unwrap();
        doc.append_element(post, "span", &[]).unwrap();
        doc.append_text(post, "\nA\n").unwrap();
        doc.append_text(post, "B").unwrap();

        assert_eq!(extract_text(&doc, &post), "A B");
    }

    #[test]
    fn test_text_node_and_empty_element() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let t = doc.append_text(body, " solo ").unwrap();
        assert_eq!(extract_text(&doc, &t), "solo");

        let empty = doc.append_element(body, "div", &[]).unwrap();
        assert_eq!(extract_text(&doc, &empty), "");
    }

    #[test]
    fn test_excludes_shadow_content() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let host = doc.append_element(body, "x-card", &[]).unwrap();
        doc.append_text(host, "light").unwrap();
        let shadow = doc.attach_shadow(host).unwrap();
        doc.append_text(shadow, "dark").unwrap();

        assert_eq!(extract_text(&doc, &host), "light");
    }

    #[test]
    fn test_deep_nesting() {
        let mut doc = MemoryDocument::new();
        let mut parent = doc.body().unwrap();
        for _ in 0..10_000 {
            parent = doc.append_element(parent, "div", &[]).unwrap();
        }
        doc.append_text(parent, "bottom").unwrap();
        let body = doc.body().unwrap();
        assert_eq!(extract_text(&doc, &body), "bottom");
    }
}
