//! DOM Operations Adapter
//!
//! Thin helpers over `dom_query` used by the profiler, the extractor and the
//! image pipeline. Removal helpers always collect nodes first and detach them
//! in reverse document order so nested matches never invalidate each other.

pub use dom_query::{Document, Selection};
pub use tendril::StrTendril;

// === Attributes ===

/// Class and id joined with a space, for pattern tests against both.
#[must_use]
pub fn class_and_id(sel: &Selection) -> String {
    let class = sel.attr("class");
    let id = sel.attr("id");
    match (class, id) {
        (Some(class), Some(id)) => format!("{class} {id}"),
        (Some(class), None) => class.to_string(),
        (None, Some(id)) => id.to_string(),
        (None, None) => String::new(),
    }
}

/// Attribute value of the first node, owned.
#[inline]
#[must_use]
pub fn get_attribute(sel: &Selection, name: &str) -> Option<String> {
    sel.attr(name).map(|s| s.to_string())
}

/// Set `name` on every node in the selection.
#[inline]
pub fn set_attribute(sel: &Selection, name: &str, value: &str) {
    sel.set_attr(name, value);
}

/// Drop `name` from every node in the selection.
#[inline]
pub fn remove_attribute(sel: &Selection, name: &str) {
    sel.remove_attr(name);
}

/// Get all attribute names of the first node in the selection.
#[must_use]
pub fn attribute_names(sel: &Selection) -> Vec<String> {
    sel.nodes()
        .first()
        .map(|node| node.attrs().iter().map(|attr| attr.name.local.to_string()).collect())
        .unwrap_or_default()
}

/// Lowercase tag name of the first node.
#[must_use]
pub fn tag_name(sel: &Selection) -> Option<String> {
    sel.nodes()
        .first()
        .and_then(dom_query::NodeRef::node_name)
        .map(|t| t.to_ascii_lowercase())
}

// === Content ===

/// Text of the selection and its descendants, unnormalized.
#[inline]
#[must_use]
pub fn text_content(sel: &Selection) -> StrTendril {
    sel.text()
}

/// Serialized children of the first node.
#[inline]
#[must_use]
pub fn inner_html(sel: &Selection) -> StrTendril {
    sel.inner_html()
}

/// Serialized first node, including its own tag.
#[inline]
#[must_use]
pub fn outer_html(sel: &Selection) -> StrTendril {
    sel.html()
}

/// Body text with whitespace runs collapsed to single spaces.
#[must_use]
pub fn normalized_text(sel: &Selection) -> String {
    text_content(sel).split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Number of chars of normalized body text in `doc`.
#[must_use]
pub fn body_text_len(doc: &Document) -> usize {
    normalized_text(&doc.select("body")).chars().count()
}

const TEXT_BLOCK_SELECTOR: &str = "p, h1, h2, h3, h4, h5, h6, li, blockquote, pre, tr, figcaption, dt, dd";
const BLOCK_BREAK: char = '\u{2029}';

/// Body text with one blank line between block elements and whitespace
/// collapsed inside each block.
#[must_use]
pub fn text_with_breaks(doc: &Document) -> String {
    let copy = clone_document(doc);
    let breaks = copy.select("br").nodes().to_vec();
    for node in breaks.into_iter().rev() {
        Selection::from(node).replace_with_html(BLOCK_BREAK.to_string());
    }
    for node in copy.select(TEXT_BLOCK_SELECTOR).nodes() {
        Selection::from(*node).append_html(BLOCK_BREAK.to_string());
    }

    text_content(&copy.select("body"))
        .split(BLOCK_BREAK)
        .map(|block| block.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|block| !block.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Number of element nodes under `body`.
#[must_use]
pub fn element_count(doc: &Document) -> usize {
    doc.select("body *").length()
}

// === Removal ===

/// Remove every element matching `selector`. Returns the number removed.
pub fn remove_all(doc: &Document, selector: &str) -> usize {
    remove_where(doc, selector, |_| true)
}

/// Remove every element matching `selector` for which `predicate` holds.
/// Returns the number removed.
pub fn remove_where<F>(doc: &Document, selector: &str, predicate: F) -> usize
where
    F: Fn(&Selection) -> bool,
{
    let nodes = doc.select(selector).nodes().to_vec();
    let mut removed = 0;
    for node in nodes.into_iter().rev() {
        let sel = Selection::from(node);
        if predicate(&sel) {
            sel.remove();
            removed += 1;
        }
    }
    removed
}

/// Strip inline event handler attributes (`onclick`, `onload`, ...) from every element.
pub fn strip_event_handlers(doc: &Document) {
    for node in doc.select("*").nodes() {
        let sel = Selection::from(*node);
        for name in attribute_names(&sel) {
            if name.len() > 2 && name.to_ascii_lowercase().starts_with("on") {
                remove_attribute(&sel, &name);
            }
        }
    }
}

/// Escape text for inclusion in HTML element content or attribute values.
#[must_use]
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// === Documents ===

/// Parse a full document or a fragment.
#[inline]
#[must_use]
pub fn parse(html: &str) -> Document {
    Document::from(html)
}

/// Deep copy of a document via re-serialization.
#[must_use]
pub fn clone_document(doc: &Document) -> Document {
    Document::from(doc.html().to_string())
}
