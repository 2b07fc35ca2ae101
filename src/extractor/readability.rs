//! The `extract` strategy.
//!
//! Page chrome and ad blocks are removed first, then a readability pass picks
//! the main content. When the readability pass is unavailable or returns too
//! little, the richest content container (or the whole body) is used instead.
//! The chosen content is re-serialized into a fresh document with only a
//! small set of attributes kept.

use tracing::debug;

use crate::dom::{self, Document, Selection};
use crate::error::ExtractionError;
use crate::extractor::{finish, metadata, wordpress};
use crate::options::Options;
use crate::patterns::{
    AD_CLASS, ALWAYS_REMOVED_SELECTOR, CANDIDATE_BLOCK_SELECTOR, CHROME_SELECTOR, CONTENT_CONTAINER_SELECTOR,
    OVERLAY_CLASS, SOCIAL_CLASS,
};
use crate::result::{ExtractedArticle, SourceDocument, StrategyUsed};
use crate::url_utils::document_base;

/// Attributes that survive the rebuild.
const KEPT_ATTRIBUTES: &[&str] = &["src", "alt", "href", "title", "colspan", "rowspan"];

/// Elements with no place in a rebuilt article.
const REBUILD_REMOVED_SELECTOR: &str = "svg, canvas, video, audio, source, picture > source, input, select, textarea, button, form, meta, link";

/// Run the `extract` strategy.
///
/// # Errors
///
/// Returns [`ExtractionError::TooShort`] when the rebuilt article is below
/// `min_content_length`, or [`ExtractionError::NoContent`] when nothing is left.
pub fn extract(source: &SourceDocument, options: &Options) -> Result<ExtractedArticle, ExtractionError> {
    let doc = dom::parse(&source.raw_html);
    let meta = metadata::examine_meta(&doc);
    let base = document_base(&doc, &source.url);
    let fallback_title = metadata::best_title(&doc, &meta, source.url.as_str());

    if wordpress::is_cms_page(&source.raw_html) {
        let isolated = wordpress::isolate_entry(&doc);
        wordpress::strip_shortcodes(&doc);
        debug!(isolated, "CMS pre-pass");
    }

    pre_clean(&doc);

    let (content_html, readability_title) = select_content(&doc, options);
    let title = readability_title.filter(|t| !t.trim().is_empty()).unwrap_or(fallback_title);

    let rebuilt = Document::from(format!("<html><body>{content_html}</body></html>"));
    dom::remove_all(&rebuilt, REBUILD_REMOVED_SELECTOR);
    strip_attributes(&rebuilt);

    finish(&rebuilt, &base, title, &meta, StrategyUsed::Extract, source, options)
}

/// Remove unsafe elements, page chrome and ad, share and overlay blocks.
fn pre_clean(doc: &Document) {
    let unsafe_removed = dom::remove_all(doc, ALWAYS_REMOVED_SELECTOR);
    let chrome_removed = dom::remove_all(doc, CHROME_SELECTOR);
    let blocks_removed = dom::remove_where(doc, CANDIDATE_BLOCK_SELECTOR, |sel| {
        let tokens = dom::class_and_id(sel);
        !tokens.is_empty() && (AD_CLASS.is_match(&tokens) || SOCIAL_CLASS.is_match(&tokens) || OVERLAY_CLASS.is_match(&tokens))
    });
    debug!(unsafe_removed, chrome_removed, blocks_removed, "pre-clean done");
}

/// Main content HTML and, when the readability pass ran, its title.
fn select_content(doc: &Document, options: &Options) -> (String, Option<String>) {
    #[cfg(feature = "readability")]
    {
        use dom_smoothie::Readability;

        match Readability::with_document(dom::clone_document(doc), None, None).and_then(|mut r| r.parse()) {
            Ok(article) => {
                let content = article.content.to_string();
                let length = dom::body_text_len(&Document::from(content.as_str()));
                if length >= options.min_content_length {
                    return (content, Some(article.title));
                }
                debug!(length, "readability output too short, using container fallback");
            }
            Err(e) => debug!(error = %e, "readability pass failed, using container fallback"),
        }
    }

    (container_fallback(doc, options), None)
}

/// The content container with the most text, or the whole body.
fn container_fallback(doc: &Document, options: &Options) -> String {
    let best = doc
        .select(CONTENT_CONTAINER_SELECTOR)
        .iter()
        .map(|sel| (dom::normalized_text(&sel).chars().count(), sel))
        .filter(|(len, _)| *len >= options.min_content_length)
        .max_by_key(|(len, _)| *len)
        .map(|(_, sel)| sel);

    match best {
        Some(container) => dom::outer_html(&container).to_string(),
        None => dom::inner_html(&doc.select("body")).to_string(),
    }
}

/// Drop every attribute outside [`KEPT_ATTRIBUTES`]. Images also keep their
/// lazy-loading attributes until their source is resolved.
fn strip_attributes(doc: &Document) {
    for node in doc.select("body *").nodes() {
        let sel = Selection::from(*node);
        let is_image = dom::tag_name(&sel).as_deref() == Some("img");
        for name in dom::attribute_names(&sel) {
            let lazy = is_image && (name.starts_with("data-") || name == "srcset");
            if !lazy && !KEPT_ATTRIBUTES.contains(&name.as_str()) {
                dom::remove_attribute(&sel, &name);
            }
        }
    }
}
