//! The `minimal` strategy.
//!
//! Keeps the original DOM and layout and removes only what must not reach the
//! PDF: scripts and embeds, tracker and ad iframes, ad, share and overlay
//! blocks, inline event handlers, and fixed/sticky or grid/flex positioning
//! that breaks paged output. The result is validated before it is accepted.

use tracing::debug;

use crate::dom::{self, Document, Selection};
use crate::error::ExtractionError;
use crate::extractor::{finish, metadata};
use crate::options::Options;
use crate::patterns::{
    AD_CLASS, ALWAYS_REMOVED_SELECTOR, CANDIDATE_BLOCK_SELECTOR, CONTENT_CONTAINER_SELECTOR, FIXED_STICKY, GRID_FLEX,
    OVERLAY_CLASS, SOCIAL_CLASS, TRACKER_IFRAME, TRACKER_SCRIPT,
};
use crate::result::{ExtractedArticle, SourceDocument, StrategyUsed};
use crate::url_utils::document_base;

/// Ad markup that is recognizable by tag or attribute alone.
const AD_ELEMENT_SELECTOR: &str = "ins.adsbygoogle, amp-ad, amp-embed, amp-sticky-ad, [id^=\"google_ads\"], [id^=\"div-gpt-ad\"], [data-ad-slot], [data-ad-client]";

/// Run the `minimal` strategy.
///
/// # Errors
///
/// Returns [`ExtractionError::Rejected`] when the cleaned document fails
/// validation, and [`ExtractionError::TooShort`] when it is below
/// `min_content_length`.
pub fn extract(source: &SourceDocument, options: &Options) -> Result<ExtractedArticle, ExtractionError> {
    let doc = dom::parse(&source.raw_html);
    let meta = metadata::examine_meta(&doc);
    let base = document_base(&doc, &source.url);
    let title = metadata::best_title(&doc, &meta, source.url.as_str());

    remove_trackers(&doc);
    let ads = remove_ad_blocks(&doc);
    let restyled = flatten_layout(&doc);
    dom::strip_event_handlers(&doc);
    debug!(ads, restyled, "minimal cleanup done");

    validate(&doc, options)?;

    finish(&doc, &base, title, &meta, StrategyUsed::Minimal, source, options)
}

/// Remove tracker scripts and iframes, then every remaining unsafe element.
fn remove_trackers(doc: &Document) {
    let scripts = dom::remove_where(doc, "script", |sel| {
        let src = dom::get_attribute(sel, "src").unwrap_or_default();
        TRACKER_SCRIPT.is_match(&src) || TRACKER_SCRIPT.is_match(&dom::text_content(sel))
    });
    let iframes = dom::remove_where(doc, "iframe", |sel| {
        TRACKER_IFRAME.is_match(&dom::get_attribute(sel, "src").unwrap_or_default())
    });
    let rest = dom::remove_all(doc, ALWAYS_REMOVED_SELECTOR);
    debug!(scripts, iframes, rest, "removed trackers and unsafe elements");
}

/// Remove ad, share and overlay blocks. Returns the number removed.
fn remove_ad_blocks(doc: &Document) -> usize {
    let tagged = dom::remove_all(doc, AD_ELEMENT_SELECTOR);
    let classed = dom::remove_where(doc, CANDIDATE_BLOCK_SELECTOR, |sel| {
        let tokens = dom::class_and_id(sel);
        !tokens.is_empty() && (AD_CLASS.is_match(&tokens) || SOCIAL_CLASS.is_match(&tokens) || OVERLAY_CLASS.is_match(&tokens))
    });
    tagged + classed
}

/// Rewrite grid/flex to block and fixed/sticky to static in inline styles.
/// Returns the number of elements changed.
fn flatten_layout(doc: &Document) -> usize {
    let mut changed = 0;
    for node in doc.select("[style]").nodes() {
        let sel = Selection::from(*node);
        let Some(style) = dom::get_attribute(&sel, "style") else {
            continue;
        };
        let rewritten = GRID_FLEX.replace_all(&style, "display: block");
        let rewritten = FIXED_STICKY.replace_all(&rewritten, "position: static");
        if rewritten != style {
            dom::set_attribute(&sel, "style", &rewritten);
            changed += 1;
        }
    }
    changed
}

/// Structural checks on the cleaned document.
fn validate(doc: &Document, options: &Options) -> Result<(), ExtractionError> {
    let body_html = dom::inner_html(&doc.select("body"));
    let bytes = body_html.len();

    if bytes > options.minimal_max_bytes {
        return Err(ExtractionError::Rejected(format!(
            "document too large: {bytes} bytes (maximum {})",
            options.minimal_max_bytes
        )));
    }
    if doc.select(CONTENT_CONTAINER_SELECTOR).is_empty() {
        return Err(ExtractionError::Rejected("no content container".to_string()));
    }

    #[allow(clippy::cast_precision_loss)]
    let ratio = if bytes == 0 { 0.0 } else { dom::body_text_len(doc) as f64 / bytes as f64 };
    if ratio < options.minimal_min_text_ratio {
        return Err(ExtractionError::Rejected(format!(
            "text ratio {ratio:.3} below {}",
            options.minimal_min_text_ratio
        )));
    }
    Ok(())
}
