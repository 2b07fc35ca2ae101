//! WordPress and Blogger handling.
//!
//! CMS pages have predictable content containers and predictable chrome, so
//! they are always routed to the `extract` strategy and get a dedicated
//! pre-pass: theme chrome is removed, the main entry container is isolated and
//! shortcodes left in the text are stripped.

use tracing::debug;

use crate::dom::{self, Document};
use crate::patterns::{BLOGGER_IMAGE, CMS_GENERATOR, SHORTCODE, WP_ASSET_PATH, WP_CLASS, WP_THEME};

/// CMS chrome removed before content selection.
const CMS_CHROME_SELECTOR: &str = "#comments, .comments-area, .comment-respond, #respond, .widget-area, #secondary, .sidebar, .related-posts, .jp-relatedposts, .sharedaddy, .sd-sharing, .share-buttons, .post-navigation, .nav-links, .author-box, .wp-block-latest-posts, .cookie-notice, #cookie-notice, .popup, .newsletter";

/// Entry containers in preference order.
const CMS_CONTENT_SELECTORS: &[&str] = &[
    ".entry-content",
    ".post-content",
    "article.post .entry",
    ".post-body",
    "article.post",
    "article.type-post",
    ".single-post article",
    "article",
    "main",
];

/// Minimum visible text (chars) for a container to count as the entry body.
const MIN_ENTRY_TEXT: usize = 200;

/// Whether the raw HTML carries CMS fingerprints.
///
/// A generator meta tag is sufficient on its own; otherwise two independent
/// signals are required.
#[must_use]
pub fn is_cms_page(html: &str) -> bool {
    if CMS_GENERATOR.is_match(html) {
        return true;
    }
    let signals = [
        WP_ASSET_PATH.is_match(html),
        WP_CLASS.is_match(html),
        BLOGGER_IMAGE.is_match(html),
        html.contains("wp-emoji-release.min.js") || html.contains("wp-embed.min.js"),
    ];
    signals.into_iter().filter(|s| *s).count() >= 2
}

/// Theme name from `/wp-content/themes/<name>/` asset paths.
#[must_use]
pub fn theme_name(html: &str) -> Option<String> {
    WP_THEME
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Remove CMS chrome and, when an entry container with enough text exists,
/// replace the body with just that container. Returns whether a container
/// was isolated.
pub fn isolate_entry(doc: &Document) -> bool {
    let removed = dom::remove_all(doc, CMS_CHROME_SELECTOR);
    debug!(removed, "removed CMS chrome");

    for selector in CMS_CONTENT_SELECTORS {
        let candidate = doc.select(selector).first();
        if candidate.is_empty() {
            continue;
        }
        if dom::normalized_text(&candidate).chars().count() < MIN_ENTRY_TEXT {
            continue;
        }
        let html = dom::outer_html(&candidate).to_string();
        doc.select("body").set_html(html);
        debug!(selector, "isolated CMS entry container");
        return true;
    }
    false
}

/// Strip shortcodes such as `[caption]` from text nodes of paragraphs and headings.
pub fn strip_shortcodes(doc: &Document) {
    for block in doc.select("p, h1, h2, h3, h4, h5, h6, li, figcaption, div").iter() {
        if !block.children().is_empty() {
            continue;
        }
        let text = dom::text_content(&block);
        if SHORTCODE.is_match(&text) {
            let cleaned = SHORTCODE.replace_all(&text, "").trim().to_string();
            block.set_html(dom::escape_text(&cleaned));
        }
    }
}
