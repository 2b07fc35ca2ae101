//! Image reference discovery.
//!
//! Lazy-loading sites keep the real image URL in `data-*` attributes or
//! `srcset` and put a placeholder in `src`. [`normalize_images`] picks the
//! real source for every `<img>`, rewrites `src` to its absolute form and
//! returns the ordered, de-duplicated list.

use std::collections::HashSet;

use url::Url;

use crate::dom::{self, Document, Selection};
use crate::url_utils::resolve;

/// Attributes that carry the real URL on lazy-loaded images, in preference order.
const LAZY_ATTRIBUTES: &[&str] = &[
    "data-src",
    "data-lazy-src",
    "data-original",
    "data-lazy",
    "data-url",
    "data-orig-file",
];

/// `data:` URIs shorter than this are treated as placeholders.
const PLACEHOLDER_DATA_URI_LEN: usize = 200;

/// Attributes dropped once `src` holds the resolved URL.
const STALE_ATTRIBUTES: &[&str] = &["srcset", "data-srcset", "sizes", "loading"];

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn is_placeholder(src: &str) -> bool {
    src.starts_with("data:") && src.len() < PLACEHOLDER_DATA_URI_LEN
}

/// Largest candidate of a `srcset` value (last entry by convention).
#[must_use]
pub fn srcset_best(srcset: &str) -> Option<String> {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
        .filter(|url| !url.is_empty())
        .last()
        .map(str::to_string)
}

/// The real image source for an `<img>`, before resolution.
#[must_use]
pub fn best_source(img: &Selection) -> Option<String> {
    let src = non_empty(dom::get_attribute(img, "src")).filter(|s| !is_placeholder(s));
    if src.is_some() && !LAZY_ATTRIBUTES.iter().any(|attr| img.has_attr(attr)) {
        return src;
    }

    LAZY_ATTRIBUTES
        .iter()
        .find_map(|attr| non_empty(dom::get_attribute(img, attr)))
        .or(src)
        .or_else(|| non_empty(dom::get_attribute(img, "data-srcset")).and_then(|s| srcset_best(&s)))
        .or_else(|| non_empty(dom::get_attribute(img, "srcset")).and_then(|s| srcset_best(&s)))
        .or_else(|| {
            non_empty(dom::get_attribute(img, "src")).filter(|s| s.starts_with("data:"))
        })
        .filter(|s| !is_placeholder(s))
}

/// Resolve every `<img>` in `doc` against `base`.
///
/// Images without a usable source are removed. Returns absolute URLs in
/// document order, each listed once.
pub fn normalize_images(doc: &Document, base: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    let images = doc.select("img").nodes().to_vec();
    for node in images {
        let img = Selection::from(node);
        let Some(url) = best_source(&img).and_then(|src| resolve(&src, base)) else {
            img.remove();
            continue;
        };

        dom::set_attribute(&img, "src", &url);
        for attr in LAZY_ATTRIBUTES.iter().chain(STALE_ATTRIBUTES) {
            dom::remove_attribute(&img, attr);
        }

        if seen.insert(url.clone()) {
            urls.push(url);
        }
    }

    urls
}

/// Image URLs already present in `doc`, in order, without duplicates.
#[must_use]
pub fn image_urls(doc: &Document) -> Vec<String> {
    let mut seen = HashSet::new();
    doc.select("img[src]")
        .iter()
        .filter_map(|img| dom::get_attribute(&img, "src"))
        .filter(|src| seen.insert(src.clone()))
        .collect()
}
