//! URL Utility Functions
//!
//! Resolution of image and link references against a page base URL, and
//! discovery of the external article URL attached to a report.

use url::Url;

use crate::dom::Document;
use crate::patterns::HTTP_URL;

/// Check if a string is a valid absolute `http(s)` URL with a host.
#[must_use]
pub fn parse_http_url(s: &str) -> Option<Url> {
    let s = s.trim();
    if !s.starts_with("http://") && !s.starts_with("https://") {
        return None;
    }
    Url::parse(s).ok().filter(|url| url.host().is_some())
}

/// Convert a relative or absolute URL to absolute form.
///
/// `data:` URIs are returned unchanged. `javascript:`, `mailto:` and `tel:`
/// references, fragments and empty strings yield `None` since they never
/// point at a fetchable resource.
#[must_use]
pub fn resolve(reference: &str, base: &Url) -> Option<String> {
    let reference = reference.trim();

    if reference.is_empty() || reference.starts_with('#') {
        return None;
    }

    let lower = reference.to_ascii_lowercase();
    if lower.starts_with("data:") {
        return Some(reference.to_string());
    }
    if lower.starts_with("javascript:") || lower.starts_with("mailto:") || lower.starts_with("tel:") {
        return None;
    }

    base.join(reference)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(String::from)
}

/// Effective base URL for a document: `<base href>` if present and valid,
/// otherwise the page URL itself.
#[must_use]
pub fn document_base(doc: &Document, page_url: &Url) -> Url {
    doc.select("base[href]")
        .attr("href")
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone())
}

/// Hostname without a leading `www.`, lowercased.
#[must_use]
pub fn normalized_host(url: &Url) -> Option<String> {
    url.host_str().map(|host| {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
    })
}

/// True for URLs that point back at the platform itself rather than at an article.
#[must_use]
pub fn is_internal_reference(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://localhost")
        || lower.starts_with("https://localhost")
        || lower.contains("storage/get")
}

/// Pick the article URL for a report.
///
/// External references are preferred in order; the description is scanned for
/// the first `http(s)` URL otherwise. Internal platform links are skipped.
#[must_use]
pub fn find_external_url<'a, I>(external_references: I, description: &str) -> Option<Url>
where
    I: IntoIterator<Item = &'a str>,
{
    external_references
        .into_iter()
        .filter(|candidate| !is_internal_reference(candidate))
        .find_map(parse_http_url)
        .or_else(|| {
            HTTP_URL
                .find_iter(description)
                .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':']))
                .filter(|candidate| !is_internal_reference(candidate))
                .find_map(parse_http_url)
        })
}
