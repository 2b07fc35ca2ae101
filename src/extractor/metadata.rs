//! Page metadata used for the article header and the report excerpt.
//!
//! Reads meta tags (standard, Open Graph, Dublin Core, Parsely) first and
//! falls back to the `<title>` element and the first `<h1>`.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

use crate::dom::{self, Document, Selection};

/// Separators between an article title and a site name suffix.
#[allow(clippy::expect_used)]
static TITLE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+[|\-–—·:]\s+").expect("TITLE_SEPARATOR regex"));

/// Metadata found in the page head.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    /// Title from meta tags.
    pub meta_title: Option<String>,
    /// Author name.
    pub author: Option<String>,
    /// Publication time.
    pub published: Option<DateTime<Utc>>,
}

/// Examine meta tags.
#[must_use]
pub fn examine_meta(doc: &Document) -> PageMetadata {
    let mut result = PageMetadata::default();

    for node in doc.select("meta").nodes() {
        let meta = Selection::from(*node);

        let name = dom::get_attribute(&meta, "name")
            .or_else(|| dom::get_attribute(&meta, "property"))
            .or_else(|| dom::get_attribute(&meta, "itemprop"))
            .unwrap_or_default()
            .to_lowercase();
        let content = dom::get_attribute(&meta, "content").unwrap_or_default();
        let content = content.trim();

        if name.is_empty() || content.is_empty() {
            continue;
        }

        match name.as_str() {
            "author" | "article:author" | "dc.creator" | "byl" | "parsely-author" | "sailthru.author" => {
                if result.author.is_none() && is_plausible_name(content) {
                    result.author = Some(content.trim_start_matches("By ").to_string());
                }
            }
            "og:title" | "twitter:title" | "dc.title" | "parsely-title" => {
                if result.meta_title.is_none() {
                    result.meta_title = Some(content.to_string());
                }
            }
            "article:published_time" | "datepublished" | "dc.date" | "dc.date.issued" | "pubdate"
            | "publish-date" | "parsely-pub-date" | "sailthru.date" => {
                if result.published.is_none() {
                    result.published = parse_date(content);
                }
            }
            _ => {}
        }
    }

    result
}

/// Title from the `<title>` element with a trailing site name removed.
#[must_use]
pub fn title_element(doc: &Document) -> Option<String> {
    let title = dom::normalized_text(&doc.select("title"));
    if title.is_empty() {
        return None;
    }

    let parts: Vec<&str> = TITLE_SEPARATOR.split(&title).collect();
    if parts.len() > 1 {
        if let Some(main) = parts.iter().map(|p| p.trim()).max_by_key(|p| p.len()) {
            if main.len() > 10 {
                return Some(main.to_string());
            }
        }
    }

    Some(title)
}

/// Best title for the article: meta title, `<title>`, first `<h1>`, then the URL path.
#[must_use]
pub fn best_title(doc: &Document, meta: &PageMetadata, fallback: &str) -> String {
    meta.meta_title
        .clone()
        .or_else(|| title_element(doc))
        .or_else(|| {
            let h1 = dom::normalized_text(&doc.select("h1").first());
            (!h1.is_empty()).then_some(h1)
        })
        .unwrap_or_else(|| fallback.to_string())
}

/// Reject values that are URLs, JSON, IDs or too long to be a person's name.
#[must_use]
pub fn is_plausible_name(name: &str) -> bool {
    let name = name.trim();

    if name.len() < 2 || name.len() > 120 {
        return false;
    }
    if name.starts_with("http://") || name.starts_with("https://") || name.starts_with("www.") {
        return false;
    }
    if name.starts_with('{') || name.starts_with('[') {
        return false;
    }
    name.chars().filter(char::is_ascii_digit).count() <= 3
}

/// Parse ISO 8601, RFC 3339 and a few common date formats.
#[must_use]
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let date_str = date_str.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc());
    }

    ["%Y-%m-%d", "%Y/%m/%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_str, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_tags_provide_title_author_and_date() {
        let doc = Document::from(
            r#"<html><head>
            <meta property="og:title" content="Ransomware gang hits hospital">
            <meta name="author" content="Jane Analyst">
            <meta property="article:published_time" content="2024-03-05T08:30:00+00:00">
            </head><body></body></html>"#,
        );

        let meta = examine_meta(&doc);

        assert_eq!(meta.meta_title.as_deref(), Some("Ransomware gang hits hospital"));
        assert_eq!(meta.author.as_deref(), Some("Jane Analyst"));
        assert_eq!(meta.published.map(|d| d.format("%Y-%m-%d").to_string()).as_deref(), Some("2024-03-05"));
    }

    #[test]
    fn title_element_strips_site_suffix() {
        let doc = Document::from("<html><head><title>New botnet targets routers | Security Weekly</title></head></html>");
        assert_eq!(title_element(&doc).as_deref(), Some("New botnet targets routers"));
    }

    #[test]
    fn best_title_falls_back_to_h1_then_url() {
        let doc = Document::from("<html><body><h1>Heading  Title</h1></body></html>");
        assert_eq!(best_title(&doc, &PageMetadata::default(), "x"), "Heading Title");

        let empty = Document::from("<html><body></body></html>");
        assert_eq!(best_title(&empty, &PageMetadata::default(), "https://e.com/a"), "https://e.com/a");
    }

    #[test]
    fn implausible_names_are_rejected() {
        assert!(is_plausible_name("Jane Analyst"));
        assert!(!is_plausible_name("https://example.com/author/jane"));
        assert!(!is_plausible_name("{\"@type\":\"Person\"}"));
        assert!(!is_plausible_name("user123456"));
    }

    #[test]
    fn parse_date_formats() {
        assert!(parse_date("2024-01-15").is_some());
        assert!(parse_date("January 15, 2024").is_some());
        assert!(parse_date("2024-01-15T10:00:00").is_some());
        assert!(parse_date("yesterday").is_none());
    }
}
