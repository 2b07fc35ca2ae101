//! Report description text and attachment naming.

use crate::patterns::{BLANK_LINES, UNSAFE_FILENAME_CHARS};
use crate::renderer::LayoutMode;
use crate::result::ExtractedArticle;

/// Appended when the excerpt is cut at the length limit.
pub const TRUNCATION_MARKER: &str = "[... Content truncated due to length limits ...]";

/// Longest sanitized name kept in an attachment filename.
const MAX_FILENAME_STEM: usize = 100;

/// Description text for a report: a short metadata header followed by the
/// article text, cut to `limit` chars of body.
#[must_use]
pub fn build_excerpt(article: &ExtractedArticle, limit: usize) -> String {
    let mut header = Vec::new();
    if !article.title.trim().is_empty() {
        header.push(format!("Title: {}", article.title.trim()));
    }
    if let Some(published) = article.published {
        header.push(format!("Published: {}", published.format("%Y-%m-%d")));
    }
    if let Some(byline) = article.byline.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
        header.push(format!("Authors: {byline}"));
    }

    let text = article.paragraph_text();
    let text = BLANK_LINES.replace_all(text.trim(), "\n\n");
    let body = truncate_chars(&text, limit);

    if header.is_empty() {
        body
    } else {
        format!("{}\n\n{body}", header.join("\n"))
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}\n\n{TRUNCATION_MARKER}", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

/// Deterministic attachment filename:
/// `{sanitized_name}_{original|simple}_{with_images|text_only}.pdf`.
#[must_use]
pub fn attachment_filename(name: &str, layout: LayoutMode, include_images: bool) -> String {
    let sanitized = UNSAFE_FILENAME_CHARS.replace_all(name.trim(), "_");
    let mut stem: String = sanitized.trim_matches(['_', '.']).chars().take(MAX_FILENAME_STEM).collect();
    if stem.is_empty() {
        stem = "report".to_string();
    }
    let images = if include_images { "with_images" } else { "text_only" };
    format!("{stem}_{layout}_{images}.pdf")
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use url::Url;

    use super::*;
    use crate::result::StrategyUsed;

    fn article(body_html: &str) -> ExtractedArticle {
        ExtractedArticle {
            title: "Botnet returns".to_string(),
            body_html: body_html.to_string(),
            image_urls: Vec::new(),
            strategy_used: StrategyUsed::Extract,
            byline: Some("A. Analyst".to_string()),
            published: Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).single(),
            source_url: Url::parse("https://e.com/p").unwrap(),
            cms_theme: None,
        }
    }

    #[test]
    fn excerpt_has_header_and_paragraphs() {
        let excerpt = build_excerpt(&article("<p>First.</p><p>Second.</p>"), 1000);
        assert_eq!(
            excerpt,
            "Title: Botnet returns\nPublished: 2024-02-01\nAuthors: A. Analyst\n\nFirst.\n\nSecond."
        );
    }

    #[test]
    fn long_text_is_truncated_with_marker() {
        let excerpt = build_excerpt(&article(&format!("<p>{}</p>", "é".repeat(50))), 10);
        assert!(excerpt.ends_with(&format!("{}\n\n{TRUNCATION_MARKER}", "é".repeat(10))));
    }

    #[test]
    fn filename_is_sanitized_and_deterministic() {
        let name = attachment_filename("APT/29: new \"phish\" wave", LayoutMode::Original, true);
        assert_eq!(name, "APT_29_new_phish_wave_original_with_images.pdf");
        assert_eq!(name, attachment_filename("APT/29: new \"phish\" wave", LayoutMode::Original, true));
        assert_eq!(attachment_filename("///", LayoutMode::Simple, false), "report_simple_text_only.pdf");
    }
}
