//! Compiled regex patterns and CSS selectors shared by the pipeline stages.
//!
//! All patterns are compiled once at first use via `LazyLock`.

#![allow(clippy::expect_used)]

use std::sync::LazyLock;

use regex::Regex;

// =============================================================================
// Ad and tracking detection
// =============================================================================

/// Substrings identifying ad networks and content-recommendation widgets in raw markup.
pub const AD_NETWORK_MARKERS: &[&str] = &[
    "doubleclick.net",
    "googlesyndication.com",
    "googletagservices.com",
    "adsbygoogle",
    "amazon-adsystem.com",
    "adnxs.com",
    "criteo.",
    "pubmatic.com",
    "taboola",
    "outbrain",
    "mgid.com",
    "revcontent",
    "zergnet",
    "prebid",
];

/// Matches class/id tokens of advertisement containers.
///
/// Tokens are matched at separator boundaries so `header` and `download`
/// do not count as ads.
pub static AD_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(^|[\s_-])(ad|ads|adv|advert|advertisement|advertising|adsbygoogle|adslot|ad[-_]?unit|ad[-_]?container|ad[-_]?wrapper|sponsor|sponsored|promo|promoted|banner[-_]?ad)($|[\s_-])|taboola|outbrain|mgid|revcontent|zergnet|dfp[-_]",
    )
    .expect("AD_CLASS regex")
});

/// Matches class/id tokens of share bars and related-content rails.
pub static SOCIAL_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(social|shar(?:e|ing)[-_]?(?:bar|buttons?|links?|tools?)|addtoany|sharedaddy|related[-_]?(?:posts?|articles?|stories|content)|recommend(?:ed|ations?)?[-_]?(?:posts?|articles?|stories)?$)")
        .expect("SOCIAL_CLASS regex")
});

/// Matches class/id tokens of cookie banners, consent dialogs and subscription popups.
pub static OVERLAY_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(cookie[-_]?(?:consent|notice|banner|bar|law)?|consent[-_]?(?:banner|manager)|gdpr|cmp[-_]|privacy[-_]?(?:notice|banner)|newsletter[-_]?(?:popup|modal|signup)|paywall|popup|modal[-_]?(?:overlay|backdrop))")
        .expect("OVERLAY_CLASS regex")
});

/// Matches script sources and inline snippets from analytics and tracking vendors.
pub static TRACKER_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(google-analytics|googletagmanager|gtag\(|analytics\.js|facebook\.net|fbq\(|hotjar|segment\.(?:com|io)|mixpanel|quantserve|scorecardresearch|chartbeat|newrelic|matomo|piwik)")
        .expect("TRACKER_SCRIPT regex")
});

/// Iframe sources that never belong in an archived article.
pub static TRACKER_IFRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(youtube\.com|youtube-nocookie\.com|vimeo\.com|doubleclick|googlesyndication|/ads?/|facebook\.com/plugins|platform\.twitter\.com)")
        .expect("TRACKER_IFRAME regex")
});

// =============================================================================
// Layout
// =============================================================================

/// Grid and flex display declarations.
pub static GRID_FLEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)display\s*:\s*(?:inline-)?(?:grid|flex)").expect("GRID_FLEX regex")
});

/// Fixed and sticky positioning declarations.
pub static FIXED_STICKY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)position\s*:\s*(?:fixed|sticky)").expect("FIXED_STICKY regex")
});

// =============================================================================
// CMS fingerprints
// =============================================================================

/// `<meta name="generator" content="WordPress ...">` and friends.
pub static CMS_GENERATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+name\s*=\s*["']generator["'][^>]+content\s*=\s*["'](?:wordpress|blogger|ghost|drupal|joomla)"#)
        .expect("CMS_GENERATOR regex")
});

/// WordPress asset paths.
pub static WP_ASSET_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/wp-(?:content|includes|json)/").expect("WP_ASSET_PATH regex"));

/// WordPress body and article classes.
pub static WP_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)class\s*=\s*["'][^"']*\b(?:wp-block-[a-z-]+|wp-embed-responsive|single-post|postid-\d+|type-post|hentry)\b"#)
        .expect("WP_CLASS regex")
});

/// Blogger-hosted images.
pub static BLOGGER_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:blogger\.googleusercontent\.com|bp\.blogspot\.com)").expect("BLOGGER_IMAGE regex")
});

/// Theme directory name from a `wp-content/themes/<name>/` asset path.
pub static WP_THEME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)/wp-content/themes/([^/'"\s]+)/"#).expect("WP_THEME regex")
});

/// Shortcodes such as `[caption id="x"]` or `[/gallery]` left in rendered text.
pub static SHORTCODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[/?[a-zA-Z0-9_-]+(?:\s[^\]]+)?\]").expect("SHORTCODE regex")
});

// =============================================================================
// Text scanning
// =============================================================================

/// First `http(s)` URL in free text.
pub static HTTP_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>"'\)\]]+"#).expect("HTTP_URL regex")
});

/// Characters not allowed in attachment filenames.
pub static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[^A-Za-z0-9._-]+"#).expect("UNSAFE_FILENAME_CHARS regex"));

/// Runs of blank lines.
pub static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n(?:\s*\n)+").expect("BLANK_LINES regex"));

// =============================================================================
// Selectors
// =============================================================================

/// Elements removed by every strategy before the body is serialized.
pub const ALWAYS_REMOVED_SELECTOR: &str = "script, noscript, style, iframe, frame, frameset, object, embed, applet, template, link[rel=\"preload\"], img[width=\"1\"][height=\"1\"], img[width=\"0\"], img[height=\"0\"]";

/// Page chrome dropped before the readability pass.
pub const CHROME_SELECTOR: &str = "nav, aside, footer, header nav, form, button, dialog, [role=\"navigation\"], [role=\"banner\"], [role=\"complementary\"], [aria-hidden=\"true\"]";

/// Containers that mark real article content.
pub const CONTENT_CONTAINER_SELECTOR: &str = "article, main, [role=\"main\"], .content, #content, .post, .entry-content, .article-body, .story-body";

/// Elements whose class/id is tested against the ad, social and overlay patterns.
pub const CANDIDATE_BLOCK_SELECTOR: &str = "div, section, aside, ins, span, ul, p, figure, li";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ad_class_matches_tokens_not_substrings() {
        assert!(AD_CLASS.is_match("ad"));
        assert!(AD_CLASS.is_match("sidebar ad-slot"));
        assert!(AD_CLASS.is_match("adsbygoogle"));
        assert!(AD_CLASS.is_match("taboola-feed"));
        assert!(AD_CLASS.is_match("ad-container"));
        assert!(!AD_CLASS.is_match("header"));
        assert!(!AD_CLASS.is_match("download-link"));
        assert!(!AD_CLASS.is_match("shadow"));
    }

    #[test]
    fn overlay_class_matches_cookie_banners() {
        assert!(OVERLAY_CLASS.is_match("cookie-banner"));
        assert!(OVERLAY_CLASS.is_match("gdpr-wrapper"));
        assert!(!OVERLAY_CLASS.is_match("article-body"));
    }

    #[test]
    fn shortcode_matches_open_and_close_tags() {
        let text = r#"before [caption id="1" align="left"]img[/caption] after"#;
        assert_eq!(SHORTCODE.replace_all(text, ""), "before img after");
    }

    #[test]
    fn http_url_stops_at_delimiters() {
        let m = HTTP_URL.find("see (https://example.com/a?b=1) now");
        assert_eq!(m.map(|m| m.as_str()), Some("https://example.com/a?b=1"));
    }

    #[test]
    fn wp_theme_captures_directory() {
        let html = r#"<link href="https://x.org/wp-content/themes/newspaper-x/style.css">"#;
        let theme = WP_THEME.captures(html).and_then(|c| c.get(1)).map(|m| m.as_str());
        assert_eq!(theme, Some("newspaper-x"));
    }
}
