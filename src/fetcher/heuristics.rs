//! Body quality checks used to decide whether to try the next fetch method.

use crate::dom;

/// Markers of client-side rendered applications whose server HTML is a shell.
const SCRIPT_APP_HINTS: &[&str] = &[
    "window.__NEXT_DATA__",
    "window.__NUXT__",
    "ng-app",
    "ng-controller",
    "<div id=\"root\"></div>",
    "<div id=\"app\"></div>",
    "data-reactroot",
];

/// Markers of bot-challenge and access-denied interstitials.
const BLOCK_PAGE_HINTS: &[&str] = &[
    "Just a moment...",
    "cf-browser-verification",
    "challenge-platform",
    "Attention Required! | Cloudflare",
    "Access Denied",
    "Request unsuccessful. Incapsula",
    "Please enable JS and disable any ad blocker",
];

/// Visible-text metrics for a fetched body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyAssessment {
    /// Chars of visible body text (scripts and styles excluded).
    pub text_len: usize,
    /// Page looks like a script-rendered shell.
    pub needs_script: bool,
    /// Page looks like a bot challenge or block page.
    pub blocked: bool,
}

impl BodyAssessment {
    /// Whether this body is good enough to stop trying further methods.
    #[must_use]
    pub const fn is_sufficient(&self, sparse_threshold: usize) -> bool {
        self.text_len >= sparse_threshold && !self.needs_script && !self.blocked
    }
}

/// Count visible body text, ignoring script, style and template contents.
#[must_use]
pub fn visible_text_len(html: &str) -> usize {
    let doc = dom::parse(html);
    dom::remove_all(&doc, "script, style, noscript, template");
    dom::body_text_len(&doc)
}

/// Assess a fetched body against the sparse threshold.
#[must_use]
pub fn assess(html: &str, sparse_threshold: usize) -> BodyAssessment {
    let text_len = visible_text_len(html);
    let thin = text_len < sparse_threshold.saturating_mul(5);

    let needs_script = thin
        && (SCRIPT_APP_HINTS.iter().any(|hint| html.contains(hint))
            || (html.len() < 5000 && (html.contains("Loading...") || html.contains("Please wait"))));

    let blocked = text_len < 2000 && BLOCK_PAGE_HINTS.iter().any(|hint| html.contains(hint));

    BodyAssessment { text_len, needs_script, blocked }
}
