//! Print shell: the standalone HTML document handed to the PDF engine.

use crate::dom;

use super::LayoutMode;

/// Page and typography rules shared by both layouts.
const BASE_CSS: &str = r#"
@page { size: A4; margin: 10mm 10mm 15mm 10mm; }
html, body { margin: 0; padding: 0; }
body { font-family: "DejaVu Sans", Arial, Helvetica, sans-serif; font-size: 11pt; line-height: 1.5; color: #111; }
h1.report-title { font-size: 20pt; line-height: 1.25; margin: 0 0 12pt 0; }
img { max-width: 100%; height: auto; page-break-inside: avoid; }
figure { margin: 8pt 0; page-break-inside: avoid; }
pre, code { font-family: "DejaVu Sans Mono", monospace; font-size: 9pt; white-space: pre-wrap; word-wrap: break-word; }
pre { background: #f4f4f4; padding: 6pt; }
table { border-collapse: collapse; max-width: 100%; }
td, th { border: 1px solid #ccc; padding: 3pt 5pt; }
a { color: #0645ad; text-decoration: none; }
p, li { orphans: 3; widows: 3; }
[style*="position: fixed"], [style*="position:fixed"], [style*="position: sticky"], [style*="position:sticky"] { position: static !important; }
.source-footer { margin-top: 18pt; padding-top: 6pt; border-top: 1px solid #999; font-size: 8pt; color: #555; word-wrap: break-word; }
"#;

/// Single-column rules for the simplified layout.
const SIMPLE_CSS: &str = r#"
body { max-width: 180mm; margin: 0 auto; }
* { float: none !important; position: static !important; }
div, section, article, main, header, aside { display: block !important; width: auto !important; }
"#;

/// Default WordPress "Twenty" themes.
const TWENTY_THEMES_CSS: &str = r#"
body.cms-theme { font-family: "Inter", "DejaVu Sans", Arial, sans-serif; }
body.cms-theme h1.report-title { font-weight: 800; }
body.cms-theme h2 { font-weight: 700; }
"#;

/// Astra and GeneratePress.
const LIGHT_THEMES_CSS: &str = r#"
body.cms-theme { font-size: 12pt; line-height: 1.7; }
body.cms-theme h1.report-title { font-weight: 600; }
"#;

/// Typography for a known CMS theme, empty for anything else.
#[must_use]
pub fn theme_css(theme: &str) -> &'static str {
    match theme.to_ascii_lowercase().as_str() {
        "twentytwenty" | "twentytwentyone" | "twentytwentytwo" => TWENTY_THEMES_CSS,
        "astra" | "generatepress" => LIGHT_THEMES_CSS,
        _ => "",
    }
}

/// Wrap `body_html` in a complete document with title, styling and a source footer.
#[must_use]
pub fn print_shell(
    body_html: &str,
    title: &str,
    source_url: Option<&str>,
    cms_theme: Option<&str>,
    layout: LayoutMode,
) -> String {
    let title = dom::escape_text(title.trim());
    let layout_css = match layout {
        LayoutMode::Original => "",
        LayoutMode::Simple => SIMPLE_CSS,
    };
    let extra_css = cms_theme.map_or("", theme_css);
    let body_class = match cms_theme {
        Some(theme) => format!("layout-{layout} cms-theme theme-{}", dom::escape_text(theme)),
        None => format!("layout-{layout}"),
    };
    let footer = source_url
        .map(|url| format!(r#"<div class="source-footer">Source: {}</div>"#, dom::escape_text(url)))
        .unwrap_or_default();

    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title>\
         <style>{BASE_CSS}{extra_css}{layout_css}</style></head>\n<body class=\"{body_class}\">\
         <h1 class=\"report-title\">{title}</h1>\n{body_html}\n{footer}</body></html>\n"
    )
}
