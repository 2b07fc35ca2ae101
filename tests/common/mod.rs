//! Shared fixtures: a local HTTP server, fake external tools and sample pages.

#![allow(dead_code)]

use std::io::Cursor;
use std::net::SocketAddr;
use std::path::PathBuf;

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use image::{ImageFormat, Rgb, RgbImage};
use tempfile::TempDir;

/// Serve `router` on an ephemeral local port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// A small solid PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([30, 90, 160]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Route serving a PNG for every `/img/{name}` and a 404 for `/img/missing.png`.
pub fn image_routes() -> Router {
    Router::new().route(
        "/img/{name}",
        get(|axum::extract::Path(name): axum::extract::Path<String>| async move {
            if name == "missing.png" {
                return StatusCode::NOT_FOUND.into_response();
            }
            ([(header::CONTENT_TYPE, "image/png")], png_bytes(64, 48)).into_response()
        }),
    )
}

/// Write an executable shell script called `name` into `dir`.
#[cfg(unix)]
pub fn script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.path().join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Fake wkhtmltopdf: writes a small PDF to its last argument.
#[cfg(unix)]
pub fn fake_wkhtmltopdf(dir: &TempDir) -> PathBuf {
    script(
        dir,
        "wkhtmltopdf",
        r#"for a; do out="$a"; done
printf '%%PDF-1.4\n%% fake render\n%%%%EOF\n' > "$out""#,
    )
}

/// Fake wkhtmltopdf that writes a PDF header followed by the input HTML, so
/// tests can inspect what reached the engine.
#[cfg(unix)]
pub fn echo_wkhtmltopdf(dir: &TempDir) -> PathBuf {
    script(
        dir,
        "wkhtmltopdf-echo",
        r#"input=""; out=""
for a; do input="$out"; out="$a"; done
printf '%%PDF-1.4\n' > "$out"
cat "$input" >> "$out""#,
    )
}

/// Fake wget: copies `page` to the file after `-O`.
#[cfg(unix)]
pub fn fake_wget(dir: &TempDir, page: &str) -> PathBuf {
    let page_path = dir.path().join("wget-page.html");
    std::fs::write(&page_path, page).unwrap();
    script(
        dir,
        "wget",
        &format!(
            r#"out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-O" ]; then out="$2"; shift; fi
  shift
done
cp "{}" "$out""#,
            page_path.display()
        ),
    )
}

/// Paragraphs of plausible report prose.
pub fn paragraphs(n: usize) -> String {
    (0..n)
        .map(|i| {
            format!(
                "<p>Paragraph {i}: the intrusion set deployed a modular loader through \
                 spear-phishing attachments, then moved laterally using stolen service \
                 account credentials before staging data for exfiltration.</p>"
            )
        })
        .collect()
}

/// A clean article page with `images` image tags under `/img/`.
pub fn clean_article(images: usize) -> String {
    let imgs: String = (0..images).map(|i| format!("<img src=\"/img/figure-{i}.png\" alt=\"Figure {i}\">")).collect();
    format!(
        "<html><head><title>Loader campaign</title>\
         <meta name=\"author\" content=\"Research Team\"></head><body>\
         <nav><a href=\"/\">Home</a></nav>\
         <article><h1>Loader campaign</h1>{}{imgs}</article>\
         <footer>Copyright</footer></body></html>",
        paragraphs(6)
    )
}

/// An article page buried in ad networks, trackers and ad slots.
pub fn ad_heavy_article(images: usize) -> String {
    let imgs: String = (0..images).map(|i| format!("<figure><img src=\"/img/shot-{i}.png\" alt=\"Screenshot {i}\"></figure>")).collect();
    let ad_slots: String = (0..10)
        .map(|i| format!("<div class=\"ad-slot advertisement\" id=\"ad-{i}\"><iframe src=\"https://ads.doubleclick.net/slot/{i}\"></iframe></div>"))
        .collect();
    format!(
        "<html><head><title>Ransomware affiliate playbook</title>\
         <script src=\"https://securepubads.g.doubleclick.net/tag/js/gpt.js\"></script>\
         <script src=\"https://pagead2.googlesyndication.com/pagead/js/adsbygoogle.js\"></script>\
         <script src=\"https://widgets.outbrain.com/outbrain.js\"></script>\
         <script src=\"https://cdn.taboola.com/libtrc/loader.js\"></script>\
         <style>.grid {{ display: grid; }}</style></head><body>\
         <div class=\"sticky-banner\" style=\"position: fixed; top: 0\">Subscribe now</div>\
         {ad_slots}\
         <article class=\"post\"><h1>Ransomware affiliate playbook</h1>{}{imgs}\
         <div class=\"taboola-feed\">Sponsored stories</div></article>\
         <script>window.dataLayer = [];</script></body></html>",
        paragraphs(10)
    )
}
