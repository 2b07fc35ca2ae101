#![cfg(unix)]

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::response::Html;
use axum::routing::get;
use tempfile::TempDir;
use tokio::sync::watch;

use rs_report_enhancer::connector::{Connector, ConnectorSettings};
use rs_report_enhancer::pipeline::{LiveStages, MarkConfig, Orchestrator, ReportOutcome, ReportProcessor, Stage};
use rs_report_enhancer::platform::{InMemoryPlatform, ReportFilter, ReportRef, PDF_MIME};
use rs_report_enhancer::{Options, StrategyMode};

const LABEL: &str = "rss-enhanced";

struct Site {
    base: String,
    hits: Arc<AtomicUsize>,
}

async fn site(page: String) -> Site {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let router = common::image_routes().route(
        "/story",
        get(move || {
            let counter = Arc::clone(&counter);
            let page = page.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Html(page)
            }
        }),
    );
    Site { base: format!("http://{}", common::serve(router).await), hits }
}

fn options(dir: &TempDir) -> Options {
    Options {
        ad_removal_strategy: StrategyMode::Auto,
        max_images: 20,
        renderer_path: common::fake_wkhtmltopdf(dir),
        wget_path: common::script(dir, "wget", "exit 4"),
        browser_path: None,
        direct_timeout: Duration::from_secs(5),
        render_timeout: Duration::from_secs(10),
        ..Options::default()
    }
}

fn report(id: &str, url: &str, labels: &[&str]) -> ReportRef {
    ReportRef {
        id: id.to_string(),
        name: "Ransomware affiliate playbook".to_string(),
        description: "Imported from feed".to_string(),
        external_references: vec![url.to_string()],
        report_types: vec!["rss-report".to_string()],
        labels: labels.iter().map(ToString::to_string).collect(),
    }
}

fn processor(options: Options, platform: &Arc<InMemoryPlatform>) -> ReportProcessor<LiveStages, InMemoryPlatform> {
    let stages = LiveStages::new(&options).unwrap();
    let mark = MarkConfig { label: LABEL.to_string(), color: "#ff9900".to_string() };
    ReportProcessor::new(Orchestrator::new(stages, options), Arc::clone(platform), mark)
}

#[tokio::test]
async fn ad_heavy_article_with_thirty_images_is_enriched() {
    let dir = TempDir::new().unwrap();
    let site = site(common::ad_heavy_article(30)).await;
    let url = format!("{}/story", site.base);
    let platform = Arc::new(InMemoryPlatform::new(vec![report("r1", &url, &[])]));
    let options = Options { renderer_path: common::echo_wkhtmltopdf(&dir), ..options(&dir) };
    let processor = processor(options, &platform);

    let outcome = processor.process(&report("r1", &url, &[])).await.unwrap();

    let ReportOutcome::Enriched(result) = outcome else {
        panic!("expected enrichment, got {outcome:?}");
    };
    assert_eq!(result.strategy_chain, vec!["extract".to_string()]);
    assert_eq!(result.image_count, 20);
    assert!(!result.pdf_bytes.is_empty());
    let rendered = String::from_utf8_lossy(&result.pdf_bytes);
    assert_eq!(rendered.matches("<img").count(), 20);
    assert_eq!(rendered.matches("data:image/jpeg;base64,").count(), 20);
    assert!(!rendered.contains("doubleclick"));
    assert_eq!(result.filename, "Ransomware_affiliate_playbook_original_with_images.pdf");

    let stored = platform.report("r1").unwrap();
    assert_eq!(stored.labels, vec![LABEL.to_string()]);
    assert!(stored.description.starts_with("Title: "));
    assert!(stored.description.contains("spear-phishing"));

    let files = platform.files("r1");
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].mime, PDF_MIME);
    assert!(files[0].bytes.starts_with(b"%PDF"));
    assert_eq!(platform.calls().label, 1);
}

#[tokio::test]
async fn unreachable_page_leaves_report_unmarked() {
    let dir = TempDir::new().unwrap();
    let closed = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/gone", closed.local_addr().unwrap());
    drop(closed);

    let platform = Arc::new(InMemoryPlatform::new(vec![report("r1", &url, &[])]));
    let processor = processor(options(&dir), &platform);

    let outcome = processor.process(&report("r1", &url, &[])).await.unwrap();

    match outcome {
        ReportOutcome::Failed(result) => {
            assert_eq!(result.failed_stage, Some(Stage::Fetched));
            assert!(result.failure_reason.is_some());
        }
        other => panic!("expected fetch failure, got {other:?}"),
    }
    assert!(platform.report("r1").unwrap().labels.is_empty());
    assert!(platform.files("r1").is_empty());
    assert_eq!(platform.calls().describe, 0);
}

#[tokio::test]
async fn marked_report_is_never_fetched() {
    let dir = TempDir::new().unwrap();
    let site = site(common::clean_article(2)).await;
    let url = format!("{}/story", site.base);
    let platform = Arc::new(InMemoryPlatform::new(vec![report("r1", &url, &[LABEL])]));
    let settings = ConnectorSettings {
        filter: ReportFilter::new(["rss-report"], false, Some(LABEL.to_string())),
        ..ConnectorSettings::default()
    };
    let connector = Connector::new(processor(options(&dir), &platform), Arc::clone(&platform), settings);
    let (_tx, mut rx) = watch::channel(false);

    let summary = connector.poll_cycle(&mut rx).await.unwrap();

    assert_eq!(summary.seen, 0);
    assert_eq!(site.hits.load(Ordering::SeqCst), 0);
    assert_eq!(platform.calls().attach, 0);
    assert_eq!(platform.calls().label, 0);
}

#[tokio::test]
async fn second_cycle_does_not_refetch() {
    let dir = TempDir::new().unwrap();
    let site = site(common::clean_article(1)).await;
    let url = format!("{}/story", site.base);
    let platform = Arc::new(InMemoryPlatform::new(vec![report("r1", &url, &[])]));
    let options = Options { preserve_original_layout: false, include_images: false, ..options(&dir) };
    let connector = Connector::new(processor(options, &platform), Arc::clone(&platform), ConnectorSettings::default());
    let (_tx, mut rx) = watch::channel(false);

    let first = connector.poll_cycle(&mut rx).await.unwrap();
    let second = connector.poll_cycle(&mut rx).await.unwrap();

    assert_eq!(first.enriched, 1);
    assert_eq!(second.enriched, 0);
    assert_eq!(site.hits.load(Ordering::SeqCst), 1);
    assert_eq!(platform.files("r1")[0].filename, "Ransomware_affiliate_playbook_simple_text_only.pdf");
}
