//! Runs in its own binary: it points TMPDIR at a missing directory, which
//! would break any test sharing the process.

#![cfg(unix)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::response::Html;
use axum::routing::get;
use axum::Router;
use tempfile::TempDir;
use tokio::sync::watch;

use rs_report_enhancer::connector::{Connector, ConnectorSettings};
use rs_report_enhancer::pipeline::{LiveStages, MarkConfig, Orchestrator, ReportProcessor};
use rs_report_enhancer::platform::{InMemoryPlatform, ReportRef};
use rs_report_enhancer::{Error, Options};

fn report(id: &str, url: String) -> ReportRef {
    ReportRef {
        id: id.to_string(),
        name: format!("Report {id}"),
        external_references: vec![url],
        report_types: vec!["threat-report".to_string()],
        ..ReportRef::default()
    }
}

#[tokio::test]
async fn unusable_temp_dir_aborts_the_poll_cycle() {
    let tools = TempDir::new().unwrap();
    let router = Router::new().route("/story", get(|| async { Html(common::clean_article(0)) }));
    let base = format!("http://{}", common::serve(router).await);
    let options = Options {
        renderer_path: common::fake_wkhtmltopdf(&tools),
        wget_path: common::script(&tools, "wget", "exit 4"),
        browser_path: None,
        direct_timeout: Duration::from_secs(5),
        ..Options::default()
    };

    let platform = Arc::new(InMemoryPlatform::new(vec![
        report("r1", format!("{base}/story")),
        report("r2", format!("{base}/story")),
    ]));
    let mark = MarkConfig { label: "rss-enhanced".to_string(), color: "#ff9900".to_string() };
    let stages = LiveStages::new(&options).unwrap();
    let processor = ReportProcessor::new(Orchestrator::new(stages, options), Arc::clone(&platform), mark);
    let connector = Connector::new(processor, Arc::clone(&platform), ConnectorSettings::default());
    let (_tx, mut rx) = watch::channel(false);

    std::env::set_var("TMPDIR", tools.path().join("does-not-exist"));
    let result = connector.poll_cycle(&mut rx).await;
    std::env::remove_var("TMPDIR");

    let err = result.unwrap_err();
    assert!(matches!(err, Error::Io(_)), "expected resource exhaustion, got {err:?}");
    assert_eq!(platform.calls().get, 1);
    assert_eq!(platform.calls().attach, 0);
    assert!(platform.report("r1").unwrap().labels.is_empty());
    assert!(platform.report("r2").unwrap().labels.is_empty());
}
