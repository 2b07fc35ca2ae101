//! Connector service: polls the platform and enriches new reports.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use rs_report_enhancer::config::Config;
use rs_report_enhancer::connector::{Connector, ConnectorSettings};
use rs_report_enhancer::logging;
use rs_report_enhancer::pipeline::{LiveStages, Orchestrator, ReportProcessor};
use rs_report_enhancer::platform::OpenCtiClient;

#[derive(Debug, Parser)]
#[command(name = "report_enhancer", version, about = "Enrich web-sourced reports with article PDFs")]
struct Args {
    /// YAML config file. Environment variables override its values.
    #[arg(short, long, env = "REPORT_ENHANCER_CONFIG")]
    config: Option<PathBuf>,

    /// Process the backlog once and exit instead of polling.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("loading configuration")?;
    logging::init(&config.effective_logging());

    let options = config.options();
    let platform = Arc::new(
        OpenCtiClient::new(
            &config.platform.url,
            &config.platform.token,
            Duration::from_secs(config.platform.request_timeout),
        )
        .context("building platform client")?,
    );
    let stages = LiveStages::new(&options).context("building pipeline stages")?;
    let processor = ReportProcessor::new(Orchestrator::new(stages, options), Arc::clone(&platform), config.mark());
    let connector = Connector::new(processor, platform, ConnectorSettings::from_config(&config));

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("shutdown requested, finishing current report");
        let _ = shutdown_tx.send(true);
    });

    if args.once {
        let summary = connector.backlog(&mut shutdown_rx).await.context("processing backlog")?;
        info!(?summary, "backlog processed");
    } else {
        connector.run(shutdown_rx).await.context("connector aborted")?;
    }
    Ok(())
}
