//! Enrich a single URL: fetch, extract, render to a PDF file and print the
//! excerpt. No platform access.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;

use rs_report_enhancer::logging::{self, LogFormat, LoggingConfig};
use rs_report_enhancer::pipeline::{LiveStages, Orchestrator};
use rs_report_enhancer::{Options, StrategyMode};

#[derive(Debug, Parser)]
#[command(name = "enrich_url", version, about = "Render one web article to PDF")]
struct Args {
    /// Article URL.
    url: String,

    /// Output PDF path. Defaults to the generated attachment name.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report name used for the title and file name.
    #[arg(short, long, default_value = "report")]
    name: String,

    /// extract, minimal or auto.
    #[arg(short, long, default_value = "auto")]
    strategy: StrategyMode,

    /// Single-column layout instead of the original one.
    #[arg(long)]
    simple: bool,

    /// Leave images out of the PDF.
    #[arg(long)]
    no_images: bool,

    /// PDF engine binary.
    #[arg(long, env = "WKHTMLTOPDF_PATH")]
    wkhtmltopdf: Option<PathBuf>,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(&LoggingConfig {
        level: if args.verbose { "debug" } else { "warn" }.to_string(),
        format: LogFormat::Compact,
    });

    let defaults = Options::default();
    let options = Options {
        ad_removal_strategy: args.strategy,
        preserve_original_layout: !args.simple,
        include_images: !args.no_images,
        renderer_path: args.wkhtmltopdf.unwrap_or(defaults.renderer_path.clone()),
        ..defaults
    };

    let stages = LiveStages::new(&options).context("building pipeline stages")?;
    let result = Orchestrator::new(stages, options)
        .enrich(&args.url, &args.name)
        .await
        .context("scratch space unavailable")?;
    if !result.success {
        bail!(
            "enrichment failed at {}: {}",
            result.failed_stage.map_or_else(|| "unknown stage".to_string(), |s| s.to_string()),
            result.failure_reason.unwrap_or_default()
        );
    }

    let output = args.output.unwrap_or_else(|| PathBuf::from(&result.filename));
    std::fs::write(&output, &result.pdf_bytes).with_context(|| format!("writing {}", output.display()))?;

    eprintln!(
        "wrote {} ({} bytes, strategies: {}, images: {})",
        output.display(),
        result.pdf_bytes.len(),
        result.strategy_chain.join(" -> "),
        result.image_count
    );
    println!("{}", result.excerpt_text);
    Ok(())
}
