//! Stage implementations behind a trait, so runs can be driven by fakes.

use async_trait::async_trait;

use crate::error::{ExtractionError, FetchError, RenderError};
use crate::extractor::ExtractionStrategy;
use crate::fetcher::Fetcher;
use crate::image_pipeline::ImagePipeline;
use crate::options::Options;
use crate::profiler::{self, SiteProfile};
use crate::renderer::{LayoutMode, Renderer};
use crate::result::{ExtractedArticle, ProcessedArticle, SourceDocument};

/// The work done at each pipeline stage.
#[async_trait]
pub trait Stages: Send + Sync {
    /// Download the page at `url`.
    async fn fetch(&self, url: &str) -> Result<SourceDocument, FetchError>;

    /// Profile a fetched page.
    fn profile(&self, source: &SourceDocument) -> SiteProfile;

    /// Extract the article with one strategy.
    fn extract(&self, source: &SourceDocument, strategy: ExtractionStrategy) -> Result<ExtractedArticle, ExtractionError>;

    /// Download and embed images. Never fails.
    async fn process_images(&self, article: ExtractedArticle) -> ProcessedArticle;

    /// Render the processed article to PDF bytes.
    async fn render(&self, article: &ProcessedArticle, layout: LayoutMode) -> Result<Vec<u8>, RenderError>;
}

/// Stages backed by the network, the extractors and the PDF engine.
#[derive(Debug, Clone)]
pub struct LiveStages {
    fetcher: Fetcher,
    images: ImagePipeline,
    renderer: Renderer,
    options: Options,
}

impl LiveStages {
    /// Build every stage from `options`.
    pub fn new(options: &Options) -> Result<Self, FetchError> {
        Ok(Self {
            fetcher: Fetcher::new(options)?,
            images: ImagePipeline::new(options)?,
            renderer: Renderer::new(options),
            options: options.clone(),
        })
    }
}

#[async_trait]
impl Stages for LiveStages {
    async fn fetch(&self, url: &str) -> Result<SourceDocument, FetchError> {
        self.fetcher.fetch(url).await
    }

    fn profile(&self, source: &SourceDocument) -> SiteProfile {
        profiler::profile(source, &self.options.profile_thresholds)
    }

    fn extract(&self, source: &SourceDocument, strategy: ExtractionStrategy) -> Result<ExtractedArticle, ExtractionError> {
        strategy.attempt(source, &self.options)
    }

    async fn process_images(&self, article: ExtractedArticle) -> ProcessedArticle {
        self.images.process(article).await
    }

    async fn render(&self, article: &ProcessedArticle, layout: LayoutMode) -> Result<Vec<u8>, RenderError> {
        let source = article.article.source_url.as_str();
        self.renderer
            .render(
                &article.article.body_html,
                &article.article.title,
                Some(source),
                article.article.cms_theme.as_deref(),
                layout,
            )
            .await
    }
}
