//! Image download, re-encoding and embedding.
//!
//! Every image referenced by an article (up to `max_images`) is downloaded,
//! decoded, downscaled when very wide and re-encoded as JPEG at the
//! configured quality. Successful images are embedded in the article body as
//! `data:` URIs so the renderer never touches the network. An image that
//! fails at any step is dropped from the body; the article text is never
//! changed by this stage.

use std::collections::HashMap;
use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ImageReader;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::dom::{self, Document, Selection};
use crate::error::{FetchError, ImageError};
use crate::options::Options;
use crate::result::{ExtractedArticle, ProcessedArticle, ProcessedImage};

/// Images wider than this are scaled down before encoding.
pub const MAX_IMAGE_WIDTH: u32 = 1600;

/// Downloads larger than this are rejected.
pub const MAX_IMAGE_BYTES: usize = 15 * 1024 * 1024;

/// Image stage: owns an HTTP client and the image options.
#[derive(Debug, Clone)]
pub struct ImagePipeline {
    client: reqwest::Client,
    options: Options,
}

impl ImagePipeline {
    /// Build the pipeline with its own HTTP client.
    pub fn new(options: &Options) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(&options.user_agent)
            .timeout(options.image_timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client, options: options.clone() })
    }

    /// Process every image of `article`.
    ///
    /// Never fails: images that cannot be downloaded or decoded are removed
    /// from the body and logged.
    pub async fn process(&self, article: ExtractedArticle) -> ProcessedArticle {
        if !self.options.include_images {
            let body_html = strip_images(&article.body_html);
            debug!("images disabled, stripped from body");
            return ProcessedArticle {
                article: ExtractedArticle { body_html, image_urls: Vec::new(), ..article },
                images: Vec::new(),
            };
        }
        if article.image_urls.is_empty() {
            return ProcessedArticle { article, images: Vec::new() };
        }

        let selected: Vec<String> = article.image_urls.iter().take(self.options.max_images).cloned().collect();
        if article.image_urls.len() > selected.len() {
            info!(
                total = article.image_urls.len(),
                kept = selected.len(),
                "image count above limit, extra images dropped"
            );
        }

        let images = self.load_all(&selected).await;
        let embedded: HashMap<&str, &str> =
            images.iter().map(|img| (img.source_url.as_str(), img.local_reference.as_str())).collect();
        let body_html = embed_images(&article.body_html, &embedded);

        info!(requested = selected.len(), embedded = images.len(), "images processed");

        ProcessedArticle {
            article: ExtractedArticle { body_html, image_urls: selected, ..article },
            images,
        }
    }

    /// Load and re-encode `urls` concurrently. Results keep the input order;
    /// failures are logged and skipped.
    async fn load_all(&self, urls: &[String]) -> Vec<ProcessedImage> {
        let mut tasks = JoinSet::new();
        for (index, url) in urls.iter().enumerate() {
            let pipeline = self.clone();
            let url = url.clone();
            tasks.spawn(async move { (index, pipeline.load(&url).await) });
        }

        let mut loaded = Vec::with_capacity(urls.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(image))) => loaded.push((index, image)),
                Ok((_, Err(e))) => warn!(error = %e, "image dropped"),
                Err(e) => warn!(error = %e, "image task failed"),
            }
        }
        loaded.sort_by_key(|(index, _)| *index);
        loaded.into_iter().map(|(_, image)| image).collect()
    }

    /// Load a single image and re-encode it.
    pub async fn load(&self, url: &str) -> Result<ProcessedImage, ImageError> {
        let bytes = if url.starts_with("data:") {
            decode_data_uri(url)?
        } else {
            self.download(url).await?
        };

        let quality = self.options.image_quality;
        let source = url.to_string();
        let jpeg = tokio::task::spawn_blocking(move || reencode_jpeg(&bytes, quality))
            .await
            .map_err(|e| ImageError::Decode { url: source, reason: e.to_string() })?
            .map_err(|reason| ImageError::Decode { url: url.to_string(), reason })?;

        Ok(ProcessedImage {
            source_url: url.to_string(),
            byte_size: jpeg.len(),
            local_reference: format!("data:image/jpeg;base64,{}", STANDARD.encode(&jpeg)),
            quality_applied: quality,
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        let fail = |reason: String| ImageError::Download { url: url.to_string(), reason };

        let response = self.client.get(url).send().await.map_err(|e| fail(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {status}")));
        }
        let bytes = response.bytes().await.map_err(|e| fail(e.to_string()))?;
        if bytes.is_empty() {
            return Err(fail("empty body".to_string()));
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(fail(format!("{} bytes exceeds limit", bytes.len())));
        }
        Ok(bytes.to_vec())
    }
}

/// Payload of a base64 `data:` URI.
fn decode_data_uri(uri: &str) -> Result<Vec<u8>, ImageError> {
    let fail = |reason: &str| ImageError::Decode { url: uri.chars().take(64).collect(), reason: reason.to_string() };
    let (header, payload) = uri.split_once(',').ok_or_else(|| fail("malformed data URI"))?;
    if !header.ends_with(";base64") {
        return Err(fail("data URI is not base64"));
    }
    STANDARD.decode(payload.trim()).map_err(|e| fail(&e.to_string()))
}

/// Decode any supported format and re-encode as JPEG at `quality`.
///
/// Transparent images are flattened onto black by the RGB conversion.
pub fn reencode_jpeg(bytes: &[u8], quality: u8) -> Result<Vec<u8>, String> {
    let mut img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| format!("format detection failed: {e}"))?
        .decode()
        .map_err(|e| format!("decode failed: {e}"))?;

    if img.width() > MAX_IMAGE_WIDTH {
        img = img.resize(MAX_IMAGE_WIDTH, u32::MAX, FilterType::Triangle);
    }

    let mut out = Vec::new();
    img.to_rgb8()
        .write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)))
        .map_err(|e| format!("encode failed: {e}"))?;
    Ok(out)
}

/// Point every `<img>` whose `src` is a key of `embedded` at its data URI and
/// remove all other images.
#[must_use]
pub fn embed_images(body_html: &str, embedded: &HashMap<&str, &str>) -> String {
    let doc = Document::from(format!("<html><body>{body_html}</body></html>"));
    let images = doc.select("img").nodes().to_vec();
    for node in images.into_iter().rev() {
        let img = Selection::from(node);
        match dom::get_attribute(&img, "src").as_deref().and_then(|src| embedded.get(src)) {
            Some(data_uri) => dom::set_attribute(&img, "src", data_uri),
            None => img.remove(),
        }
    }
    dom::inner_html(&doc.select("body")).to_string()
}

/// Remove every image from `body_html`.
#[must_use]
pub fn strip_images(body_html: &str) -> String {
    embed_images(body_html, &HashMap::new())
}

#[cfg(test)]
mod tests {
    use image::{ImageFormat, Rgb, RgbImage};
    use url::Url;

    use super::*;
    use crate::result::StrategyUsed;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 40]));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png).unwrap();
        out
    }

    fn data_uri(bytes: &[u8]) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(bytes))
    }

    fn article(body_html: &str, image_urls: Vec<String>) -> ExtractedArticle {
        ExtractedArticle {
            title: "t".to_string(),
            body_html: body_html.to_string(),
            image_urls,
            strategy_used: StrategyUsed::Extract,
            byline: None,
            published: None,
            source_url: Url::parse("https://example.com/a").unwrap(),
            cms_theme: None,
        }
    }

    #[test]
    fn reencode_produces_jpeg_and_downscales() {
        let jpeg = reencode_jpeg(&png_bytes(2000, 100), 70).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), MAX_IMAGE_WIDTH);
    }

    #[test]
    fn reencode_rejects_garbage() {
        assert!(reencode_jpeg(b"not an image", 85).is_err());
    }

    #[test]
    fn embed_replaces_known_and_drops_unknown() {
        let embedded = HashMap::from([("https://e.com/a.png", "data:image/jpeg;base64,AAAA")]);
        let html = embed_images(r#"<p>text</p><img src="https://e.com/a.png"><img src="https://e.com/b.png">"#, &embedded);
        assert_eq!(html, r#"<p>text</p><img src="data:image/jpeg;base64,AAAA">"#);
    }

    #[tokio::test]
    async fn disabled_images_are_stripped() {
        let options = Options { include_images: false, ..Options::default() };
        let pipeline = ImagePipeline::new(&options).unwrap();
        let input = article(r#"<p>body</p><img src="https://e.com/a.png">"#, vec!["https://e.com/a.png".to_string()]);

        let processed = pipeline.process(input).await;

        assert!(processed.images.is_empty());
        assert_eq!(processed.article.body_html, "<p>body</p>");
    }

    #[tokio::test]
    async fn article_without_images_is_unchanged() {
        let pipeline = ImagePipeline::new(&Options::default()).unwrap();
        let input = article("<p>only <b>text</b></p>", Vec::new());

        let processed = pipeline.process(input.clone()).await;

        assert_eq!(processed.article, input);
        assert!(processed.images.is_empty());
    }

    #[tokio::test]
    async fn inline_images_are_reencoded_and_limited() {
        let options = Options { max_images: 2, image_quality: 60, ..Options::default() };
        let pipeline = ImagePipeline::new(&options).unwrap();
        let uris: Vec<String> = (1..=3).map(|n| data_uri(&png_bytes(n * 10, 10))).collect();
        let body: String = uris.iter().map(|u| format!(r#"<p>x</p><img src="{u}">"#)).collect();

        let processed = pipeline.process(article(&body, uris.clone())).await;

        assert_eq!(processed.images.len(), 2);
        assert!(processed.images.iter().all(|i| i.quality_applied == 60));
        assert_eq!(processed.images[0].source_url, uris[0]);
        assert_eq!(processed.article.body_html.matches("<img").count(), 2);
        assert!(processed.article.body_html.contains("data:image/jpeg;base64,"));
        assert!(!processed.article.body_html.contains(&uris[2]));
    }

    #[test]
    fn data_uri_must_be_base64() {
        assert!(decode_data_uri("data:image/svg+xml,<svg/>").is_err());
        assert_eq!(decode_data_uri("data:image/png;base64,AQID").unwrap(), vec![1, 2, 3]);
    }
}
