mod common;

use url::Url;

use rs_report_enhancer::image_pipeline::ImagePipeline;
use rs_report_enhancer::{ExtractedArticle, Options, StrategyUsed};

fn article(base: &str, images: &[&str]) -> ExtractedArticle {
    let urls: Vec<String> = images.iter().map(|name| format!("{base}/img/{name}")).collect();
    let tags: String = urls.iter().map(|u| format!("<figure><img src=\"{u}\" alt=\"fig\"></figure>")).collect();
    ExtractedArticle {
        title: "Figures".to_string(),
        body_html: format!("<p>Intro text.</p>{tags}<p>Closing text.</p>"),
        image_urls: urls,
        strategy_used: StrategyUsed::Extract,
        byline: None,
        published: None,
        source_url: Url::parse(&format!("{base}/post")).unwrap(),
        cms_theme: None,
    }
}

fn img_count(html: &str) -> usize {
    html.matches("<img").count()
}

#[tokio::test]
async fn images_are_embedded_up_to_the_limit() {
    let base = format!("http://{}", common::serve(common::image_routes()).await);
    let names: Vec<String> = (0..8).map(|i| format!("f{i}.png")).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let pipeline = ImagePipeline::new(&Options { max_images: 5, ..Options::default() }).unwrap();

    let processed = pipeline.process(article(&base, &names)).await;

    assert_eq!(processed.images.len(), 5);
    assert_eq!(img_count(&processed.article.body_html), 5);
    assert!(processed.images.iter().all(|img| img.local_reference.starts_with("data:image/jpeg;base64,")));
    assert!(processed.images.iter().all(|img| img.quality_applied == 85));
    assert_eq!(processed.images[0].source_url, format!("{base}/img/f0.png"));
    assert!(!processed.article.body_html.contains("/img/f6.png"));
}

#[tokio::test]
async fn failed_downloads_are_dropped_without_touching_text() {
    let base = format!("http://{}", common::serve(common::image_routes()).await);
    let pipeline = ImagePipeline::new(&Options::default()).unwrap();

    let processed = pipeline.process(article(&base, &["good.png", "missing.png"])).await;

    assert_eq!(processed.images.len(), 1);
    assert_eq!(img_count(&processed.article.body_html), 1);
    assert!(processed.article.body_html.contains("Intro text."));
    assert!(processed.article.body_html.contains("Closing text."));
}

#[tokio::test]
async fn article_without_images_is_unchanged() {
    let pipeline = ImagePipeline::new(&Options::default()).unwrap();
    let input = article("https://blog.example.com", &[]);

    let processed = pipeline.process(input.clone()).await;

    assert!(processed.images.is_empty());
    assert_eq!(processed.article, input);
}

#[tokio::test]
async fn disabled_images_are_stripped() {
    let pipeline = ImagePipeline::new(&Options { include_images: false, ..Options::default() }).unwrap();

    let processed = pipeline.process(article("https://blog.example.com", &["a.png"])).await;

    assert_eq!(img_count(&processed.article.body_html), 0);
    assert!(processed.article.image_urls.is_empty());
}
