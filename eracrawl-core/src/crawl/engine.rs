use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::{CrawlSection, EngineSection};

use super::error::{EngineError, EngineResult};
use super::stealth::{StealthHeaderPool, StealthHeaders};

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "bmp", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSearchEngine {
    Bing,
    Baidu,
}

impl fmt::Display for ImageSearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ImageSearchEngine::Bing => "bing",
            ImageSearchEngine::Baidu => "baidu",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for ImageSearchEngine {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "bing" => Ok(ImageSearchEngine::Bing),
            "baidu" => Ok(ImageSearchEngine::Baidu),
            other => Err(EngineError::Configuration(format!(
                "invalid image search engine: {other}"
            ))),
        }
    }
}

impl ImageSearchEngine {
    pub fn search_url(&self, query: &str, count: usize) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        match self {
            ImageSearchEngine::Bing => {
                format!("https://www.bing.com/images/async?q={encoded}&first=0&count={count}")
            }
            ImageSearchEngine::Baidu => format!(
                "https://image.baidu.com/search/acjson?tn=resultjson_com&word={encoded}&pn=0&rn={count}"
            ),
        }
    }

    /// Pulls direct image URLs out of the results payload. The engines'
    /// full parse pipelines stay external; a substring scan over the known
    /// payload shape is all the adapter needs.
    pub fn extract_image_urls(&self, body: &str, max: usize) -> Vec<String> {
        let pattern = match self {
            ImageSearchEngine::Bing => r#"murl&quot;:&quot;(https?://[^&]+?)&quot;"#,
            ImageSearchEngine::Baidu => r#""thumbURL"\s*:\s*"(https?://[^"]+)""#,
        };
        let regex = Regex::new(pattern).unwrap();
        let mut urls = Vec::new();
        for capture in regex.captures_iter(body) {
            let url = capture[1].to_string();
            if !urls.contains(&url) {
                urls.push(url);
            }
            if urls.len() >= max {
                break;
            }
        }
        urls
    }
}

/// Uniform capability over one external image-search engine: fetch a bounded
/// number of images for a query into a target directory, numbering files
/// sequentially from `start_index + 1`.
#[async_trait]
pub trait ImageEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the number of images actually written.
    async fn fetch(&self, query: &str, target_dir: &Path, start_index: usize)
        -> EngineResult<usize>;
}

pub struct HttpImageEngine {
    engine: ImageSearchEngine,
    name: String,
    client: reqwest::Client,
    stealth: StealthHeaderPool,
    referer: String,
    accept_language: String,
    images_per_query: usize,
}

impl HttpImageEngine {
    /// Builds one engine adapter. Header injection is part of construction:
    /// an empty stealth pool or an unbuildable client is a hard error, never
    /// a silently header-less crawler.
    pub fn new(
        engine: ImageSearchEngine,
        section: &EngineSection,
        crawl: &CrawlSection,
        stealth: StealthHeaderPool,
    ) -> EngineResult<Self> {
        // Baidu's CDN routinely needs ~20s on first contact; the timeout
        // floor keeps slow upstreams from burning retries.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(crawl.request_timeout_secs.max(20)))
            .build()
            .map_err(|err| EngineError::Configuration(err.to_string()))?;
        Ok(Self {
            engine,
            name: engine.to_string(),
            client,
            stealth,
            referer: section.referer.clone(),
            accept_language: section.accept_language.clone(),
            images_per_query: crawl.images_per_engine,
        })
    }

    async fn get(&self, url: &str, headers: &StealthHeaders) -> EngineResult<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, &headers.user_agent)
            .header(reqwest::header::ACCEPT_LANGUAGE, &headers.accept_language)
            .header(reqwest::header::REFERER, &headers.referer)
            .send()
            .await
            .map_err(|err| EngineError::from_request(err, url))?;
        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    async fn download_image(
        &self,
        url: &str,
        headers: &StealthHeaders,
        path: &Path,
    ) -> EngineResult<()> {
        let response = self.get(url, headers).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|err| EngineError::from_request(err, url))?;
        tokio::fs::write(path, &bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl ImageEngine for HttpImageEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        query: &str,
        target_dir: &Path,
        start_index: usize,
    ) -> EngineResult<usize> {
        let headers = self.stealth.headers(&self.referer, &self.accept_language);
        let search_url = self.engine.search_url(query, self.images_per_query);
        debug!(engine = %self.engine, url = %search_url, "opening results page");

        let body = self
            .get(&search_url, &headers)
            .await?
            .text()
            .await
            .map_err(|err| EngineError::from_request(err, &search_url))?;
        let image_urls = self.engine.extract_image_urls(&body, self.images_per_query);

        let mut written = 0usize;
        for image_url in &image_urls {
            let path = image_path(target_dir, start_index + written + 1, image_url);
            // One bad image link is not worth failing the whole invocation.
            match self.download_image(image_url, &headers, &path).await {
                Ok(()) => written += 1,
                Err(err) => {
                    warn!(engine = %self.engine, url = %image_url, error = %err, "image download failed");
                }
            }
        }
        Ok(written)
    }
}

/// Sequential 6-digit filename shared across both engines within an era
/// directory, extension taken from the source URL when recognizable.
fn image_path(target_dir: &Path, index: usize, url: &str) -> PathBuf {
    let extension = url::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            Path::new(parsed.path())
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
        })
        .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or_else(|| "jpg".to_string());
    target_dir.join(format!("{index:06}.{extension}"))
}

/// File-index offset: how many image files already live in the era
/// directory. Recomputed by rescanning before every engine call, never
/// cached, so it self-corrects after partial downloads.
pub fn count_images(directory: &Path) -> std::io::Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                IMAGE_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false);
        if path.is_file() && is_image {
            count += 1;
        }
    }
    Ok(count)
}
