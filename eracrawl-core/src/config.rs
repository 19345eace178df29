use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CrawlerConfig {
    pub paths: PathsSection,
    pub crawl: CrawlSection,
    pub stealth: StealthSection,
    pub engines: EnginesSection,
}

impl CrawlerConfig {
    pub fn resolve_path<P: AsRef<Path>>(&self, candidate: P) -> PathBuf {
        let path = candidate.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.paths.base_dir).join(path)
        }
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.stealth.user_agents.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "stealth.user_agents must not be empty".to_string(),
                path: path.to_path_buf(),
            });
        }
        if self.crawl.jitter_min_secs > self.crawl.jitter_max_secs {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "crawl.jitter_min_secs ({}) exceeds crawl.jitter_max_secs ({})",
                    self.crawl.jitter_min_secs, self.crawl.jitter_max_secs
                ),
                path: path.to_path_buf(),
            });
        }
        if self.crawl.images_per_engine == 0 {
            return Err(ConfigError::Invalid {
                reason: "crawl.images_per_engine must be at least 1".to_string(),
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    pub base_dir: String,
    pub assets_dir: String,
    pub manifest: String,
    pub checkpoint: String,
    pub log_file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrawlSection {
    pub images_per_engine: usize,
    pub inter_engine_delay_secs: u64,
    pub jitter_min_secs: f64,
    pub jitter_max_secs: f64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StealthSection {
    pub user_agents: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnginesSection {
    pub bing: EngineSection,
    pub baidu: EngineSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    pub referer: String,
    pub accept_language: String,
}

pub fn load_crawler_config<P: AsRef<Path>>(path: P) -> Result<CrawlerConfig> {
    let path = path.as_ref();
    let config: CrawlerConfig = load_toml(path)?;
    config.validate(path)?;
    Ok(config)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_fixture_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/eracrawl.toml");
        let config = load_crawler_config(path).expect("config should parse");
        assert_eq!(config.crawl.images_per_engine, 3);
        assert!(config.stealth.user_agents.len() >= 10);
        assert!(config.engines.baidu.accept_language.starts_with("zh-CN"));
        assert!(config.crawl.jitter_min_secs <= config.crawl.jitter_max_secs);
    }

    #[test]
    fn inverted_jitter_bounds_rejected() {
        let toml = r#"
            [paths]
            base_dir = "."
            assets_dir = "assets"
            manifest = "research.json"
            checkpoint = "completed_queries.json"
            log_file = "scrape_status.log"

            [crawl]
            images_per_engine = 3
            inter_engine_delay_secs = 3
            jitter_min_secs = 5.0
            jitter_max_secs = 2.0
            request_timeout_secs = 20

            [stealth]
            user_agents = ["Mozilla/5.0 test"]

            [engines.bing]
            referer = "https://www.bing.com/"
            accept_language = "en-US,en;q=0.9"

            [engines.baidu]
            referer = "https://image.baidu.com/"
            accept_language = "zh-CN,zh;q=0.9"
        "#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eracrawl.toml");
        std::fs::write(&path, toml).unwrap();
        let err = load_crawler_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
