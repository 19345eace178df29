use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::checkpoint::CheckpointStore;
use crate::config::CrawlerConfig;
use crate::manifest::{load_manifest, ManifestError};

use super::engine::{HttpImageEngine, ImageEngine, ImageSearchEngine};
use super::era::EraProcessor;
use super::error::EngineError;
use super::stealth::StealthHeaderPool;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("engine construction failed: {0}")]
    Engine(#[from] EngineError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct RunSummary {
    pub eras_total: usize,
    pub eras_skipped: usize,
    pub eras_aborted: usize,
    pub queries_total: usize,
    pub queries_already_done: usize,
    pub queries_completed_now: usize,
    pub queries_failed: usize,
}

/// Entry point of a crawl run: loads the manifest and checkpoint, reports
/// resume statistics, then walks every era sequentially through the
/// `EraProcessor`. Per-query and per-engine failures never escape; only a
/// missing or empty manifest is fatal.
pub struct Orchestrator {
    manifest_path: PathBuf,
    assets_dir: PathBuf,
    store: CheckpointStore,
    processor: EraProcessor,
}

impl Orchestrator {
    /// Wires the two production engines, Bing before Baidu, in the fixed
    /// invocation order the rate-shaping design expects.
    pub fn from_config(config: &CrawlerConfig) -> Result<Self, OrchestratorError> {
        let stealth = StealthHeaderPool::new(config.stealth.user_agents.clone())?;
        let bing = HttpImageEngine::new(
            ImageSearchEngine::Bing,
            &config.engines.bing,
            &config.crawl,
            stealth.clone(),
        )?;
        let baidu = HttpImageEngine::new(
            ImageSearchEngine::Baidu,
            &config.engines.baidu,
            &config.crawl,
            stealth,
        )?;
        Ok(Self::with_engines(
            config,
            vec![Arc::new(bing), Arc::new(baidu)],
        ))
    }

    pub fn with_engines(config: &CrawlerConfig, engines: Vec<Arc<dyn ImageEngine>>) -> Self {
        let store = CheckpointStore::new(config.resolve_path(&config.paths.checkpoint));
        let processor = EraProcessor::new(
            engines,
            store.clone(),
            Duration::from_secs(config.crawl.inter_engine_delay_secs),
            (config.crawl.jitter_min_secs, config.crawl.jitter_max_secs),
        );
        Self {
            manifest_path: config.resolve_path(&config.paths.manifest),
            assets_dir: config.resolve_path(&config.paths.assets_dir),
            store,
            processor,
        }
    }

    pub async fn run(&self) -> Result<RunSummary, OrchestratorError> {
        let eras = load_manifest(&self.manifest_path)?;
        std::fs::create_dir_all(&self.assets_dir)?;

        let mut checkpoint = self.store.load();
        let mut summary = RunSummary {
            eras_total: eras.len(),
            queries_total: eras.iter().map(|era| era.icrawler_queries.len()).sum(),
            queries_already_done: checkpoint.completed_total(),
            ..Default::default()
        };

        info!(
            eras = summary.eras_total,
            assets_dir = %self.assets_dir.display(),
            checkpoint = %self.store.path().display(),
            "era crawl starting"
        );
        if summary.queries_already_done > 0 {
            info!(
                done = summary.queries_already_done,
                total = summary.queries_total,
                "resuming, completed queries will be skipped"
            );
        } else {
            info!("checkpoint empty, fresh run");
        }

        for era in &eras {
            match self.processor.process(era, &self.assets_dir, &mut checkpoint).await {
                Ok(stats) => {
                    if stats.aborted {
                        summary.eras_aborted += 1;
                    } else if stats.queries_skipped == stats.queries_total {
                        summary.eras_skipped += 1;
                    }
                    summary.queries_completed_now += stats.queries_completed;
                    summary.queries_failed += stats.queries_failed;
                }
                Err(err) => {
                    // An unusable era directory degrades that era only; the
                    // remaining eras still run.
                    error!(era = %era.title, error = %err, "era processing failed");
                    summary.eras_aborted += 1;
                }
            }
        }

        info!(
            completed_now = summary.queries_completed_now,
            failed = summary.queries_failed,
            aborted_eras = summary.eras_aborted,
            "all eras processed"
        );
        Ok(summary)
    }
}
