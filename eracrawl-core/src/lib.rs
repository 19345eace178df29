pub mod checkpoint;
pub mod config;
pub mod crawl;
pub mod error;
pub mod manifest;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use config::{
    load_crawler_config, CrawlSection, CrawlerConfig, EngineSection, EnginesSection, PathsSection,
    StealthSection,
};
pub use crawl::{
    classify, count_images, run_engine, Disposition, EngineError, EngineResult, EraProcessor,
    EraStats, HttpImageEngine, ImageEngine, ImageSearchEngine, Orchestrator, OrchestratorError,
    RunSummary, StealthHeaderPool, StealthHeaders, TransportClass,
};
pub use error::{ConfigError, Result};
pub use manifest::{load_manifest, slugify, Era, EraIndex, ManifestError};
