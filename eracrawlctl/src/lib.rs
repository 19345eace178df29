use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use eracrawl_core::{
    load_crawler_config, load_manifest, CheckpointStore, CrawlerConfig, ManifestError,
    Orchestrator, OrchestratorError, RunSummary,
};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] eracrawl_core::ConfigError),
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Era image crawl control interface", long_about = None)]
pub struct Cli {
    /// Path to eracrawl.toml
    #[arg(long, default_value = "configs/eracrawl.toml")]
    pub config: PathBuf,
    /// Override for the era/query manifest
    #[arg(long)]
    pub manifest: Option<PathBuf>,
    /// Override for the checkpoint file
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,
    /// Override for the assets output root
    #[arg(long)]
    pub assets_dir: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl every era in the manifest, resuming from the checkpoint
    Run,
    /// Report resume statistics without crawling
    Status,
}

pub fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    init_logging(&config);

    match &cli.command {
        Commands::Run => {
            let orchestrator = Orchestrator::from_config(&config)?;
            let runtime = tokio::runtime::Runtime::new()?;
            let summary = runtime.block_on(orchestrator.run())?;
            render(&summary, cli.format)?;
        }
        Commands::Status => {
            let status = gather_status(&config)?;
            render(&status, cli.format)?;
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<CrawlerConfig> {
    let mut config = load_crawler_config(&cli.config)?;
    if let Some(manifest) = &cli.manifest {
        config.paths.manifest = manifest.to_string_lossy().into_owned();
    }
    if let Some(checkpoint) = &cli.checkpoint {
        config.paths.checkpoint = checkpoint.to_string_lossy().into_owned();
    }
    if let Some(assets_dir) = &cli.assets_dir {
        config.paths.assets_dir = assets_dir.to_string_lossy().into_owned();
    }
    Ok(config)
}

/// Console output plus the append-only run-history stream in the configured
/// log file. Init failures are ignored so repeated calls in tests are safe.
fn init_logging(config: &CrawlerConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());
    let log_path = config.resolve_path(&config.paths.log_file);
    match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => {
            let _ = registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Arc::new(file)),
                )
                .try_init();
        }
        Err(err) => {
            let _ = registry.try_init();
            tracing::warn!(path = %log_path.display(), error = %err, "log file unavailable");
        }
    }
}

fn gather_status(config: &CrawlerConfig) -> Result<StatusReport> {
    let eras = load_manifest(config.resolve_path(&config.paths.manifest))?;
    let store = CheckpointStore::new(config.resolve_path(&config.paths.checkpoint));
    let checkpoint = store.load();

    let rows: Vec<EraStatusRow> = eras
        .iter()
        .map(|era| {
            let era_key = era.folder_name();
            let done = era
                .icrawler_queries
                .iter()
                .filter(|query| checkpoint.is_done(&era_key, query))
                .count();
            EraStatusRow {
                era_key,
                title: era.title.clone(),
                queries_total: era.icrawler_queries.len(),
                queries_done: done,
            }
        })
        .collect();

    Ok(StatusReport {
        queries_total: rows.iter().map(|row| row.queries_total).sum(),
        queries_done: rows.iter().map(|row| row.queries_done).sum(),
        eras: rows,
    })
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub queries_total: usize,
    pub queries_done: usize,
    pub eras: Vec<EraStatusRow>,
}

#[derive(Debug, Serialize)]
pub struct EraStatusRow {
    pub era_key: String,
    pub title: String,
    pub queries_total: usize,
    pub queries_done: usize,
}

impl DisplayFallback for StatusReport {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "Queries complete: {} / {}",
            self.queries_done, self.queries_total
        )];
        for row in &self.eras {
            lines.push(format!(
                "  {key} | {title} | {done}/{total}",
                key = row.era_key,
                title = row.title,
                done = row.queries_done,
                total = row.queries_total
            ));
        }
        lines.join("\n")
    }
}

impl DisplayFallback for RunSummary {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "Eras processed: {} (skipped {}, aborted {})",
            self.eras_total, self.eras_skipped, self.eras_aborted
        )];
        lines.push(format!(
            "Queries completed this run: {} (failed {})",
            self.queries_completed_now, self.queries_failed
        ));
        lines.push(format!(
            "Checkpoint coverage: {} / {} queries",
            self.queries_already_done + self.queries_completed_now,
            self.queries_total
        ));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_fixtures(root: &std::path::Path) -> PathBuf {
        let config_path = root.join("eracrawl.toml");
        let toml = format!(
            r#"
            [paths]
            base_dir = "{base}"
            assets_dir = "assets"
            manifest = "research.json"
            checkpoint = "completed_queries.json"
            log_file = "scrape_status.log"

            [crawl]
            images_per_engine = 3
            inter_engine_delay_secs = 3
            jitter_min_secs = 2.0
            jitter_max_secs = 5.0
            request_timeout_secs = 20

            [stealth]
            user_agents = ["Mozilla/5.0 test"]

            [engines.bing]
            referer = "https://www.bing.com/"
            accept_language = "en-US,en;q=0.9"

            [engines.baidu]
            referer = "https://image.baidu.com/"
            accept_language = "zh-CN,zh;q=0.9"
            "#,
            base = root.display()
        );
        std::fs::write(&config_path, toml).unwrap();
        std::fs::write(
            root.join("research.json"),
            r#"{"eras": [
                {"era_index": 1, "title": "One", "icrawler_queries": ["q1", "q2"]},
                {"era_index": 2, "title": "Two", "icrawler_queries": ["q3"]}
            ]}"#,
        )
        .unwrap();
        std::fs::write(
            root.join("completed_queries.json"),
            r#"{"01_one": ["q1"]}"#,
        )
        .unwrap();
        config_path
    }

    #[test]
    fn status_counts_resume_progress() {
        let temp = tempfile::tempdir().unwrap();
        let config_path = write_fixtures(temp.path());
        let config = load_crawler_config(&config_path).unwrap();
        let status = gather_status(&config).unwrap();
        assert_eq!(status.queries_total, 3);
        assert_eq!(status.queries_done, 1);
        assert_eq!(status.eras[0].queries_done, 1);
        assert_eq!(status.eras[1].queries_done, 0);
    }

    #[test]
    fn cli_overrides_replace_config_paths() {
        let temp = tempfile::tempdir().unwrap();
        let config_path = write_fixtures(temp.path());
        let cli = Cli {
            config: config_path,
            manifest: Some(temp.path().join("other.json")),
            checkpoint: None,
            assets_dir: None,
            format: OutputFormat::Json,
            command: Commands::Status,
        };
        let config = load_config(&cli).unwrap();
        assert!(config.paths.manifest.ends_with("other.json"));
        assert_eq!(config.paths.checkpoint, "completed_queries.json");
    }

    #[test]
    fn missing_manifest_is_a_fatal_status_error() {
        let temp = tempfile::tempdir().unwrap();
        let config_path = write_fixtures(temp.path());
        let mut config = load_crawler_config(&config_path).unwrap();
        config.paths.manifest = "absent.json".to_string();
        let err = gather_status(&config).unwrap_err();
        assert!(matches!(err, AppError::Manifest(ManifestError::Missing(_))));
    }
}
