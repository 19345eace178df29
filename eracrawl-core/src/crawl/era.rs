use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::manifest::Era;

use super::classify::Disposition;
use super::engine::{count_images, ImageEngine};
use super::runner::run_engine;

#[derive(Debug, Clone, Serialize, Default)]
pub struct EraStats {
    pub era_key: String,
    pub queries_total: usize,
    pub queries_skipped: usize,
    pub queries_completed: usize,
    pub queries_failed: usize,
    pub aborted: bool,
    pub total_sleep_ms: u64,
}

impl EraStats {
    fn new(era_key: &str, queries_total: usize) -> Self {
        Self {
            era_key: era_key.to_string(),
            queries_total,
            ..Default::default()
        }
    }
}

/// Walks one era's queries in manifest order: consults the checkpoint, runs
/// every configured engine in sequence with the mandated inter-engine delay,
/// flushes progress after each satisfied query, and jitters between query
/// cycles. Strictly sequential by design to keep the outbound request rate
/// low.
pub struct EraProcessor {
    engines: Vec<Arc<dyn ImageEngine>>,
    store: CheckpointStore,
    inter_engine_delay: Duration,
    jitter: Jitter,
}

impl EraProcessor {
    pub fn new(
        engines: Vec<Arc<dyn ImageEngine>>,
        store: CheckpointStore,
        inter_engine_delay: Duration,
        jitter_range_secs: (f64, f64),
    ) -> Self {
        Self {
            engines,
            store,
            inter_engine_delay,
            jitter: Jitter::new(jitter_range_secs),
        }
    }

    pub async fn process(
        &self,
        era: &Era,
        assets_dir: &Path,
        checkpoint: &mut Checkpoint,
    ) -> std::io::Result<EraStats> {
        let era_key = era.folder_name();
        let queries = &era.icrawler_queries;
        let mut stats = EraStats::new(&era_key, queries.len());

        let already_done = queries
            .iter()
            .filter(|query| checkpoint.is_done(&era_key, query))
            .count();
        if already_done == queries.len() {
            stats.queries_skipped = already_done;
            info!(era = %era.title, total = queries.len(), "era skipped, all queries in checkpoint");
            return Ok(stats);
        }

        let save_dir = assets_dir.join(&era_key);
        std::fs::create_dir_all(&save_dir)?;
        info!(
            era = %era.title,
            total = queries.len(),
            done = already_done,
            save_dir = %save_dir.display(),
            "era start"
        );

        for (position, query) in queries.iter().enumerate() {
            if checkpoint.is_done(&era_key, query) {
                stats.queries_skipped += 1;
                info!(
                    query,
                    position = position + 1,
                    total = queries.len(),
                    "query skipped via checkpoint"
                );
                continue;
            }
            info!(query, position = position + 1, total = queries.len(), "query start");

            let mut any_success = false;
            for (engine_idx, engine) in self.engines.iter().enumerate() {
                if engine_idx > 0 {
                    info!(
                        delay_secs = self.inter_engine_delay.as_secs(),
                        "sleeping before engine switch"
                    );
                    sleep(self.inter_engine_delay).await;
                    stats.total_sleep_ms += self.inter_engine_delay.as_millis() as u64;
                }

                // Offset is rescanned before every call: the previous engine
                // may have appended files to the same directory.
                let offset = count_images(&save_dir)?;
                match run_engine(engine.as_ref(), query, &save_dir, offset).await {
                    Disposition::Success => any_success = true,
                    Disposition::SkipQuery => {}
                    Disposition::SkipEra => {
                        warn!(era = %era.title, engine = engine.name(), "hard block, aborting era");
                        stats.aborted = true;
                        return Ok(stats);
                    }
                }
            }

            // One working engine satisfies the query. If both failed the
            // query stays unmarked and retries on the next run.
            if any_success {
                self.store.mark_done(checkpoint, &era_key, query);
                stats.queries_completed += 1;
                info!(query, "checkpoint saved");
            } else {
                stats.queries_failed += 1;
            }

            if position + 1 < queries.len() {
                let jitter = self.jitter.sample();
                info!(jitter_ms = jitter.as_millis() as u64, "jitter before next query");
                sleep(jitter).await;
                stats.total_sleep_ms += jitter.as_millis() as u64;
            }
        }

        info!(era = %era.title, completed = stats.queries_completed, "era complete");
        Ok(stats)
    }
}

/// Randomized delay between query cycles, drawn uniformly from the
/// configured interval.
#[derive(Debug, Clone)]
struct Jitter {
    range_secs: (f64, f64),
}

impl Jitter {
    fn new(range_secs: (f64, f64)) -> Self {
        Self { range_secs }
    }

    fn sample(&self) -> Duration {
        let (min, max) = self.range_secs;
        if max <= min {
            return Duration::from_secs_f64(min.max(0.0));
        }
        let secs = rand::thread_rng().gen_range(min..=max);
        Duration::from_secs_f64(secs)
    }
}
