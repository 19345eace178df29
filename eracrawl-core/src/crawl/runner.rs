use std::path::Path;

use tracing::{error, info, warn};

use super::classify::{classify, is_blocked, transport_class, Disposition, TransportClass};
use super::engine::ImageEngine;

/// Executes one engine for a single query and maps the raw outcome onto the
/// three dispositions the era loop acts on. Every outcome is logged with
/// engine name, query, and disposition before returning.
pub async fn run_engine(
    engine: &dyn ImageEngine,
    query: &str,
    target_dir: &Path,
    offset: usize,
) -> Disposition {
    match engine.fetch(query, target_dir, offset).await {
        Ok(0) => {
            // A clean call that produced nothing must not mark the query
            // done: "done" guarantees at least one image exists.
            warn!(
                engine = engine.name(),
                query,
                disposition = %Disposition::SkipQuery,
                "no images fetched"
            );
            Disposition::SkipQuery
        }
        Ok(count) => {
            info!(
                engine = engine.name(),
                query,
                images = count,
                disposition = %Disposition::Success,
                "fetch ok"
            );
            Disposition::Success
        }
        Err(err) => {
            let disposition = classify(&err);
            match (transport_class(&err), disposition) {
                (TransportClass::Other, Disposition::SkipEra) => {
                    warn!(
                        engine = engine.name(),
                        query,
                        error = %err,
                        disposition = %disposition,
                        "blocked (403/429), skipping entire era"
                    );
                }
                (TransportClass::Connectivity, _) if is_blocked(&err.to_string()) => {
                    warn!(
                        engine = engine.name(),
                        query,
                        error = %err,
                        disposition = %disposition,
                        "blocked (403/429), skipping query"
                    );
                }
                (TransportClass::Connectivity, _) => {
                    error!(
                        engine = engine.name(),
                        query,
                        error = %err,
                        disposition = %disposition,
                        "network/timeout error, skipping query"
                    );
                }
                _ => {
                    error!(
                        engine = engine.name(),
                        query,
                        error = %err,
                        disposition = %disposition,
                        "unexpected error, skipping query"
                    );
                }
            }
            disposition
        }
    }
}
