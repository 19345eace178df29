mod classify;
mod engine;
mod era;
mod error;
mod orchestrator;
mod runner;
mod stealth;

pub use classify::{classify, is_blocked, transport_class, Disposition, TransportClass};
pub use engine::{count_images, HttpImageEngine, ImageEngine, ImageSearchEngine};
pub use era::{EraProcessor, EraStats};
pub use error::{EngineError, EngineResult};
pub use orchestrator::{Orchestrator, OrchestratorError, RunSummary};
pub use runner::run_engine;
pub use stealth::{StealthHeaderPool, StealthHeaders};
