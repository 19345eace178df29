use rand::seq::SliceRandom;

use super::error::{EngineError, EngineResult};

/// Request-shaping identity for one engine invocation. Re-rolled on every
/// call, never reused for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct StealthHeaders {
    pub user_agent: String,
    pub accept_language: String,
    pub referer: String,
}

/// Pool of realistic browser identity strings. Construction fails on an
/// empty pool so an adapter can never silently run without header injection.
#[derive(Debug, Clone)]
pub struct StealthHeaderPool {
    user_agents: Vec<String>,
}

impl StealthHeaderPool {
    pub fn new(user_agents: Vec<String>) -> EngineResult<Self> {
        if user_agents.is_empty() {
            return Err(EngineError::Configuration(
                "stealth user-agent pool is empty".to_string(),
            ));
        }
        Ok(Self { user_agents })
    }

    pub fn headers(&self, referer: &str, accept_language: &str) -> StealthHeaders {
        let mut rng = rand::thread_rng();
        let user_agent = self
            .user_agents
            .choose(&mut rng)
            .cloned()
            .unwrap_or_default();
        StealthHeaders {
            user_agent,
            accept_language: accept_language.to_string(),
            referer: referer.to_string(),
        }
    }
}
