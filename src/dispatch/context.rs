//! Execution context shared by the dispatcher and every handler.

use std::sync::Arc;

use crate::config::Config;
use crate::llm::LlmClient;

/// Shared context passed to handlers during execution.
///
/// Holds no per-request state; one value serves every request.
#[derive(Clone)]
pub struct DispatchContext {
    /// Application configuration
    pub config: Arc<Config>,

    /// Client for every remote model capability
    pub llm: Arc<dyn LlmClient>,
}

impl DispatchContext {
    pub fn new(config: Arc<Config>, llm: Arc<dyn LlmClient>) -> Self {
        Self { config, llm }
    }
}
