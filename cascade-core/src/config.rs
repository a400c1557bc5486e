//! Executor configuration

use serde::{Deserialize, Serialize};

/// Settings for a single `run`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Worker threads for this run; `None` uses the process-wide pool.
    pub worker_threads: Option<usize>,
}

impl ExecutorConfig {
    /// Run on a dedicated pool of `threads` workers
    pub fn with_threads(threads: usize) -> Self {
        Self {
            worker_threads: Some(threads),
        }
    }
}
