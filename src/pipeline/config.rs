//! Pipeline configuration

use crate::buffer::BufferConfig;
use crate::packet::pool::DEFAULT_POOL_CAPACITY;

/// Pipeline configuration options
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Pipeline identifier, used in log output
    pub identifier: String,

    /// Watermarks given to every buffer the pipeline allocates
    pub buffer: BufferConfig,

    /// Number of freed packet allocations kept for reuse (0 = no pooling)
    pub pool_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            identifier: "pipeline".to_string(),
            buffer: BufferConfig::default(),
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

impl PipelineConfig {
    /// Create a default config with the given identifier
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Default::default()
        }
    }

    /// Set the default buffer watermarks
    pub fn buffer(mut self, config: BufferConfig) -> Self {
        self.buffer = config;
        self
    }

    /// Set the packet pool capacity
    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    /// Disable packet recycling
    pub fn disable_pool(mut self) -> Self {
        self.pool_capacity = 0;
        self
    }
}
