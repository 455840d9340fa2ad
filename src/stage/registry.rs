//! Registry of stage constructors
//!
//! Stage plugins expose a single no-argument constructor returning a fresh
//! instance. The registry maps a stage-kind identifier to that constructor
//! and is populated with the built-in stages at startup; additional kinds
//! can be registered by the embedding application.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::stages;

use super::traits::Stage;

/// Constructor producing a new stage instance per call
pub type StageConstructor = fn() -> Box<dyn Stage>;

/// Map from stage kind to constructor
pub struct StageRegistry {
    constructors: HashMap<String, StageConstructor>,
}

impl StageRegistry {
    /// Create a registry with the built-in stages registered
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register(stages::FileSource::KIND, stages::file::create);
        registry.register(stages::WaveDemux::KIND, stages::wave::create);

        registry
    }

    /// Create a registry with nothing registered
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Register a constructor, replacing any previous one for `kind`
    pub fn register(&mut self, kind: &str, constructor: StageConstructor) {
        if self
            .constructors
            .insert(kind.to_string(), constructor)
            .is_some()
        {
            tracing::debug!(kind = kind, "Stage constructor replaced");
        }
    }

    /// Construct a new stage of the given kind
    pub fn create(&self, kind: &str) -> Result<Box<dyn Stage>> {
        let constructor = self
            .constructors
            .get(kind)
            .ok_or_else(|| Error::not_found(format!("stage kind {}", kind)))?;

        Ok(constructor())
    }

    /// Check whether a stage kind is registered
    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// All registered kinds, sorted
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.constructors.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
