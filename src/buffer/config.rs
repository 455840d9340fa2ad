//! Buffer watermark configuration

use crate::error::{Error, Result};

/// Default low watermark
pub const DEFAULT_MIN: usize = 5;

/// Default high watermark
pub const DEFAULT_MAX: usize = 10;

/// Low/high watermarks of a buffer
///
/// The refill task suspends once the queue holds `max` packets and resumes
/// only after consumers have drained it below `min`. A config can only be
/// built with `0 < min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    min: usize,
    max: usize,
}

impl BufferConfig {
    /// Create a config, validating the watermarks
    pub fn new(min: usize, max: usize) -> Result<Self> {
        if min < 1 || max < 1 {
            return Err(Error::invalid(format!(
                "watermarks must be at least 1 (min={}, max={})",
                min, max
            )));
        }
        if max < min {
            return Err(Error::invalid(format!(
                "max watermark {} is below min watermark {}",
                max, min
            )));
        }

        Ok(Self { min, max })
    }

    /// Low watermark: refill resumes below this count
    pub fn min(&self) -> usize {
        self.min
    }

    /// High watermark: refill suspends at this count
    pub fn max(&self) -> usize {
        self.max
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN,
            max: DEFAULT_MAX,
        }
    }
}
