//! Local file source

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::error::{Error, Result};
use crate::packet::{Packet, PacketFactory};
use crate::stage::{Interface, Stage};

/// Default number of bytes read per packet
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

const URI_SCHEME: &str = "file://";

/// File source options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSourceConfig {
    /// Maximum payload size of each produced packet
    pub chunk_size: usize,
}

impl Default for FileSourceConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl FileSourceConfig {
    /// Set the read size; values below one byte are raised to one
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }
}

/// Reads a file from disk as a stream of raw packets
///
/// Produces packets of up to `chunk_size` bytes with kind
/// [`Unknown`](crate::packet::PacketKind::Unknown) and reports
/// [`Error::Exhausted`] at end of file.
pub struct FileSource {
    config: FileSourceConfig,
    path: Option<PathBuf>,
    file: Option<File>,
    factory: Option<PacketFactory>,
    scratch: Vec<u8>,
}

impl FileSource {
    /// Registry kind
    pub const KIND: &'static str = "source/file";

    pub fn new() -> Self {
        Self::with_config(FileSourceConfig::default())
    }

    pub fn with_config(config: FileSourceConfig) -> Self {
        Self {
            scratch: vec![0; config.chunk_size],
            config,
            path: None,
            file: None,
            factory: None,
        }
    }

    pub fn config(&self) -> &FileSourceConfig {
        &self.config
    }

    /// Path of the open file, if any
    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }
}

impl Default for FileSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry constructor
pub fn create() -> Box<dyn Stage> {
    Box::new(FileSource::new())
}

#[async_trait]
impl Stage for FileSource {
    fn name(&self) -> &str {
        Self::KIND
    }

    fn input_interface(&self) -> Interface {
        Interface::Source
    }

    fn output_interface(&self) -> Interface {
        Interface::Demux
    }

    fn output_count(&self) -> usize {
        1
    }

    fn bind(&mut self, factory: PacketFactory) {
        self.factory = Some(factory);
    }

    /// Open a local path, optionally prefixed with `file://`
    async fn open_uri(&mut self, uri: &str) -> Result<()> {
        if self.file.is_some() {
            return Err(Error::invalid(format!(
                "{} already has a file open",
                Self::KIND
            )));
        }

        let path = PathBuf::from(uri.strip_prefix(URI_SCHEME).unwrap_or(uri));
        let file = File::open(&path).await.map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Failed to open file");
            e
        })?;

        tracing::info!(path = %path.display(), "Opened file for reading");

        self.file = Some(file);
        self.path = Some(path);
        Ok(())
    }

    async fn get_packet(&mut self, output: usize) -> Result<Packet> {
        self.check_output(output)?;

        let (Some(file), Some(factory)) = (self.file.as_mut(), self.factory.as_ref()) else {
            return Err(Error::invalid(format!(
                "{} must be opened and bound before reading",
                Self::KIND
            )));
        };

        let read = file.read(&mut self.scratch).await?;
        if read == 0 {
            return Err(Error::Exhausted);
        }

        let mut packet = factory.alloc();
        if let Err(e) = packet.set_data(&self.scratch[..read]) {
            factory.free(packet);
            return Err(e);
        }
        Ok(packet)
    }
}
