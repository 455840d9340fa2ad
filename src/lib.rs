//! Pull-based media pipeline
//!
//! Media flows through a chain of pluggable stages (source, demux, decode,
//! output, ...). Every stage output feeds a [`Buffer`](buffer::Buffer) whose
//! background task keeps it between a low and a high watermark, so that
//! consumers read packets with bounded latency and bounded memory.
//!
//! # Example
//! ```no_run
//! use media_pipeline::prelude::*;
//!
//! # async fn example() -> media_pipeline::Result<()> {
//! let registry = StageRegistry::new();
//! let mut pipeline = InputPipeline::new("player");
//!
//! let mut source = registry.create("source/file")?;
//! source.open_uri("song.wav").await?;
//! let source_id = pipeline.add_stage(source)?;
//! let demux_id = pipeline.add_stage(registry.create("demux/wave")?)?;
//!
//! // Sniff the container before wiring the demuxer up
//! let first = pipeline.buffer(&source_id, 0)?.peek_packet().await;
//! if let Some(packet) = first {
//!     pipeline.stage(&demux_id)?.lock().await.check(&packet);
//! }
//!
//! pipeline.connect(&demux_id, &source_id, 0).await?;
//!
//! let output = pipeline.buffer(&demux_id, 0)?;
//! while let Some(packet) = output.next_packet().await {
//!     println!("{} bytes of {:?}", packet.len(), packet.kind());
//!     pipeline.free_packet(packet);
//! }
//!
//! pipeline.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod error;
pub mod packet;
pub mod pipeline;
pub mod stage;
pub mod stages;

pub use error::{Error, Result};

/// Commonly used types
pub mod prelude {
    pub use crate::buffer::{Buffer, BufferConfig, BufferState};
    pub use crate::error::{Error, Result};
    pub use crate::packet::{AudioInfo, Packet, PacketFactory, PacketInfo, PacketKind};
    pub use crate::pipeline::{InputPipeline, Pipeline, PipelineConfig};
    pub use crate::stage::{Interface, SharedStage, Stage, StageRegistry};
}
