//! Pipeline graph assembly
//!
//! A pipeline owns its stages, allocates the buffers behind every stage
//! output and wires stages together:
//!
//! ```text
//!   InputPipeline
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │ StageNode "source/file-0"          StageNode "demux/wave-0"  │
//!   │ ┌────────────┐  ┌──────────┐       ┌────────────┐  ┌───────┐ │
//!   │ │ FileSource │─►│ Buffer 0 │──────►│ WaveDemux  │─►│Buf. 0 │─┼─► consumer
//!   │ └────────────┘  └──────────┘       └────────────┘  └───────┘ │
//!   └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Buffers of source stages start as soon as the stage is added. Buffers of
//! any other stage start once the stage is connected to an upstream buffer.

pub mod config;
pub mod input;
pub mod node;

pub use config::PipelineConfig;
pub use input::{BufferFill, InputPipeline};
pub use node::StageNode;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::packet::Packet;

/// Common pipeline services
///
/// Every pipeline is the sole packet factory for the stages it owns and can
/// start or stop all of its buffers at once.
#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Pipeline identifier
    fn identifier(&self) -> &str;

    /// Allocate an empty packet
    fn alloc_packet(&self) -> Packet;

    /// Release a packet back to the pipeline
    fn free_packet(&self, packet: Packet);

    /// Start every buffer in the pipeline
    fn start(&self) -> Result<()> {
        Err(Error::NotImplemented("start"))
    }

    /// Stop every buffer in the pipeline
    async fn stop(&self) -> Result<()> {
        Err(Error::NotImplemented("stop"))
    }
}
