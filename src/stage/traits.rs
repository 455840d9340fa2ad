//! The stage capability trait

use std::sync::Arc;

use async_trait::async_trait;

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::packet::{Packet, PacketFactory};

use super::interface::Interface;

/// A processing unit in a pipeline
///
/// Every capability has a safe default so that generic pipeline code can
/// call any method on any stage. Implementations override what they support
/// and report the rest as [`Error::NotImplemented`].
///
/// # Example
/// ```no_run
/// use async_trait::async_trait;
/// use media_pipeline::error::{Error, Result};
/// use media_pipeline::packet::{Packet, PacketFactory};
/// use media_pipeline::stage::{Interface, Stage};
///
/// struct Silence {
///     remaining: usize,
///     factory: Option<PacketFactory>,
/// }
///
/// #[async_trait]
/// impl Stage for Silence {
///     fn name(&self) -> &str {
///         "source/silence"
///     }
///
///     fn input_interface(&self) -> Interface {
///         Interface::Source
///     }
///
///     fn output_interface(&self) -> Interface {
///         Interface::Output
///     }
///
///     fn output_count(&self) -> usize {
///         1
///     }
///
///     fn bind(&mut self, factory: PacketFactory) {
///         self.factory = Some(factory);
///     }
///
///     async fn get_packet(&mut self, output: usize) -> Result<Packet> {
///         self.check_output(output)?;
///         let factory = self
///             .factory
///             .as_ref()
///             .ok_or_else(|| Error::InvalidArgument("not bound to a pipeline".into()))?;
///         if self.remaining == 0 {
///             return Err(Error::Exhausted);
///         }
///         self.remaining -= 1;
///
///         let mut packet = factory.alloc();
///         packet.set_data(&[0u8; 256])?;
///         Ok(packet)
///     }
/// }
/// ```
#[async_trait]
pub trait Stage: Send + 'static {
    /// Stable, human-readable stage name (e.g. `"source/file"`)
    fn name(&self) -> &str;

    /// Interface this stage consumes
    fn input_interface(&self) -> Interface {
        Interface::None
    }

    /// Interface this stage produces
    fn output_interface(&self) -> Interface {
        Interface::None
    }

    /// Number of independent output streams
    fn output_count(&self) -> usize {
        0
    }

    /// Cheap format sniff: does this stage recognise the packet?
    fn check(&mut self, _packet: &Packet) -> bool {
        false
    }

    /// Produce the next packet for output `output`
    ///
    /// Returns [`Error::Exhausted`] (or an I/O error) once nothing more can
    /// be produced; the calling buffer never retries after a failure.
    async fn get_packet(&mut self, _output: usize) -> Result<Packet> {
        Err(Error::NotImplemented("get_packet"))
    }

    /// Bind this stage's input to an upstream buffer
    ///
    /// Source stages originate data and always reject this.
    fn connect(&mut self, _upstream: Arc<Buffer>) -> Result<()> {
        if self.input_interface() == Interface::Source {
            Err(Error::invalid(format!(
                "{} is a source and cannot be connected upstream",
                self.name()
            )))
        } else {
            Err(Error::NotImplemented("connect"))
        }
    }

    /// Receive the packet factory of the owning pipeline
    fn bind(&mut self, _factory: PacketFactory) {}

    /// Open a resource by URI (source stages)
    async fn open_uri(&mut self, _uri: &str) -> Result<()> {
        Err(Error::NotImplemented("open_uri"))
    }

    /// MIME type of the accepted input, empty if unspecified
    fn input_mime_type(&self) -> &str {
        ""
    }

    /// Validate an output index against [`Stage::output_count`]
    fn check_output(&self, output: usize) -> Result<()> {
        if output >= self.output_count() {
            return Err(Error::invalid(format!(
                "{} has {} output(s), index {} is out of range",
                self.name(),
                self.output_count(),
                output
            )));
        }
        Ok(())
    }
}
