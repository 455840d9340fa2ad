//! Media packets
//!
//! A [`Packet`] is the unit of data moving between stages. It owns its
//! payload exclusively: cloning a packet copies the bytes, and packets move
//! by value from the producing stage, through a buffer, to the consumer.
//!
//! Packets can only be created through the pipeline's [`PacketFactory`]
//! (or by cloning an existing packet), so that payload allocations can be
//! recycled.

pub mod info;
pub mod pool;

pub use info::{AudioFormat, AudioInfo, PacketInfo, PacketKind};
pub use pool::{PacketFactory, PoolStats};

use bytes::Bytes;

use crate::error::{Error, Result};

/// A unit of media data
///
/// Obtained from [`PacketFactory::alloc`]; there is no public constructor.
///
/// ```compile_fail
/// let packet = media_pipeline::packet::Packet::new();
/// ```
///
/// ```compile_fail
/// let packet: media_pipeline::packet::Packet = Default::default();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    kind: PacketKind,
    info: Option<PacketInfo>,
    data: Vec<u8>,
}

impl Packet {
    /// Create an empty packet of unknown kind
    pub(crate) fn new() -> Self {
        Self {
            kind: PacketKind::Unknown,
            info: None,
            data: Vec::new(),
        }
    }

    /// Create a packet holding a copy of `data`
    pub(crate) fn with_data(data: &[u8], kind: PacketKind) -> Self {
        Self {
            kind,
            info: None,
            data: data.to_vec(),
        }
    }

    /// Reuse an existing allocation as an empty packet
    pub(crate) fn from_storage(mut storage: Vec<u8>) -> Self {
        storage.clear();
        Self {
            kind: PacketKind::Unknown,
            info: None,
            data: storage,
        }
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: PacketKind) {
        self.kind = kind;
    }

    pub fn info(&self) -> Option<&PacketInfo> {
        self.info.as_ref()
    }

    pub fn set_info(&mut self, info: PacketInfo) {
        self.info = Some(info);
    }

    pub fn take_info(&mut self) -> Option<PacketInfo> {
        self.info.take()
    }

    /// Payload bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Replace the payload with a copy of `data`
    ///
    /// Fails with [`Error::OutOfMemory`] if the payload cannot be reserved;
    /// the packet is left empty in that case.
    pub fn set_data(&mut self, data: &[u8]) -> Result<()> {
        self.data.clear();
        self.data
            .try_reserve(data.len())
            .map_err(|_| Error::OutOfMemory)?;
        self.data.extend_from_slice(data);
        Ok(())
    }

    /// Drop the first `n` payload bytes
    pub fn advance(&mut self, n: usize) {
        let n = n.min(self.data.len());
        self.data.drain(..n);
    }

    /// Shorten the payload to `len` bytes
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    /// Consume the packet, returning its payload as shareable [`Bytes`]
    pub fn freeze(self) -> Bytes {
        Bytes::from(self.data)
    }

    pub(crate) fn into_storage(self) -> Vec<u8> {
        self.data
    }
}
