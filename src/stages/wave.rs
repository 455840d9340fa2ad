//! RIFF/WAVE demuxer
//!
//! WAVE files are a RIFF container holding a list of chunks:
//!
//! ```text
//! +------+------+------+------------------+------------------+-----
//! | RIFF | size | WAVE | "fmt " size body | "fact" size body | "data" size samples...
//! +------+------+------+------------------+------------------+-----
//!    4      4      4
//! ```
//!
//! All integers are little-endian. Chunk bodies are padded to an even
//! length. Only uncompressed PCM (`fmt ` format tag 1) is supported.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Buf;

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::packet::{AudioFormat, AudioInfo, Packet, PacketFactory, PacketInfo, PacketKind};
use crate::stage::{Interface, Stage};

const RIFF_HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;
const FMT_PCM_LEN: usize = 16;
const FMT_EXTENDED_LEN: usize = 18;
const FORMAT_PCM: u16 = 1;

/// Stream parameters read from a WAVE header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveFormat {
    /// Sample layout of the `data` chunk
    pub info: AudioInfo,
    /// Offset of the first sample byte from the start of the file
    pub data_offset: usize,
    /// Length of the `data` chunk body in bytes
    pub data_len: u32,
}

fn invalid_data(msg: impl Into<String>) -> Error {
    Error::InvalidData(msg.into())
}

fn take_id(buf: &mut &[u8]) -> [u8; 4] {
    let mut id = [0u8; 4];
    buf.copy_to_slice(&mut id);
    id
}

/// Parse a `fmt ` chunk body
fn parse_fmt(body: &[u8], size: usize) -> Result<AudioInfo> {
    if size != FMT_PCM_LEN && size != FMT_EXTENDED_LEN {
        return Err(invalid_data(format!("unexpected fmt chunk size {}", size)));
    }
    if body.len() < FMT_PCM_LEN {
        return Err(invalid_data("truncated fmt chunk"));
    }

    let mut buf = &body[..FMT_PCM_LEN];
    let format = buf.get_u16_le();
    let channels = buf.get_u16_le();
    let sample_rate = buf.get_u32_le();
    let _byte_rate = buf.get_u32_le();
    let _block_align = buf.get_u16_le();
    let bits_per_sample = buf.get_u16_le();

    if format != FORMAT_PCM {
        return Err(invalid_data(format!("unsupported format tag {}", format)));
    }
    if channels == 0 || bits_per_sample == 0 {
        return Err(invalid_data("fmt chunk declares an empty sample layout"));
    }

    Ok(AudioInfo {
        format: AudioFormat::from_wave_bits(bits_per_sample),
        channels: u32::from(channels),
        sample_rate,
        bits_per_sample: u32::from(bits_per_sample),
    })
}

/// Parse a WAVE header up to the start of the `data` chunk
///
/// `data` must hold everything from the `RIFF` magic to the `data` chunk
/// header; the samples themselves may be cut short.
pub fn parse_header(data: &[u8]) -> Result<WaveFormat> {
    let mut buf = data;
    if buf.remaining() < RIFF_HEADER_LEN {
        return Err(invalid_data("truncated RIFF header"));
    }

    let riff = take_id(&mut buf);
    let _riff_size = buf.get_u32_le();
    let wave = take_id(&mut buf);
    if &riff != b"RIFF" || &wave != b"WAVE" {
        return Err(invalid_data("not a RIFF/WAVE stream"));
    }

    let mut info = None;

    while buf.remaining() >= CHUNK_HEADER_LEN {
        let id = take_id(&mut buf);
        let size = buf.get_u32_le() as usize;

        match &id {
            b"fmt " => {
                if info.is_none() {
                    info = Some(parse_fmt(buf, size)?);
                } else {
                    tracing::debug!("Ignoring repeated fmt chunk");
                }
            }
            b"data" => {
                let info = info.ok_or_else(|| invalid_data("data chunk before fmt chunk"))?;
                return Ok(WaveFormat {
                    info,
                    data_offset: data.len() - buf.remaining(),
                    data_len: size as u32,
                });
            }
            b"fact" => {}
            _ => {
                tracing::warn!(
                    chunk = %String::from_utf8_lossy(&id),
                    size = size,
                    "Skipping unknown chunk"
                );
            }
        }

        let padded = size
            .checked_add(size & 1)
            .ok_or_else(|| invalid_data("chunk size overflows"))?;
        if buf.remaining() < padded {
            return Err(invalid_data("chunk list extends past the first packet"));
        }
        buf.advance(padded);
    }

    Err(invalid_data("no data chunk found"))
}

/// Demultiplexes PCM audio out of a RIFF/WAVE stream
///
/// The first packet read from upstream has the header stripped; every
/// produced packet is tagged [`PacketKind::Audio`] with the stream's
/// [`AudioInfo`]. Production ends with the `data` chunk, so trailing
/// metadata chunks are never forwarded.
#[derive(Default)]
pub struct WaveDemux {
    upstream: Option<Arc<Buffer>>,
    factory: Option<PacketFactory>,
    format: Option<WaveFormat>,
    packets: u64,
    remaining: usize,
}

impl WaveDemux {
    /// Registry kind
    pub const KIND: &'static str = "demux/wave";

    pub const MIME_TYPE: &'static str = "audio/wav";

    pub fn new() -> Self {
        Self::default()
    }

    /// Format recorded by the last successful `check`
    pub fn format(&self) -> Option<&WaveFormat> {
        self.format.as_ref()
    }

    /// Packets produced so far
    pub fn packet_count(&self) -> u64 {
        self.packets
    }

    fn release(&self, packet: Packet) {
        if let Some(factory) = &self.factory {
            factory.free(packet);
        }
    }

    /// Turn the first upstream packet into a payload-only packet
    fn strip_header(&mut self, packet: Packet) -> Result<(Packet, WaveFormat)> {
        let format = match self.format {
            Some(format) => format,
            None => match parse_header(packet.data()) {
                Ok(format) => {
                    self.format = Some(format);
                    format
                }
                Err(e) => {
                    self.release(packet);
                    return Err(e);
                }
            },
        };

        self.remaining = format.data_len as usize;

        let Some(factory) = &self.factory else {
            let mut packet = packet;
            packet.advance(format.data_offset);
            return Ok((packet, format));
        };

        let mut stripped = factory.alloc();
        let payload = packet.data().get(format.data_offset..).unwrap_or_default();
        let copied = stripped.set_data(payload);
        factory.free(packet);

        match copied {
            Ok(()) => Ok((stripped, format)),
            Err(e) => {
                factory.free(stripped);
                Err(e)
            }
        }
    }
}

/// Registry constructor
pub fn create() -> Box<dyn Stage> {
    Box::new(WaveDemux::new())
}

#[async_trait]
impl Stage for WaveDemux {
    fn name(&self) -> &str {
        Self::KIND
    }

    fn input_interface(&self) -> Interface {
        Interface::Demux
    }

    fn output_interface(&self) -> Interface {
        Interface::Output
    }

    fn output_count(&self) -> usize {
        1
    }

    fn input_mime_type(&self) -> &str {
        Self::MIME_TYPE
    }

    fn bind(&mut self, factory: PacketFactory) {
        self.factory = Some(factory);
    }

    fn check(&mut self, packet: &Packet) -> bool {
        match parse_header(packet.data()) {
            Ok(format) => {
                tracing::info!(
                    channels = format.info.channels,
                    sample_rate = format.info.sample_rate,
                    bits = format.info.bits_per_sample,
                    data_offset = format.data_offset,
                    data_len = format.data_len,
                    "Recognised WAVE stream"
                );
                self.format = Some(format);
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "Not a WAVE stream");
                false
            }
        }
    }

    fn connect(&mut self, upstream: Arc<Buffer>) -> Result<()> {
        self.upstream = Some(upstream);
        Ok(())
    }

    async fn get_packet(&mut self, output: usize) -> Result<Packet> {
        self.check_output(output)?;

        let upstream = self
            .upstream
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| Error::invalid(format!("{} is not connected", Self::KIND)))?;

        if self.packets > 0 && self.remaining == 0 {
            return Err(Error::Exhausted);
        }

        let packet = upstream
            .get_packet(false, true)
            .await
            .ok_or(Error::Exhausted)?;

        let (mut packet, format) = match (self.format, self.packets) {
            (Some(format), 1..) => (packet, format),
            _ => self.strip_header(packet)?,
        };

        let keep = packet.len().min(self.remaining);
        packet.truncate(keep);
        self.remaining -= keep;

        packet.set_kind(PacketKind::Audio);
        packet.set_info(PacketInfo::Audio(format.info));
        self.packets += 1;

        if self.remaining == 0 {
            tracing::debug!(packets = self.packets, "Reached end of WAVE data");
        }

        Ok(packet)
    }
}
