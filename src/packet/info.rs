//! Packet kind and typed metadata

/// Type of media carried by a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PacketKind {
    /// Not yet classified (raw source data)
    #[default]
    Unknown,
    /// Audio samples
    Audio,
    /// Video frames
    Video,
    /// Subtitle data
    Subtitle,
    /// Anything else
    Other,
}

/// Sample encoding of audio payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioFormat {
    #[default]
    Unknown,
    /// Unsigned 8-bit PCM
    PcmUnsigned8,
    /// Unsigned little-endian PCM
    PcmUnsignedLe,
    /// Unsigned big-endian PCM
    PcmUnsignedBe,
    /// Signed little-endian PCM
    PcmSignedLe,
    /// Signed big-endian PCM
    PcmSignedBe,
    Other,
}

impl AudioFormat {
    /// PCM format for a RIFF/WAVE stream of the given sample width
    ///
    /// 8-bit WAVE samples are unsigned, wider samples are signed
    /// little-endian.
    pub fn from_wave_bits(bits_per_sample: u16) -> Self {
        if bits_per_sample == 8 {
            AudioFormat::PcmUnsigned8
        } else {
            AudioFormat::PcmSignedLe
        }
    }

    pub fn is_pcm(&self) -> bool {
        !matches!(self, AudioFormat::Unknown | AudioFormat::Other)
    }
}

/// Audio stream parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioInfo {
    /// Sample encoding
    pub format: AudioFormat,
    /// Number of interleaved channels
    pub channels: u32,
    /// Samples per second per channel
    pub sample_rate: u32,
    /// Width of a single sample
    pub bits_per_sample: u32,
}

impl AudioInfo {
    /// Bytes per second of payload
    pub fn byte_rate(&self) -> u64 {
        self.sample_rate as u64 * self.channels as u64 * self.bits_per_sample as u64 / 8
    }

    /// Bytes per interleaved sample frame
    pub fn block_align(&self) -> u32 {
        self.channels * self.bits_per_sample / 8
    }
}

/// Typed metadata attached to a packet
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PacketInfo {
    /// Audio stream parameters
    Audio(AudioInfo),
}

impl PacketInfo {
    /// Audio parameters, if this is audio metadata
    pub fn audio(&self) -> Option<&AudioInfo> {
        match self {
            PacketInfo::Audio(info) => Some(info),
        }
    }
}
