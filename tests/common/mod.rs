//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Once};

use async_trait::async_trait;
use media_pipeline::buffer::Buffer;
use media_pipeline::packet::{Packet, PacketFactory, PacketKind};
use media_pipeline::stage::{Interface, Stage};
use media_pipeline::{Error, Result};

static INIT: Once = Once::new();

/// Route library logs to the test output, filtered by `RUST_LOG`
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Source producing a fixed list of payloads, then `Exhausted`
pub struct ListSource {
    payloads: VecDeque<Vec<u8>>,
    factory: Option<PacketFactory>,
}

impl ListSource {
    pub fn boxed(payloads: &[&[u8]]) -> Box<dyn Stage> {
        Box::new(ListSource {
            payloads: payloads.iter().map(|p| p.to_vec()).collect(),
            factory: None,
        })
    }
}

#[async_trait]
impl Stage for ListSource {
    fn name(&self) -> &str {
        "source/list"
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

    async fn get_packet(&mut self, output: usize) -> Result<Packet> {
        self.check_output(output)?;
        let factory = self
            .factory
            .as_ref()
            .ok_or_else(|| Error::InvalidArgument("unbound".into()))?;
        let payload = self.payloads.pop_front().ok_or(Error::Exhausted)?;

        let mut packet = factory.alloc();
        packet.set_data(&payload)?;
        packet.set_kind(PacketKind::Other);
        Ok(packet)
    }
}

/// Demux forwarding upstream packets unchanged
#[derive(Default)]
pub struct PassThrough {
    upstream: Option<Arc<Buffer>>,
}

impl PassThrough {
    pub fn boxed() -> Box<dyn Stage> {
        Box::<PassThrough>::default()
    }
}

#[async_trait]
impl Stage for PassThrough {
    fn name(&self) -> &str {
        "demux/pass"
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

    fn connect(&mut self, upstream: Arc<Buffer>) -> Result<()> {
        self.upstream = Some(upstream);
        Ok(())
    }

    async fn get_packet(&mut self, output: usize) -> Result<Packet> {
        self.check_output(output)?;
        let upstream = self
            .upstream
            .as_ref()
            .ok_or_else(|| Error::InvalidArgument("not connected".into()))?;
        upstream.next_packet().await.ok_or(Error::Exhausted)
    }
}

/// Minimal PCM WAVE file with a 16-byte `fmt ` chunk
pub fn wav_bytes(channels: u16, sample_rate: u32, bits: u16, samples: &[u8]) -> Vec<u8> {
    let block_align = channels * bits / 8;
    let mut out = Vec::with_capacity(44 + samples.len());

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&((36 + samples.len()) as u32).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&(samples.len() as u32).to_le_bytes());
    out.extend_from_slice(samples);
    out
}
