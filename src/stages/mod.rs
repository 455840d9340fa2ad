//! Built-in stages
//!
//! - [`FileSource`] (`source/file`): reads a local file in fixed-size chunks
//! - [`WaveDemux`] (`demux/wave`): strips the RIFF/WAVE container from PCM
//!   audio and tags packets with the stream format
//!
//! Both are registered by [`StageRegistry::new`](crate::stage::StageRegistry::new).

pub mod file;
pub mod wave;

pub use file::{FileSource, FileSourceConfig};
pub use wave::{WaveDemux, WaveFormat};
