//! Stage interface kinds
//!
//! Interfaces name the position a stage occupies in the conceptual chain
//!
//! ```text
//! SOURCE → DEMUX → DECODE → OUTPUT → EFFECT → ENCODE → MUX → SINK
//! ```
//!
//! A stage declares the interface it accepts and the one it offers. A
//! downstream stage may only read from an upstream stage whose output
//! interface equals its own input interface.

use std::fmt;

/// Position of a stage in the processing chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Interface {
    /// No declared interface
    #[default]
    None,
    /// Originates data; has no upstream
    Source,
    /// Splits a container into elementary streams
    Demux,
    /// Decodes compressed streams
    Decode,
    /// Raw output ready for presentation
    Output,
    /// Transforms raw media
    Effect,
    /// Compresses raw media
    Encode,
    /// Packs streams into a container
    Mux,
    /// Terminal consumer
    Sink,
}

impl Interface {
    /// All interfaces in chain order
    pub const CHAIN: [Interface; 8] = [
        Interface::Source,
        Interface::Demux,
        Interface::Decode,
        Interface::Output,
        Interface::Effect,
        Interface::Encode,
        Interface::Mux,
        Interface::Sink,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interface::None => "none",
            Interface::Source => "source",
            Interface::Demux => "demux",
            Interface::Decode => "decode",
            Interface::Output => "output",
            Interface::Effect => "effect",
            Interface::Encode => "encode",
            Interface::Mux => "mux",
            Interface::Sink => "sink",
        }
    }

    /// Whether a stage consuming `self` can read from a stage producing
    /// `upstream_output`
    pub fn accepts(&self, upstream_output: Interface) -> bool {
        *self != Interface::None && *self != Interface::Source && *self == upstream_output
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
