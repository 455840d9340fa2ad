//! Watermark-driven packet buffers
//!
//! A [`Buffer`] sits downstream of exactly one stage output and decouples
//! the stage from its consumers:
//!
//! ```text
//!            refill task                     consumer
//!   Stage ──get_packet()──► [ p p p p ] ──get_packet()──►
//!     ▲                        │    │
//!     │          count >= max ─┘    └─ count < min
//!     │            (suspend)            (resume)
//!     └──────────────────────────────────────┘
//! ```
//!
//! The refill task stops pulling once the queue reaches the high watermark
//! and resumes only after consumers drain it below the low watermark, so a
//! busy consumer does not cause one-packet refills around `max`.
//!
//! Packets move through the queue by value. A failed pull ends the refill
//! permanently; consumers drain what is left and then always get `None`.

pub mod config;
pub mod queue;
mod refill;
mod state;

pub use config::BufferConfig;
pub use queue::{Buffer, BufferState, BufferStats};
