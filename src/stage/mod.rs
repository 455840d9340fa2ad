//! Stages and their capability protocol
//!
//! A stage is a polymorphic processing unit: sources read data, demuxers
//! split containers, decoders, effects and encoders transform media. Each
//! stage declares an input and an output [`Interface`]; the pipeline only
//! wires stages whose interfaces line up.
//!
//! Stages are created by constructors registered in a [`StageRegistry`] and
//! are owned by the pipeline once added. Because several output buffers may
//! pull from the same stage, the pipeline shares a stage as a
//! [`SharedStage`].

pub mod interface;
pub mod registry;
pub mod traits;

pub use interface::Interface;
pub use registry::{StageConstructor, StageRegistry};
pub use traits::Stage;

use std::sync::Arc;

use tokio::sync::Mutex;

/// A stage shared between its pipeline node and its output buffers
pub type SharedStage = Arc<Mutex<Box<dyn Stage>>>;

/// Wrap a stage for sharing
pub fn shared(stage: Box<dyn Stage>) -> SharedStage {
    Arc::new(Mutex::new(stage))
}
