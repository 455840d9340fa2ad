//! Stage nodes
//!
//! A node keeps a stage together with the buffers fed by its outputs. It is
//! the unit of ownership and identity inside a pipeline.

use std::sync::Arc;

use tokio::sync::watch;

use crate::buffer::{Buffer, BufferConfig, BufferStats};
use crate::error::{Error, Result};
use crate::stage::{shared, Interface, SharedStage, Stage};

/// A stage and its output buffers
pub struct StageNode {
    identifier: String,
    name: String,
    input: Interface,
    output: Interface,
    /// Upstream buffer the stage is connected to, watched by the refill tasks
    upstream: watch::Sender<Option<Arc<Buffer>>>,
    /// Dropped before `stage`
    buffers: Vec<Arc<Buffer>>,
    stage: SharedStage,
}

impl StageNode {
    /// Wrap a stage, allocating one stopped buffer per output
    pub(crate) fn new(identifier: String, stage: Box<dyn Stage>, config: BufferConfig) -> Self {
        let name = stage.name().to_string();
        let input = stage.input_interface();
        let output = stage.output_interface();
        let outputs = stage.output_count();

        let stage = shared(stage);
        let (upstream, watcher) = watch::channel(None);
        let buffers = (0..outputs)
            .map(|index| {
                let buffer = Buffer::with_label(
                    Arc::clone(&stage),
                    index,
                    config,
                    format!("{}:{}", identifier, index),
                );
                Arc::new(buffer.with_upstream(watcher.clone()))
            })
            .collect();

        Self {
            identifier,
            name,
            input,
            output,
            upstream,
            buffers,
            stage,
        }
    }

    /// Pipeline-unique identifier (`name-ordinal`)
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Name reported by the stage
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_interface(&self) -> Interface {
        self.input
    }

    pub fn output_interface(&self) -> Interface {
        self.output
    }

    /// Whether this node originates data
    pub fn is_source(&self) -> bool {
        self.input == Interface::Source
    }

    pub fn stage(&self) -> &SharedStage {
        &self.stage
    }

    /// Upstream buffer the stage is currently connected to
    pub fn upstream(&self) -> Option<Arc<Buffer>> {
        self.upstream.borrow().clone()
    }

    /// Record a new upstream connection and wake the refill tasks
    pub(crate) fn set_upstream(&self, buffer: Arc<Buffer>) {
        self.upstream.send_replace(Some(buffer));
    }

    /// Number of output buffers
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Buffer fed by output `output`
    pub fn buffer(&self, output: usize) -> Result<&Arc<Buffer>> {
        self.buffers.get(output).ok_or_else(|| {
            Error::invalid(format!(
                "{} has {} output(s), index {} is out of range",
                self.identifier,
                self.buffers.len(),
                output
            ))
        })
    }

    pub fn buffers(&self) -> &[Arc<Buffer>] {
        &self.buffers
    }

    /// Start every output buffer, stopping at the first failure
    pub fn start_buffers(&self) -> Result<()> {
        for buffer in &self.buffers {
            buffer.start()?;
        }
        Ok(())
    }

    /// Whether any output buffer still has a refill task alive
    pub(crate) fn has_live_workers(&self) -> bool {
        self.buffers.iter().any(|b| b.has_live_worker())
    }

    /// Stop every output buffer and wait for the refill tasks to end
    pub async fn stop_buffers(&self) {
        for buffer in &self.buffers {
            buffer.stop().await;
        }
    }

    pub fn buffer_stats(&self) -> Vec<BufferStats> {
        self.buffers.iter().map(|b| b.stats()).collect()
    }
}

impl std::fmt::Debug for StageNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageNode")
            .field("identifier", &self.identifier)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("buffers", &self.buffers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::buffer::BufferState;

    struct Splitter;

    #[async_trait]
    impl Stage for Splitter {
        fn name(&self) -> &str {
            "demux/split"
        }

        fn input_interface(&self) -> Interface {
            Interface::Demux
        }

        fn output_interface(&self) -> Interface {
            Interface::Decode
        }

        fn output_count(&self) -> usize {
            3
        }
    }

    #[test]
    fn test_node_allocates_buffers() {
        let node = StageNode::new(
            "demux/split-0".to_string(),
            Box::new(Splitter),
            BufferConfig::default(),
        );

        assert_eq!(node.identifier(), "demux/split-0");
        assert_eq!(node.name(), "demux/split");
        assert_eq!(node.input_interface(), Interface::Demux);
        assert_eq!(node.output_interface(), Interface::Decode);
        assert!(!node.is_source());
        assert_eq!(node.buffer_count(), 3);

        for (index, buffer) in node.buffers().iter().enumerate() {
            assert_eq!(buffer.output(), index);
            assert_eq!(buffer.label(), format!("demux/split-0:{}", index));
            assert_eq!(buffer.state(), BufferState::Stopped);
        }
    }

    #[test]
    fn test_buffer_index_bounds() {
        let node = StageNode::new("s-0".to_string(), Box::new(Splitter), BufferConfig::default());

        assert!(node.buffer(2).is_ok());
        // The output count itself is already out of range
        assert!(matches!(node.buffer(3), Err(Error::InvalidArgument(_))));
        assert!(matches!(node.buffer(usize::MAX), Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_start_and_stop_buffers() {
        let node = StageNode::new("s-0".to_string(), Box::new(Splitter), BufferConfig::default());

        node.start_buffers().unwrap();
        for buffer in node.buffers() {
            assert_eq!(buffer.state(), BufferState::Running);
        }

        node.stop_buffers().await;
        for buffer in node.buffers() {
            assert_eq!(buffer.state(), BufferState::Stopped);
        }
        for stats in node.buffer_stats() {
            assert_eq!(stats.queued, 0);
        }
    }
}
