//! Input pipeline implementation
//!
//! Holds the ordered list of stage nodes, generates their identifiers and
//! connects them.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::packet::{Packet, PacketFactory, PoolStats};
use crate::stage::{SharedStage, Stage};

use super::config::PipelineConfig;
use super::node::StageNode;
use super::Pipeline;

/// Fill level of one buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferFill {
    /// Identifier of the producing stage
    pub stage: String,
    /// Output index
    pub output: usize,
    /// Packets queued
    pub queued: usize,
}

/// A pipeline reading media from sources through chained stages
///
/// # Example
/// ```no_run
/// use media_pipeline::pipeline::{InputPipeline, Pipeline};
/// use media_pipeline::stage::StageRegistry;
///
/// # async fn example() -> media_pipeline::error::Result<()> {
/// let registry = StageRegistry::new();
/// let mut pipeline = InputPipeline::new("player");
///
/// let mut source = registry.create("source/file")?;
/// source.open_uri("song.wav").await?;
/// let source_id = pipeline.add_stage(source)?;
/// let demux_id = pipeline.add_stage(registry.create("demux/wave")?)?;
///
/// pipeline.connect(&demux_id, &source_id, 0).await?;
///
/// let output = pipeline.buffer(&demux_id, 0)?;
/// while let Some(packet) = output.get_packet(false, true).await {
///     // play packet.data()
///     pipeline.free_packet(packet);
/// }
/// pipeline.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct InputPipeline {
    config: PipelineConfig,
    factory: PacketFactory,
    nodes: Vec<StageNode>,
}

impl InputPipeline {
    /// Create an empty pipeline with default configuration
    pub fn new(identifier: impl Into<String>) -> Self {
        Self::with_config(PipelineConfig::new(identifier))
    }

    /// Create an empty pipeline with custom configuration
    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            factory: PacketFactory::with_capacity(config.pool_capacity),
            config,
            nodes: Vec::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Handle to this pipeline's packet factory
    pub fn factory(&self) -> &PacketFactory {
        &self.factory
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.factory.stats()
    }

    /// Add a stage and take ownership of it
    ///
    /// Allocates one buffer per stage output and, for source stages, starts
    /// them right away. Returns the generated identifier: the stage name
    /// followed by the number of stages with that name added before it.
    pub fn add_stage(&mut self, mut stage: Box<dyn Stage>) -> Result<String> {
        stage.bind(self.factory.clone());

        let ordinal = self
            .nodes
            .iter()
            .filter(|node| node.name() == stage.name())
            .count();
        let identifier = format!("{}-{}", stage.name(), ordinal);

        let node = StageNode::new(identifier.clone(), stage, self.config.buffer);

        if node.is_source() {
            node.start_buffers()?;
        }

        tracing::info!(
            pipeline = %self.config.identifier,
            stage = %identifier,
            input = %node.input_interface(),
            output = %node.output_interface(),
            outputs = node.buffer_count(),
            started = node.is_source(),
            "Stage added"
        );

        self.nodes.push(node);
        Ok(identifier)
    }

    /// Connect the input of `downstream` to output `output` of `upstream`
    ///
    /// The upstream stage's output interface must match the downstream
    /// stage's input interface. On success every buffer of the downstream
    /// stage is started. A failure part way leaves already started buffers
    /// running.
    ///
    /// Reconnecting a running stage is allowed: its refill tasks only hold
    /// the stage lock while upstream data is available, and switch to the
    /// new upstream buffer on their next pull.
    pub async fn connect(&self, downstream: &str, upstream: &str, output: usize) -> Result<()> {
        let down = self.node(downstream)?;
        let up = self.node(upstream)?;

        if downstream == upstream {
            return Err(Error::invalid(format!(
                "cannot connect {} to itself",
                downstream
            )));
        }

        let buffer = Arc::clone(up.buffer(output)?);

        if !down.input_interface().accepts(up.output_interface()) {
            return Err(Error::invalid(format!(
                "{} accepts {} input but {} produces {}",
                downstream,
                down.input_interface(),
                upstream,
                up.output_interface()
            )));
        }

        down.stage().lock().await.connect(Arc::clone(&buffer))?;
        down.set_upstream(buffer);
        down.start_buffers()?;

        tracing::info!(
            pipeline = %self.config.identifier,
            downstream = %downstream,
            upstream = %upstream,
            output = output,
            "Stages connected"
        );

        Ok(())
    }

    /// Buffer fed by output `output` of stage `stage`
    pub fn buffer(&self, stage: &str, output: usize) -> Result<Arc<Buffer>> {
        self.node(stage)?.buffer(output).map(Arc::clone)
    }

    /// Shared handle to a stage, e.g. to sniff a packet with `check`
    pub fn stage(&self, identifier: &str) -> Result<SharedStage> {
        self.node(identifier).map(|node| Arc::clone(node.stage()))
    }

    pub fn node(&self, identifier: &str) -> Result<&StageNode> {
        self.nodes
            .iter()
            .find(|node| node.identifier() == identifier)
            .ok_or_else(|| Error::not_found(format!("stage {}", identifier)))
    }

    /// Identifiers of all stages, in insertion order
    pub fn identifiers(&self) -> Vec<&str> {
        self.nodes.iter().map(|node| node.identifier()).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Fill level of every buffer, in stage insertion order
    pub fn fill_levels(&self) -> Vec<BufferFill> {
        self.nodes
            .iter()
            .flat_map(|node| {
                node.buffers().iter().map(move |buffer| BufferFill {
                    stage: node.identifier().to_string(),
                    output: buffer.output(),
                    queued: buffer.count(),
                })
            })
            .collect()
    }

    /// Stop every buffer, then drop the stages in insertion order
    pub async fn shutdown(mut self) {
        for node in &self.nodes {
            node.stop_buffers().await;
        }

        tracing::info!(
            pipeline = %self.config.identifier,
            stages = self.nodes.len(),
            "Pipeline shut down"
        );

        self.nodes.clear();
    }
}

#[async_trait]
impl Pipeline for InputPipeline {
    fn identifier(&self) -> &str {
        &self.config.identifier
    }

    fn alloc_packet(&self) -> Packet {
        self.factory.alloc()
    }

    fn free_packet(&self, packet: Packet) {
        self.factory.free(packet);
    }

    /// Start every buffer of every stage, stopping at the first failure
    fn start(&self) -> Result<()> {
        for node in &self.nodes {
            node.start_buffers()?;
        }
        Ok(())
    }

    /// Stop every buffer of every stage
    async fn stop(&self) -> Result<()> {
        for node in &self.nodes {
            node.stop_buffers().await;
        }
        Ok(())
    }
}

impl Drop for InputPipeline {
    /// Stop the refill tasks before the stages are dropped
    ///
    /// On a multi-thread runtime this blocks until every in-flight pull has
    /// returned. Elsewhere the tasks are only aborted, so [`shutdown`] is the
    /// way to guarantee no stage outlives the pipeline.
    ///
    /// [`shutdown`]: InputPipeline::shutdown
    fn drop(&mut self) {
        if !self.nodes.iter().any(|node| node.has_live_workers()) {
            return;
        }

        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                let nodes = &self.nodes;
                tokio::task::block_in_place(|| {
                    handle.block_on(async {
                        for node in nodes {
                            node.stop_buffers().await;
                        }
                    })
                });

                tracing::debug!(
                    pipeline = %self.config.identifier,
                    "Pipeline dropped, refill tasks stopped"
                );
            }
            _ => {
                tracing::warn!(
                    pipeline = %self.config.identifier,
                    "Pipeline dropped with running buffers; use shutdown() to wait for them"
                );
            }
        }
    }
}

impl std::fmt::Debug for InputPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputPipeline")
            .field("identifier", &self.config.identifier)
            .field("nodes", &self.nodes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::buffer::{BufferConfig, BufferState};
    use crate::packet::PacketKind;
    use crate::stage::Interface;

    /// Emits a fixed list of payloads, then reports exhaustion
    struct Chunks {
        chunks: VecDeque<&'static [u8]>,
        factory: Option<PacketFactory>,
    }

    impl Chunks {
        fn boxed(chunks: &[&'static [u8]]) -> Box<dyn Stage> {
            Box::new(Chunks {
                chunks: chunks.iter().copied().collect(),
                factory: None,
            })
        }
    }

    #[async_trait]
    impl Stage for Chunks {
        fn name(&self) -> &str {
            "source/chunks"
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
            let chunk = self.chunks.pop_front().ok_or(Error::Exhausted)?;
            let mut packet = match &self.factory {
                Some(factory) => factory.alloc(),
                None => Packet::new(),
            };
            packet.set_data(chunk)?;
            packet.set_kind(PacketKind::Other);
            Ok(packet)
        }
    }

    /// Forwards packets from its upstream buffer unchanged
    #[derive(Default)]
    struct Forward {
        upstream: Option<Arc<Buffer>>,
    }

    #[async_trait]
    impl Stage for Forward {
        fn name(&self) -> &str {
            "demux/forward"
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
            let upstream = self.upstream.as_ref().ok_or(Error::Exhausted)?;
            upstream.get_packet(false, true).await.ok_or(Error::Exhausted)
        }
    }

    fn forward() -> Box<dyn Stage> {
        Box::<Forward>::default()
    }

    /// Source that never produces
    struct Starved;

    #[async_trait]
    impl Stage for Starved {
        fn name(&self) -> &str {
            "source/starved"
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

        async fn get_packet(&mut self, _output: usize) -> Result<Packet> {
            std::future::pending().await
        }
    }

    /// Source whose pulls block the worker thread for a while
    struct Sluggish {
        started: Arc<AtomicBool>,
        dropped: Arc<AtomicBool>,
        factory: Option<PacketFactory>,
    }

    #[async_trait]
    impl Stage for Sluggish {
        fn name(&self) -> &str {
            "source/sluggish"
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

        async fn get_packet(&mut self, _output: usize) -> Result<Packet> {
            self.started.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(300));

            let factory = self.factory.as_ref().ok_or(Error::Exhausted)?;
            let mut packet = factory.alloc();
            packet.set_data(b"slow")?;
            Ok(packet)
        }
    }

    impl Drop for Sluggish {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_identifiers_are_unique_per_name() {
        let mut pipeline = InputPipeline::new("input_test");

        let first = pipeline.add_stage(Chunks::boxed(&[])).unwrap();
        let demux = pipeline.add_stage(forward()).unwrap();
        let second = pipeline.add_stage(Chunks::boxed(&[])).unwrap();

        assert_eq!(first, "source/chunks-0");
        assert_eq!(demux, "demux/forward-0");
        assert_eq!(second, "source/chunks-1");
        assert_eq!(
            pipeline.identifiers(),
            vec!["source/chunks-0", "demux/forward-0", "source/chunks-1"]
        );
        assert_eq!(pipeline.len(), 3);
    }

    #[tokio::test]
    async fn test_source_buffers_start_on_add() {
        let mut pipeline = InputPipeline::new("p");

        let source = pipeline.add_stage(Chunks::boxed(&[b"AAAA"])).unwrap();
        let demux = pipeline.add_stage(forward()).unwrap();

        let source_buffer = pipeline.buffer(&source, 0).unwrap();
        let packet = source_buffer.peek_packet().await.unwrap();
        assert_eq!(packet.data(), b"AAAA");

        // Not a source and not connected yet
        let demux_buffer = pipeline.buffer(&demux, 0).unwrap();
        assert_eq!(demux_buffer.state(), BufferState::Stopped);
    }

    #[tokio::test]
    async fn test_lookup_failures() {
        let mut pipeline = InputPipeline::new("p");
        let source = pipeline.add_stage(Chunks::boxed(&[])).unwrap();

        assert!(matches!(pipeline.buffer("missing-0", 0), Err(Error::NotFound(_))));
        assert!(matches!(pipeline.stage("missing-0"), Err(Error::NotFound(_))));
        // The output count itself is out of range
        assert!(matches!(
            pipeline.buffer(&source, 1),
            Err(Error::InvalidArgument(_))
        ));
        assert!(pipeline.stage(&source).is_ok());
    }

    #[tokio::test]
    async fn test_connect_rejections() {
        let mut pipeline = InputPipeline::new("p");
        let source = pipeline.add_stage(Chunks::boxed(&[])).unwrap();
        let demux = pipeline.add_stage(forward()).unwrap();
        let other = pipeline.add_stage(forward()).unwrap();

        assert!(matches!(
            pipeline.connect("missing-0", &source, 0).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            pipeline.connect(&demux, "missing-0", 0).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            pipeline.connect(&demux, &demux, 0).await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            pipeline.connect(&demux, &source, 1).await,
            Err(Error::InvalidArgument(_))
        ));
        // Output interface of a demux-forward is Output, not Demux
        assert!(matches!(
            pipeline.connect(&other, &demux, 0).await,
            Err(Error::InvalidArgument(_))
        ));
        // A source never takes an upstream
        assert!(matches!(
            pipeline.connect(&source, &demux, 0).await,
            Err(Error::InvalidArgument(_))
        ));

        let downstream = pipeline.buffer(&demux, 0).unwrap();
        assert_eq!(downstream.state(), BufferState::Stopped);
    }

    #[tokio::test]
    async fn test_connect_starts_downstream() {
        let config = PipelineConfig::new("p").buffer(BufferConfig::new(1, 2).unwrap());
        let mut pipeline = InputPipeline::with_config(config);

        let source = pipeline
            .add_stage(Chunks::boxed(&[b"AAAA", b"BBBB", b"CCCC"]))
            .unwrap();
        let demux = pipeline.add_stage(forward()).unwrap();
        pipeline.connect(&demux, &source, 0).await.unwrap();

        let output = pipeline.buffer(&demux, 0).unwrap();
        for expected in [b"AAAA", b"BBBB", b"CCCC"] {
            let packet = tokio::time::timeout(Duration::from_secs(2), output.next_packet())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(packet.data(), expected);
            pipeline.free_packet(packet);
        }
        assert!(output.next_packet().await.is_none());

        let stats = pipeline.pool_stats();
        assert_eq!(stats.allocated, 3);
        assert_eq!(stats.freed, 3);

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_and_stop_cascade() {
        let mut pipeline = InputPipeline::new("p");
        // More than both buffers can hold, so nothing runs dry
        let chunks = vec![&b"AAAA"[..]; 100];
        let source = pipeline.add_stage(Chunks::boxed(&chunks)).unwrap();
        let demux = pipeline.add_stage(forward()).unwrap();
        pipeline.connect(&demux, &source, 0).await.unwrap();

        pipeline.stop().await.unwrap();
        for fill in pipeline.fill_levels() {
            let buffer = pipeline.buffer(&fill.stage, fill.output).unwrap();
            assert_eq!(buffer.state(), BufferState::Stopped);
        }

        pipeline.start().unwrap();
        for id in [&source, &demux] {
            let buffer = pipeline.buffer(id, 0).unwrap();
            assert_eq!(buffer.state(), BufferState::Running);
        }

        pipeline.stop().await.unwrap();
        for id in [&source, &demux] {
            let buffer = pipeline.buffer(id, 0).unwrap();
            assert_eq!(buffer.state(), BufferState::Stopped);
        }
    }

    #[tokio::test]
    async fn test_fill_levels() {
        let mut pipeline = InputPipeline::new("p");
        let source = pipeline
            .add_stage(Chunks::boxed(&[b"AAAA", b"BBBB"]))
            .unwrap();
        pipeline.add_stage(forward()).unwrap();

        let buffer = pipeline.buffer(&source, 0).unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while !buffer.is_exhausted() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();

        let levels = pipeline.fill_levels();
        assert_eq!(
            levels,
            vec![
                BufferFill {
                    stage: "source/chunks-0".to_string(),
                    output: 0,
                    queued: 2,
                },
                BufferFill {
                    stage: "demux/forward-0".to_string(),
                    output: 0,
                    queued: 0,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_connected_stage_reachable_while_upstream_starves() {
        let mut pipeline = InputPipeline::new("p");
        let starved = pipeline.add_stage(Box::new(Starved)).unwrap();
        let demux = pipeline.add_stage(forward()).unwrap();

        pipeline.connect(&demux, &starved, 0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(2), pipeline.connect(&demux, &starved, 0))
            .await
            .expect("reconnect waited on upstream")
            .unwrap();

        let stage = pipeline.stage(&demux).unwrap();
        let recognised = tokio::time::timeout(Duration::from_secs(2), async {
            stage.lock().await.check(&Packet::new())
        })
        .await
        .expect("stage lock held while upstream starves");
        assert!(!recognised);

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_reconnect_switches_upstream() {
        let mut pipeline = InputPipeline::new("p");
        let starved = pipeline.add_stage(Box::new(Starved)).unwrap();
        let live = pipeline.add_stage(Chunks::boxed(&[b"LIVE"])).unwrap();
        let demux = pipeline.add_stage(forward()).unwrap();

        pipeline.connect(&demux, &starved, 0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        pipeline.connect(&demux, &live, 0).await.unwrap();

        let upstream = pipeline.node(&demux).unwrap().upstream().unwrap();
        assert!(Arc::ptr_eq(&upstream, &pipeline.buffer(&live, 0).unwrap()));

        let output = pipeline.buffer(&demux, 0).unwrap();
        let packet = tokio::time::timeout(Duration::from_secs(2), output.next_packet())
            .await
            .expect("refill stayed on the old upstream")
            .unwrap();
        assert_eq!(packet.data(), b"LIVE");

        pipeline.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_drop_waits_for_in_flight_pull() {
        let started = Arc::new(AtomicBool::new(false));
        let dropped = Arc::new(AtomicBool::new(false));

        let mut pipeline = InputPipeline::new("p");
        pipeline
            .add_stage(Box::new(Sluggish {
                started: Arc::clone(&started),
                dropped: Arc::clone(&dropped),
                factory: None,
            }))
            .unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while !started.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();

        drop(pipeline);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_drop_on_current_thread_runtime() {
        let mut pipeline = InputPipeline::new("p");
        let chunks = vec![&b"AAAA"[..]; 100];
        pipeline.add_stage(Chunks::boxed(&chunks)).unwrap();
        let starved = pipeline.add_stage(Box::new(Starved)).unwrap();
        assert!(pipeline.node(&starved).unwrap().has_live_workers());

        // Cannot block here; the tasks are aborted instead
        drop(pipeline);
    }

    #[tokio::test]
    async fn test_stages_share_pipeline_factory() {
        let mut pipeline = InputPipeline::new("p");
        pipeline.add_stage(Chunks::boxed(&[b"AAAA"])).unwrap();

        let packet = pipeline.alloc_packet();
        assert!(packet.is_empty());
        pipeline.free_packet(packet);

        assert_eq!(pipeline.identifier(), "p");
        assert!(pipeline.factory().same_as(&pipeline.factory().clone()));
    }
}
