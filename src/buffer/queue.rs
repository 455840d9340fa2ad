//! Bounded, self-refilling packet queue

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::packet::Packet;
use crate::stage::SharedStage;

use super::config::BufferConfig;
use super::refill;
use super::state::Shared;

/// Lifecycle state of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// No refill task, or exhausted and fully drained
    Stopped,
    /// Refill task active, or exhausted with packets left to drain
    Running,
}

/// Snapshot of a buffer's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    /// Packets currently queued
    pub queued: usize,
    /// Low watermark
    pub min: usize,
    /// High watermark
    pub max: usize,
    /// Packets queued by the refill task since creation
    pub total_pushed: u64,
    /// Packets consumed since creation
    pub total_popped: u64,
    /// Refill task is parked at the high watermark
    pub suspended: bool,
    /// The stage will never produce again
    pub exhausted: bool,
}

/// Receiving side of a stage's upstream connection
pub(crate) type UpstreamReceiver = watch::Receiver<Option<Arc<Buffer>>>;

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// A bounded FIFO of packets fed by one stage output
///
/// Once started, a dedicated task keeps pulling packets from the stage
/// until the queue reaches the high watermark, then sleeps until consumers
/// drain it below the low watermark. When the stage reports exhaustion the
/// task ends for good; the remaining packets are still delivered, after
/// which every read returns `None`.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
///
/// use media_pipeline::buffer::{Buffer, BufferConfig};
/// use media_pipeline::stage::{shared, StageRegistry};
///
/// # async fn example() -> media_pipeline::error::Result<()> {
/// let stage = StageRegistry::new().create("source/file")?;
/// let buffer = Arc::new(Buffer::new(shared(stage), 0, BufferConfig::new(2, 8)?));
///
/// buffer.start()?;
/// while let Some(packet) = buffer.get_packet(false, true).await {
///     println!("{} bytes, {} still queued", packet.len(), buffer.count());
/// }
/// buffer.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct Buffer {
    shared: Arc<Shared>,
    stage: SharedStage,
    output: usize,
    upstream: Option<UpstreamReceiver>,
    worker: Mutex<Option<Worker>>,
}

impl Buffer {
    /// Create a stopped buffer reading output `output` of `stage`
    pub fn new(stage: SharedStage, output: usize, config: BufferConfig) -> Self {
        Self::with_label(stage, output, config, format!("output-{}", output))
    }

    /// Create a stopped buffer with a label used in log output
    pub fn with_label(
        stage: SharedStage,
        output: usize,
        config: BufferConfig,
        label: impl Into<String>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared::new(label.into(), config)),
            stage,
            output,
            upstream: None,
            worker: Mutex::new(None),
        }
    }

    /// Follow the upstream connection of the producing stage
    ///
    /// The refill task then waits for the connected upstream buffer to hold
    /// data before it takes the stage lock.
    pub(crate) fn with_upstream(mut self, upstream: UpstreamReceiver) -> Self {
        self.upstream = Some(upstream);
        self
    }

    /// Label used in log output
    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Output index of the producing stage this buffer reads
    pub fn output(&self) -> usize {
        self.output
    }

    /// Update the watermarks
    ///
    /// Fails with [`Error::InvalidArgument`] unless `0 < min <= max`, in
    /// which case the previous watermarks stay in effect.
    pub fn set_min_max(&self, min: usize, max: usize) -> Result<()> {
        let config = BufferConfig::new(min, max)?;

        let mut state = self.shared.lock();
        state.config = config;
        self.shared.resume_if_drained(&mut state);

        tracing::debug!(buffer = %self.shared.label, min = min, max = max, "Watermarks updated");
        Ok(())
    }

    /// Current watermarks
    pub fn watermarks(&self) -> BufferConfig {
        self.shared.lock().config
    }

    /// Start the refill task
    ///
    /// Idempotent. Does nothing on an exhausted buffer. Fails with
    /// [`Error::Runtime`] when called outside a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);

        if worker.is_some() || !self.shared.can_fill() {
            return Ok(());
        }

        let runtime = Handle::try_current().map_err(|e| Error::Runtime(e.to_string()))?;
        let cancel = CancellationToken::new();
        let handle = runtime.spawn(refill::run(
            Arc::clone(&self.shared),
            Arc::clone(&self.stage),
            self.output,
            self.upstream.clone(),
            cancel.clone(),
        ));

        *worker = Some(Worker { cancel, handle });
        self.shared.running.store(true, Ordering::Release);

        tracing::debug!(buffer = %self.shared.label, "Buffer started");
        Ok(())
    }

    /// Stop the refill task and wait for it to finish
    ///
    /// Idempotent. Queued packets are kept and can still be read.
    pub async fn stop(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.shared.running.store(false, Ordering::Release);

        let Some(worker) = worker else {
            return;
        };

        worker.cancel.cancel();
        if let Err(e) = worker.handle.await {
            if e.is_panic() {
                tracing::error!(buffer = %self.shared.label, "Refill task panicked");
            }
        }

        tracing::debug!(buffer = %self.shared.label, queued = self.count(), "Buffer stopped");
    }

    /// Get the oldest queued packet
    ///
    /// With `no_block` set, or once the stage is exhausted, an empty queue
    /// yields `None` immediately; otherwise this waits for a packet. With
    /// `consume` unset the head packet is copied and left in the queue.
    pub async fn get_packet(&self, no_block: bool, consume: bool) -> Option<Packet> {
        loop {
            // Register before checking so a push in between is not missed
            let notified = self.shared.data_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.shared.lock();

                if consume {
                    if let Some(packet) = self.shared.pop(&mut state) {
                        return Some(packet);
                    }
                } else if let Some(packet) = state.packets.front() {
                    return Some(packet.clone());
                }

                if no_block || !self.shared.can_fill() {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Consume the next packet, waiting if necessary
    pub async fn next_packet(&self) -> Option<Packet> {
        self.get_packet(false, true).await
    }

    /// Copy of the head packet, waiting if necessary
    pub async fn peek_packet(&self) -> Option<Packet> {
        self.get_packet(false, false).await
    }

    /// Whether a consuming read would return without waiting
    pub fn is_ready(&self) -> bool {
        self.count() > 0 || self.is_exhausted()
    }

    /// Wait until a packet is queued or the buffer is exhausted
    ///
    /// Nothing is consumed.
    pub async fn ready(&self) {
        loop {
            let notified = self.shared.data_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_ready() {
                return;
            }

            notified.await;
        }
    }

    /// Number of packets currently queued
    pub fn count(&self) -> usize {
        self.shared.count.load(Ordering::Acquire)
    }

    /// Whether the stage has stopped producing for good
    pub fn is_exhausted(&self) -> bool {
        !self.shared.can_fill()
    }

    /// Whether a refill task is still alive
    pub(crate) fn has_live_worker(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    pub fn state(&self) -> BufferState {
        let running = self.shared.running.load(Ordering::Acquire);
        if !running || (self.is_exhausted() && self.count() == 0) {
            BufferState::Stopped
        } else {
            BufferState::Running
        }
    }

    pub fn stats(&self) -> BufferStats {
        let state = self.shared.lock();
        BufferStats {
            queued: state.packets.len(),
            min: state.config.min(),
            max: state.config.max(),
            total_pushed: self.shared.total_pushed.load(Ordering::Relaxed),
            total_popped: self.shared.total_popped.load(Ordering::Relaxed),
            suspended: state.suspended,
            exhausted: !self.shared.can_fill(),
        }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        let worker = self
            .worker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(worker) = worker {
            worker.cancel.cancel();
            worker.handle.abort();
        }
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("label", &self.shared.label)
            .field("output", &self.output)
            .field("queued", &self.count())
            .field("state", &self.state())
            .finish()
    }
}
