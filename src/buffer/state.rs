//! State shared between a buffer and its refill task

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::packet::Packet;

use super::config::BufferConfig;

/// Queue contents and watermarks, guarded by [`Shared::state`]
#[derive(Debug)]
pub(super) struct QueueState {
    pub(super) packets: VecDeque<Packet>,
    pub(super) config: BufferConfig,
    /// Refill is parked waiting for the queue to drop below `min`
    pub(super) suspended: bool,
}

#[derive(Debug)]
pub(super) struct Shared {
    pub(super) label: String,
    pub(super) state: Mutex<QueueState>,
    /// Mirror of `packets.len()`, readable without the lock
    pub(super) count: AtomicUsize,
    /// Cleared for good once the stage fails to produce
    pub(super) can_fill: AtomicBool,
    pub(super) running: AtomicBool,
    /// Signalled when a packet is queued or the buffer is exhausted
    pub(super) data_ready: Notify,
    /// Signalled when a suspended refill may resume
    pub(super) space_ready: Notify,
    pub(super) total_pushed: AtomicU64,
    pub(super) total_popped: AtomicU64,
}

impl Shared {
    pub(super) fn new(label: String, config: BufferConfig) -> Self {
        Self {
            label,
            state: Mutex::new(QueueState {
                packets: VecDeque::with_capacity(config.max()),
                config,
                suspended: false,
            }),
            count: AtomicUsize::new(0),
            can_fill: AtomicBool::new(true),
            running: AtomicBool::new(false),
            data_ready: Notify::new(),
            space_ready: Notify::new(),
            total_pushed: AtomicU64::new(0),
            total_popped: AtomicU64::new(0),
        }
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a packet produced by the refill task
    pub(super) fn push(&self, packet: Packet) {
        {
            let mut state = self.lock();
            state.packets.push_back(packet);
            self.count.fetch_add(1, Ordering::AcqRel);
        }
        self.total_pushed.fetch_add(1, Ordering::Relaxed);

        self.data_ready.notify_waiters();
    }

    /// Take the head packet, waking the refill task below the low watermark
    pub(super) fn pop(&self, state: &mut QueueState) -> Option<Packet> {
        let packet = state.packets.pop_front()?;
        self.count.fetch_sub(1, Ordering::AcqRel);
        self.total_popped.fetch_add(1, Ordering::Relaxed);

        self.resume_if_drained(state);
        Some(packet)
    }

    /// Clear the suspension once the queue is below `min`
    pub(super) fn resume_if_drained(&self, state: &mut QueueState) {
        if state.suspended && state.packets.len() < state.config.min() {
            state.suspended = false;
            self.space_ready.notify_one();

            tracing::trace!(
                buffer = %self.label,
                queued = state.packets.len(),
                "Below low watermark, resuming refill"
            );
        }
    }

    /// Decide whether the refill task has to park before pulling again
    pub(super) fn must_wait(&self) -> bool {
        let mut state = self.lock();
        if !state.suspended && state.packets.len() >= state.config.max() {
            state.suspended = true;

            tracing::trace!(
                buffer = %self.label,
                queued = state.packets.len(),
                "High watermark reached, suspending refill"
            );
        }
        state.suspended
    }

    /// Permanently stop filling and release any blocked consumers
    pub(super) fn exhaust(&self) {
        {
            let _state = self.lock();
            self.can_fill.store(false, Ordering::Release);
        }
        self.data_ready.notify_waiters();
    }

    pub(super) fn can_fill(&self) -> bool {
        self.can_fill.load(Ordering::Acquire)
    }
}
