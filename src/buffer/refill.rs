//! The refill task
//!
//! Each running buffer owns one task executing [`run`]: pull a packet from
//! the stage, queue it, park at the high watermark, resume below the low
//! watermark. A failed pull ends the task for good.
//!
//! When the stage is connected to an upstream buffer, the task waits for
//! that buffer to become ready before taking the stage lock. The lock is
//! therefore free while upstream is starved, and `connect` or `check` on the
//! stage never wait for upstream production.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::packet::Packet;
use crate::stage::SharedStage;

use super::queue::UpstreamReceiver;
use super::state::Shared;

pub(super) async fn run(
    shared: Arc<Shared>,
    stage: SharedStage,
    output: usize,
    mut upstream: Option<UpstreamReceiver>,
    cancel: CancellationToken,
) {
    tracing::debug!(buffer = %shared.label, output = output, "Refill task started");

    loop {
        if !wait_for_space(&shared, &cancel).await {
            break;
        }

        let pulled = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = pull(&stage, output, &mut upstream) => result,
        };

        match pulled {
            Ok(packet) => shared.push(packet),
            Err(e) => {
                shared.exhaust();

                if e.is_end_of_stream() {
                    tracing::debug!(
                        buffer = %shared.label,
                        queued = shared.count.load(Ordering::Acquire),
                        "Stage exhausted, refill finished"
                    );
                } else {
                    tracing::debug!(
                        buffer = %shared.label,
                        error = %e,
                        "Stage failed, refill finished"
                    );
                }
                return;
            }
        }
    }

    tracing::debug!(buffer = %shared.label, "Refill task cancelled");
}

async fn pull(
    stage: &SharedStage,
    output: usize,
    upstream: &mut Option<UpstreamReceiver>,
) -> Result<Packet> {
    loop {
        let Some(connection) = upstream.as_mut() else {
            return stage.lock().await.get_packet(output).await;
        };

        let Some(source) = connection.borrow_and_update().clone() else {
            return stage.lock().await.get_packet(output).await;
        };

        if !source.is_ready() {
            // A reconnect replaces `source`, so re-read the slot on change
            tokio::select! {
                _ = source.ready() => {}
                Ok(()) = connection.changed() => continue,
            }
        }

        let mut guard = stage.lock().await;
        // Another output of the same stage may have taken the packet
        if !source.is_ready() {
            continue;
        }
        return guard.get_packet(output).await;
    }
}

/// Park while the queue is full. Returns `false` if cancelled.
async fn wait_for_space(shared: &Shared, cancel: &CancellationToken) -> bool {
    loop {
        // Register interest before checking so a wakeup in between is kept
        let notified = shared.space_ready.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if !shared.must_wait() {
            return true;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            _ = &mut notified => {}
        }
    }
}
