//! Pipeline-scoped packet factory
//!
//! Every packet in a pipeline is allocated through a [`PacketFactory`].
//! Freed packets return their payload allocation to a bounded free list so
//! that steady-state streaming reuses the same handful of buffers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::Packet;

/// Default number of payload allocations kept for reuse
pub const DEFAULT_POOL_CAPACITY: usize = 32;

/// Cheaply cloneable handle to a pipeline's packet allocator
#[derive(Debug, Clone)]
pub struct PacketFactory {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    free: Mutex<Vec<Vec<u8>>>,
    capacity: usize,
    allocated: AtomicU64,
    freed: AtomicU64,
    recycled: AtomicU64,
}

/// Allocation counters for a packet factory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Packets handed out by `alloc`
    pub allocated: u64,
    /// Packets returned through `free`
    pub freed: u64,
    /// Allocations served from the free list
    pub recycled: u64,
    /// Payload buffers currently waiting in the free list
    pub pooled: usize,
}

impl PacketFactory {
    /// Create a factory with the default free-list capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_POOL_CAPACITY)
    }

    /// Create a factory keeping at most `capacity` payloads for reuse
    ///
    /// A capacity of zero disables recycling.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::with_capacity(capacity)),
                capacity,
                allocated: AtomicU64::new(0),
                freed: AtomicU64::new(0),
                recycled: AtomicU64::new(0),
            }),
        }
    }

    /// Allocate an empty packet
    pub fn alloc(&self) -> Packet {
        self.inner.allocated.fetch_add(1, Ordering::Relaxed);

        let storage = self
            .inner
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        match storage {
            Some(storage) => {
                self.inner.recycled.fetch_add(1, Ordering::Relaxed);
                Packet::from_storage(storage)
            }
            None => Packet::new(),
        }
    }

    /// Release a packet, keeping its allocation if the free list has room
    pub fn free(&self, packet: Packet) {
        self.inner.freed.fetch_add(1, Ordering::Relaxed);

        let storage = packet.into_storage();
        if storage.capacity() == 0 {
            return;
        }

        let mut free = self
            .inner
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.inner.capacity {
            free.push(storage);
        }
    }

    /// Snapshot of allocation counters
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            allocated: self.inner.allocated.load(Ordering::Relaxed),
            freed: self.inner.freed.load(Ordering::Relaxed),
            recycled: self.inner.recycled.load(Ordering::Relaxed),
            pooled: self
                .inner
                .free
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
        }
    }

    /// Whether two handles refer to the same factory
    pub fn same_as(&self, other: &PacketFactory) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for PacketFactory {
    fn default() -> Self {
        Self::new()
    }
}
