//! Reusable frame buffers.
//!
//! The pool is an optimization only: a miss allocates, a full pool drops the
//! returned buffer. No two live frame sequences share a buffer, because a
//! buffer is only given back once its sequence has been retired.

use crate::frame::Frame;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of idle buffers kept for reuse.
    pub max_retained: usize,
    /// Buffers that grew beyond this capacity are dropped instead of retained.
    pub max_retained_capacity: usize,
    /// Capacity of freshly allocated buffers.
    pub initial_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_retained: 64,
            max_retained_capacity: 16 * 1024,
            initial_capacity: 32,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub rented: u64,
    pub reused: u64,
    pub allocated: u64,
    pub returned: u64,
    pub discarded: u64,
}

#[derive(Debug, Default)]
pub struct FramePool {
    config: PoolConfig,
    idle: Vec<Vec<Frame>>,
    stats: PoolStats,
}

impl FramePool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            idle: Vec::with_capacity(config.max_retained.min(64)),
            config,
            stats: PoolStats::default(),
        }
    }

    /// Returns an empty buffer with at least `min_capacity` slots.
    pub fn rent(&mut self, min_capacity: usize) -> Vec<Frame> {
        self.stats.rented += 1;
        let found = self
            .idle
            .iter()
            .rposition(|buffer| buffer.capacity() >= min_capacity);
        if let Some(pos) = found {
            self.stats.reused += 1;
            return self.idle.swap_remove(pos);
        }
        if let Some(mut buffer) = self.idle.pop() {
            self.stats.reused += 1;
            buffer.reserve(min_capacity);
            return buffer;
        }
        self.stats.allocated += 1;
        Vec::with_capacity(min_capacity.max(self.config.initial_capacity))
    }

    pub fn give_back(&mut self, mut buffer: Vec<Frame>) {
        buffer.clear();
        if self.idle.len() >= self.config.max_retained
            || buffer.capacity() > self.config.max_retained_capacity
            || buffer.capacity() == 0
        {
            self.stats.discarded += 1;
            log::trace!(
                target: "render_tree.pool",
                "discarding buffer of capacity {} ({} idle)",
                buffer.capacity(),
                self.idle.len()
            );
            return;
        }
        self.stats.returned += 1;
        self.idle.push(buffer);
    }

    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}
