//! Bounded, pausable log collector.
//!
//! Accumulates log lines in a ring buffer with sequential IDs. While paused,
//! incoming lines are dropped; subscribers are notified of every line that
//! is kept.

use super::event::{LogLevel, LogLine};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Maximum number of lines kept by default.
pub const DEFAULT_CAPACITY: usize = 2048;

/// Type alias for subscriber callbacks.
type LogSubscribers = RwLock<Vec<Arc<dyn Fn(&LogLine) + Send + Sync>>>;

/// Thread-safe collector with a bounded ring buffer.
pub struct LogCollector {
    /// Ring buffer of lines.
    buffer: RwLock<VecDeque<LogLine>>,
    /// Maximum buffer capacity.
    capacity: usize,
    /// Next line ID counter.
    next_id: AtomicU64,
    /// Drop incoming lines while set.
    paused: AtomicBool,
    /// Subscribers for real-time notifications.
    subscribers: LogSubscribers,
}

impl LogCollector {
    /// Create a collector with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: RwLock::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
            paused: AtomicBool::new(false),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Collect a line.
    pub fn collect(&self, mut line: LogLine) {
        if self.paused.load(Ordering::Acquire) {
            return;
        }

        line.id = self.next_id.fetch_add(1, Ordering::SeqCst);

        {
            let subscribers = self.subscribers.read();
            for subscriber in subscribers.iter() {
                subscriber(&line);
            }
        }

        let mut buffer = self.buffer.write();
        if buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(line);
    }

    /// Stop accepting lines.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Accept lines again.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    /// Whether the collector is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Add a subscriber.
    pub fn subscribe(&self, callback: Arc<dyn Fn(&LogLine) + Send + Sync>) {
        self.subscribers.write().push(callback);
    }

    /// Most recent `limit` lines, newest first.
    pub fn recent(&self, limit: usize) -> Vec<LogLine> {
        let buffer = self.buffer.read();
        buffer.iter().rev().take(limit).cloned().collect()
    }

    /// Lines at or above `min_level`.
    pub fn by_level(&self, min_level: LogLevel) -> Vec<LogLine> {
        let buffer = self.buffer.read();
        buffer
            .iter()
            .filter(|l| l.level >= min_level)
            .cloned()
            .collect()
    }

    /// Lines with an ID greater than `after_id`.
    pub fn since(&self, after_id: u64) -> Vec<LogLine> {
        let buffer = self.buffer.read();
        buffer.iter().filter(|l| l.id > after_id).cloned().collect()
    }

    /// All buffered lines, oldest first.
    pub fn all(&self) -> Vec<LogLine> {
        self.buffer.read().iter().cloned().collect()
    }

    /// Drop all buffered lines.
    pub fn clear(&self) {
        self.buffer.write().clear();
    }

    /// Number of buffered lines.
    pub fn len(&self) -> usize {
        self.buffer.read().len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffer capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for LogCollector {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for LogCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogCollector")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("paused", &self.is_paused())
            .finish()
    }
}
