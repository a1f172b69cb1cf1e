//! Session tracking
//!
//! A session is one open-to-close interval. It owns no buffer state; the only
//! thing the device remembers about sessions is how many times it was opened.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic open/close counters
#[derive(Debug, Default)]
pub struct SessionTracker {
    opens: AtomicU64,
    closes: AtomicU64,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an open; returns the new open count (also the session id)
    #[inline]
    pub fn open(&self) -> u64 {
        self.opens.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Record a close. Never fails
    #[inline]
    pub fn close(&self) {
        self.closes.fetch_add(1, Ordering::AcqRel);
    }

    /// Total number of opens so far
    #[inline]
    pub fn opens(&self) -> u64 {
        self.opens.load(Ordering::Acquire)
    }

    /// Total number of close calls so far
    #[inline]
    pub fn closes(&self) -> u64 {
        self.closes.load(Ordering::Acquire)
    }
}
