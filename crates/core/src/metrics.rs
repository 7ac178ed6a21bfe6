use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing how a pool is being used.
///
/// # Example
/// ```rust
/// use vdec_core::metrics::Metrics;
///
/// let metrics = Metrics::default();
/// metrics.hit();
/// metrics.wait();
/// assert_eq!(metrics.snapshot().acquired, 1);
/// assert_eq!(metrics.snapshot().waits, 1);
/// ```
#[derive(Debug, Default)]
pub struct Metrics {
    hits: AtomicU64,
    misses: AtomicU64,
    allocations: AtomicU64,
    waits: AtomicU64,
    releases: AtomicU64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolStats {
    /// Buffers handed out.
    pub acquired: u64,
    /// Non-blocking acquisitions that found the pool empty.
    pub exhausted: u64,
    /// Buffers allocated at init.
    pub allocations: u64,
    /// Times a blocking acquirer had to wait.
    pub waits: u64,
    /// Buffers returned to the pool.
    pub released: u64,
}

impl Metrics {
    pub fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn alloc(&self) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn wait(&self) {
        self.waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PoolStats {
        PoolStats {
            acquired: self.hits.load(Ordering::Relaxed),
            exhausted: self.misses.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            released: self.releases.load(Ordering::Relaxed),
        }
    }
}
