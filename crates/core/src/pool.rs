use parking_lot::{Condvar, Mutex};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::{
    alloc::{AllocError, Allocator},
    buffer::{Buffer, BufferLayout, BufferState},
    meta::BufferMeta,
    metrics::{Metrics, PoolStats},
};

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// How [`BufferPool::acquire`] behaves when no buffer is free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireMode {
    /// Wait until a buffer is released or the pool is decommitted.
    Blocking,
    /// Fail with [`PoolError::Exhausted`] immediately.
    NonBlocking,
}

/// Errors surfaced by [`BufferPool`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("pool {0} is not initialized")]
    NotInitialized(String),
    #[error("pool {0} is already initialized")]
    AlreadyInitialized(String),
    #[error("pool {0} was decommitted")]
    Decommitted(String),
    #[error("pool {0} has no free buffer")]
    Exhausted(String),
    #[error(transparent)]
    OutOfMemory(#[from] AllocError),
}

/// Fixed-size set of uniform buffers shared between a producer and the decoder.
///
/// A pool starts uninitialized, becomes committed after [`BufferPool::init`], and can be
/// decommitted to release every blocked acquirer with [`PoolError::Decommitted`] and
/// committed again for the next pass. Buffers come back on their own when the last
/// [`Buffer`] handle is dropped.
///
/// # Example
/// ```rust
/// use vdec_core::prelude::*;
///
/// let pool = BufferPool::new("stream");
/// pool.init(&HeapAllocator, 2, BufferLayout::stream(1024)).unwrap();
/// let first = pool.acquire(AcquireMode::NonBlocking).unwrap();
/// let _second = pool.acquire(AcquireMode::NonBlocking).unwrap();
/// assert!(pool.acquire(AcquireMode::NonBlocking).is_err());
/// drop(first);
/// assert_eq!(pool.available(), 1);
/// pool.decommit();
/// assert!(matches!(pool.acquire(AcquireMode::Blocking), Err(PoolError::Decommitted(_))));
/// ```
#[derive(Clone)]
pub struct BufferPool {
    shared: Arc<PoolShared>,
}

pub(crate) struct PoolShared {
    name: String,
    state: Mutex<PoolState>,
    available: Condvar,
    metrics: Metrics,
}

#[derive(Default)]
struct PoolState {
    free: Vec<(u64, BufferState)>,
    capacity: usize,
    layout: Option<BufferLayout>,
    decommitted: bool,
}

impl BufferPool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                name: name.into(),
                state: Mutex::new(PoolState::default()),
                available: Condvar::new(),
                metrics: Metrics::default(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Allocate `count` buffers following `layout`. May be called once.
    pub fn init(
        &self,
        allocator: &dyn Allocator,
        count: usize,
        layout: BufferLayout,
    ) -> Result<(), PoolError> {
        let mut state = self.shared.state.lock();
        if state.layout.is_some() {
            return Err(PoolError::AlreadyInitialized(self.shared.name.clone()));
        }
        let mut free = Vec::with_capacity(count);
        for _ in 0..count {
            let chunks = layout
                .chunks
                .iter()
                .map(|&size| allocator.alloc(size, &self.shared.name))
                .collect::<Result<_, _>>()?;
            self.shared.metrics.alloc();
            free.push((
                NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
                BufferState {
                    chunks,
                    planes: layout.planes.clone(),
                    format: layout.format,
                    meta: BufferMeta::default(),
                },
            ));
        }
        state.free = free;
        state.capacity = count;
        state.layout = Some(layout);
        state.decommitted = false;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.state.lock().layout.is_some()
    }

    /// Layout given at init.
    pub fn layout(&self) -> Option<BufferLayout> {
        self.shared.state.lock().layout.clone()
    }

    /// Number of buffers created at init.
    pub fn capacity(&self) -> usize {
        self.shared.state.lock().capacity
    }

    /// Number of buffers currently free.
    pub fn available(&self) -> usize {
        self.shared.state.lock().free.len()
    }

    /// Take a free buffer.
    pub fn acquire(&self, mode: AcquireMode) -> Result<Buffer, PoolError> {
        let mut state = self.shared.state.lock();
        loop {
            if state.layout.is_none() {
                return Err(PoolError::NotInitialized(self.shared.name.clone()));
            }
            if state.decommitted {
                return Err(PoolError::Decommitted(self.shared.name.clone()));
            }
            if let Some((id, buffer)) = state.free.pop() {
                self.shared.metrics.hit();
                return Ok(Buffer::pooled(id, buffer, Arc::downgrade(&self.shared)));
            }
            match mode {
                AcquireMode::NonBlocking => {
                    self.shared.metrics.miss();
                    return Err(PoolError::Exhausted(self.shared.name.clone()));
                }
                AcquireMode::Blocking => {
                    self.shared.metrics.wait();
                    self.shared.available.wait(&mut state);
                }
            }
        }
    }

    /// Reopen the pool after [`BufferPool::decommit`].
    pub fn commit(&self) {
        self.shared.state.lock().decommitted = false;
    }

    /// Close the pool: current and future acquirers fail with `Decommitted`.
    pub fn decommit(&self) {
        self.shared.state.lock().decommitted = true;
        self.shared.available.notify_all();
    }

    pub fn stats(&self) -> PoolStats {
        self.shared.metrics.snapshot()
    }
}

impl PoolShared {
    pub(crate) fn recycle(&self, id: u64, buffer: BufferState) {
        self.state.lock().free.push((id, buffer));
        self.metrics.release();
        self.available.notify_one();
    }
}
