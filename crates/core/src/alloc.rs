use std::sync::atomic::{AtomicUsize, Ordering};

/// Allocation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    #[error("out of memory allocating {size} bytes for {name}")]
    OutOfMemory { size: usize, name: String },
}

/// Source of buffer memory handed to pools.
pub trait Allocator: Send + Sync {
    /// Allocate `size` zeroed bytes; `name` labels the allocation in errors.
    fn alloc(&self, size: usize, name: &str) -> Result<Vec<u8>, AllocError>;
}

/// Heap allocator that reports exhaustion instead of aborting.
///
/// # Example
/// ```rust
/// use vdec_core::prelude::{Allocator, HeapAllocator};
///
/// let chunk = HeapAllocator.alloc(64, "stream").unwrap();
/// assert_eq!(chunk.len(), 64);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAllocator;

impl Allocator for HeapAllocator {
    fn alloc(&self, size: usize, name: &str) -> Result<Vec<u8>, AllocError> {
        let mut chunk = Vec::new();
        chunk
            .try_reserve_exact(size)
            .map_err(|_| AllocError::OutOfMemory {
                size,
                name: name.to_string(),
            })?;
        chunk.resize(size, 0);
        Ok(chunk)
    }
}

/// Heap allocator limited to a total byte budget, modelling a fixed memory region.
///
/// # Example
/// ```rust
/// use vdec_core::prelude::{Allocator, BudgetAllocator};
///
/// let alloc = BudgetAllocator::new(100);
/// assert!(alloc.alloc(60, "a").is_ok());
/// assert!(alloc.alloc(60, "b").is_err());
/// assert_eq!(alloc.remaining(), 40);
/// ```
#[derive(Debug)]
pub struct BudgetAllocator {
    remaining: AtomicUsize,
}

impl BudgetAllocator {
    pub fn new(budget: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(budget),
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }
}

impl Allocator for BudgetAllocator {
    fn alloc(&self, size: usize, name: &str) -> Result<Vec<u8>, AllocError> {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| {
                left.checked_sub(size)
            })
            .map_err(|_| AllocError::OutOfMemory {
                size,
                name: name.to_string(),
            })?;
        HeapAllocator.alloc(size, name)
    }
}
