use parking_lot::{Mutex, MutexGuard};
use smallvec::SmallVec;
use std::sync::{Arc, Weak};

use crate::{
    format::{Dimension, FourCc},
    meta::BufferMeta,
    pool::PoolShared,
};

/// Logical plane of a picture buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneId {
    Y,
    /// Interleaved U/V plane of semi-planar layouts.
    Uv,
    U,
    V,
}

/// Where a plane lives inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneDesc {
    pub id: PlaneId,
    /// Index of the memory chunk holding the plane.
    pub chunk: usize,
    /// Byte offset of the plane inside its chunk.
    pub offset: usize,
    /// Bytes between two rows (or two tile rows).
    pub pitch: usize,
}

/// Four-cc and dimension a picture buffer currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PictureFormat {
    pub fourcc: FourCc,
    pub dim: Dimension,
}

/// Geometry shared by every buffer of a pool: chunk sizes plus plane placement.
///
/// # Example
/// ```rust
/// use vdec_core::prelude::*;
///
/// let layout = BufferLayout::stream(4096);
/// assert_eq!(layout.total_size(), 4096);
/// assert!(layout.planes.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferLayout {
    pub chunks: SmallVec<[usize; 3]>,
    pub planes: SmallVec<[PlaneDesc; 3]>,
    pub format: Option<PictureFormat>,
}

impl BufferLayout {
    /// Single chunk of compressed data, no planes.
    pub fn stream(size: usize) -> Self {
        let mut chunks = SmallVec::new();
        chunks.push(size);
        Self {
            chunks,
            planes: SmallVec::new(),
            format: None,
        }
    }

    /// Empty picture layout; chunks are added with [`BufferLayout::add_chunk`].
    pub fn picture(format: PictureFormat) -> Self {
        Self {
            chunks: SmallVec::new(),
            planes: SmallVec::new(),
            format: Some(format),
        }
    }

    /// Append a chunk holding `planes`, given as `(id, offset, pitch)` inside the chunk.
    pub fn add_chunk(&mut self, size: usize, planes: &[(PlaneId, usize, usize)]) -> usize {
        let chunk = self.chunks.len();
        self.chunks.push(size);
        self.planes
            .extend(planes.iter().map(|&(id, offset, pitch)| PlaneDesc {
                id,
                chunk,
                offset,
                pitch,
            }));
        chunk
    }

    pub fn total_size(&self) -> usize {
        self.chunks.iter().sum()
    }
}

/// Borrowed plane bytes, from the plane offset to the end of its chunk.
#[derive(Debug, Clone, Copy)]
pub struct Plane<'a> {
    data: &'a [u8],
    pitch: usize,
}

impl<'a> Plane<'a> {
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn pitch(&self) -> usize {
        self.pitch
    }
}

/// Mutable plane view.
#[derive(Debug)]
pub struct PlaneMut<'a> {
    data: &'a mut [u8],
    pitch: usize,
}

impl PlaneMut<'_> {
    pub fn data(&mut self) -> &mut [u8] {
        self.data
    }

    pub fn pitch(&self) -> usize {
        self.pitch
    }
}

/// Contents of a buffer: memory chunks, plane map, current picture format and metadata.
#[derive(Debug, Default)]
pub struct BufferState {
    pub chunks: SmallVec<[Vec<u8>; 3]>,
    pub planes: SmallVec<[PlaneDesc; 3]>,
    pub format: Option<PictureFormat>,
    pub meta: BufferMeta,
}

impl BufferState {
    /// First chunk, the whole payload of compressed buffers.
    pub fn data(&self) -> &[u8] {
        self.chunks.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.chunks
            .first_mut()
            .map(Vec::as_mut_slice)
            .unwrap_or(&mut [])
    }

    pub fn size(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    pub fn plane_desc(&self, id: PlaneId) -> Option<PlaneDesc> {
        self.planes.iter().copied().find(|p| p.id == id)
    }

    pub fn plane(&self, id: PlaneId) -> Option<Plane<'_>> {
        let desc = self.plane_desc(id)?;
        let data = self.chunks.get(desc.chunk)?.get(desc.offset..)?;
        Some(Plane {
            data,
            pitch: desc.pitch,
        })
    }

    pub fn plane_mut(&mut self, id: PlaneId) -> Option<PlaneMut<'_>> {
        let desc = self.plane_desc(id)?;
        let data = self.chunks.get_mut(desc.chunk)?.get_mut(desc.offset..)?;
        Some(PlaneMut {
            data,
            pitch: desc.pitch,
        })
    }

    /// Fill every chunk with `byte`.
    pub fn fill(&mut self, byte: u8) {
        for chunk in &mut self.chunks {
            chunk.fill(byte);
        }
    }
}

/// Shared, reference-counted handle to a pooled or standalone buffer.
///
/// Cloning takes a new reference. When the last reference is dropped the storage goes
/// back to the pool it came from and one blocked acquirer is woken.
///
/// # Example
/// ```rust
/// use vdec_core::prelude::*;
///
/// let buffer = Buffer::standalone(BufferLayout::stream(16));
/// let second = buffer.clone();
/// assert_eq!(buffer.ref_count(), 2);
/// second.lock().data_mut()[0] = 7;
/// drop(second);
/// assert_eq!(buffer.lock().data()[0], 7);
/// ```
#[derive(Clone)]
pub struct Buffer {
    inner: Arc<BufferInner>,
}

struct BufferInner {
    id: u64,
    state: Mutex<BufferState>,
    home: Weak<PoolShared>,
}

impl Buffer {
    pub(crate) fn pooled(id: u64, state: BufferState, home: Weak<PoolShared>) -> Self {
        Self {
            inner: Arc::new(BufferInner {
                id,
                state: Mutex::new(state),
                home,
            }),
        }
    }

    /// Zero-filled buffer owned by nobody but its handles.
    pub fn standalone(layout: BufferLayout) -> Self {
        let state = BufferState {
            chunks: layout.chunks.iter().map(|&size| vec![0u8; size]).collect(),
            planes: layout.planes,
            format: layout.format,
            meta: BufferMeta::default(),
        };
        Self::pooled(0, state, Weak::new())
    }

    /// Identifier stable across recycling; zero for standalone buffers.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Number of live handles to this buffer.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Lock the buffer contents.
    pub fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.inner.state.lock()
    }

    pub fn same_as(&self, other: &Buffer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.inner.id)
            .field("refs", &self.ref_count())
            .finish()
    }
}

impl Drop for BufferInner {
    fn drop(&mut self) {
        if let Some(pool) = self.home.upgrade() {
            let mut state = std::mem::take(self.state.get_mut());
            state.meta.recycle();
            pool.recycle(self.id, state);
        }
    }
}
