#![doc = include_str!("../README.md")]

pub mod alloc;
pub mod buffer;
pub mod event;
pub mod format;
pub mod frame;
pub mod layout;
pub mod meta;
pub mod metrics;
pub mod pool;
pub mod queue;
pub mod sample;
pub mod transform;

pub mod prelude {
    pub use crate::{
        alloc::{AllocError, Allocator, BudgetAllocator, HeapAllocator},
        buffer::{
            Buffer, BufferLayout, BufferState, PictureFormat, Plane, PlaneDesc, PlaneId, PlaneMut,
        },
        event::Event,
        format::{
            ChromaMode, ChromaOrder, CropInfo, Dimension, FourCc, PicFormat, SequenceMode,
            StorageMode, bytes_per_sample,
        },
        frame::{FrameError, YuvFrame},
        layout::{
            checked_round_up, chroma_pitch, chroma_plane_count, chroma_plane_size, luma_size,
            min_pitch, picture_size, round_up,
        },
        meta::{
            BufferMeta, ContentLightLevel, DecodeHandle, HandleMeta, HandleState, HdrMeta,
            HdrSeis, MasteringDisplay, SectionFlags, SeiMessage, StreamMeta, StreamSection,
        },
        metrics::{Metrics, PoolStats},
        pool::{AcquireMode, BufferPool, PoolError},
        queue::{BoundedRx, BoundedTx, RecvOutcome, SendOutcome, bounded},
        sample::SampleLayout,
        transform::{TransformError, crop_in_place},
    };
}
