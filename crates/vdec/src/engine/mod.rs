//! Boundary between the harness and a decode engine.
//!
//! The engine owns the decode algorithm and reports back through a [`DecoderListener`]
//! registered at creation. Callbacks may arrive on engine-owned threads.

use std::sync::{Arc, OnceLock, Weak};

use vdec_core::prelude::*;

use crate::{config::StreamSettings, error::ErrorCode};

mod soft;
pub mod stream;

pub use soft::{HW_IP_BIT_DEPTH, MAX_REFERENCES, SEI_CAPACITY, SoftEngine};

/// Per-picture record produced by the engine for each displayed picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeInfo {
    /// Layout the picture is stored in.
    pub storage: StorageMode,
    pub bit_depth_y: u8,
    pub bit_depth_c: u8,
    pub crop: CropInfo,
    /// CRC computed by the engine over the visible samples.
    pub crc: u32,
    pub chroma: ChromaMode,
    pub dim: Dimension,
    pub sequence: SequenceMode,
    pub profile: u32,
    pub level: u32,
}

/// Geometry notification asking the harness to provision decoded-picture buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionRequest {
    /// Pictures the engine needs at minimum.
    pub buffer_count: usize,
    /// Bytes the engine needs per picture.
    pub buffer_size: usize,
    pub stream: StreamSettings,
    pub crop: CropInfo,
}

/// Failure creating a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("decoder creation failed: {code}")]
pub struct EngineError {
    pub code: ErrorCode,
}

/// Operations a decode engine exposes to the harness.
pub trait DecoderEngine: Send + Sync {
    /// Queue `size` bytes of `stream` for decoding. `false` means the buffer was refused.
    fn push_buffer(&self, stream: Buffer, size: usize) -> bool;

    /// Mark the end of the input; the engine drains and reports end of stream.
    fn flush(&self);

    /// Give a picture buffer to the engine, free to be decoded into.
    fn put_display_picture(&self, picture: Buffer);

    /// Provision picture buffers from the stream settings given at creation.
    fn preallocate_buffers(&self) -> bool;

    fn last_error(&self) -> ErrorCode;

    /// Output bit depth used when none is requested.
    fn max_bit_depth(&self) -> u8;

    /// Smallest luma pitch accepted for pictures of `width` samples.
    fn min_pitch(&self, width: u32, format: &PicFormat) -> u32 {
        min_pitch(width, format)
    }

    /// Status of a decoded picture; `None` asks for the channel status.
    fn frame_error(&self, picture: Option<&Buffer>) -> ErrorCode;
}

/// Events raised by a decode engine.
pub trait DecoderListener: Send + Sync {
    /// The compressed buffer behind handle `parsing_id` of `picture` has been parsed.
    fn end_parsing(&self, picture: &Buffer, parsing_id: usize);

    /// A picture finished decoding; `None` reports a decode that produced nothing.
    fn end_decoding(&self, picture: Option<&Buffer>);

    /// Display-order delivery. `(None, None)` is end of stream, `(Some, None)` a release.
    fn display(&self, picture: Option<&Buffer>, info: Option<&DecodeInfo>);

    /// Stream geometry became known or changed.
    fn resolution_found(&self, request: &ResolutionRequest) -> Result<(), ErrorCode>;

    fn parsed_sei(&self, sei: &SeiMessage);
}

/// Late-bound, non-owning reference to the engine, shared by the callback handlers.
///
/// Handlers are built before the engine exists; the runner attaches the engine once
/// created. A handle whose engine is gone reports `None`.
#[derive(Default)]
pub struct EngineHandle {
    slot: OnceLock<Weak<dyn DecoderEngine>>,
}

impl EngineHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the engine; later calls are ignored.
    pub fn attach(&self, engine: &Arc<dyn DecoderEngine>) {
        let _ = self.slot.set(Arc::downgrade(engine));
    }

    pub fn get(&self) -> Option<Arc<dyn DecoderEngine>> {
        self.slot.get()?.upgrade()
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("live", &self.get().is_some())
            .finish()
    }
}
