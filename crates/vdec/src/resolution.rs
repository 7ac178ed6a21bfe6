//! Decoded-picture pool provisioning on geometry notifications.

use std::{fmt, sync::Arc};

use parking_lot::Mutex;
use tracing::{error, info, warn};
use vdec_core::prelude::*;

use crate::{
    engine::{EngineHandle, ResolutionRequest},
    error::ErrorCode,
};

/// Buffers kept on top of the decoder minimum for the downstream consumer.
pub const NEXT_COMPONENT_RESERVE: usize = 1;

/// Byte pattern new picture buffers are filled with.
const FILL_PATTERN: u8 = 0xDE;

/// Plane layout of a decoder picture at luma pitch `pitch`.
///
/// Planes follow each other inside one chunk, or get one chunk each when `multi_chunk`
/// is set.
///
/// # Example
/// ```rust
/// use vdec::resolution::picture_layout;
/// use vdec_core::prelude::*;
///
/// let format = PicFormat::decoder_native(ChromaMode::Yuv420, 8, StorageMode::Raster);
/// let dim = Dimension::new(64, 32);
/// let single = picture_layout(dim, 64, &format, false).unwrap();
/// assert_eq!(single.chunks.len(), 1);
/// assert_eq!(single.total_size(), 64 * 32 * 3 / 2);
/// let split = picture_layout(dim, 64, &format, true).unwrap();
/// assert_eq!(split.chunks.len(), 2);
/// assert_eq!(split.total_size(), single.total_size());
/// ```
pub fn picture_layout(
    dim: Dimension,
    pitch: u32,
    format: &PicFormat,
    multi_chunk: bool,
) -> Option<BufferLayout> {
    let fourcc = format.fourcc()?;
    let mut layout = BufferLayout::picture(PictureFormat { fourcc, dim });
    let luma = luma_size(dim, pitch, format.storage);
    let chroma = chroma_plane_size(dim, pitch, format);
    let cpitch = chroma_pitch(pitch, format) as usize;
    let pitch = pitch as usize;
    let chroma_planes: &[PlaneId] = match format.order {
        ChromaOrder::NoChroma => &[],
        ChromaOrder::SemiPlanar => &[PlaneId::Uv],
        ChromaOrder::Planar => &[PlaneId::U, PlaneId::V],
    };
    if multi_chunk {
        layout.add_chunk(luma, &[(PlaneId::Y, 0, pitch)]);
        for &id in chroma_planes {
            layout.add_chunk(chroma, &[(id, 0, cpitch)]);
        }
    } else {
        let mut planes = vec![(PlaneId::Y, 0, pitch)];
        let mut offset = luma;
        for &id in chroma_planes {
            planes.push((id, offset, cpitch));
            offset += chroma;
        }
        layout.add_chunk(offset, &planes);
    }
    Some(layout)
}

/// Stream description logged on every geometry notification.
#[derive(Debug, Clone, Copy)]
pub struct StreamInfo {
    pub request: ResolutionRequest,
    pub fourcc: FourCc,
    pub buffer_size: usize,
}

impl fmt::Display for StreamInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stream = &self.request.stream;
        let crop = &self.request.crop;
        writeln!(f, "Resolution: {}x{}", stream.dim.width, stream.dim.height)?;
        writeln!(f, "FourCC: {}", self.fourcc)?;
        writeln!(f, "Profile: {}", stream.profile)?;
        writeln!(f, "Level: {}", stream.level)?;
        writeln!(f, "Bitdepth: {}", stream.bit_depth)?;
        if crop.is_cropping() {
            writeln!(f, "Crop top: {}", crop.top)?;
            writeln!(f, "Crop bottom: {}", crop.bottom)?;
            writeln!(f, "Crop left: {}", crop.left)?;
            writeln!(f, "Crop right: {}", crop.right)?;
            if let Some(display) = crop.apply(stream.dim) {
                writeln!(f, "Display resolution: {}x{}", display.width, display.height)?;
            }
        }
        let sequence = match stream.sequence {
            SequenceMode::Unknown => "unknown",
            SequenceMode::Progressive => "progressive",
            SequenceMode::Interlaced => "interlaced",
        };
        writeln!(f, "Sequence picture: {sequence}")?;
        write!(
            f,
            "Buffers needed: {} of size {}",
            self.request.buffer_count + NEXT_COMPONENT_RESERVE,
            self.buffer_size
        )
    }
}

/// Answers the engine's geometry notifications by provisioning the picture pool once
/// and seeding the engine with every buffer of it.
pub struct ResolutionHandler {
    engine: Arc<EngineHandle>,
    pool: BufferPool,
    allocator: Arc<dyn Allocator>,
    storage: StorageMode,
    multi_chunk: bool,
    attach_hdr: bool,
    lock: Mutex<()>,
}

impl ResolutionHandler {
    pub fn new(
        engine: Arc<EngineHandle>,
        allocator: Arc<dyn Allocator>,
        storage: StorageMode,
        multi_chunk: bool,
        attach_hdr: bool,
    ) -> Self {
        Self {
            engine,
            pool: BufferPool::new("decoded picture buffer"),
            allocator,
            storage,
            multi_chunk,
            attach_hdr,
            lock: Mutex::new(()),
        }
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn on_resolution(&self, request: &ResolutionRequest) -> Result<(), ErrorCode> {
        let _guard = self.lock.lock();
        let Some(engine) = self.engine.get() else {
            error!("resolution notified without a live decoder");
            return Err(ErrorCode::Error);
        };
        let stream = &request.stream;
        let format = stream.native_format(self.storage);
        let Some(fourcc) = format.fourcc() else {
            error!(?format, "no four-cc for decoded picture format");
            return Err(ErrorCode::Error);
        };
        let pitch = engine.min_pitch(stream.dim.width, &format);

        if let Some(current) = self.pool.layout() {
            // The pool is never reallocated: only a picture larger than its buffers is fatal.
            let size = picture_size(stream.dim, pitch, &format);
            if size > current.total_size() {
                error!(size, pool = current.total_size(), "picture pool too small for new geometry");
                return Err(ErrorCode::NoMemory);
            }
            let count = request.buffer_count + NEXT_COMPONENT_RESERVE;
            if count > self.pool.capacity() {
                warn!(
                    count,
                    pool = self.pool.capacity(),
                    "picture pool holds fewer buffers than requested"
                );
            }
            let info = StreamInfo {
                request: *request,
                fourcc,
                buffer_size: current.total_size(),
            };
            info!("{info}");
            return Ok(());
        }

        let Some(mut layout) = picture_layout(stream.dim, pitch, &format, self.multi_chunk) else {
            return Err(ErrorCode::Error);
        };
        if !self.multi_chunk && layout.total_size() < request.buffer_size {
            layout.chunks[0] = request.buffer_size;
        }
        let info = StreamInfo {
            request: *request,
            fourcc,
            buffer_size: layout.total_size(),
        };
        info!("{info}");

        let count = request.buffer_count + NEXT_COMPONENT_RESERVE;
        if let Err(err) = self.pool.init(self.allocator.as_ref(), count, layout) {
            error!(%err, count, "cannot provision the picture pool");
            return Err(ErrorCode::NoMemory);
        }
        for _ in 0..count {
            let picture = match self.pool.acquire(AcquireMode::NonBlocking) {
                Ok(picture) => picture,
                Err(err) => {
                    error!(%err, "picture pool drained while seeding the decoder");
                    return Err(ErrorCode::NoMemory);
                }
            };
            {
                let mut state = picture.lock();
                state.fill(FILL_PATTERN);
                if self.attach_hdr {
                    state.meta.hdr = Some(HdrMeta::default());
                }
            }
            engine.put_display_picture(picture);
        }
        Ok(())
    }
}
