use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};
use vdec_core::prelude::*;

use super::{
    DecodeInfo, DecoderEngine, DecoderListener, EngineError, ResolutionRequest,
    stream::{self, PictureUnit, SequenceHeader, Unit, UnitKind},
};
use crate::{
    config::{DecSettings, DpbMode, InputMode, StreamSettings},
    error::ErrorCode,
};

/// Deepest samples the engine decodes.
pub const HW_IP_BIT_DEPTH: u8 = 12;
/// References assumed when provisioning from pre-allocation settings.
pub const MAX_REFERENCES: usize = 4;
/// Largest SEI payload kept; bigger messages are dropped with a warning.
pub const SEI_CAPACITY: usize = 1024;

const POLL: Duration = Duration::from_millis(1);

enum Command {
    Data(Buffer, usize),
    Flush,
}

/// Software decode engine for the synthetic stream of [`stream`](super::stream).
///
/// Decoding runs on a scheduler thread fed through a bounded FIFO. Pictures are written
/// into buffers handed over with [`DecoderEngine::put_display_picture`] in the layout
/// the configured storage mode prescribes, and delivered to the listener in decode order.
pub struct SoftEngine {
    shared: Arc<Shared>,
    tx: BoundedTx<Command>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    settings: DecSettings,
    listener: Arc<dyn DecoderListener>,
    pictures: Mutex<VecDeque<Buffer>>,
    picture_ready: Condvar,
    status: Mutex<Status>,
    stream: Mutex<StreamState>,
    max_bit_depth: AtomicU8,
    stop: AtomicBool,
}

#[derive(Default)]
struct Status {
    last_error: ErrorCode,
    frame_errors: HashMap<u64, ErrorCode>,
}

#[derive(Default)]
struct StreamState {
    pending: Vec<u8>,
    active: Option<SequenceHeader>,
    /// Geometry and buffer count the picture pool was provisioned for.
    provisioned: Option<(StreamSettings, usize)>,
    /// A fatal condition was hit; everything until teardown is ignored.
    halted: bool,
    hdr: HdrMeta,
    references: VecDeque<Buffer>,
    handles: Vec<Buffer>,
}

impl SoftEngine {
    /// Start an engine; `input_depth` sizes the input FIFO.
    pub fn create(
        settings: DecSettings,
        listener: Arc<dyn DecoderListener>,
        input_depth: usize,
    ) -> Result<Arc<Self>, EngineError> {
        if settings.stack_size == 0 {
            return Err(EngineError {
                code: ErrorCode::RequestMalformed,
            });
        }
        // Room for every input buffer plus a flush from this pass and the previous one.
        let (tx, rx) = bounded(input_depth + 2);
        let shared = Arc::new(Shared {
            settings,
            listener,
            pictures: Mutex::new(VecDeque::new()),
            picture_ready: Condvar::new(),
            status: Mutex::new(Status::default()),
            stream: Mutex::new(StreamState::default()),
            max_bit_depth: AtomicU8::new(0),
            stop: AtomicBool::new(false),
        });
        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("vdec-scheduler".into())
            .spawn(move || worker.run(rx))
            .map_err(|err| {
                warn!(%err, "cannot start scheduler thread");
                EngineError {
                    code: ErrorCode::ChanCreationResourceUnavailable,
                }
            })?;
        Ok(Arc::new(Self {
            shared,
            tx,
            scheduler: Mutex::new(Some(handle)),
        }))
    }
}

impl DecoderEngine for SoftEngine {
    fn push_buffer(&self, stream: Buffer, size: usize) -> bool {
        self.tx.send(Command::Data(stream, size)).is_ok()
    }

    fn flush(&self) {
        if !self.tx.send(Command::Flush).is_ok() {
            warn!("flush dropped, input queue unavailable");
        }
    }

    fn put_display_picture(&self, picture: Buffer) {
        self.shared.pictures.lock().push_back(picture);
        self.shared.picture_ready.notify_one();
    }

    fn preallocate_buffers(&self) -> bool {
        let Some(settings) = self.shared.settings.stream else {
            self.shared.record(ErrorCode::RequestMalformed);
            return false;
        };
        let mut stream = self.shared.stream.lock();
        let count = MAX_REFERENCES + self.shared.settings.stack_size as usize;
        match self.shared.provision(settings, CropInfo::default(), count) {
            Ok(()) => {
                stream.provisioned = Some((settings, count));
                true
            }
            Err(code) => {
                self.shared.record(code);
                false
            }
        }
    }

    fn last_error(&self) -> ErrorCode {
        self.shared.status.lock().last_error
    }

    /// Deepest sequence decoded so far, or the engine depth before any sequence.
    fn max_bit_depth(&self) -> u8 {
        match self.shared.max_bit_depth.load(Ordering::Acquire) {
            0 => HW_IP_BIT_DEPTH,
            depth => depth,
        }
    }

    fn frame_error(&self, picture: Option<&Buffer>) -> ErrorCode {
        let status = self.shared.status.lock();
        match picture {
            Some(picture) => status
                .frame_errors
                .get(&picture.id())
                .copied()
                .unwrap_or_default(),
            None => status.last_error,
        }
    }
}

impl Drop for SoftEngine {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        self.tx.close();
        self.shared.picture_ready.notify_all();
        if let Some(handle) = self.scheduler.lock().take() {
            // The last reference can be released from a callback on the scheduler itself.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Shared {
    fn run(&self, rx: BoundedRx<Command>) {
        loop {
            match rx.recv_blocking(POLL, &self.stop) {
                RecvOutcome::Data(Command::Data(buffer, size)) => self.decode_buffer(buffer, size),
                RecvOutcome::Data(Command::Flush) => self.flush_stream(),
                RecvOutcome::Closed | RecvOutcome::Empty => break,
            }
        }
        debug!("scheduler stopped");
    }

    /// Keep the first error; warnings only fill an empty status.
    fn record(&self, code: ErrorCode) {
        let mut status = self.status.lock();
        if code.is_error() && !status.last_error.is_error()
            || code.is_warning() && status.last_error == ErrorCode::Success
        {
            status.last_error = code;
        }
    }

    fn decode_buffer(&self, buffer: Buffer, size: usize) {
        let mut stream = self.stream.lock();
        if stream.halted {
            return;
        }
        if self.settings.input_mode == InputMode::Split {
            // Units never straddle split buffers.
            let data = {
                let state = buffer.lock();
                state.data()[..size.min(state.size())].to_vec()
            };
            stream.handles.push(buffer.clone());
            self.parse_units(&mut stream, &data, Some(&buffer));
        } else {
            {
                let state = buffer.lock();
                let data = &state.data()[..size.min(state.size())];
                stream.pending.extend_from_slice(data);
            }
            drop(buffer);
            let data = std::mem::take(&mut stream.pending);
            let consumed = self.parse_units(&mut stream, &data, None);
            stream.pending = data[consumed..].to_vec();
        }
    }

    /// Handle every complete unit of `data`; returns the bytes consumed.
    fn parse_units(&self, stream: &mut StreamState, data: &[u8], source: Option<&Buffer>) -> usize {
        let mut offset = 0;
        while offset < data.len() && !stream.halted {
            match stream::next_unit(&data[offset..]) {
                Ok(Some(unit)) => {
                    offset += unit.encoded_len();
                    self.handle_unit(stream, unit, source);
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(%err, dropped = data.len() - offset, "skipping unreadable stream data");
                    return data.len();
                }
            }
        }
        offset
    }

    fn handle_unit(&self, stream: &mut StreamState, unit: Unit<'_>, source: Option<&Buffer>) {
        trace!(kind = ?unit.kind, len = unit.payload.len(), "unit");
        match unit.kind {
            UnitKind::Sequence => match SequenceHeader::parse(unit.payload) {
                Ok(header) => self.on_sequence(stream, header),
                Err(err) => warn!(%err, "bad sequence header"),
            },
            UnitKind::Picture => match PictureUnit::parse(unit.payload) {
                Ok(picture) => self.on_picture(stream, picture),
                Err(err) => warn!(%err, "bad picture unit"),
            },
            UnitKind::Sei => match stream::parse_sei(unit.payload) {
                Ok(sei) if sei.payload.len() > SEI_CAPACITY => {
                    self.record(ErrorCode::WarnSeiOverflow);
                }
                Ok(sei) => {
                    self.listener.parsed_sei(&sei);
                    if let Some(source) = source {
                        source.lock().meta.sei.get_or_insert_with(Vec::new).push(sei);
                    }
                }
                Err(err) => warn!(%err, "bad SEI unit"),
            },
            UnitKind::Hdr => match stream::parse_hdr(unit.payload) {
                Ok(hdr) => stream.hdr = hdr,
                Err(err) => warn!(%err, "bad HDR unit"),
            },
        }
    }

    fn provision(&self, settings: StreamSettings, crop: CropInfo, count: usize) -> Result<(), ErrorCode> {
        let format = settings.native_format(self.settings.storage);
        let pitch = min_pitch(settings.dim.width, &format);
        let request = ResolutionRequest {
            buffer_count: count,
            buffer_size: picture_size(settings.dim, pitch, &format),
            stream: settings,
            crop,
        };
        self.listener.resolution_found(&request)
    }

    fn on_sequence(&self, stream: &mut StreamState, header: SequenceHeader) {
        if stream.active == Some(header) {
            return;
        }
        let settings = header.stream_settings();
        let needed = header.num_ref as usize + self.settings.stack_size as usize;
        if let Some((pool, count)) = stream.provisioned {
            let fits = pool.chroma == settings.chroma
                && pool.bit_depth == settings.bit_depth
                && settings.dim.width <= pool.dim.width
                && settings.dim.height <= pool.dim.height
                && needed <= count;
            if !fits {
                warn!(dim = %settings.dim, pool = %pool.dim, "sequence does not fit the channel, discarded");
                self.record(ErrorCode::WarnSpsNotCompatible);
                stream.active = None;
                return;
            }
        }
        match self.provision(settings, header.crop, needed) {
            Ok(()) => {
                stream.provisioned.get_or_insert((settings, needed));
                stream.active = Some(header);
                self.max_bit_depth
                    .fetch_max(settings.bit_depth, Ordering::AcqRel);
            }
            Err(code) => {
                self.record(code);
                self.halt(stream);
            }
        }
    }

    /// Stop decoding and report the status as end of stream.
    fn halt(&self, stream: &mut StreamState) {
        stream.halted = true;
        stream.references.clear();
        stream.handles.clear();
        self.listener.display(None, None);
    }

    fn wait_free_picture(&self, references: &VecDeque<Buffer>) -> Option<Buffer> {
        let mut free = self.pictures.lock();
        loop {
            if self.stop.load(Ordering::Acquire) {
                return None;
            }
            let position = free
                .iter()
                .position(|candidate| !references.iter().any(|r| r.same_as(candidate)));
            if let Some(position) = position {
                return free.remove(position);
            }
            self.picture_ready.wait_for(&mut free, POLL * 10);
        }
    }

    fn on_picture(&self, stream: &mut StreamState, unit: PictureUnit) {
        let Some(header) = stream.active else {
            debug!(seed = unit.seed, "picture without active sequence, skipped");
            stream.handles.clear();
            return;
        };
        let Some(picture) = self.wait_free_picture(&stream.references) else {
            return;
        };
        let format = header.stream_settings().native_format(self.settings.storage);
        let Some(fourcc) = format.fourcc() else {
            warn!(?format, "no four-cc for decoder layout");
            self.record(ErrorCode::Error);
            self.halt(stream);
            return;
        };
        let split = self.settings.input_mode == InputMode::Split;
        let crc;
        {
            let mut state = picture.lock();
            paint(&mut state, &format, header.dim, unit.seed);
            crc = native_crc(&state, &format, header.dim);
            state.format = Some(PictureFormat {
                fourcc,
                dim: header.dim,
            });
            if let Some(hdr) = state.meta.hdr.as_mut() {
                *hdr = stream.hdr.clone();
            }
            state.meta.handles = split.then(|| HandleMeta {
                handles: stream
                    .handles
                    .drain(..)
                    .map(|buffer| DecodeHandle {
                        stream: buffer,
                        state: HandleState::Processed,
                    })
                    .collect(),
            });
        }
        let error = if unit.corrupt {
            ErrorCode::Error
        } else if unit.conceal {
            ErrorCode::WarnConcealDetect
        } else {
            ErrorCode::Success
        };
        self.status.lock().frame_errors.insert(picture.id(), error);

        let keep = match self.settings.dpb_mode {
            DpbMode::Normal => header.num_ref as usize,
            DpbMode::NoReordering => (header.num_ref as usize).min(1),
        };
        if keep > 0 {
            stream.references.push_back(picture.clone());
        }
        while stream.references.len() > keep {
            stream.references.pop_front();
        }

        let handles = picture
            .lock()
            .meta
            .handles
            .as_ref()
            .map_or(0, |meta| meta.handles.len());
        for parsing_id in 0..handles {
            self.listener.end_parsing(&picture, parsing_id);
        }
        self.listener.end_decoding(Some(&picture));
        if error.is_error() {
            self.record(error);
            stream.halted = true;
        }
        let info = DecodeInfo {
            storage: self.settings.storage,
            bit_depth_y: header.bit_depth,
            bit_depth_c: header.bit_depth,
            crop: header.crop,
            crc,
            chroma: header.chroma,
            dim: header.dim,
            sequence: header.sequence,
            profile: header.profile as u32,
            level: header.level as u32,
        };
        trace!(seed = unit.seed, id = picture.id(), crc, "picture decoded");
        self.listener.display(Some(&picture), Some(&info));
    }

    fn flush_stream(&self) {
        let mut stream = self.stream.lock();
        if !stream.pending.is_empty() {
            warn!(bytes = stream.pending.len(), "incomplete unit at end of stream");
            stream.pending.clear();
        }
        stream.references.clear();
        stream.handles.clear();
        debug!("end of stream");
        self.listener.display(None, None);
    }
}

/// Write the synthetic samples of picture `seed` in the decoder layout.
fn paint(state: &mut BufferState, format: &PicFormat, dim: Dimension, seed: u32) {
    let samples = SampleLayout::of(format);
    let bd = format.bit_depth;
    if let Some(mut luma) = state.plane_mut(PlaneId::Y) {
        let pitch = luma.pitch();
        for y in 0..dim.height as usize {
            for x in 0..dim.width as usize {
                samples.write(luma.data(), pitch, x, y, stream::pattern_sample(seed, 0, x, y, bd));
            }
        }
    }
    let cdim = format.chroma.chroma_dim(dim);
    let (rows, cols) = (cdim.height as usize, cdim.width as usize);
    match format.order {
        ChromaOrder::NoChroma => {}
        ChromaOrder::SemiPlanar => {
            if let Some(mut uv) = state.plane_mut(PlaneId::Uv) {
                let pitch = uv.pitch();
                for y in 0..rows {
                    for x in 0..cols {
                        let (u, v) = (
                            stream::pattern_sample(seed, 1, x, y, bd),
                            stream::pattern_sample(seed, 2, x, y, bd),
                        );
                        samples.write(uv.data(), pitch, 2 * x, y, u);
                        samples.write(uv.data(), pitch, 2 * x + 1, y, v);
                    }
                }
            }
        }
        ChromaOrder::Planar => {
            for (index, id) in [(1, PlaneId::U), (2, PlaneId::V)] {
                if let Some(mut plane) = state.plane_mut(id) {
                    let pitch = plane.pitch();
                    for y in 0..rows {
                        for x in 0..cols {
                            let value = stream::pattern_sample(seed, index, x, y, bd);
                            samples.write(plane.data(), pitch, x, y, value);
                        }
                    }
                }
            }
        }
    }
}

/// CRC-32 over the visible samples, one byte per 8-bit sample, two otherwise.
fn native_crc(state: &BufferState, format: &PicFormat, dim: Dimension) -> u32 {
    let samples = SampleLayout::of(format);
    let wide = format.bit_depth > 8;
    let mut hasher = crc32fast::Hasher::new();
    let mut hash_plane = |id: PlaneId, columns: usize, rows: usize, step: usize, first: usize| {
        let Some(plane) = state.plane(id) else {
            return;
        };
        for y in 0..rows {
            for x in 0..columns {
                let value = samples.read(plane.data(), plane.pitch(), x * step + first, y);
                if wide {
                    hasher.update(&value.to_le_bytes());
                } else {
                    hasher.update(&[value as u8]);
                }
            }
        }
    };
    hash_plane(PlaneId::Y, dim.width as usize, dim.height as usize, 1, 0);
    let cdim = format.chroma.chroma_dim(dim);
    let (cols, rows) = (cdim.width as usize, cdim.height as usize);
    match format.order {
        ChromaOrder::NoChroma => {}
        ChromaOrder::SemiPlanar => {
            hash_plane(PlaneId::Uv, cols, rows, 2, 0);
            hash_plane(PlaneId::Uv, cols, rows, 2, 1);
        }
        ChromaOrder::Planar => {
            hash_plane(PlaneId::U, cols, rows, 1, 0);
            hash_plane(PlaneId::V, cols, rows, 1, 0);
        }
    }
    hasher.finalize()
}
