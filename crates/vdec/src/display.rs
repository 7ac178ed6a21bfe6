//! Display callback: end of stream, errors, releases and picture output.

use std::{collections::HashMap, sync::Arc};

use parking_lot::{Mutex, MutexGuard};
use tracing::{error, info, trace, warn};
use vdec_core::prelude::*;

use crate::{
    completion::Completion,
    engine::{DecodeInfo, EngineHandle},
    error::ErrorCode,
    hdr::HdrWriter,
    metrics::StageMetrics,
    output::OutputWriter,
};

/// Mutable display state, behind the display lock.
pub struct DisplayState {
    writers: HashMap<StorageMode, OutputWriter>,
    hdr: Option<HdrWriter>,
    bit_depth: Option<u8>,
    /// Pictures displayed from the main storage mode.
    pub displayed: u64,
    /// Pictures reported with concealed areas.
    pub conceal: u64,
    finished: bool,
}

impl DisplayState {
    /// Flush every writer.
    pub fn flush(&mut self) -> std::io::Result<()> {
        for writer in self.writers.values_mut() {
            writer.flush()?;
        }
        if let Some(hdr) = self.hdr.as_mut() {
            hdr.flush()?;
        }
        Ok(())
    }
}

/// Serializes the engine's display deliveries.
///
/// | picture | info | meaning |
/// |---------|------|---------|
/// | `None`  | `None` | end of stream, or a failure when the channel status is an error |
/// | `Some`  | `None` | the engine releases the picture, nothing to do |
/// | `Some`  | `Some` | decoded picture to write out and give back |
///
/// A picture whose frame status is an error ends the pass like the end of stream.
/// Completion is signalled once per pass.
pub struct DisplayOrchestrator {
    engine: Arc<EngineHandle>,
    completion: Arc<Completion>,
    main_storage: StorageMode,
    requested_bit_depth: i32,
    max_frames: u64,
    metrics: StageMetrics,
    state: Mutex<DisplayState>,
}

impl DisplayOrchestrator {
    pub fn new(
        engine: Arc<EngineHandle>,
        completion: Arc<Completion>,
        main_storage: StorageMode,
        requested_bit_depth: i32,
        max_frames: u64,
    ) -> Self {
        Self {
            engine,
            completion,
            main_storage,
            requested_bit_depth,
            max_frames,
            metrics: StageMetrics::default(),
            state: Mutex::new(DisplayState {
                writers: HashMap::new(),
                hdr: None,
                bit_depth: None,
                displayed: 0,
                conceal: 0,
                finished: false,
            }),
        }
    }

    pub fn with_writer(self, storage: StorageMode, writer: OutputWriter) -> Self {
        self.state.lock().writers.insert(storage, writer);
        self
    }

    pub fn with_hdr(self, writer: HdrWriter) -> Self {
        self.state.lock().hdr = Some(writer);
        self
    }

    /// Take the display lock, waiting for a delivery in progress.
    pub fn lock(&self) -> MutexGuard<'_, DisplayState> {
        self.state.lock()
    }

    /// Timing of picture output.
    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    /// Prepare for another pass over the input.
    pub fn rearm(&self) {
        let mut state = self.state.lock();
        state.finished = false;
        state.bit_depth = None;
    }

    /// Whether enough pictures were displayed to stop.
    pub fn limit_reached(&self) -> bool {
        self.state.lock().displayed > self.max_frames
    }

    fn output_bit_depth(&self, info: &DecodeInfo, max_bit_depth: impl FnOnce() -> u8) -> u8 {
        match self.requested_bit_depth {
            0 => info.bit_depth_y.max(info.bit_depth_c),
            depth if depth > 0 => depth as u8,
            _ => max_bit_depth(),
        }
    }

    pub fn on_display(&self, picture: Option<&Buffer>, info: Option<&DecodeInfo>) {
        let mut state = self.state.lock();
        let engine = self.engine.get();
        let status = engine
            .as_ref()
            .map_or(ErrorCode::Error, |engine| engine.frame_error(picture));

        if picture.is_none() || status.is_error() {
            if state.finished {
                return;
            }
            state.finished = true;
            let channel = engine
                .as_ref()
                .map_or(status, |engine| engine.last_error());
            match channel {
                ErrorCode::WarnSpsNotCompatible => {
                    warn!("Decoder has discarded some SPS not compatible with the channel settings")
                }
                ErrorCode::WarnSeiOverflow => {
                    warn!("Decoder has discarded some SEI while the SEI metadata buffer was too small")
                }
                _ => {}
            }
            if status.is_error() {
                error!(code = status.code(), "Error: {status}");
            } else {
                info!("Complete");
            }
            self.completion.signal();
            return;
        }

        if status == ErrorCode::WarnConcealDetect {
            state.conceal += 1;
        }
        let (Some(picture), Some(info), Some(engine)) = (picture, info, engine) else {
            return;
        };

        let bit_depth = match state.bit_depth {
            Some(depth) => depth,
            None => {
                let depth = self.output_bit_depth(info, || engine.max_bit_depth());
                state.bit_depth = Some(depth);
                depth
            }
        };

        if let Some(writer) = state.writers.get_mut(&info.storage) {
            let written = self
                .metrics
                .time(|| writer.process_output(&picture.lock(), info, bit_depth));
            if let Err(err) = written {
                error!(%err, id = picture.id(), "cannot write picture");
                state.finished = true;
                self.completion.fail(err);
                return;
            }
        }

        if info.storage != self.main_storage {
            return;
        }
        let hdr = picture.lock().meta.hdr.clone();
        if let (Some(meta), Some(writer)) = (hdr, state.hdr.as_mut()) {
            if let Err(err) = writer.write(&meta) {
                warn!(%err, "cannot write HDR record");
            }
        }
        engine.put_display_picture(picture.clone());
        state.displayed += 1;
        trace!(displayed = state.displayed, "picture displayed");
        if state.displayed > self.max_frames {
            self.completion.signal();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{self, Write},
        time::Duration,
    };

    use super::*;
    use crate::engine::DecoderEngine;

    #[derive(Default)]
    struct FakeEngine {
        returned: Mutex<Vec<u64>>,
        frame_errors: Mutex<HashMap<u64, ErrorCode>>,
        last_error: Mutex<ErrorCode>,
    }

    impl DecoderEngine for FakeEngine {
        fn push_buffer(&self, _stream: Buffer, _size: usize) -> bool {
            true
        }
        fn flush(&self) {}
        fn put_display_picture(&self, picture: Buffer) {
            self.returned.lock().push(picture.id());
        }
        fn preallocate_buffers(&self) -> bool {
            true
        }
        fn last_error(&self) -> ErrorCode {
            *self.last_error.lock()
        }
        fn max_bit_depth(&self) -> u8 {
            8
        }
        fn frame_error(&self, picture: Option<&Buffer>) -> ErrorCode {
            match picture {
                Some(picture) => self
                    .frame_errors
                    .lock()
                    .get(&picture.id())
                    .copied()
                    .unwrap_or_default(),
                None => *self.last_error.lock(),
            }
        }
    }

    #[derive(Clone, Default)]
    struct Bytes(Arc<Mutex<Vec<u8>>>);

    impl Write for Bytes {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Fixture {
        fake: Arc<FakeEngine>,
        _engine: Arc<dyn DecoderEngine>,
        completion: Arc<Completion>,
        crc: Bytes,
        display: DisplayOrchestrator,
        pool: BufferPool,
    }

    fn fixture(max_frames: u64) -> Fixture {
        let fake = Arc::new(FakeEngine::default());
        let engine: Arc<dyn DecoderEngine> = fake.clone();
        let handle = Arc::new(EngineHandle::new());
        handle.attach(&engine);
        let completion = Arc::new(Completion::new());
        let crc = Bytes::default();
        let display = DisplayOrchestrator::new(
            handle,
            completion.clone(),
            StorageMode::Raster,
            -1,
            max_frames,
        )
        .with_writer(
            StorageMode::Raster,
            OutputWriter::new().with_crc(Box::new(crc.clone())),
        );
        let pool = BufferPool::new("pictures");
        pool.init(&HeapAllocator, 4, BufferLayout::stream(16)).unwrap();
        Fixture {
            fake,
            _engine: engine,
            completion,
            crc,
            display,
            pool,
        }
    }

    fn info(storage: StorageMode) -> DecodeInfo {
        DecodeInfo {
            storage,
            bit_depth_y: 8,
            bit_depth_c: 8,
            crop: CropInfo::default(),
            crc: 1,
            chroma: ChromaMode::Yuv420,
            dim: Dimension::new(16, 16),
            sequence: SequenceMode::Progressive,
            profile: 1,
            level: 40,
        }
    }

    fn signalled(completion: &Completion) -> bool {
        completion.wait(Some(Duration::ZERO))
    }

    #[test]
    fn displayed_picture_is_written_counted_and_returned() {
        let f = fixture(u64::MAX);
        let picture = f.pool.acquire(AcquireMode::NonBlocking).unwrap();
        f.display.on_display(Some(&picture), Some(&info(StorageMode::Raster)));
        assert_eq!(f.display.lock().displayed, 1);
        assert_eq!(f.fake.returned.lock().as_slice(), &[picture.id()]);
        assert_eq!(f.crc.0.lock().as_slice(), b"00000001\n");
        assert!(!signalled(&f.completion));
    }

    #[test]
    fn release_only_delivery_does_nothing() {
        let f = fixture(u64::MAX);
        let picture = f.pool.acquire(AcquireMode::NonBlocking).unwrap();
        f.display.on_display(Some(&picture), None);
        assert_eq!(f.display.lock().displayed, 0);
        assert!(f.fake.returned.lock().is_empty());
        assert!(f.crc.0.lock().is_empty());
        assert!(!signalled(&f.completion));
    }

    #[test]
    fn secondary_storage_is_written_but_not_counted() {
        let f = fixture(u64::MAX);
        let picture = f.pool.acquire(AcquireMode::NonBlocking).unwrap();
        f.display.on_display(Some(&picture), Some(&info(StorageMode::Tile64x4)));
        assert_eq!(f.display.lock().displayed, 0);
        assert!(f.fake.returned.lock().is_empty());
    }

    #[test]
    fn end_of_stream_after_error_signals_once() {
        let f = fixture(u64::MAX);
        let picture = f.pool.acquire(AcquireMode::NonBlocking).unwrap();
        f.fake.frame_errors.lock().insert(picture.id(), ErrorCode::Error);
        *f.fake.last_error.lock() = ErrorCode::Error;
        f.display.on_display(Some(&picture), Some(&info(StorageMode::Raster)));
        assert!(signalled(&f.completion));
        f.display.on_display(None, None);
        assert!(!signalled(&f.completion));
        assert_eq!(f.display.lock().displayed, 0);
    }

    #[test]
    fn conceal_is_counted_and_still_displayed() {
        let f = fixture(u64::MAX);
        let picture = f.pool.acquire(AcquireMode::NonBlocking).unwrap();
        f.fake
            .frame_errors
            .lock()
            .insert(picture.id(), ErrorCode::WarnConcealDetect);
        f.display.on_display(Some(&picture), Some(&info(StorageMode::Raster)));
        let state = f.display.lock();
        assert_eq!((state.conceal, state.displayed), (1, 1));
    }

    #[test]
    fn completion_follows_the_picture_past_max_frames() {
        let f = fixture(2);
        let mut pictures = Vec::new();
        for _ in 0..2 {
            let picture = f.pool.acquire(AcquireMode::NonBlocking).unwrap();
            f.display.on_display(Some(&picture), Some(&info(StorageMode::Raster)));
            pictures.push(picture);
        }
        assert!(!signalled(&f.completion));
        assert!(!f.display.limit_reached());

        let third = f.pool.acquire(AcquireMode::NonBlocking).unwrap();
        f.display.on_display(Some(&third), Some(&info(StorageMode::Raster)));
        assert!(signalled(&f.completion));
        assert!(f.display.limit_reached());
        assert_eq!(f.display.lock().displayed, 3);
    }

    #[test]
    fn pictures_in_flight_after_the_cutoff_are_still_written() {
        let f = fixture(0);
        for _ in 0..2 {
            let picture = f.pool.acquire(AcquireMode::NonBlocking).unwrap();
            f.display.on_display(Some(&picture), Some(&info(StorageMode::Raster)));
        }
        assert_eq!(f.display.lock().displayed, 2);
        assert_eq!(f.fake.returned.lock().len(), 2);
        assert_eq!(f.crc.0.lock().as_slice(), b"00000001\n00000001\n");
    }

    #[test]
    fn rearm_allows_another_end_of_stream() {
        let f = fixture(u64::MAX);
        f.display.on_display(None, None);
        assert!(signalled(&f.completion));
        f.display.rearm();
        f.display.on_display(None, None);
        assert!(signalled(&f.completion));
    }
}
