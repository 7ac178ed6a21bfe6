//! Compressed input: loaders filling stream buffers and the feeder thread pushing them.

use std::{
    fs::File,
    io::{self, BufReader, Read},
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use tracing::{debug, warn};
use vdec_core::prelude::*;

use crate::{
    completion::Completion,
    config::{DecodeUnit, InputMode},
    engine::{
        DecoderEngine,
        stream::{self, UnitKind},
    },
    error::VdecError,
};

const READ_CHUNK: usize = 64 * 1024;
/// Pause before acquiring again from a decommitted pool.
const RETRY: Duration = Duration::from_millis(1);

/// Fills a stream buffer from a byte source.
pub trait InputLoader: Send {
    /// Fill `buffer`; the number of valid bytes is returned, `0` at end of input.
    fn read_stream(&mut self, reader: &mut dyn Read, buffer: &Buffer) -> io::Result<usize>;
}

/// Reads fixed-size pieces of the input, ignoring unit boundaries.
#[derive(Debug, Default)]
pub struct BasicLoader;

impl InputLoader for BasicLoader {
    fn read_stream(&mut self, reader: &mut dyn Read, buffer: &Buffer) -> io::Result<usize> {
        let mut state = buffer.lock();
        let data = state.data_mut();
        let mut filled = 0;
        while filled < data.len() {
            match reader.read(&mut data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(filled)
    }
}

/// Cuts the input on decoding-unit boundaries, one unit group per buffer.
///
/// A group is the non-picture units preceding a picture plus the picture itself. In
/// access-unit mode the suffix messages that follow the picture belong to it as well.
/// Each unit is described by a section of the buffer's [`StreamMeta`].
#[derive(Debug)]
pub struct SplitLoader {
    pending: Vec<u8>,
    eof: bool,
    unit: DecodeUnit,
}

impl SplitLoader {
    pub fn new(unit: DecodeUnit) -> Self {
        Self {
            pending: Vec::new(),
            eof: false,
            unit,
        }
    }

    /// Units of the next group as `(offset, length, is_picture)`, or `None` when more
    /// data is needed to find the end of the group.
    fn next_group(&self) -> io::Result<Option<Vec<(usize, usize, bool)>>> {
        let mut units = Vec::new();
        let mut offset = 0;
        let mut has_picture = false;
        loop {
            let unit = stream::next_unit(&self.pending[offset..])
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
            let Some(unit) = unit else {
                // End of the buffered data: the group is complete only at end of input.
                return Ok((self.eof && !units.is_empty()).then_some(units));
            };
            if has_picture {
                let suffix = unit.kind == UnitKind::Sei && unit.payload.first() == Some(&0);
                if !suffix || self.unit == DecodeUnit::VclUnit {
                    return Ok(Some(units));
                }
            }
            let picture = unit.kind.is_vcl();
            units.push((offset, unit.encoded_len(), picture));
            offset += unit.encoded_len();
            has_picture |= picture;
        }
    }
}

impl InputLoader for SplitLoader {
    fn read_stream(&mut self, reader: &mut dyn Read, buffer: &Buffer) -> io::Result<usize> {
        loop {
            if let Some(units) = self.next_group()? {
                let size = units.iter().map(|&(_, len, _)| len).sum::<usize>();
                let mut state = buffer.lock();
                if size > state.size() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("decoding unit of {size} bytes exceeds the {} bytes input buffer", state.size()),
                    ));
                }
                state.data_mut()[..size].copy_from_slice(&self.pending[..size]);
                let meta = state.meta.stream.get_or_insert_with(StreamMeta::default);
                meta.clear();
                for (offset, length, picture) in units {
                    meta.add_section(offset, length, SectionFlags { end_of_frame: picture });
                }
                self.pending.drain(..size);
                return Ok(size);
            }
            if self.eof {
                if !self.pending.is_empty() {
                    warn!(bytes = self.pending.len(), "truncated unit at end of input");
                    self.pending.clear();
                }
                return Ok(0);
            }
            let start = self.pending.len();
            self.pending.resize(start + READ_CHUNK, 0);
            let read = loop {
                match reader.read(&mut self.pending[start..]) {
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    other => break other,
                }
            };
            match read {
                Ok(n) => {
                    self.pending.truncate(start + n);
                    self.eof = n == 0;
                }
                Err(err) => {
                    self.pending.truncate(start);
                    return Err(err);
                }
            }
        }
    }
}

/// Loader matching the input mode.
pub fn loader_for(mode: InputMode, unit: DecodeUnit) -> Box<dyn InputLoader> {
    match mode {
        InputMode::Unsplit => Box::new(BasicLoader),
        InputMode::Split => Box::new(SplitLoader::new(unit)),
    }
}

/// Background feeder: takes stream buffers from a pool, fills them and pushes them to
/// the engine until the input ends, then flushes the engine.
///
/// A decommitted pool is retried until it is committed again or the feeder is dropped.
/// Dropping the feeder asks the thread to exit and joins it. The pool must be
/// decommitted first so a feeder blocked on acquisition wakes up.
pub struct AsyncFileInput {
    exit: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl AsyncFileInput {
    pub fn start(
        path: &Path,
        pool: BufferPool,
        engine: Arc<dyn DecoderEngine>,
        mut loader: Box<dyn InputLoader>,
        completion: Arc<Completion>,
    ) -> Result<Self, VdecError> {
        let file = File::open(path).map_err(|err| VdecError::file(path, err))?;
        let exit = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&exit);
        let worker = thread::Builder::new()
            .name("vdec-feeder".into())
            .spawn(move || {
                let mut reader = BufReader::new(file);
                let mut pushed = 0u64;
                while !stop.load(Ordering::Acquire) {
                    let buffer = match pool.acquire(AcquireMode::Blocking) {
                        Ok(buffer) => buffer,
                        Err(PoolError::Decommitted(_)) => {
                            thread::sleep(RETRY);
                            continue;
                        }
                        Err(err) => {
                            completion.fail(err.into());
                            break;
                        }
                    };
                    match loader.read_stream(&mut reader, &buffer) {
                        Ok(0) => {
                            debug!(pushed, "input exhausted, flushing");
                            engine.flush();
                            break;
                        }
                        Ok(size) => {
                            if !engine.push_buffer(buffer, size) {
                                completion.fail(VdecError::Protocol("Failed to push buffer".into()));
                                break;
                            }
                            pushed += 1;
                        }
                        Err(err) => {
                            completion.fail(err.into());
                            break;
                        }
                    }
                }
            })?;
        Ok(Self {
            exit,
            worker: Some(worker),
        })
    }
}

impl Drop for AsyncFileInput {
    fn drop(&mut self) {
        self.exit.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("feeder thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, sync::atomic::AtomicUsize, time::Instant};

    use super::*;
    use crate::{
        engine::stream::{PictureUnit, SequenceHeader, SyntheticStream},
        error::ErrorCode,
    };

    #[derive(Default)]
    struct CountingEngine {
        pushed: AtomicUsize,
        flushed: AtomicBool,
    }

    impl DecoderEngine for CountingEngine {
        fn push_buffer(&self, _stream: Buffer, _size: usize) -> bool {
            self.pushed.fetch_add(1, Ordering::AcqRel);
            true
        }
        fn flush(&self) {
            self.flushed.store(true, Ordering::Release);
        }
        fn put_display_picture(&self, _picture: Buffer) {}
        fn preallocate_buffers(&self) -> bool {
            false
        }
        fn last_error(&self) -> ErrorCode {
            ErrorCode::Success
        }
        fn max_bit_depth(&self) -> u8 {
            8
        }
        fn frame_error(&self, _picture: Option<&Buffer>) -> ErrorCode {
            ErrorCode::Success
        }
    }

    fn suffix_sei() -> SeiMessage {
        SeiMessage {
            prefix: false,
            payload_type: 5,
            payload: vec![1, 2, 3],
        }
    }

    fn stream_bytes() -> Vec<u8> {
        SyntheticStream::new()
            .sequence(SequenceHeader::new(Dimension::new(64, 64), ChromaMode::Yuv420, 8))
            .picture(PictureUnit::new(0))
            .sei(&suffix_sei())
            .picture(PictureUnit::new(1))
            .finish()
    }

    fn sections(buffer: &Buffer) -> Vec<(usize, bool)> {
        buffer
            .lock()
            .meta
            .stream
            .as_ref()
            .map(|meta| {
                meta.sections
                    .iter()
                    .map(|section| (section.length, section.flags.end_of_frame))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn basic_loader_fills_whole_buffers() {
        let data = vec![9u8; 100];
        let buffer = Buffer::standalone(BufferLayout::stream(64));
        let mut reader = &data[..];
        let mut loader = BasicLoader;
        assert_eq!(loader.read_stream(&mut reader, &buffer).unwrap(), 64);
        assert_eq!(loader.read_stream(&mut reader, &buffer).unwrap(), 36);
        assert_eq!(loader.read_stream(&mut reader, &buffer).unwrap(), 0);
    }

    #[test]
    fn access_units_keep_their_suffix_messages() {
        let data = stream_bytes();
        let buffer = Buffer::standalone(BufferLayout::stream(1024));
        let mut reader = &data[..];
        let mut loader = SplitLoader::new(DecodeUnit::AccessUnit);

        let first = loader.read_stream(&mut reader, &buffer).unwrap();
        let layout = sections(&buffer);
        assert_eq!(layout.len(), 3);
        assert_eq!(layout.iter().filter(|(_, eof)| *eof).count(), 1);
        assert_eq!(first, layout.iter().map(|(len, _)| len).sum::<usize>());

        let second = loader.read_stream(&mut reader, &buffer).unwrap();
        assert_eq!(sections(&buffer), vec![(second, true)]);
        assert_eq!(first + second, data.len());
        assert_eq!(loader.read_stream(&mut reader, &buffer).unwrap(), 0);
    }

    #[test]
    fn vcl_units_end_at_the_picture() {
        let data = stream_bytes();
        let buffer = Buffer::standalone(BufferLayout::stream(1024));
        let mut reader = &data[..];
        let mut loader = SplitLoader::new(DecodeUnit::VclUnit);

        loader.read_stream(&mut reader, &buffer).unwrap();
        assert_eq!(sections(&buffer).len(), 2);
        loader.read_stream(&mut reader, &buffer).unwrap();
        assert_eq!(sections(&buffer).len(), 2);
        assert_eq!(loader.read_stream(&mut reader, &buffer).unwrap(), 0);
    }

    #[test]
    fn feeder_waits_for_a_recommitted_pool() {
        let path = std::env::temp_dir().join(format!("vdec-feeder-{}.bin", std::process::id()));
        fs::write(&path, stream_bytes()).unwrap();
        let pool = BufferPool::new("stream buffer");
        pool.init(&HeapAllocator, 2, BufferLayout::stream(32)).unwrap();
        pool.decommit();
        let engine = Arc::new(CountingEngine::default());
        let completion = Arc::new(Completion::new());

        let feeder = AsyncFileInput::start(
            &path,
            pool.clone(),
            engine.clone(),
            Box::new(BasicLoader),
            completion.clone(),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(engine.pushed.load(Ordering::Acquire), 0);
        assert!(!feeder.worker.as_ref().unwrap().is_finished());

        pool.commit();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !engine.flushed.load(Ordering::Acquire) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        drop(feeder);
        fs::remove_file(&path).unwrap();

        assert!(engine.flushed.load(Ordering::Acquire));
        let expected = stream_bytes().len().div_ceil(32);
        assert_eq!(engine.pushed.load(Ordering::Acquire), expected);
        assert!(completion.take_failure().is_none());
    }

    #[test]
    fn dropping_a_feeder_stalled_on_a_decommitted_pool_returns() {
        let path = std::env::temp_dir().join(format!("vdec-stalled-{}.bin", std::process::id()));
        fs::write(&path, stream_bytes()).unwrap();
        let pool = BufferPool::new("stream buffer");
        pool.init(&HeapAllocator, 1, BufferLayout::stream(32)).unwrap();
        pool.decommit();
        let engine = Arc::new(CountingEngine::default());

        let feeder = AsyncFileInput::start(
            &path,
            pool,
            engine.clone(),
            Box::new(BasicLoader),
            Arc::new(Completion::new()),
        )
        .unwrap();
        drop(feeder);
        fs::remove_file(&path).unwrap();
        assert!(!engine.flushed.load(Ordering::Acquire));
    }

    #[test]
    fn oversized_unit_is_rejected() {
        let data = stream_bytes();
        let buffer = Buffer::standalone(BufferLayout::stream(16));
        let mut reader = &data[..];
        let err = SplitLoader::new(DecodeUnit::AccessUnit)
            .read_stream(&mut reader, &buffer)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
