//! One decode channel: files, pools, engine, feeder and the run loop.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use vdec_core::prelude::*;

use crate::{
    completion::Completion,
    config::{Config, InputMode},
    device::Device,
    display::DisplayOrchestrator,
    engine::{DecodeInfo, DecoderEngine, DecoderListener, EngineHandle, ResolutionRequest},
    error::{ErrorCode, VdecError},
    hdr::HdrWriter,
    input::{AsyncFileInput, loader_for},
    output::OutputWriter,
    resolution::ResolutionHandler,
    sei::SeiWriter,
    tracker::DecodeTracker,
};

/// Routes engine events to the channel's handlers.
pub struct ChannelListener {
    pub tracker: DecodeTracker,
    pub resolution: ResolutionHandler,
    pub display: DisplayOrchestrator,
    sei: Option<Mutex<SeiWriter>>,
}

impl DecoderListener for ChannelListener {
    fn end_parsing(&self, picture: &Buffer, parsing_id: usize) {
        self.tracker.on_end_parsing(picture, parsing_id);
    }

    fn end_decoding(&self, picture: Option<&Buffer>) {
        self.tracker.on_end_decoding(picture);
    }

    fn display(&self, picture: Option<&Buffer>, info: Option<&DecodeInfo>) {
        self.display.on_display(picture, info);
    }

    fn resolution_found(&self, request: &ResolutionRequest) -> Result<(), ErrorCode> {
        self.resolution.on_resolution(request)
    }

    fn parsed_sei(&self, sei: &SeiMessage) {
        if let Some(writer) = self.sei.as_ref() {
            if let Err(err) = writer.lock().write(sei) {
                warn!(%err, "cannot write SEI");
            }
        }
    }
}

impl ChannelListener {
    fn flush(&self) -> Result<(), VdecError> {
        if let Some(writer) = self.sei.as_ref() {
            writer.lock().flush()?;
        }
        self.tracker.flush()?;
        self.display.lock().flush()?;
        Ok(())
    }
}

/// Outcome of a channel run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunReport {
    pub displayed: u64,
    pub decoded: u64,
    pub conceal: u64,
    pub elapsed: Duration,
    pub timed_out: bool,
    /// Average time spent writing one picture out, in milliseconds.
    pub output_millis: Option<f64>,
}

impl RunReport {
    /// Statistics line printed at the end of a run.
    ///
    /// # Example
    /// ```rust
    /// use std::time::Duration;
    /// use vdec::channel::RunReport;
    ///
    /// let report = RunReport {
    ///     displayed: 48,
    ///     decoded: 50,
    ///     conceal: 0,
    ///     elapsed: Duration::from_secs(2),
    ///     timed_out: false,
    ///     output_millis: None,
    /// };
    /// assert_eq!(
    ///     report.statistics(),
    ///     "Decoded time = 2.0000 s;  Decoding FrameRate ~ 25.0000 Fps; Frame(s) conceal = 0"
    /// );
    /// ```
    pub fn statistics(&self) -> String {
        let secs = self.elapsed.as_secs_f64();
        let rate = if secs > 0.0 {
            self.decoded as f64 / secs
        } else {
            0.0
        };
        let label = if self.timed_out {
            "TIMEOUT = "
        } else {
            "Decoded time = "
        };
        format!(
            "{label}{secs:.4} s;  Decoding FrameRate ~ {rate:.4} Fps; Frame(s) conceal = {}",
            self.conceal
        )
    }
}

/// Runs one channel from configuration to statistics.
///
/// # Example
/// ```rust,no_run
/// use vdec::prelude::*;
///
/// let config = Config {
///     input: "stream.bin".into(),
///     ..Default::default()
/// };
/// let report = ChannelRunner::new(config)?.run()?;
/// println!("{}", report.statistics());
/// # Ok::<(), VdecError>(())
/// ```
pub struct ChannelRunner {
    config: Config,
    device: Device,
}

impl ChannelRunner {
    /// Validate `config` and open a device for it.
    pub fn new(config: Config) -> Result<Self, VdecError> {
        let mut config = config;
        config.validate()?;
        let device = Device::new(config.settings.num_core).map_err(|err| VdecError::Codec(err.code))?;
        Ok(Self { config, device })
    }

    /// Use `device` instead of a default one, for instance to bound memory.
    pub fn with_device(config: Config, device: Device) -> Result<Self, VdecError> {
        let mut config = config;
        config.validate()?;
        Ok(Self { config, device })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn listener(&self, engine: &Arc<EngineHandle>, completion: &Arc<Completion>) -> Result<ChannelListener, VdecError> {
        let config = &self.config;
        let settings = &config.settings;
        let split = settings.input_mode == InputMode::Split;

        let sei = config.sei_file.as_deref().map(SeiWriter::create).transpose()?;
        let sync_sei = match config.sei_file.as_deref() {
            Some(path) if split => Some(SeiWriter::create(&SeiWriter::sync_path(path))?),
            _ => None,
        };
        let writer = OutputWriter::create(
            config.output.as_deref(),
            config.crc.as_deref(),
            config.cert_crc.as_deref(),
        )?;
        let mut display = DisplayOrchestrator::new(
            Arc::clone(engine),
            Arc::clone(completion),
            settings.storage,
            settings.bit_depth,
            config.max_frames,
        )
        .with_writer(settings.storage, writer);
        if let Some(path) = config.hdr_file.as_deref() {
            display = display.with_hdr(HdrWriter::create(path)?);
        }
        let resolution = ResolutionHandler::new(
            Arc::clone(engine),
            self.device.allocator(),
            settings.storage,
            config.multi_chunk,
            config.hdr_file.is_some(),
        );
        Ok(ChannelListener {
            tracker: DecodeTracker::new(Arc::clone(completion), sync_sei),
            resolution,
            display,
            sei: sei.map(Mutex::new),
        })
    }

    fn stream_pool(&self) -> Result<BufferPool, VdecError> {
        let config = &self.config;
        let pool = BufferPool::new("stream buffer");
        let layout = BufferLayout::stream(config.input_buffer_size);
        match config.settings.input_mode {
            InputMode::Split => {
                pool.init(self.device.allocator().as_ref(), config.input_buffers, layout)?
            }
            InputMode::Unsplit => pool.init(&HeapAllocator, config.input_buffers, layout)?,
        }
        Ok(pool)
    }

    /// Decode the input `loops` times and report.
    pub fn run(&self) -> Result<RunReport, VdecError> {
        let config = &self.config;
        let completion = Arc::new(Completion::new());
        let handle = Arc::new(EngineHandle::new());
        let listener = Arc::new(self.listener(&handle, &completion)?);
        let pool = self.stream_pool()?;

        let engine = self
            .device
            .create_decoder(&config.settings, listener.clone(), config.input_buffers)
            .map_err(|err| VdecError::Codec(err.code))?;
        handle.attach(&engine);

        if config.settings.stream.is_some() && !engine.preallocate_buffers() {
            return Err(VdecError::Codec(engine.last_error()));
        }

        let start = Instant::now();
        let mut timed_out = false;
        for pass in 0..config.loops {
            debug!(pass, "starting pass");
            completion.reset();
            listener.display.rearm();
            pool.commit();
            let feeder = AsyncFileInput::start(
                &config.input,
                pool.clone(),
                Arc::clone(&engine),
                loader_for(config.settings.input_mode, config.settings.dec_unit),
                Arc::clone(&completion),
            )?;
            timed_out = !completion.wait(config.timeout);
            pool.decommit();
            drop(feeder);

            if let Some(err) = completion.take_failure() {
                return Err(err);
            }
            if timed_out || engine.last_error().is_error() || listener.display.limit_reached() {
                break;
            }
        }
        let elapsed = start.elapsed();
        debug!(stats = ?pool.stats(), "stream buffers");
        let report = self.finish(&engine, &listener, elapsed, timed_out)?;
        listener.flush()?;
        Ok(report)
    }

    fn finish(
        &self,
        engine: &Arc<dyn DecoderEngine>,
        listener: &ChannelListener,
        elapsed: Duration,
        timed_out: bool,
    ) -> Result<RunReport, VdecError> {
        let display = listener.display.lock();
        let last = engine.last_error();
        if last.is_error() {
            return Err(VdecError::Codec(last));
        }
        let decoded = listener.tracker.decoded();
        if decoded == 0 {
            return Err(VdecError::NoFrameDecoded);
        }
        let report = RunReport {
            displayed: display.displayed,
            decoded,
            conceal: display.conceal,
            elapsed,
            timed_out,
            output_millis: listener.display.metrics().avg_millis(),
        };
        info!("{}", report.statistics());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(displayed: u64, decoded: u64, millis: u64) -> RunReport {
        RunReport {
            displayed,
            decoded,
            conceal: 2,
            elapsed: Duration::from_millis(millis),
            timed_out: false,
            output_millis: None,
        }
    }

    #[test]
    fn frame_rate_counts_decoded_pictures() {
        assert_eq!(
            report(3, 40, 500).statistics(),
            "Decoded time = 0.5000 s;  Decoding FrameRate ~ 80.0000 Fps; Frame(s) conceal = 2"
        );
    }

    #[test]
    fn timeout_changes_the_label_and_empty_runs_have_no_rate() {
        let timed_out = RunReport {
            timed_out: true,
            ..report(0, 0, 0)
        };
        assert_eq!(
            timed_out.statistics(),
            "TIMEOUT = 0.0000 s;  Decoding FrameRate ~ 0.0000 Fps; Frame(s) conceal = 2"
        );
    }
}
