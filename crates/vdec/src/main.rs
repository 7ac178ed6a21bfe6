use std::{path::PathBuf, process::ExitCode, time::Duration};

use anyhow::Context;
use clap::{ArgAction, Parser, ValueEnum};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use vdec::prelude::*;
use vdec::config::CERT_CRC_FILE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Storage {
    Raster,
    Tile64,
}

#[derive(Parser, Debug)]
#[command(name = "vdec", about = "Decode an elementary stream into planar YUV")]
struct Args {
    /// Compressed input file.
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Planar YUV output file.
    #[arg(short, long, default_value = "dec.yuv")]
    output: PathBuf,
    /// Do not write the YUV output.
    #[arg(long)]
    noyuv: bool,
    /// Input is an AVC stream.
    #[arg(long, conflicts_with = "hevc")]
    avc: bool,
    /// Input is an HEVC stream (default).
    #[arg(long)]
    hevc: bool,
    /// Output bit depth: 0 follows the stream, -1 uses the decoder maximum.
    #[arg(long = "bd", default_value_t = -1, allow_hyphen_values = true)]
    bit_depth: i32,
    /// Number of decoder cores, 0 for automatic.
    #[arg(long, default_value_t = 0)]
    core: u8,
    /// DDR bus width: 16, 32 or 64.
    #[arg(long, default_value_t = 32)]
    ddr_width: u32,
    /// Input buffers.
    #[arg(long, default_value_t = vdec::config::DEFAULT_INPUT_BUFFERS)]
    nbuf: usize,
    /// Input buffer size in bytes.
    #[arg(long, default_value_t = vdec::config::DEFAULT_INPUT_BUFFER_SIZE)]
    nsize: usize,
    /// Decode the input this many times.
    #[arg(long = "loop", default_value_t = 1)]
    loops: u32,
    /// Seconds before giving up, negative waits forever.
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    timeout: i64,
    /// Stop after about this many displayed pictures.
    #[arg(long)]
    max_frames: Option<u64>,
    /// Dump parsed SEI messages.
    #[arg(long)]
    sei_file: Option<PathBuf>,
    /// Dump HDR metadata of displayed pictures.
    #[arg(long)]
    hdr_file: Option<PathBuf>,
    /// Stream settings known ahead: WIDTHxHEIGHT:mode:chroma:bitdepth:profile:level.
    #[arg(long)]
    prealloc_args: Option<StreamSettings>,
    /// Push one decoding unit per input buffer.
    #[arg(long)]
    split_input: bool,
    /// Slice latency: one VCL unit per decoding unit, no reordering.
    #[arg(long, conflicts_with = "framelat")]
    slicelat: bool,
    /// Frame latency: access units, no reordering.
    #[arg(long)]
    framelat: bool,
    /// Output pictures in decoding order.
    #[arg(long)]
    no_reordering: bool,
    /// Place each plane of a decoded picture in its own memory chunk.
    #[arg(long)]
    multi_chunk: bool,
    /// Write the decoder CRC of each picture.
    #[arg(long = "crc-ip")]
    crc: Option<PathBuf>,
    /// Write the CRC of each written picture.
    #[arg(long)]
    cert_crc: bool,
    /// Layout of decoded pictures.
    #[arg(long, value_enum, default_value_t = Storage::Raster)]
    frame_buffer_storage: Storage,
    /// Only report errors.
    #[arg(short, long)]
    quiet: bool,
    /// Log detail, 0 to 3.
    #[arg(long, default_value_t = 1)]
    verbosity: u8,
    /// Plain log output.
    #[arg(long)]
    no_color: bool,
    /// Start configuring another channel.
    #[arg(long, action = ArgAction::Count)]
    next_chan: u8,
}

impl Args {
    fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbosity) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "info",
            (false, 2) => "debug",
            _ => "trace",
        }
    }

    fn into_config(self) -> Result<Config, VdecError> {
        if self.next_chan > 0 {
            return Err(ConfigError::TooManyChannels.into());
        }
        let mut settings = DecSettings {
            codec: if self.avc { Codec::Avc } else { Codec::Hevc },
            bit_depth: self.bit_depth,
            num_core: self.core,
            ddr_width: self.ddr_width,
            storage: match self.frame_buffer_storage {
                Storage::Raster => StorageMode::Raster,
                Storage::Tile64 => StorageMode::Tile64x4,
            },
            input_mode: if self.split_input {
                InputMode::Split
            } else {
                InputMode::Unsplit
            },
            stream: self.prealloc_args,
            ..Default::default()
        };
        if self.slicelat {
            settings.dec_unit = DecodeUnit::VclUnit;
            settings.dpb_mode = DpbMode::NoReordering;
        }
        if self.framelat || self.no_reordering {
            settings.dpb_mode = DpbMode::NoReordering;
        }
        Ok(Config {
            input: self.input.unwrap_or_default(),
            output: (!self.noyuv).then_some(self.output),
            crc: self.crc,
            cert_crc: self.cert_crc.then(|| PathBuf::from(CERT_CRC_FILE)),
            sei_file: self.sei_file,
            hdr_file: self.hdr_file,
            settings,
            input_buffers: self.nbuf,
            input_buffer_size: self.nsize,
            loops: self.loops,
            timeout: u64::try_from(self.timeout).ok().map(Duration::from_secs),
            max_frames: self.max_frames.unwrap_or(u64::MAX),
            multi_chunk: self.multi_chunk,
        })
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = args.into_config()?;
    let input = config.input.clone();
    let runner = ChannelRunner::new(config)?;
    let report = runner
        .run()
        .with_context(|| format!("decoding {}", input.display()))?;
    if report.timed_out {
        warn!(displayed = report.displayed, "decoding timed out");
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(!args.no_color)
        .with_target(false)
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            let code = err
                .downcast_ref::<VdecError>()
                .map_or(1, VdecError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("vdec").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_the_harness() {
        let config = parse(&["-i", "in.bin"]).into_config().unwrap();
        assert_eq!(config.output, Some(PathBuf::from("dec.yuv")));
        assert_eq!(config.settings.bit_depth, -1);
        assert_eq!(config.settings.codec, Codec::Hevc);
        assert_eq!(config.timeout, None);
        assert_eq!(config.max_frames, u64::MAX);
    }

    #[test]
    fn latency_switches_set_unit_and_dpb() {
        let config = parse(&["-i", "in.bin", "--slicelat"]).into_config().unwrap();
        assert_eq!(config.settings.dec_unit, DecodeUnit::VclUnit);
        assert_eq!(config.settings.dpb_mode, DpbMode::NoReordering);
        let config = parse(&["-i", "in.bin", "--framelat", "--noyuv"]).into_config().unwrap();
        assert_eq!(config.settings.dec_unit, DecodeUnit::AccessUnit);
        assert_eq!(config.output, None);
    }

    #[test]
    fn second_channel_is_refused() {
        let err = parse(&["-i", "a.bin", "--next-chan"]).into_config().unwrap_err();
        assert!(matches!(err, VdecError::Config(ConfigError::TooManyChannels)));
    }

    #[test]
    fn bad_prealloc_string_fails_at_parse_time() {
        let parsed = Args::try_parse_from(["vdec", "-i", "a.bin", "--prealloc-args", "1920x1080"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn negative_values_are_accepted() {
        let args = parse(&["-i", "a.bin", "--bd", "-1", "--timeout", "5"]);
        let config = args.into_config().unwrap();
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }
}
