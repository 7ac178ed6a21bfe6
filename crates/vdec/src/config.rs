//! Channel configuration and decoder settings.

use std::{path::PathBuf, str::FromStr, time::Duration};

use vdec_core::prelude::*;

/// Default size of one compressed input buffer.
pub const DEFAULT_INPUT_BUFFER_SIZE: usize = 32 * 1024;
/// Default number of compressed input buffers.
pub const DEFAULT_INPUT_BUFFERS: usize = 2;
/// Highest core count a channel may request.
pub const MAX_CORES: u8 = 4;
/// Pictures the decoder keeps in flight on top of its references.
pub const DEFAULT_STACK_SIZE: u32 = 2;
/// Pre-allocated dimensions are rounded up to this block size.
pub const PREALLOC_ALIGN: u32 = 64;
/// File receiving the reference CRC when `--cert-crc` is used.
pub const CERT_CRC_FILE: &str = "crc_certif_res.hex";

/// Configuration errors, reported before any decoder resource exists.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("wrong prealloc arguments separator")]
    PreallocSeparator,
    #[error("wrong prealloc chroma format")]
    PreallocChroma,
    #[error("wrong prealloc video format")]
    PreallocVideoMode,
    #[error("wrong prealloc arguments format")]
    PreallocFormat,
    #[error("wrong prealloc arguments")]
    PreallocInvalid,
    #[error("Invalid number of cores")]
    InvalidCores(u8),
    #[error("Invalid DDR width")]
    InvalidDdrWidth(u32),
    #[error("Invalid output bitdepth {0} (0:auto, 8, 10, 12)")]
    InvalidBitDepth(i32),
    #[error("No input file specified (use -h to get help)")]
    NoInput,
    #[error("Too many channels")]
    TooManyChannels,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Codec {
    Avc,
    #[default]
    Hevc,
}

/// Granularity at which the decoder reports decoded data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodeUnit {
    /// One access unit (a whole picture).
    #[default]
    AccessUnit,
    /// One coded slice.
    VclUnit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DpbMode {
    #[default]
    Normal,
    /// The stream has no reordering and at most one reference.
    NoReordering,
}

/// How compressed data is handed to the decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputMode {
    /// Arbitrary chunks of the byte stream.
    #[default]
    Unsplit,
    /// One decoding unit per buffer, described by stream metadata.
    Split,
}

/// Stream parameters, either parsed from a sequence header or given up front.
///
/// Pre-allocation strings have the form `WIDTHxHEIGHT:mode:chroma:bitdepth:profile:level`.
///
/// # Example
/// ```rust
/// use vdec::prelude::*;
/// use vdec_core::prelude::*;
///
/// let stream: StreamSettings = "1920x1080:progr:420:8:1:40".parse().unwrap();
/// assert_eq!(stream.dim, Dimension::new(1920, 1088));
/// assert_eq!(stream.chroma, ChromaMode::Yuv420);
/// assert_eq!((stream.bit_depth, stream.profile, stream.level), (8, 1, 40));
/// assert!("1920x1080;progr:420:8:1:40".parse::<StreamSettings>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamSettings {
    pub dim: Dimension,
    pub chroma: ChromaMode,
    pub bit_depth: u8,
    pub profile: u32,
    pub level: u32,
    pub sequence: SequenceMode,
}

impl StreamSettings {
    /// Layout the decoder writes pictures of this stream in.
    pub fn native_format(&self, storage: StorageMode) -> PicFormat {
        PicFormat::decoder_native(self.chroma, self.bit_depth, storage)
    }
}

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn number(&mut self) -> Result<i64, ConfigError> {
        let trimmed = self.rest.trim_start();
        let digits = trimmed
            .char_indices()
            .take_while(|&(i, c)| c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+')))
            .count();
        let (number, rest) = trimmed.split_at(digits);
        self.rest = rest;
        number.parse().map_err(|_| ConfigError::PreallocFormat)
    }

    fn separator(&mut self, expected: char) -> Result<(), ConfigError> {
        let trimmed = self.rest.trim_start();
        let mut chars = trimmed.chars();
        match chars.next() {
            Some(c) if c == expected => {
                self.rest = chars.as_str();
                Ok(())
            }
            _ => Err(ConfigError::PreallocSeparator),
        }
    }

    fn word(&mut self, len: usize) -> &'a str {
        let trimmed = self.rest.trim_start();
        let end = trimmed
            .char_indices()
            .nth(len)
            .map_or(trimmed.len(), |(i, _)| i);
        let (word, rest) = trimmed.split_at(end);
        self.rest = rest;
        word
    }
}

impl FromStr for StreamSettings {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cursor = Cursor { rest: s };
        let width = cursor.number()?;
        cursor.separator('x')?;
        let height = cursor.number()?;
        cursor.separator(':')?;
        let mode = cursor.word(5);
        cursor.separator(':')?;
        let chroma = cursor.word(3);
        cursor.separator(':')?;
        let bit_depth = cursor.number()?;
        cursor.separator(':')?;
        let profile = cursor.number()?;
        cursor.separator(':')?;
        let level = cursor.number()?;

        let chroma = chroma
            .parse::<ChromaMode>()
            .map_err(|_| ConfigError::PreallocChroma)?;
        let sequence = mode
            .parse::<SequenceMode>()
            .map_err(|_| ConfigError::PreallocVideoMode)?;
        if !cursor.rest.is_empty() {
            return Err(ConfigError::PreallocFormat);
        }
        if width <= 0 || height <= 0 || profile <= 0 || level <= 0 {
            return Err(ConfigError::PreallocInvalid);
        }
        let bit_depth = match bit_depth {
            8 | 10 | 12 => bit_depth as u8,
            _ => return Err(ConfigError::PreallocInvalid),
        };
        let to_u32 = |v: i64| u32::try_from(v).map_err(|_| ConfigError::PreallocInvalid);
        let aligned = |v: i64| {
            checked_round_up(to_u32(v)?, PREALLOC_ALIGN).ok_or(ConfigError::PreallocInvalid)
        };
        Ok(StreamSettings {
            dim: Dimension::new(aligned(width)?, aligned(height)?),
            chroma,
            bit_depth,
            profile: to_u32(profile)?,
            level: to_u32(level)?,
            sequence,
        })
    }
}

/// Upper bound of one compressed picture for a stream, used to size input buffers.
pub fn max_nal_size(stream: &StreamSettings) -> usize {
    let chroma = stream.chroma.chroma_dim(stream.dim).area();
    let samples = stream.dim.area().saturating_add(chroma.saturating_mul(2));
    samples
        .saturating_mul(stream.bit_depth as usize)
        .div_ceil(8)
        .saturating_add(4096)
}

/// Decoder settings handed to the engine at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecSettings {
    pub codec: Codec,
    /// Output bit depth: -1 decoder maximum, 0 follows the stream, otherwise explicit.
    pub bit_depth: i32,
    /// 0 lets the device pick.
    pub num_core: u8,
    pub ddr_width: u32,
    pub stack_size: u32,
    pub dec_unit: DecodeUnit,
    pub dpb_mode: DpbMode,
    /// Layout of decoded pictures; the main output storage mode.
    pub storage: StorageMode,
    pub input_mode: InputMode,
    /// Stream parameters known before decoding, enabling pre-allocation.
    pub stream: Option<StreamSettings>,
}

impl Default for DecSettings {
    fn default() -> Self {
        Self {
            codec: Codec::default(),
            bit_depth: -1,
            num_core: 0,
            ddr_width: 32,
            stack_size: DEFAULT_STACK_SIZE,
            dec_unit: DecodeUnit::default(),
            dpb_mode: DpbMode::default(),
            storage: StorageMode::Raster,
            input_mode: InputMode::default(),
            stream: None,
        }
    }
}

/// Everything one decode channel needs.
#[derive(Debug, Clone)]
pub struct Config {
    pub input: PathBuf,
    /// Planar YUV output; `None` disables it.
    pub output: Option<PathBuf>,
    /// One hexadecimal line per picture with the decoder CRC.
    pub crc: Option<PathBuf>,
    /// Reference CRC computed over the written planes.
    pub cert_crc: Option<PathBuf>,
    pub sei_file: Option<PathBuf>,
    pub hdr_file: Option<PathBuf>,
    pub settings: DecSettings,
    pub input_buffers: usize,
    pub input_buffer_size: usize,
    pub loops: u32,
    pub timeout: Option<Duration>,
    /// Displayed pictures after which the channel stops; checked after each display.
    pub max_frames: u64,
    /// Place each plane of a decoded picture in its own memory chunk.
    pub multi_chunk: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output: Some(PathBuf::from("dec.yuv")),
            crc: None,
            cert_crc: None,
            sei_file: None,
            hdr_file: None,
            settings: DecSettings::default(),
            input_buffers: DEFAULT_INPUT_BUFFERS,
            input_buffer_size: DEFAULT_INPUT_BUFFER_SIZE,
            loops: 1,
            timeout: None,
            max_frames: u64::MAX,
            multi_chunk: false,
        }
    }
}

impl Config {
    /// Check the settings and correct the ones that are silently clamped.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let settings = &mut self.settings;
        if settings.num_core > MAX_CORES {
            return Err(ConfigError::InvalidCores(settings.num_core));
        }
        if !matches!(settings.ddr_width, 16 | 32 | 64) {
            return Err(ConfigError::InvalidDdrWidth(settings.ddr_width));
        }
        if !matches!(settings.bit_depth, -1 | 0 | 8..=12) {
            return Err(ConfigError::InvalidBitDepth(settings.bit_depth));
        }
        self.input_buffers = self.input_buffers.max(1);
        self.input_buffer_size = self.input_buffer_size.max(1);
        if let Some(stream) = &settings.stream {
            if self.input_buffer_size == DEFAULT_INPUT_BUFFER_SIZE {
                self.input_buffer_size = max_nal_size(stream);
            }
        }
        settings.stack_size = settings.stack_size.max(1);
        self.loops = self.loops.max(1);
        if self.input.as_os_str().is_empty() {
            return Err(ConfigError::NoInput);
        }
        Ok(())
    }
}
