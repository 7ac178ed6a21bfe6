use std::{fmt, str::FromStr};

/// Four-character code naming a picture memory layout.
///
/// # Example
/// ```rust
/// use vdec_core::prelude::FourCc;
///
/// let fcc = FourCc::new(*b"NV12");
/// assert_eq!(fcc.to_string(), "NV12");
/// assert_eq!(fcc, FourCc::NV12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc([u8; 4]);

impl FourCc {
    pub const NV12: FourCc = FourCc::new(*b"NV12");
    pub const NV16: FourCc = FourCc::new(*b"NV16");
    pub const I420: FourCc = FourCc::new(*b"I420");
    pub const I422: FourCc = FourCc::new(*b"I422");
    pub const I444: FourCc = FourCc::new(*b"I444");
    pub const Y800: FourCc = FourCc::new(*b"Y800");
    pub const XV15: FourCc = FourCc::new(*b"XV15");
    pub const XV20: FourCc = FourCc::new(*b"XV20");
    pub const XV10: FourCc = FourCc::new(*b"XV10");
    pub const P010: FourCc = FourCc::new(*b"P010");
    pub const P210: FourCc = FourCc::new(*b"P210");
    pub const P012: FourCc = FourCc::new(*b"P012");
    pub const P212: FourCc = FourCc::new(*b"P212");
    pub const I0AL: FourCc = FourCc::new(*b"I0AL");
    pub const I2AL: FourCc = FourCc::new(*b"I2AL");
    pub const I4AL: FourCc = FourCc::new(*b"I4AL");
    pub const Y010: FourCc = FourCc::new(*b"Y010");
    pub const I0CL: FourCc = FourCc::new(*b"I0CL");
    pub const I2CL: FourCc = FourCc::new(*b"I2CL");
    pub const I4CL: FourCc = FourCc::new(*b"I4CL");
    pub const Y012: FourCc = FourCc::new(*b"Y012");
    pub const T608: FourCc = FourCc::new(*b"T608");
    pub const T628: FourCc = FourCc::new(*b"T628");
    pub const T648: FourCc = FourCc::new(*b"T648");
    pub const T6M8: FourCc = FourCc::new(*b"T6m8");
    pub const T60A: FourCc = FourCc::new(*b"T60A");
    pub const T62A: FourCc = FourCc::new(*b"T62A");
    pub const T64A: FourCc = FourCc::new(*b"T64A");
    pub const T6MA: FourCc = FourCc::new(*b"T6mA");
    pub const T60C: FourCc = FourCc::new(*b"T60C");
    pub const T62C: FourCc = FourCc::new(*b"T62C");
    pub const T64C: FourCc = FourCc::new(*b"T64C");
    pub const T6MC: FourCc = FourCc::new(*b"T6mC");

    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Value as stored in a 32-bit register, first character lowest.
    pub fn to_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// The four characters, when they are valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// Layout described by this code, when it is one the harness knows.
    pub fn pic_format(self) -> Option<PicFormat> {
        FOURCC_TABLE
            .iter()
            .find(|(code, _)| *code == self)
            .map(|(_, format)| *format)
    }
}

impl From<u32> for FourCc {
    fn from(value: u32) -> Self {
        Self(value.to_le_bytes())
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.as_str() {
            write!(f, "{s}")
        } else {
            write!(f, "0x{:08x}", self.to_u32())
        }
    }
}

impl FromStr for FourCc {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 4] = s
            .as_bytes()
            .try_into()
            .map_err(|_| "fourcc must be four ASCII bytes".to_string())?;
        Ok(FourCc(bytes))
    }
}

/// Chroma subsampling of a picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChromaMode {
    /// Luma only (4:0:0).
    Mono,
    Yuv420,
    Yuv422,
    Yuv444,
}

impl ChromaMode {
    /// Horizontal and vertical subsampling factors of the chroma planes.
    ///
    /// Monochrome reports `(1, 1)`; callers check [`ChromaMode::has_chroma`] first.
    pub fn subsampling(self) -> (u32, u32) {
        match self {
            ChromaMode::Mono | ChromaMode::Yuv444 => (1, 1),
            ChromaMode::Yuv420 => (2, 2),
            ChromaMode::Yuv422 => (2, 1),
        }
    }

    pub fn has_chroma(self) -> bool {
        self != ChromaMode::Mono
    }

    /// Chroma plane dimension for a luma dimension, rounding up.
    pub fn chroma_dim(self, dim: Dimension) -> Dimension {
        if !self.has_chroma() {
            return Dimension::new(0, 0);
        }
        let (sx, sy) = self.subsampling();
        Dimension::new(dim.width.div_ceil(sx), dim.height.div_ceil(sy))
    }

    /// Numeric tag used on the command line (`400`, `420`, `422`, `444`).
    pub fn code(self) -> u16 {
        match self {
            ChromaMode::Mono => 400,
            ChromaMode::Yuv420 => 420,
            ChromaMode::Yuv422 => 422,
            ChromaMode::Yuv444 => 444,
        }
    }
}

impl fmt::Display for ChromaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for ChromaMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "400" => Ok(ChromaMode::Mono),
            "420" => Ok(ChromaMode::Yuv420),
            "422" => Ok(ChromaMode::Yuv422),
            "444" => Ok(ChromaMode::Yuv444),
            other => Err(format!("unknown chroma mode {other}")),
        }
    }
}

/// Physical arrangement of samples in a picture buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StorageMode {
    /// Row-major samples.
    #[default]
    Raster,
    /// 64x4 sample tiles, bit-packed at the picture bit depth.
    Tile64x4,
}

impl StorageMode {
    pub fn is_tiled(self) -> bool {
        self == StorageMode::Tile64x4
    }
}

/// How chroma samples are arranged across planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChromaOrder {
    NoChroma,
    /// One plane with interleaved U/V pairs.
    SemiPlanar,
    /// Separate U and V planes.
    Planar,
}

/// Field/frame structure of a sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SequenceMode {
    #[default]
    Unknown,
    Progressive,
    Interlaced,
}

impl SequenceMode {
    pub fn tag(self) -> &'static str {
        match self {
            SequenceMode::Unknown => "unkwn",
            SequenceMode::Progressive => "progr",
            SequenceMode::Interlaced => "inter",
        }
    }
}

impl FromStr for SequenceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unkwn" => Ok(SequenceMode::Unknown),
            "progr" => Ok(SequenceMode::Progressive),
            "inter" => Ok(SequenceMode::Interlaced),
            other => Err(format!("unknown sequence mode {other}")),
        }
    }
}

/// Width and height in samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dimension {
    pub width: u32,
    pub height: u32,
}

impl Dimension {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Border to remove from a decoded picture, in luma samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CropInfo {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl CropInfo {
    pub fn is_cropping(&self) -> bool {
        self.left != 0 || self.right != 0 || self.top != 0 || self.bottom != 0
    }

    /// Dimension left once the border is removed, or `None` when nothing would remain.
    pub fn apply(&self, dim: Dimension) -> Option<Dimension> {
        let width = dim.width.checked_sub(self.left)?.checked_sub(self.right)?;
        let height = dim.height.checked_sub(self.top)?.checked_sub(self.bottom)?;
        let cropped = Dimension::new(width, height);
        (!cropped.is_empty()).then_some(cropped)
    }
}

/// Full description of a picture layout; every known [`FourCc`] maps to one.
///
/// # Example
/// ```rust
/// use vdec_core::prelude::*;
///
/// let native = PicFormat::decoder_native(ChromaMode::Yuv420, 10, StorageMode::Raster);
/// assert_eq!(native.fourcc(), Some(FourCc::XV15));
/// let out = PicFormat::planar_output(ChromaMode::Yuv420, 10);
/// assert_eq!(out.fourcc(), Some(FourCc::I0AL));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PicFormat {
    pub chroma: ChromaMode,
    pub bit_depth: u8,
    pub storage: StorageMode,
    pub order: ChromaOrder,
    /// Three 10-bit samples per little-endian 32-bit word.
    pub packed10: bool,
}

impl PicFormat {
    const fn raster(chroma: ChromaMode, bit_depth: u8, order: ChromaOrder, packed10: bool) -> Self {
        Self {
            chroma,
            bit_depth,
            storage: StorageMode::Raster,
            order,
            packed10,
        }
    }

    const fn tiled(chroma: ChromaMode, bit_depth: u8, order: ChromaOrder) -> Self {
        Self {
            chroma,
            bit_depth,
            storage: StorageMode::Tile64x4,
            order,
            packed10: false,
        }
    }

    /// Layout the decoder writes for a given stream configuration.
    pub fn decoder_native(chroma: ChromaMode, bit_depth: u8, storage: StorageMode) -> Self {
        let order = match chroma {
            ChromaMode::Mono => ChromaOrder::NoChroma,
            ChromaMode::Yuv420 | ChromaMode::Yuv422 => ChromaOrder::SemiPlanar,
            ChromaMode::Yuv444 => ChromaOrder::Planar,
        };
        match storage {
            StorageMode::Tile64x4 => Self::tiled(chroma, bit_depth, order),
            StorageMode::Raster => {
                let packed10 = bit_depth == 10 && chroma != ChromaMode::Yuv444;
                Self::raster(chroma, bit_depth, order, packed10)
            }
        }
    }

    /// Planar raster layout written to output files.
    pub fn planar_output(chroma: ChromaMode, bit_depth: u8) -> Self {
        let order = if chroma.has_chroma() {
            ChromaOrder::Planar
        } else {
            ChromaOrder::NoChroma
        };
        Self::raster(chroma, bit_depth, order, false)
    }

    pub fn fourcc(&self) -> Option<FourCc> {
        FOURCC_TABLE
            .iter()
            .find(|(_, format)| format == self)
            .map(|(code, _)| *code)
    }

    /// Bytes used by one sample once unpacked (1 for 8-bit, 2 otherwise).
    pub fn bytes_per_sample(&self) -> usize {
        bytes_per_sample(self.bit_depth)
    }
}

/// Bytes needed to hold one sample of `bit_depth` bits.
pub fn bytes_per_sample(bit_depth: u8) -> usize {
    (bit_depth as usize).div_ceil(8)
}

use ChromaMode::{Mono, Yuv420, Yuv422, Yuv444};
use ChromaOrder::{NoChroma, Planar, SemiPlanar};

const FOURCC_TABLE: &[(FourCc, PicFormat)] = &[
    (FourCc::NV12, PicFormat::raster(Yuv420, 8, SemiPlanar, false)),
    (FourCc::NV16, PicFormat::raster(Yuv422, 8, SemiPlanar, false)),
    (FourCc::I420, PicFormat::raster(Yuv420, 8, Planar, false)),
    (FourCc::I422, PicFormat::raster(Yuv422, 8, Planar, false)),
    (FourCc::I444, PicFormat::raster(Yuv444, 8, Planar, false)),
    (FourCc::Y800, PicFormat::raster(Mono, 8, NoChroma, false)),
    (FourCc::XV15, PicFormat::raster(Yuv420, 10, SemiPlanar, true)),
    (FourCc::XV20, PicFormat::raster(Yuv422, 10, SemiPlanar, true)),
    (FourCc::XV10, PicFormat::raster(Mono, 10, NoChroma, true)),
    (FourCc::P010, PicFormat::raster(Yuv420, 10, SemiPlanar, false)),
    (FourCc::P210, PicFormat::raster(Yuv422, 10, SemiPlanar, false)),
    (FourCc::I0AL, PicFormat::raster(Yuv420, 10, Planar, false)),
    (FourCc::I2AL, PicFormat::raster(Yuv422, 10, Planar, false)),
    (FourCc::I4AL, PicFormat::raster(Yuv444, 10, Planar, false)),
    (FourCc::Y010, PicFormat::raster(Mono, 10, NoChroma, false)),
    (FourCc::P012, PicFormat::raster(Yuv420, 12, SemiPlanar, false)),
    (FourCc::P212, PicFormat::raster(Yuv422, 12, SemiPlanar, false)),
    (FourCc::I0CL, PicFormat::raster(Yuv420, 12, Planar, false)),
    (FourCc::I2CL, PicFormat::raster(Yuv422, 12, Planar, false)),
    (FourCc::I4CL, PicFormat::raster(Yuv444, 12, Planar, false)),
    (FourCc::Y012, PicFormat::raster(Mono, 12, NoChroma, false)),
    (FourCc::T608, PicFormat::tiled(Yuv420, 8, SemiPlanar)),
    (FourCc::T628, PicFormat::tiled(Yuv422, 8, SemiPlanar)),
    (FourCc::T648, PicFormat::tiled(Yuv444, 8, Planar)),
    (FourCc::T6M8, PicFormat::tiled(Mono, 8, NoChroma)),
    (FourCc::T60A, PicFormat::tiled(Yuv420, 10, SemiPlanar)),
    (FourCc::T62A, PicFormat::tiled(Yuv422, 10, SemiPlanar)),
    (FourCc::T64A, PicFormat::tiled(Yuv444, 10, Planar)),
    (FourCc::T6MA, PicFormat::tiled(Mono, 10, NoChroma)),
    (FourCc::T60C, PicFormat::tiled(Yuv420, 12, SemiPlanar)),
    (FourCc::T62C, PicFormat::tiled(Yuv422, 12, SemiPlanar)),
    (FourCc::T64C, PicFormat::tiled(Yuv444, 12, Planar)),
    (FourCc::T6MC, PicFormat::tiled(Mono, 12, NoChroma)),
];
