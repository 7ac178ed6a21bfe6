//! Synthetic elementary stream understood by [`SoftEngine`](super::SoftEngine).
//!
//! A stream is a sequence of units `tag:[u8; 4] | len:u32le | payload`:
//!
//! | tag    | payload |
//! |--------|---------|
//! | `SEQH` | sequence header, see [`SequenceHeader`] |
//! | `PICT` | one coded picture, see [`PictureUnit`] |
//! | `SEI ` | prefix flag `u8`, payload type `u16le`, payload bytes |
//! | `HDR ` | colour description and optional mastering display / light level |
//!
//! Picture samples are synthesized from the picture seed with [`pattern_sample`].

use std::{io, path::Path};

use vdec_core::prelude::*;

use crate::config::StreamSettings;

/// Bytes in front of every payload.
pub const UNIT_HEADER_LEN: usize = 8;

const SEQUENCE_LEN: usize = 18;
const PICTURE_LEN: usize = 5;

/// Errors reading stream units.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("unknown unit tag {0:?}")]
    UnknownTag([u8; 4]),
    #[error("{kind:?} payload holds {len} bytes")]
    BadPayload { kind: UnitKind, len: usize },
    #[error("invalid {field} value {value}")]
    BadField { field: &'static str, value: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Sequence,
    Picture,
    Sei,
    Hdr,
}

impl UnitKind {
    pub fn tag(self) -> [u8; 4] {
        match self {
            UnitKind::Sequence => *b"SEQH",
            UnitKind::Picture => *b"PICT",
            UnitKind::Sei => *b"SEI ",
            UnitKind::Hdr => *b"HDR ",
        }
    }

    pub fn from_tag(tag: [u8; 4]) -> Option<Self> {
        [
            UnitKind::Sequence,
            UnitKind::Picture,
            UnitKind::Sei,
            UnitKind::Hdr,
        ]
        .into_iter()
        .find(|kind| kind.tag() == tag)
    }

    /// Units carrying coded picture data.
    pub fn is_vcl(self) -> bool {
        self == UnitKind::Picture
    }
}

/// One unit borrowed from a byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unit<'a> {
    pub kind: UnitKind,
    pub payload: &'a [u8],
}

impl Unit<'_> {
    /// Encoded size, header included.
    pub fn encoded_len(&self) -> usize {
        UNIT_HEADER_LEN + self.payload.len()
    }
}

/// Read the unit at the start of `data`; `Ok(None)` when `data` ends inside it.
pub fn next_unit(data: &[u8]) -> Result<Option<Unit<'_>>, StreamError> {
    let Some(header) = data.get(..UNIT_HEADER_LEN) else {
        return Ok(None);
    };
    let tag = [header[0], header[1], header[2], header[3]];
    let kind = UnitKind::from_tag(tag).ok_or(StreamError::UnknownTag(tag))?;
    let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
    Ok(data
        .get(UNIT_HEADER_LEN..UNIT_HEADER_LEN + len)
        .map(|payload| Unit { kind, payload }))
}

/// Sample value of plane `plane` (0 luma, 1 U, 2 V) at `(x, y)` for a picture seed.
pub fn pattern_sample(seed: u32, plane: usize, x: usize, y: usize, bit_depth: u8) -> u16 {
    let value = seed as usize + x + 2 * y + plane * 64;
    (value & ((1usize << bit_depth) - 1)) as u16
}

/// Stream parameters carried by a `SEQH` unit.
///
/// # Example
/// ```rust
/// use vdec::engine::stream::SequenceHeader;
/// use vdec_core::prelude::*;
///
/// let header = SequenceHeader::new(Dimension::new(64, 32), ChromaMode::Yuv420, 8);
/// assert_eq!(header.stream_settings().dim, Dimension::new(64, 32));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceHeader {
    pub dim: Dimension,
    pub chroma: ChromaMode,
    pub bit_depth: u8,
    pub profile: u8,
    pub level: u8,
    pub sequence: SequenceMode,
    pub crop: CropInfo,
    /// Reference pictures the stream keeps alive.
    pub num_ref: u8,
}

impl SequenceHeader {
    pub fn new(dim: Dimension, chroma: ChromaMode, bit_depth: u8) -> Self {
        Self {
            dim,
            chroma,
            bit_depth,
            profile: 1,
            level: 40,
            sequence: SequenceMode::Progressive,
            crop: CropInfo::default(),
            num_ref: 1,
        }
    }

    pub fn with_crop(mut self, crop: CropInfo) -> Self {
        self.crop = crop;
        self
    }

    pub fn with_refs(mut self, num_ref: u8) -> Self {
        self.num_ref = num_ref;
        self
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            dim: self.dim,
            chroma: self.chroma,
            bit_depth: self.bit_depth,
            profile: self.profile as u32,
            level: self.level as u32,
            sequence: self.sequence,
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SEQUENCE_LEN);
        out.extend_from_slice(&(self.dim.width as u16).to_le_bytes());
        out.extend_from_slice(&(self.dim.height as u16).to_le_bytes());
        out.push(match self.chroma {
            ChromaMode::Mono => 0,
            ChromaMode::Yuv420 => 1,
            ChromaMode::Yuv422 => 2,
            ChromaMode::Yuv444 => 3,
        });
        out.push(self.bit_depth);
        out.push(self.profile);
        out.push(self.level);
        out.push(match self.sequence {
            SequenceMode::Unknown => 0,
            SequenceMode::Progressive => 1,
            SequenceMode::Interlaced => 2,
        });
        for border in [
            self.crop.left,
            self.crop.right,
            self.crop.top,
            self.crop.bottom,
        ] {
            out.extend_from_slice(&(border as u16).to_le_bytes());
        }
        out.push(self.num_ref);
        out
    }

    pub fn parse(payload: &[u8]) -> Result<Self, StreamError> {
        if payload.len() != SEQUENCE_LEN {
            return Err(StreamError::BadPayload {
                kind: UnitKind::Sequence,
                len: payload.len(),
            });
        }
        let u16_at = |at: usize| u16::from_le_bytes([payload[at], payload[at + 1]]) as u32;
        let chroma = match payload[4] {
            0 => ChromaMode::Mono,
            1 => ChromaMode::Yuv420,
            2 => ChromaMode::Yuv422,
            3 => ChromaMode::Yuv444,
            other => {
                return Err(StreamError::BadField {
                    field: "chroma",
                    value: other as u32,
                });
            }
        };
        let bit_depth = payload[5];
        if !matches!(bit_depth, 8 | 10 | 12) {
            return Err(StreamError::BadField {
                field: "bit depth",
                value: bit_depth as u32,
            });
        }
        let sequence = match payload[8] {
            1 => SequenceMode::Progressive,
            2 => SequenceMode::Interlaced,
            _ => SequenceMode::Unknown,
        };
        let dim = Dimension::new(u16_at(0), u16_at(2));
        if dim.is_empty() {
            return Err(StreamError::BadField {
                field: "dimension",
                value: 0,
            });
        }
        Ok(Self {
            dim,
            chroma,
            bit_depth,
            profile: payload[6],
            level: payload[7],
            sequence,
            crop: CropInfo {
                left: u16_at(9),
                right: u16_at(11),
                top: u16_at(13),
                bottom: u16_at(15),
            },
            num_ref: payload[17],
        })
    }
}

/// Coded picture: a sample seed plus status flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PictureUnit {
    pub seed: u32,
    /// Decoded with concealment.
    pub conceal: bool,
    /// Undecodable; the engine stops with an error.
    pub corrupt: bool,
}

impl PictureUnit {
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            ..Default::default()
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PICTURE_LEN);
        out.extend_from_slice(&self.seed.to_le_bytes());
        out.push(self.conceal as u8 | (self.corrupt as u8) << 1);
        out
    }

    pub fn parse(payload: &[u8]) -> Result<Self, StreamError> {
        match payload {
            &[a, b, c, d, flags] => Ok(Self {
                seed: u32::from_le_bytes([a, b, c, d]),
                conceal: flags & 1 != 0,
                corrupt: flags & 2 != 0,
            }),
            _ => Err(StreamError::BadPayload {
                kind: UnitKind::Picture,
                len: payload.len(),
            }),
        }
    }
}

pub fn parse_sei(payload: &[u8]) -> Result<SeiMessage, StreamError> {
    match payload {
        [prefix, lo, hi, data @ ..] => Ok(SeiMessage {
            prefix: *prefix != 0,
            payload_type: u16::from_le_bytes([*lo, *hi]) as u32,
            payload: data.to_vec(),
        }),
        _ => Err(StreamError::BadPayload {
            kind: UnitKind::Sei,
            len: payload.len(),
        }),
    }
}

fn encode_hdr(hdr: &HdrMeta) -> Vec<u8> {
    let seis = &hdr.seis;
    let present = seis.mastering_display.is_some() as u8
        | (seis.content_light_level.is_some() as u8) << 1
        | (seis.alternative_transfer.is_some() as u8) << 2;
    let mut out = vec![
        hdr.colour_primaries,
        hdr.transfer_characteristics,
        hdr.matrix_coefficients,
        present,
    ];
    if let Some(mdcv) = &seis.mastering_display {
        for (x, y) in mdcv.primaries.iter().chain(std::iter::once(&mdcv.white_point)) {
            out.extend_from_slice(&x.to_le_bytes());
            out.extend_from_slice(&y.to_le_bytes());
        }
        out.extend_from_slice(&mdcv.max_luminance.to_le_bytes());
        out.extend_from_slice(&mdcv.min_luminance.to_le_bytes());
    }
    if let Some(cll) = &seis.content_light_level {
        out.extend_from_slice(&cll.max_content.to_le_bytes());
        out.extend_from_slice(&cll.max_pic_average.to_le_bytes());
    }
    if let Some(transfer) = seis.alternative_transfer {
        out.push(transfer);
    }
    out
}

pub fn parse_hdr(payload: &[u8]) -> Result<HdrMeta, StreamError> {
    let bad = || StreamError::BadPayload {
        kind: UnitKind::Hdr,
        len: payload.len(),
    };
    let mut bytes = payload.iter().copied();
    let mut byte = || bytes.next().ok_or_else(bad);
    let colour_primaries = byte()?;
    let transfer_characteristics = byte()?;
    let matrix_coefficients = byte()?;
    let present = byte()?;
    let mut u16_le = || -> Result<u16, StreamError> { Ok(u16::from_le_bytes([byte()?, byte()?])) };
    let mut seis = HdrSeis::default();
    if present & 1 != 0 {
        let mut points = [(0u16, 0u16); 4];
        for point in &mut points {
            *point = (u16_le()?, u16_le()?);
        }
        let max_luminance = (u16_le()? as u32) | (u16_le()? as u32) << 16;
        let min_luminance = (u16_le()? as u32) | (u16_le()? as u32) << 16;
        seis.mastering_display = Some(MasteringDisplay {
            primaries: [points[0], points[1], points[2]],
            white_point: points[3],
            max_luminance,
            min_luminance,
        });
    }
    if present & 2 != 0 {
        seis.content_light_level = Some(ContentLightLevel {
            max_content: u16_le()?,
            max_pic_average: u16_le()?,
        });
    }
    if present & 4 != 0 {
        seis.alternative_transfer = Some(byte()?);
    }
    Ok(HdrMeta {
        colour_primaries,
        transfer_characteristics,
        matrix_coefficients,
        seis,
    })
}

/// Builder for synthetic streams.
///
/// # Example
/// ```rust
/// use vdec::engine::stream::{SequenceHeader, SyntheticStream};
/// use vdec_core::prelude::*;
///
/// let bytes = SyntheticStream::new()
///     .sequence(SequenceHeader::new(Dimension::new(64, 32), ChromaMode::Yuv420, 8))
///     .pictures(0, 3)
///     .finish();
/// assert_eq!(bytes.len(), 8 + 18 + 3 * (8 + 5));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SyntheticStream {
    bytes: Vec<u8>,
}

impl SyntheticStream {
    pub fn new() -> Self {
        Self::default()
    }

    fn unit(mut self, kind: UnitKind, payload: &[u8]) -> Self {
        self.bytes.extend_from_slice(&kind.tag());
        self.bytes
            .extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.bytes.extend_from_slice(payload);
        self
    }

    pub fn sequence(self, header: SequenceHeader) -> Self {
        let payload = header.encode();
        self.unit(UnitKind::Sequence, &payload)
    }

    pub fn picture(self, picture: PictureUnit) -> Self {
        let payload = picture.encode();
        self.unit(UnitKind::Picture, &payload)
    }

    /// `count` plain pictures with consecutive seeds starting at `first_seed`.
    pub fn pictures(self, first_seed: u32, count: u32) -> Self {
        (first_seed..first_seed + count).fold(self, |stream, seed| {
            stream.picture(PictureUnit::new(seed))
        })
    }

    pub fn sei(self, sei: &SeiMessage) -> Self {
        let mut payload = vec![sei.prefix as u8];
        payload.extend_from_slice(&(sei.payload_type as u16).to_le_bytes());
        payload.extend_from_slice(&sei.payload);
        self.unit(UnitKind::Sei, &payload)
    }

    pub fn hdr(self, hdr: &HdrMeta) -> Self {
        let payload = encode_hdr(hdr);
        self.unit(UnitKind::Hdr, &payload)
    }

    /// Raw bytes appended as they are, for malformed streams.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write_to(self, path: impl AsRef<Path>) -> io::Result<()> {
        std::fs::write(path, self.bytes)
    }
}
