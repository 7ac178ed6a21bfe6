#![doc = include_str!("../README.md")]

use vdec_core::prelude::{ChromaMode, FourCc, FrameError, PlaneId};

pub mod convert;
pub mod crc;

/// Errors raised while converting decoder pictures.
///
/// # Example
/// ```rust
/// use vdec_codec::ConvertError;
/// use vdec_core::prelude::ChromaMode;
///
/// let err = ConvertError::NoRoutine {
///     chroma: ChromaMode::Yuv420,
///     bd_in: 8,
///     bd_out: 12,
///     tiled: false,
/// };
/// assert!(err.to_string().contains("8 -> 12"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    /// No routine exists for this combination.
    #[error("no conversion for chroma {chroma} {bd_in} -> {bd_out} bits (tiled: {tiled})")]
    NoRoutine {
        chroma: ChromaMode,
        bd_in: u8,
        bd_out: u8,
        tiled: bool,
    },
    #[error("buffer carries no picture format")]
    NotAPicture,
    #[error("unknown fourcc {0}")]
    UnknownFourCc(FourCc),
    #[error("picture has no {0:?} plane")]
    MissingPlane(PlaneId),
    #[error("{plane:?} plane holds {actual} bytes, {needed} needed")]
    PlaneTooShort {
        plane: PlaneId,
        needed: usize,
        actual: usize,
    },
    #[error(transparent)]
    Frame(#[from] FrameError),
}

pub mod prelude {
    pub use crate::{
        ConvertError,
        convert::{
            Component, Conversion, ConversionKey, ConvertTarget, SourcePicture, conversion_for,
            supported_keys,
        },
        crc::{crc_line, frame_crc},
    };
}
