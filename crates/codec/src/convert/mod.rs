//! Conversion dispatch from decoder picture layouts to planar YUV.
//!
//! Routines are looked up by `(chroma, input bit depth, output bit depth, tiled)`. Each
//! raster input bit depth contributes its own table and tiled pictures always resolve
//! through the tiled table. Combinations outside these tables have no routine.

use std::{collections::HashMap, fmt, sync::LazyLock};

use vdec_core::prelude::*;

use crate::ConvertError;

pub mod kernels;
mod source;

pub use source::{Component, SourcePicture};

/// Routine signature.
pub type KernelFn = fn(&SourcePicture<'_>, &mut YuvFrame);

/// Named conversion between two four-cc layouts.
#[derive(Clone, Copy)]
pub struct Conversion {
    pub name: &'static str,
    pub source: FourCc,
    pub target: FourCc,
    kernel: KernelFn,
}

impl Conversion {
    const fn new(name: &'static str, source: FourCc, target: FourCc, kernel: KernelFn) -> Self {
        Self {
            name,
            source,
            target,
            kernel,
        }
    }

    /// Run the routine; `dst` must be laid out for `self.target` at the source dimension.
    pub fn apply(&self, src: &SourcePicture<'_>, dst: &mut YuvFrame) {
        (self.kernel)(src, dst)
    }

    pub fn is_copy(&self) -> bool {
        self.source == self.target
    }
}

impl fmt::Debug for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} -> {})", self.name, self.source, self.target)
    }
}

/// `(chroma, input bit depth, output bit depth, tiled)`.
pub type ConversionKey = (ChromaMode, u8, u8, bool);

type Entry = (ChromaMode, u8, u8, Conversion);

use vdec_core::format::ChromaMode::{Mono, Yuv420, Yuv422, Yuv444};
use kernels as k;

const RASTER_8BIT: &[Entry] = &[
    (Yuv420, 8, 8, Conversion::new("NV12_To_I420", FourCc::NV12, FourCc::I420, k::nv12_to_i420)),
    (Yuv420, 8, 10, Conversion::new("NV12_To_I0AL", FourCc::NV12, FourCc::I0AL, k::nv12_to_i0al)),
    (Yuv422, 8, 8, Conversion::new("NV16_To_I422", FourCc::NV16, FourCc::I422, k::nv16_to_i422)),
    (Yuv422, 8, 10, Conversion::new("NV16_To_I2AL", FourCc::NV16, FourCc::I2AL, k::nv16_to_i2al)),
    (Yuv444, 8, 8, Conversion::new("CopyPixMapBuffer", FourCc::I444, FourCc::I444, k::copy)),
    (Yuv444, 8, 10, Conversion::new("I444_To_I4AL", FourCc::I444, FourCc::I4AL, k::i444_to_i4al)),
    (Mono, 8, 8, Conversion::new("CopyPixMapBuffer", FourCc::Y800, FourCc::Y800, k::copy)),
    (Mono, 8, 10, Conversion::new("Y800_To_Y010", FourCc::Y800, FourCc::Y010, k::y800_to_y010)),
];

const RASTER_10BIT: &[Entry] = &[
    (Yuv420, 10, 10, Conversion::new("XV15_To_I0AL", FourCc::XV15, FourCc::I0AL, k::xv15_to_i0al)),
    (Yuv420, 10, 8, Conversion::new("XV15_To_I420", FourCc::XV15, FourCc::I420, k::xv15_to_i420)),
    (Yuv422, 10, 10, Conversion::new("XV20_To_I2AL", FourCc::XV20, FourCc::I2AL, k::xv20_to_i2al)),
    (Yuv422, 10, 8, Conversion::new("XV20_To_I422", FourCc::XV20, FourCc::I422, k::xv20_to_i422)),
    (Yuv444, 10, 10, Conversion::new("CopyPixMapBuffer", FourCc::I4AL, FourCc::I4AL, k::copy)),
    (Yuv444, 10, 8, Conversion::new("I4AL_To_I444", FourCc::I4AL, FourCc::I444, k::i4al_to_i444)),
    (Mono, 10, 10, Conversion::new("XV10_To_Y010", FourCc::XV10, FourCc::Y010, k::xv10_to_y010)),
    (Mono, 10, 8, Conversion::new("XV10_To_Y800", FourCc::XV10, FourCc::Y800, k::xv10_to_y800)),
];

const RASTER_12BIT: &[Entry] = &[
    (Yuv420, 12, 12, Conversion::new("P012_To_I0CL", FourCc::P012, FourCc::I0CL, k::p012_to_i0cl)),
    (Yuv420, 12, 10, Conversion::new("P012_To_I0AL", FourCc::P012, FourCc::I0AL, k::p012_to_i0al)),
    (Yuv420, 12, 8, Conversion::new("P012_To_I420", FourCc::P012, FourCc::I420, k::p012_to_i420)),
    (Yuv422, 12, 12, Conversion::new("P212_To_I2CL", FourCc::P212, FourCc::I2CL, k::p212_to_i2cl)),
    (Yuv422, 12, 10, Conversion::new("P212_To_I2AL", FourCc::P212, FourCc::I2AL, k::p212_to_i2al)),
    (Yuv422, 12, 8, Conversion::new("P212_To_I422", FourCc::P212, FourCc::I422, k::p212_to_i422)),
    (Yuv444, 12, 12, Conversion::new("CopyPixMapBuffer", FourCc::I4CL, FourCc::I4CL, k::copy)),
    (Yuv444, 12, 10, Conversion::new("I4CL_To_I4AL", FourCc::I4CL, FourCc::I4AL, k::i4cl_to_i4al)),
    (Yuv444, 12, 8, Conversion::new("I4CL_To_I444", FourCc::I4CL, FourCc::I444, k::i4cl_to_i444)),
    (Mono, 12, 12, Conversion::new("CopyPixMapBuffer", FourCc::Y012, FourCc::Y012, k::copy)),
    (Mono, 12, 10, Conversion::new("Y012_To_Y010", FourCc::Y012, FourCc::Y010, k::y012_to_y010)),
    (Mono, 12, 8, Conversion::new("Y012_To_Y800", FourCc::Y012, FourCc::Y800, k::y012_to_y800)),
];

const TILED: &[Entry] = &[
    (Yuv420, 8, 8, Conversion::new("T608_To_I420", FourCc::T608, FourCc::I420, k::t608_to_i420)),
    (Yuv420, 8, 10, Conversion::new("T608_To_I0AL", FourCc::T608, FourCc::I0AL, k::t608_to_i0al)),
    (Yuv422, 8, 8, Conversion::new("T628_To_I422", FourCc::T628, FourCc::I422, k::t628_to_i422)),
    (Yuv422, 8, 10, Conversion::new("T628_To_I2AL", FourCc::T628, FourCc::I2AL, k::t628_to_i2al)),
    (Yuv444, 8, 8, Conversion::new("T648_To_I444", FourCc::T648, FourCc::I444, k::t648_to_i444)),
    (Mono, 8, 8, Conversion::new("T6m8_To_Y800", FourCc::T6M8, FourCc::Y800, k::t6m8_to_y800)),
    (Mono, 8, 10, Conversion::new("T6m8_To_Y010", FourCc::T6M8, FourCc::Y010, k::t6m8_to_y010)),
    (Yuv420, 10, 10, Conversion::new("T60A_To_I0AL", FourCc::T60A, FourCc::I0AL, k::t60a_to_i0al)),
    (Yuv420, 10, 8, Conversion::new("T60A_To_I420", FourCc::T60A, FourCc::I420, k::t60a_to_i420)),
    (Yuv422, 10, 10, Conversion::new("T62A_To_I2AL", FourCc::T62A, FourCc::I2AL, k::t62a_to_i2al)),
    (Yuv422, 10, 8, Conversion::new("T62A_To_I422", FourCc::T62A, FourCc::I422, k::t62a_to_i422)),
    (Yuv444, 10, 10, Conversion::new("T64A_To_I4AL", FourCc::T64A, FourCc::I4AL, k::t64a_to_i4al)),
    (Mono, 10, 10, Conversion::new("T6mA_To_Y010", FourCc::T6MA, FourCc::Y010, k::t6ma_to_y010)),
    (Mono, 10, 8, Conversion::new("T6mA_To_Y800", FourCc::T6MA, FourCc::Y800, k::t6ma_to_y800)),
    (Mono, 12, 12, Conversion::new("T6mC_To_Y012", FourCc::T6MC, FourCc::Y012, k::t6mc_to_y012)),
    (Mono, 12, 10, Conversion::new("T6mC_To_Y010", FourCc::T6MC, FourCc::Y010, k::t6mc_to_y010)),
    (Mono, 12, 8, Conversion::new("T6mC_To_Y800", FourCc::T6MC, FourCc::Y800, k::t6mc_to_y800)),
    (Yuv420, 12, 12, Conversion::new("T60C_To_I0CL", FourCc::T60C, FourCc::I0CL, k::t60c_to_i0cl)),
    (Yuv420, 12, 10, Conversion::new("T60C_To_I0AL", FourCc::T60C, FourCc::I0AL, k::t60c_to_i0al)),
    (Yuv420, 12, 8, Conversion::new("T60C_To_I420", FourCc::T60C, FourCc::I420, k::t60c_to_i420)),
    (Yuv422, 12, 12, Conversion::new("T62C_To_I2CL", FourCc::T62C, FourCc::I2CL, k::t62c_to_i2cl)),
    (Yuv422, 12, 10, Conversion::new("T62C_To_I2AL", FourCc::T62C, FourCc::I2AL, k::t62c_to_i2al)),
    (Yuv422, 12, 8, Conversion::new("T62C_To_I422", FourCc::T62C, FourCc::I422, k::t62c_to_i422)),
    (Yuv444, 12, 12, Conversion::new("T64C_To_I4CL", FourCc::T64C, FourCc::I4CL, k::t64c_to_i4cl)),
];

static DISPATCH: LazyLock<HashMap<ConversionKey, Conversion>> = LazyLock::new(|| {
    let raster = [RASTER_8BIT, RASTER_10BIT, RASTER_12BIT]
        .into_iter()
        .flatten()
        .map(|&(chroma, bd_in, bd_out, conv)| ((chroma, bd_in, bd_out, false), conv));
    let tiled = TILED
        .iter()
        .map(|&(chroma, bd_in, bd_out, conv)| ((chroma, bd_in, bd_out, true), conv));
    raster.chain(tiled).collect()
});

/// Every key with a routine.
pub fn supported_keys() -> impl Iterator<Item = ConversionKey> {
    DISPATCH.keys().copied()
}

/// Routine converting pictures of layout `source` into planar YUV at `bd_out` bits.
///
/// # Example
/// ```rust
/// use vdec_core::prelude::*;
/// use vdec_codec::prelude::*;
///
/// let xv15 = FourCc::XV15.pic_format().unwrap();
/// let conversion = conversion_for(&xv15, 8).unwrap();
/// assert_eq!(conversion.name, "XV15_To_I420");
/// assert!(conversion_for(&xv15, 12).is_err());
/// ```
pub fn conversion_for(source: &PicFormat, bd_out: u8) -> Result<Conversion, ConvertError> {
    let key = (
        source.chroma,
        source.bit_depth,
        bd_out,
        source.storage.is_tiled(),
    );
    DISPATCH
        .get(&key)
        .copied()
        .filter(|conv| Some(conv.source) == source.fourcc())
        .ok_or(ConvertError::NoRoutine {
            chroma: key.0,
            bd_in: key.1,
            bd_out: key.2,
            tiled: key.3,
        })
}

/// Reusable destination frame for conversions.
///
/// The frame is reallocated only when the target layout or the picture dimension changes.
#[derive(Debug, Default)]
pub struct ConvertTarget {
    frame: Option<YuvFrame>,
    allocated_for: Option<(FourCc, Dimension)>,
    allocations: u64,
}

impl ConvertTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert `picture` to planar YUV with `bd_out` bits per sample.
    pub fn convert(
        &mut self,
        picture: &BufferState,
        bd_out: u8,
    ) -> Result<&mut YuvFrame, ConvertError> {
        let source = SourcePicture::from_buffer(picture)?;
        let conversion = conversion_for(&source.format, bd_out)?;
        let frame = self.frame_for(conversion.target, source.dim)?;
        conversion.apply(&source, frame);
        Ok(frame)
    }

    fn frame_for(&mut self, fourcc: FourCc, dim: Dimension) -> Result<&mut YuvFrame, ConvertError> {
        let frame = match self.frame.take() {
            Some(mut frame) if self.allocated_for == Some((fourcc, dim)) => {
                frame.reshape(dim);
                frame
            }
            _ => {
                let frame = YuvFrame::new(fourcc, dim)?;
                self.allocated_for = Some((fourcc, dim));
                self.allocations += 1;
                frame
            }
        };
        Ok(self.frame.insert(frame))
    }

    /// Number of destination allocations so far.
    pub fn allocations(&self) -> u64 {
        self.allocations
    }
}

#[cfg(test)]
mod tests;
