//! Plane geometry of decoder-written pictures.
//!
//! Raster rows are aligned to 32 bytes. Tiled pictures store 64x4 blocks of samples, one
//! "row" of tiles covering four picture rows; the pitch is the byte length of such a row.

use crate::format::{ChromaMode, ChromaOrder, Dimension, PicFormat, StorageMode};

/// Row alignment of raster buffers, in bytes.
pub const RASTER_PITCH_ALIGN: u32 = 32;
/// Tile width in samples.
pub const TILE_WIDTH: u32 = 64;
/// Tile height in samples.
pub const TILE_HEIGHT: u32 = 4;

/// Round `value` up to the next multiple of `align` (`align` > 0), or `None` when that
/// multiple does not fit in a `u32`.
pub fn checked_round_up(value: u32, align: u32) -> Option<u32> {
    value.div_ceil(align).checked_mul(align)
}

/// Round `value` up to the next multiple of `align` (`align` > 0), saturating at the
/// largest representable multiple.
pub fn round_up(value: u32, align: u32) -> u32 {
    checked_round_up(value, align).unwrap_or(u32::MAX / align * align)
}

/// Smallest luma pitch in bytes the decoder accepts for `width` samples.
///
/// # Example
/// ```rust
/// use vdec_core::prelude::*;
///
/// let nv12 = PicFormat::decoder_native(ChromaMode::Yuv420, 8, StorageMode::Raster);
/// assert_eq!(min_pitch(1920, &nv12), 1920);
/// let xv15 = PicFormat::decoder_native(ChromaMode::Yuv420, 10, StorageMode::Raster);
/// assert_eq!(min_pitch(1920, &xv15), 2560);
/// ```
pub fn min_pitch(width: u32, format: &PicFormat) -> u32 {
    match format.storage {
        StorageMode::Tile64x4 => {
            round_up(width, TILE_WIDTH)
                .saturating_mul(TILE_HEIGHT * format.bit_depth as u32)
                / 8
        }
        StorageMode::Raster => {
            let bytes = if format.packed10 {
                width.div_ceil(3) * 4
            } else {
                width.saturating_mul(format.bytes_per_sample() as u32)
            };
            round_up(bytes, RASTER_PITCH_ALIGN)
        }
    }
}

/// Pitch of the chroma plane(s) given the luma pitch.
pub fn chroma_pitch(luma_pitch: u32, format: &PicFormat) -> u32 {
    match format.order {
        ChromaOrder::NoChroma => 0,
        ChromaOrder::SemiPlanar => luma_pitch,
        ChromaOrder::Planar => luma_pitch.div_ceil(format.chroma.subsampling().0),
    }
}

/// Rows of storage (pitch units) needed for `height` sample rows.
pub fn storage_rows(height: u32, storage: StorageMode) -> u32 {
    match storage {
        StorageMode::Raster => height,
        StorageMode::Tile64x4 => height.div_ceil(TILE_HEIGHT),
    }
}

/// Byte size of the luma plane.
pub fn luma_size(dim: Dimension, pitch: u32, storage: StorageMode) -> usize {
    pitch as usize * storage_rows(dim.height, storage) as usize
}

/// Byte size of one chroma plane (the interleaved plane for semi-planar layouts).
pub fn chroma_plane_size(dim: Dimension, pitch: u32, format: &PicFormat) -> usize {
    if format.chroma == ChromaMode::Mono {
        return 0;
    }
    let rows = format.chroma.chroma_dim(dim).height;
    chroma_pitch(pitch, format) as usize * storage_rows(rows, format.storage) as usize
}

/// Number of chroma planes a decoder layout carries.
pub fn chroma_plane_count(format: &PicFormat) -> usize {
    match format.order {
        ChromaOrder::NoChroma => 0,
        ChromaOrder::SemiPlanar => 1,
        ChromaOrder::Planar => 2,
    }
}

/// Total bytes of a picture in a decoder layout.
pub fn picture_size(dim: Dimension, pitch: u32, format: &PicFormat) -> usize {
    luma_size(dim, pitch, format.storage)
        + chroma_plane_count(format) * chroma_plane_size(dim, pitch, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FourCc;

    fn format(code: FourCc) -> PicFormat {
        code.pic_format().unwrap()
    }

    #[test]
    fn raster_pitch_alignment() {
        assert_eq!(min_pitch(100, &format(FourCc::NV12)), 128);
        assert_eq!(min_pitch(100, &format(FourCc::P012)), 224);
        assert_eq!(min_pitch(100, &format(FourCc::XV10)), 160);
    }

    #[test]
    fn rounding_past_u32_is_detected() {
        assert_eq!(checked_round_up(100, 64), Some(128));
        assert_eq!(checked_round_up(u32::MAX, 64), None);
        assert_eq!(round_up(u32::MAX, 64), u32::MAX - 63);
        assert_eq!(min_pitch(u32::MAX, &format(FourCc::P012)), u32::MAX - 31);
    }

    #[test]
    fn tiled_pitch_covers_tile_rows() {
        assert_eq!(min_pitch(100, &format(FourCc::T608)), 128 * 4);
        assert_eq!(min_pitch(64, &format(FourCc::T60A)), 320);
        assert_eq!(min_pitch(64, &format(FourCc::T6MC)), 384);
    }

    #[test]
    fn semi_planar_420_picture_size() {
        let fmt = format(FourCc::NV12);
        let dim = Dimension::new(64, 33);
        let pitch = min_pitch(64, &fmt);
        assert_eq!(luma_size(dim, pitch, fmt.storage), 64 * 33);
        assert_eq!(chroma_plane_size(dim, pitch, &fmt), 64 * 17);
        assert_eq!(picture_size(dim, pitch, &fmt), 64 * 50);
    }

    #[test]
    fn planar_444_has_two_chroma_planes() {
        let fmt = format(FourCc::I4AL);
        let dim = Dimension::new(16, 2);
        let pitch = min_pitch(16, &fmt);
        assert_eq!(pitch, 32);
        assert_eq!(picture_size(dim, pitch, &fmt), 3 * 32 * 2);
    }

    #[test]
    fn tiled_chroma_rows_round_to_tiles() {
        let fmt = format(FourCc::T608);
        let dim = Dimension::new(64, 10);
        let pitch = min_pitch(64, &fmt);
        assert_eq!(luma_size(dim, pitch, fmt.storage), 256 * 3);
        assert_eq!(chroma_plane_size(dim, pitch, &fmt), 256 * 2);
    }
}
