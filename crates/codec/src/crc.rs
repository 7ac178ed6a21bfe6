//! Checksums over converted frames.

use vdec_core::prelude::*;

/// CRC-32 over the visible samples of a planar frame, Y then U then V.
///
/// 8-bit frames are hashed byte by byte. Deeper frames are hashed as little-endian
/// 16-bit samples masked to the frame bit depth.
///
/// # Example
/// ```rust
/// use vdec_core::prelude::*;
/// use vdec_codec::crc::frame_crc;
///
/// let frame = YuvFrame::new(FourCc::Y800, Dimension::new(4, 1)).unwrap();
/// assert_eq!(frame_crc(&frame), crc32fast::hash(&[0, 0, 0, 0]));
/// ```
pub fn frame_crc(frame: &YuvFrame) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    let planes: &[PlaneId] = if frame.format().chroma.has_chroma() {
        &[PlaneId::Y, PlaneId::U, PlaneId::V]
    } else {
        &[PlaneId::Y]
    };
    let bit_depth = frame.format().bit_depth;
    for &plane in planes {
        let bytes = frame.plane(plane);
        if frame.bytes_per_sample() == 1 {
            hasher.update(bytes);
        } else {
            let mask = (1u16 << bit_depth) - 1;
            for sample in bytes.chunks_exact(2) {
                let value = u16::from_le_bytes([sample[0], sample[1]]) & mask;
                hasher.update(&value.to_le_bytes());
            }
        }
    }
    hasher.finalize()
}

/// Line written to CRC files: eight uppercase hexadecimal digits.
pub fn crc_line(crc: u32) -> String {
    format!("{crc:08X}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_line_is_zero_padded_uppercase() {
        assert_eq!(crc_line(0xabc), "00000ABC");
        assert_eq!(crc_line(u32::MAX), "FFFFFFFF");
    }

    #[test]
    fn deep_frames_ignore_bits_above_depth() {
        let mut clean = YuvFrame::new(FourCc::Y010, Dimension::new(2, 1)).unwrap();
        let mut dirty = clean.clone();
        clean.planes_mut().0.copy_from_slice(&[0xff, 0x03, 0x01, 0x00]);
        dirty.planes_mut().0.copy_from_slice(&[0xff, 0xff, 0x01, 0xfc]);
        assert_eq!(frame_crc(&clean), frame_crc(&dirty));
    }

    #[test]
    fn chroma_contributes() {
        let plain = YuvFrame::new(FourCc::I420, Dimension::new(2, 2)).unwrap();
        let mut tinted = plain.clone();
        tinted.planes_mut().1[0] = 1;
        assert_ne!(frame_crc(&plain), frame_crc(&tinted));
    }
}
