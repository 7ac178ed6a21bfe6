use crate::{
    format::{PicFormat, StorageMode},
    layout::{TILE_HEIGHT, TILE_WIDTH},
};

/// How individual samples are stored inside a plane.
///
/// Semi-planar chroma planes are addressed with `x` counting interleaved samples, so the
/// U sample of pair `n` lives at `x = 2n` and the V sample at `x = 2n + 1`.
///
/// # Example
/// ```rust
/// use vdec_core::prelude::SampleLayout;
///
/// let layout = SampleLayout::Packed10;
/// let mut row = vec![0u8; 8];
/// layout.write(&mut row, 8, 4, 0, 0x3ff);
/// assert_eq!(layout.read(&row, 8, 4, 0), 0x3ff);
/// assert_eq!(layout.read(&row, 8, 3, 0), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleLayout {
    /// One byte per sample.
    U8,
    /// Three 10-bit samples in the low 30 bits of a little-endian 32-bit word.
    Packed10,
    /// Little-endian 16-bit container, value in the low bits.
    U16,
    /// 64x4 tiles, samples bit-packed little-endian at `bit_depth` bits.
    Tiled { bit_depth: u8 },
}

impl SampleLayout {
    pub fn of(format: &PicFormat) -> Self {
        match format.storage {
            StorageMode::Tile64x4 => SampleLayout::Tiled {
                bit_depth: format.bit_depth,
            },
            StorageMode::Raster if format.packed10 => SampleLayout::Packed10,
            StorageMode::Raster if format.bit_depth > 8 => SampleLayout::U16,
            StorageMode::Raster => SampleLayout::U8,
        }
    }

    /// Read the sample at column `x`, row `y`. Out-of-range positions read as zero.
    pub fn read(&self, plane: &[u8], pitch: usize, x: usize, y: usize) -> u16 {
        match *self {
            SampleLayout::U8 => plane.get(y * pitch + x).copied().unwrap_or(0) as u16,
            SampleLayout::U16 => {
                let at = y * pitch + 2 * x;
                match plane.get(at..at + 2) {
                    Some(bytes) => u16::from_le_bytes([bytes[0], bytes[1]]),
                    None => 0,
                }
            }
            SampleLayout::Packed10 => {
                let at = y * pitch + (x / 3) * 4;
                match plane.get(at..at + 4) {
                    Some(bytes) => {
                        let word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                        ((word >> (10 * (x % 3))) & 0x3ff) as u16
                    }
                    None => 0,
                }
            }
            SampleLayout::Tiled { bit_depth } => {
                let bit = tile_bit_offset(pitch, x, y, bit_depth);
                let mut window = 0u32;
                for i in 0..3 {
                    let byte = plane.get(bit / 8 + i).copied().unwrap_or(0);
                    window |= (byte as u32) << (8 * i);
                }
                ((window >> (bit % 8)) & mask(bit_depth)) as u16
            }
        }
    }

    /// Store `value` at column `x`, row `y`. Positions outside `plane` are ignored.
    pub fn write(&self, plane: &mut [u8], pitch: usize, x: usize, y: usize, value: u16) {
        match *self {
            SampleLayout::U8 => {
                if let Some(slot) = plane.get_mut(y * pitch + x) {
                    *slot = value as u8;
                }
            }
            SampleLayout::U16 => {
                let at = y * pitch + 2 * x;
                if let Some(bytes) = plane.get_mut(at..at + 2) {
                    bytes.copy_from_slice(&value.to_le_bytes());
                }
            }
            SampleLayout::Packed10 => {
                let at = y * pitch + (x / 3) * 4;
                if let Some(bytes) = plane.get_mut(at..at + 4) {
                    let shift = 10 * (x % 3);
                    let mut word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                    word &= !(0x3ff << shift);
                    word |= ((value as u32) & 0x3ff) << shift;
                    bytes.copy_from_slice(&word.to_le_bytes());
                }
            }
            SampleLayout::Tiled { bit_depth } => {
                let bit = tile_bit_offset(pitch, x, y, bit_depth);
                let shift = bit % 8;
                let bits = ((value as u32) & mask(bit_depth)) << shift;
                let clear = mask(bit_depth) << shift;
                for i in 0..3 {
                    if let Some(byte) = plane.get_mut(bit / 8 + i) {
                        let keep = *byte & !((clear >> (8 * i)) as u8);
                        *byte = keep | (bits >> (8 * i)) as u8;
                    }
                }
            }
        }
    }
}

fn mask(bit_depth: u8) -> u32 {
    (1u32 << bit_depth) - 1
}

fn tile_bit_offset(pitch: usize, x: usize, y: usize, bit_depth: u8) -> usize {
    let bd = bit_depth as usize;
    let (tw, th) = (TILE_WIDTH as usize, TILE_HEIGHT as usize);
    let band = (y / th) * pitch * 8;
    let tile = (x / tw) * tw * th * bd;
    let inner = ((y % th) * tw + x % tw) * bd;
    band + tile + inner
}
