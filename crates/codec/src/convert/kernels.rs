//! Conversion routines from decoder layouts to planar YUV.
//!
//! Every routine has the `(source, destination)` shape; the scaled ones additionally take
//! the horizontal and vertical chroma subsampling factors of the source.

use rayon::prelude::*;
use vdec_core::prelude::*;

use super::source::{Component, SourcePicture};

/// Byte-exact copy of each plane, used when source and destination layouts match.
pub fn copy(src: &SourcePicture<'_>, dst: &mut YuvFrame) {
    let bps = dst.bytes_per_sample();
    let dim = dst.dim();
    let chroma = dst.chroma_dim();
    let (y, u, v) = dst.planes_mut();
    let targets = [(y, dim), (u, chroma), (v, chroma)];
    for (index, (plane, plane_dim)) in targets.into_iter().enumerate() {
        let Some(source) = src.plane(index) else {
            continue;
        };
        let row = bps * plane_dim.width as usize;
        if row == 0 {
            continue;
        }
        plane
            .par_chunks_mut(row)
            .enumerate()
            .for_each(|(line, out)| {
                let start = line * source.pitch();
                if let Some(input) = source.data().get(start..start + row) {
                    out.copy_from_slice(input);
                }
            });
    }
}

/// Semi-planar (interleaved UV) source to planar destination.
pub fn semi_planar_to_planar(src: &SourcePicture<'_>, dst: &mut YuvFrame, hs: u32, vs: u32) {
    resample_planes(src, dst, hs, vs);
}

/// Planar source to planar destination at another bit depth.
pub fn planar_to_planar(src: &SourcePicture<'_>, dst: &mut YuvFrame, hs: u32, vs: u32) {
    resample_planes(src, dst, hs, vs);
}

/// Luma-only source to luma-only destination at another bit depth.
pub fn mono_to_mono(src: &SourcePicture<'_>, dst: &mut YuvFrame) {
    resample_planes(src, dst, 1, 1);
}

fn resample_planes(src: &SourcePicture<'_>, dst: &mut YuvFrame, hs: u32, vs: u32) {
    let bd_in = src.format.bit_depth;
    let bd_out = dst.format().bit_depth;
    let bps = dst.bytes_per_sample();
    let dim = dst.dim();
    let has_chroma = dst.format().chroma.has_chroma();
    let chroma = Dimension::new(dim.width.div_ceil(hs), dim.height.div_ceil(vs));
    let (y, u, v) = dst.planes_mut();
    write_plane(y, dim, bps, |x, row| {
        rescale(src.sample(Component::Y, x, row), bd_in, bd_out)
    });
    if has_chroma {
        write_plane(u, chroma, bps, |x, row| {
            rescale(src.sample(Component::U, x, row), bd_in, bd_out)
        });
        write_plane(v, chroma, bps, |x, row| {
            rescale(src.sample(Component::V, x, row), bd_in, bd_out)
        });
    }
}

fn write_plane<F>(plane: &mut [u8], dim: Dimension, bps: usize, sample: F)
where
    F: Fn(usize, usize) -> u16 + Sync,
{
    let width = dim.width as usize;
    let pitch = width * bps;
    if pitch == 0 {
        return;
    }
    plane
        .par_chunks_mut(pitch)
        .take(dim.height as usize)
        .enumerate()
        .for_each(|(row, line)| {
            if bps == 1 {
                for (x, out) in line.iter_mut().enumerate() {
                    *out = sample(x, row) as u8;
                }
            } else {
                for (x, out) in line.chunks_exact_mut(2).enumerate() {
                    out.copy_from_slice(&sample(x, row).to_le_bytes());
                }
            }
        });
}

/// Move a sample between bit depths by shifting; no rounding.
#[inline]
pub fn rescale(value: u16, from: u8, to: u8) -> u16 {
    if to >= from {
        value << (to - from)
    } else {
        value >> (from - to)
    }
}

macro_rules! routines {
    ($($(#[$doc:meta])* $name:ident => $body:expr;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(src: &SourcePicture<'_>, dst: &mut YuvFrame) {
                let kernel: fn(&SourcePicture<'_>, &mut YuvFrame) = $body;
                kernel(src, dst)
            }
        )*
    };
}

routines! {
    nv12_to_i420 => |s, d| semi_planar_to_planar(s, d, 2, 2);
    nv12_to_i0al => |s, d| semi_planar_to_planar(s, d, 2, 2);
    nv16_to_i422 => |s, d| semi_planar_to_planar(s, d, 2, 1);
    nv16_to_i2al => |s, d| semi_planar_to_planar(s, d, 2, 1);
    i444_to_i4al => |s, d| planar_to_planar(s, d, 1, 1);
    y800_to_y010 => mono_to_mono;

    xv15_to_i0al => |s, d| semi_planar_to_planar(s, d, 2, 2);
    xv15_to_i420 => |s, d| semi_planar_to_planar(s, d, 2, 2);
    xv20_to_i2al => |s, d| semi_planar_to_planar(s, d, 2, 1);
    xv20_to_i422 => |s, d| semi_planar_to_planar(s, d, 2, 1);
    i4al_to_i444 => |s, d| planar_to_planar(s, d, 1, 1);
    xv10_to_y010 => mono_to_mono;
    xv10_to_y800 => mono_to_mono;

    p012_to_i0cl => |s, d| semi_planar_to_planar(s, d, 2, 2);
    p012_to_i0al => |s, d| semi_planar_to_planar(s, d, 2, 2);
    p012_to_i420 => |s, d| semi_planar_to_planar(s, d, 2, 2);
    p212_to_i2cl => |s, d| semi_planar_to_planar(s, d, 2, 1);
    p212_to_i2al => |s, d| semi_planar_to_planar(s, d, 2, 1);
    p212_to_i422 => |s, d| semi_planar_to_planar(s, d, 2, 1);
    i4cl_to_i4al => |s, d| planar_to_planar(s, d, 1, 1);
    i4cl_to_i444 => |s, d| planar_to_planar(s, d, 1, 1);
    y012_to_y010 => mono_to_mono;
    y012_to_y800 => mono_to_mono;

    /// 8-bit 4:2:0 tiles.
    t608_to_i420 => |s, d| semi_planar_to_planar(s, d, 2, 2);
    t608_to_i0al => |s, d| semi_planar_to_planar(s, d, 2, 2);
    t628_to_i422 => |s, d| semi_planar_to_planar(s, d, 2, 1);
    t628_to_i2al => |s, d| semi_planar_to_planar(s, d, 2, 1);
    t648_to_i444 => |s, d| planar_to_planar(s, d, 1, 1);
    t6m8_to_y800 => mono_to_mono;
    t6m8_to_y010 => mono_to_mono;

    /// 10-bit tiles.
    t60a_to_i0al => |s, d| semi_planar_to_planar(s, d, 2, 2);
    t60a_to_i420 => |s, d| semi_planar_to_planar(s, d, 2, 2);
    t62a_to_i2al => |s, d| semi_planar_to_planar(s, d, 2, 1);
    t62a_to_i422 => |s, d| semi_planar_to_planar(s, d, 2, 1);
    t64a_to_i4al => |s, d| planar_to_planar(s, d, 1, 1);
    t6ma_to_y010 => mono_to_mono;
    t6ma_to_y800 => mono_to_mono;

    /// 12-bit tiles.
    t60c_to_i0cl => |s, d| semi_planar_to_planar(s, d, 2, 2);
    t60c_to_i0al => |s, d| semi_planar_to_planar(s, d, 2, 2);
    t60c_to_i420 => |s, d| semi_planar_to_planar(s, d, 2, 2);
    t62c_to_i2cl => |s, d| semi_planar_to_planar(s, d, 2, 1);
    t62c_to_i2al => |s, d| semi_planar_to_planar(s, d, 2, 1);
    t62c_to_i422 => |s, d| semi_planar_to_planar(s, d, 2, 1);
    t64c_to_i4cl => |s, d| planar_to_planar(s, d, 1, 1);
    t6mc_to_y012 => mono_to_mono;
    t6mc_to_y010 => mono_to_mono;
    t6mc_to_y800 => mono_to_mono;
}
