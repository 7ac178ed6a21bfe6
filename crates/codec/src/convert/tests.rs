use super::*;
use vdec_core::prelude::*;
use vdec_core::format::ChromaMode::{Mono, Yuv420, Yuv422, Yuv444};

const DEPTHS: [u8; 3] = [8, 10, 12];
const CHROMAS: [ChromaMode; 4] = [Mono, Yuv420, Yuv422, Yuv444];

/// Decoder-layout picture whose samples come from `value(component, x, y)`.
fn native_picture(
    fourcc: FourCc,
    dim: Dimension,
    value: impl Fn(Component, usize, usize) -> u16,
) -> Buffer {
    let format = fourcc.pic_format().unwrap();
    let pitch = min_pitch(dim.width, &format) as usize;
    let luma = luma_size(dim, pitch as u32, format.storage);
    let chroma = chroma_plane_size(dim, pitch as u32, &format);
    let cpitch = chroma_pitch(pitch as u32, &format) as usize;
    let mut layout = BufferLayout::picture(PictureFormat { fourcc, dim });
    layout.add_chunk(luma, &[(PlaneId::Y, 0, pitch)]);
    match format.order {
        ChromaOrder::NoChroma => {}
        ChromaOrder::SemiPlanar => {
            layout.add_chunk(chroma, &[(PlaneId::Uv, 0, cpitch)]);
        }
        ChromaOrder::Planar => {
            layout.add_chunk(2 * chroma, &[(PlaneId::U, 0, cpitch), (PlaneId::V, chroma, cpitch)]);
        }
    }
    let buffer = Buffer::standalone(layout);
    {
        let samples = SampleLayout::of(&format);
        let cdim = format.chroma.chroma_dim(dim);
        let mut state = buffer.lock();
        let mut y = state.plane_mut(PlaneId::Y).unwrap();
        for row in 0..dim.height as usize {
            for x in 0..dim.width as usize {
                let p = y.pitch();
                samples.write(y.data(), p, x, row, value(Component::Y, x, row));
            }
        }
        let mut put = |id: PlaneId, column: usize, row: usize, v: u16| {
            let mut plane = state.plane_mut(id).unwrap();
            let p = plane.pitch();
            samples.write(plane.data(), p, column, row, v);
        };
        for row in 0..cdim.height as usize {
            for x in 0..cdim.width as usize {
                let (u, v) = (value(Component::U, x, row), value(Component::V, x, row));
                match format.order {
                    ChromaOrder::SemiPlanar => {
                        put(PlaneId::Uv, 2 * x, row, u);
                        put(PlaneId::Uv, 2 * x + 1, row, v);
                    }
                    ChromaOrder::Planar => {
                        put(PlaneId::U, x, row, u);
                        put(PlaneId::V, x, row, v);
                    }
                    ChromaOrder::NoChroma => {}
                }
            }
        }
    }
    buffer
}

fn pattern(bit_depth: u8) -> impl Fn(Component, usize, usize) -> u16 {
    move |component, x, y| {
        let base = match component {
            Component::Y => 3,
            Component::U => 500,
            Component::V => 1000,
        };
        ((base + x * 5 + y * 11) as u16) & ((1u16 << bit_depth) - 1)
    }
}

fn read_sample(frame: &YuvFrame, plane: PlaneId, x: usize, y: usize) -> u16 {
    let bps = frame.bytes_per_sample();
    let at = y * frame.pitch(plane) + x * bps;
    let bytes = frame.plane(plane);
    if bps == 1 {
        bytes[at] as u16
    } else {
        u16::from_le_bytes([bytes[at], bytes[at + 1]])
    }
}

#[test]
fn every_combination_resolves_or_fails() {
    let mut supported = 0;
    for tiled in [false, true] {
        let storage = if tiled {
            StorageMode::Tile64x4
        } else {
            StorageMode::Raster
        };
        for chroma in CHROMAS {
            for bd_in in DEPTHS {
                let source = PicFormat::decoder_native(chroma, bd_in, storage);
                for bd_out in DEPTHS {
                    match conversion_for(&source, bd_out) {
                        Ok(conversion) => {
                            supported += 1;
                            assert_eq!(Some(conversion.source), source.fourcc());
                            let target = PicFormat::planar_output(chroma, bd_out);
                            assert_eq!(Some(conversion.target), target.fourcc(), "{conversion:?}");
                        }
                        Err(err) => assert!(matches!(err, ConvertError::NoRoutine { .. })),
                    }
                }
            }
        }
    }
    assert_eq!(supported, supported_keys().count());
    assert_eq!(supported, 52);
}

#[test]
fn unsupported_combinations_fail() {
    let nv12 = FourCc::NV12.pic_format().unwrap();
    assert!(conversion_for(&nv12, 12).is_err());
    let t648 = FourCc::T648.pic_format().unwrap();
    assert!(conversion_for(&t648, 10).is_err());
    // Known key, but not the layout the decoder writes for it.
    let p010 = FourCc::P010.pic_format().unwrap();
    assert!(conversion_for(&p010, 10).is_err());
}

#[test]
fn identical_layout_copies_planes_verbatim() {
    for fourcc in [FourCc::I444, FourCc::Y800, FourCc::I4AL, FourCc::Y012] {
        let format = fourcc.pic_format().unwrap();
        let dim = Dimension::new(13, 5);
        let picture = native_picture(fourcc, dim, pattern(format.bit_depth));
        let mut target = ConvertTarget::new();
        let state = picture.lock();
        let conversion = conversion_for(&format, format.bit_depth).unwrap();
        assert!(conversion.is_copy());
        let frame = target.convert(&state, format.bit_depth).unwrap();
        assert_eq!(frame.fourcc(), fourcc);
        let row = frame.pitch(PlaneId::Y);
        let src = state.plane(PlaneId::Y).unwrap();
        for y in 0..dim.height as usize {
            assert_eq!(
                &frame.plane(PlaneId::Y)[y * row..(y + 1) * row],
                &src.data()[y * src.pitch()..y * src.pitch() + row]
            );
        }
    }
}

#[test]
fn nv12_deinterleaves_chroma() {
    let dim = Dimension::new(6, 4);
    let picture = native_picture(FourCc::NV12, dim, pattern(8));
    let mut target = ConvertTarget::new();
    let frame = target.convert(&picture.lock(), 8).unwrap();
    assert_eq!(frame.fourcc(), FourCc::I420);
    let expect = pattern(8);
    assert_eq!(read_sample(frame, PlaneId::Y, 5, 3), expect(Component::Y, 5, 3));
    assert_eq!(read_sample(frame, PlaneId::U, 2, 1), expect(Component::U, 2, 1));
    assert_eq!(read_sample(frame, PlaneId::V, 1, 0), expect(Component::V, 1, 0));
    assert_eq!(frame.as_bytes().len(), 24 + 2 * 6);
}

#[test]
fn packed_10bit_downshifts_to_8bit() {
    let dim = Dimension::new(7, 2);
    let picture = native_picture(FourCc::XV20, dim, pattern(10));
    let mut target = ConvertTarget::new();
    let frame = target.convert(&picture.lock(), 8).unwrap();
    assert_eq!(frame.fourcc(), FourCc::I422);
    let expect = pattern(10);
    for x in 0..7 {
        assert_eq!(read_sample(frame, PlaneId::Y, x, 1), expect(Component::Y, x, 1) >> 2);
    }
    assert_eq!(read_sample(frame, PlaneId::V, 3, 1), expect(Component::V, 3, 1) >> 2);
}

#[test]
fn eight_bit_upshifts_into_16bit_containers() {
    let dim = Dimension::new(4, 4);
    let picture = native_picture(FourCc::Y800, dim, pattern(8));
    let mut target = ConvertTarget::new();
    let frame = target.convert(&picture.lock(), 10).unwrap();
    assert_eq!(frame.fourcc(), FourCc::Y010);
    assert_eq!(
        read_sample(frame, PlaneId::Y, 2, 3),
        pattern(8)(Component::Y, 2, 3) << 2
    );
}

#[test]
fn tiled_pictures_untile() {
    for (fourcc, bd_out) in [(FourCc::T608, 8), (FourCc::T62A, 10), (FourCc::T64C, 12)] {
        let format = fourcc.pic_format().unwrap();
        let dim = Dimension::new(70, 9);
        let picture = native_picture(fourcc, dim, pattern(format.bit_depth));
        let mut target = ConvertTarget::new();
        let frame = target.convert(&picture.lock(), bd_out).unwrap();
        let expect = pattern(format.bit_depth);
        let cdim = frame.chroma_dim();
        for (x, y) in [(0, 0), (63, 3), (64, 4), (69, 8)] {
            assert_eq!(read_sample(frame, PlaneId::Y, x, y), expect(Component::Y, x, y));
        }
        let (cx, cy) = (cdim.width as usize - 1, cdim.height as usize - 1);
        assert_eq!(read_sample(frame, PlaneId::U, cx, cy), expect(Component::U, cx, cy));
        assert_eq!(read_sample(frame, PlaneId::V, 0, cy), expect(Component::V, 0, cy));
    }
}

#[test]
fn destination_is_reused_until_dimension_changes() {
    let small = native_picture(FourCc::NV12, Dimension::new(16, 8), pattern(8));
    let other = native_picture(FourCc::NV12, Dimension::new(16, 8), pattern(8));
    let large = native_picture(FourCc::NV12, Dimension::new(32, 8), pattern(8));
    let mut target = ConvertTarget::new();
    let first = target.convert(&small.lock(), 8).unwrap().as_bytes().as_ptr();
    let second = target.convert(&other.lock(), 8).unwrap().as_bytes().as_ptr();
    assert_eq!(first, second);
    assert_eq!(target.allocations(), 1);
    target.convert(&large.lock(), 8).unwrap();
    assert_eq!(target.allocations(), 2);
    target.convert(&large.lock(), 8).unwrap();
    assert_eq!(target.allocations(), 2);
}

#[test]
fn missing_plane_is_reported() {
    let mut layout = BufferLayout::picture(PictureFormat {
        fourcc: FourCc::NV12,
        dim: Dimension::new(4, 4),
    });
    layout.add_chunk(128, &[(PlaneId::Y, 0, 32)]);
    let picture = Buffer::standalone(layout);
    let mut target = ConvertTarget::new();
    let err = target.convert(&picture.lock(), 8).unwrap_err();
    assert_eq!(err, ConvertError::MissingPlane(PlaneId::Uv));
}

#[test]
fn stream_buffers_are_not_pictures() {
    let stream = Buffer::standalone(BufferLayout::stream(16));
    let mut target = ConvertTarget::new();
    assert_eq!(
        target.convert(&stream.lock(), 8).unwrap_err(),
        ConvertError::NotAPicture
    );
}
