use crate::{
    buffer::PlaneId,
    format::{CropInfo, Dimension},
    frame::YuvFrame,
};

/// Errors produced by in-place frame transforms.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    #[error("crop {crop:?} leaves nothing of a {dim} picture")]
    InvalidCrop { crop: CropInfo, dim: Dimension },
}

/// Remove `crop` borders from `frame` without reallocating.
///
/// Planes stay tightly packed afterwards, so the cropped picture is a prefix of the
/// original storage. Chroma borders are the luma borders divided by the subsampling
/// factors.
///
/// # Example
/// ```rust
/// use vdec_core::prelude::*;
///
/// let mut frame = YuvFrame::new(FourCc::I420, Dimension::new(1920, 16)).unwrap();
/// let crop = CropInfo { left: 8, right: 8, ..Default::default() };
/// crop_in_place(&mut frame, &crop).unwrap();
/// assert_eq!(frame.pitch(PlaneId::Y), 1904);
/// assert_eq!(frame.as_bytes().len(), 1904 * 16 + 2 * 952 * 8);
/// ```
pub fn crop_in_place(frame: &mut YuvFrame, crop: &CropInfo) -> Result<(), TransformError> {
    let old_dim = frame.dim();
    let new_dim = crop.apply(old_dim).ok_or(TransformError::InvalidCrop {
        crop: *crop,
        dim: old_dim,
    })?;
    let bps = frame.bytes_per_sample();
    let chroma = frame.format().chroma;
    let old_pitch_y = frame.pitch(PlaneId::Y);
    let old_pitch_c = frame.pitch(PlaneId::U);
    let old_u = frame.offset(PlaneId::U);
    let old_v = frame.offset(PlaneId::V);

    let new_pitch_y = bps * new_dim.width as usize;
    let data = frame.data_mut();
    move_rows(
        data,
        RowMove {
            src_base: old_pitch_y * crop.top as usize + bps * crop.left as usize,
            src_pitch: old_pitch_y,
            dst_base: 0,
            row_len: new_pitch_y,
            rows: new_dim.height as usize,
        },
    );

    if chroma.has_chroma() {
        let (sx, sy) = chroma.subsampling();
        let new_chroma = chroma.chroma_dim(new_dim);
        let new_pitch_c = bps * new_chroma.width as usize;
        let skip = old_pitch_c * (crop.top / sy) as usize + bps * (crop.left / sx) as usize;
        let new_u = new_pitch_y * new_dim.height as usize;
        let new_v = new_u + new_pitch_c * new_chroma.height as usize;
        for (old_base, new_base) in [(old_u, new_u), (old_v, new_v)] {
            move_rows(
                data,
                RowMove {
                    src_base: old_base + skip,
                    src_pitch: old_pitch_c,
                    dst_base: new_base,
                    row_len: new_pitch_c,
                    rows: new_chroma.height as usize,
                },
            );
        }
    }

    frame.set_dim(new_dim);
    let len = frame.offset(PlaneId::V) + frame.pitch(PlaneId::V) * frame.chroma_dim().height as usize;
    frame.data_mut().truncate(len);
    Ok(())
}

struct RowMove {
    src_base: usize,
    src_pitch: usize,
    dst_base: usize,
    row_len: usize,
    rows: usize,
}

// Destinations never overtake their sources, so forward row order is safe.
fn move_rows(data: &mut [u8], mv: RowMove) {
    for row in 0..mv.rows {
        let src = mv.src_base + row * mv.src_pitch;
        let dst = mv.dst_base + row * mv.row_len;
        data.copy_within(src..src + mv.row_len, dst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FourCc;

    fn numbered(fourcc: FourCc, dim: Dimension) -> YuvFrame {
        let mut frame = YuvFrame::new(fourcc, dim).unwrap();
        let (y, u, v) = frame.planes_mut();
        for (i, b) in y.iter_mut().enumerate() {
            *b = i as u8;
        }
        u.fill(100);
        v.fill(200);
        frame
    }

    #[test]
    fn crops_luma_rows_and_columns() {
        let mut frame = numbered(FourCc::Y800, Dimension::new(4, 4));
        let crop = CropInfo {
            left: 1,
            right: 1,
            top: 1,
            bottom: 1,
        };
        crop_in_place(&mut frame, &crop).unwrap();
        assert_eq!(frame.dim(), Dimension::new(2, 2));
        assert_eq!(frame.as_bytes(), &[5, 6, 9, 10]);
    }

    #[test]
    fn crops_420_chroma_by_subsampled_offsets() {
        let mut frame = YuvFrame::new(FourCc::I420, Dimension::new(4, 4)).unwrap();
        {
            let (_, u, v) = frame.planes_mut();
            u.copy_from_slice(&[1, 2, 3, 4]);
            v.copy_from_slice(&[5, 6, 7, 8]);
        }
        let crop = CropInfo {
            left: 2,
            top: 2,
            ..Default::default()
        };
        crop_in_place(&mut frame, &crop).unwrap();
        assert_eq!(frame.plane(PlaneId::U), &[4]);
        assert_eq!(frame.plane(PlaneId::V), &[8]);
        assert_eq!(frame.as_bytes().len(), 4 + 2);
    }

    #[test]
    fn sixteen_bit_samples_move_as_pairs() {
        let mut frame = numbered(FourCc::Y010, Dimension::new(3, 1));
        let crop = CropInfo {
            left: 1,
            ..Default::default()
        };
        crop_in_place(&mut frame, &crop).unwrap();
        assert_eq!(frame.as_bytes(), &[2, 3, 4, 5]);
    }

    #[test]
    fn rejects_crop_covering_picture() {
        let mut frame = numbered(FourCc::I420, Dimension::new(8, 8));
        let crop = CropInfo {
            top: 4,
            bottom: 4,
            ..Default::default()
        };
        assert!(matches!(
            crop_in_place(&mut frame, &crop),
            Err(TransformError::InvalidCrop { .. })
        ));
        assert_eq!(frame.dim(), Dimension::new(8, 8));
    }
}
