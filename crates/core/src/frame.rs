use crate::{
    buffer::PlaneId,
    format::{ChromaOrder, Dimension, FourCc, PicFormat, StorageMode},
};

/// Errors building planar frames.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("{0} is not a planar raster layout")]
    NotPlanar(FourCc),
    #[error("unknown fourcc {0}")]
    UnknownFourCc(FourCc),
}

/// Tightly packed planar YUV picture: Y rows, then U rows, then V rows, no padding.
///
/// Luma pitch is `bytes_per_sample * width`; chroma planes cover
/// `ceil(width / sx) x ceil(height / sy)` samples.
///
/// # Example
/// ```rust
/// use vdec_core::prelude::*;
///
/// let frame = YuvFrame::new(FourCc::I420, Dimension::new(5, 3)).unwrap();
/// assert_eq!(frame.pitch(PlaneId::Y), 5);
/// assert_eq!(frame.pitch(PlaneId::U), 3);
/// assert_eq!(frame.as_bytes().len(), 15 + 2 * 6);
/// ```
#[derive(Debug, Clone)]
pub struct YuvFrame {
    fourcc: FourCc,
    format: PicFormat,
    dim: Dimension,
    data: Vec<u8>,
}

impl YuvFrame {
    pub fn new(fourcc: FourCc, dim: Dimension) -> Result<Self, FrameError> {
        let format = fourcc
            .pic_format()
            .ok_or(FrameError::UnknownFourCc(fourcc))?;
        if format.storage != StorageMode::Raster
            || format.order == ChromaOrder::SemiPlanar
            || format.packed10
        {
            return Err(FrameError::NotPlanar(fourcc));
        }
        let mut frame = Self {
            fourcc,
            format,
            dim,
            data: Vec::new(),
        };
        frame.reshape(dim);
        Ok(frame)
    }

    /// Re-lay the frame out for `dim`, reusing the existing allocation when it is large enough.
    pub fn reshape(&mut self, dim: Dimension) {
        self.dim = dim;
        let len = self.len_for(dim);
        self.data.resize(len, 0);
    }

    fn len_for(&self, dim: Dimension) -> usize {
        let bps = self.format.bytes_per_sample();
        let chroma = self.format.chroma.chroma_dim(dim);
        bps * (dim.area() + 2 * chroma.area())
    }

    pub fn fourcc(&self) -> FourCc {
        self.fourcc
    }

    pub fn format(&self) -> &PicFormat {
        &self.format
    }

    pub fn dim(&self) -> Dimension {
        self.dim
    }

    pub fn chroma_dim(&self) -> Dimension {
        self.format.chroma.chroma_dim(self.dim)
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.format.bytes_per_sample()
    }

    pub fn pitch(&self, plane: PlaneId) -> usize {
        let bps = self.bytes_per_sample();
        match plane {
            PlaneId::Y => bps * self.dim.width as usize,
            _ => bps * self.chroma_dim().width as usize,
        }
    }

    /// Byte offset of a plane inside [`YuvFrame::as_bytes`].
    pub fn offset(&self, plane: PlaneId) -> usize {
        let luma = self.pitch(PlaneId::Y) * self.dim.height as usize;
        let chroma = self.pitch(PlaneId::U) * self.chroma_dim().height as usize;
        match plane {
            PlaneId::Y => 0,
            PlaneId::U | PlaneId::Uv => luma,
            PlaneId::V => luma + chroma,
        }
    }

    pub fn plane(&self, plane: PlaneId) -> &[u8] {
        let (y, u, v) = self.split();
        match plane {
            PlaneId::Y => y,
            PlaneId::U | PlaneId::Uv => u,
            PlaneId::V => v,
        }
    }

    fn split(&self) -> (&[u8], &[u8], &[u8]) {
        let (y, rest) = self.data.split_at(self.offset(PlaneId::U));
        let (u, v) = rest.split_at(self.offset(PlaneId::V) - self.offset(PlaneId::U));
        (y, u, v)
    }

    /// Mutable Y, U and V planes; chroma planes are empty for monochrome frames.
    pub fn planes_mut(&mut self) -> (&mut [u8], &mut [u8], &mut [u8]) {
        let u_at = self.offset(PlaneId::U);
        let v_at = self.offset(PlaneId::V);
        let (y, rest) = self.data.split_at_mut(u_at);
        let (u, v) = rest.split_at_mut(v_at - u_at);
        (y, u, v)
    }

    /// The whole picture as written to disk.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    pub(crate) fn set_dim(&mut self, dim: Dimension) {
        self.dim = dim;
    }
}
