use smallvec::SmallVec;
use vdec_core::{layout::storage_rows, prelude::*};

use crate::ConvertError;

/// Colour component of a picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Y,
    U,
    V,
}

/// Read-only view of a decoder picture, resolved from a buffer's plane map.
///
/// # Example
/// ```rust
/// use vdec_core::prelude::*;
/// use vdec_codec::prelude::*;
///
/// let mut layout = BufferLayout::picture(PictureFormat {
///     fourcc: FourCc::Y800,
///     dim: Dimension::new(2, 2),
/// });
/// layout.add_chunk(64, &[(PlaneId::Y, 0, 32)]);
/// let buffer = Buffer::standalone(layout);
/// buffer.lock().plane_mut(PlaneId::Y).unwrap().data()[33] = 7;
/// let state = buffer.lock();
/// let source = SourcePicture::from_buffer(&state).unwrap();
/// assert_eq!(source.sample(Component::Y, 1, 1), 7);
/// ```
pub struct SourcePicture<'a> {
    pub fourcc: FourCc,
    pub format: PicFormat,
    pub dim: Dimension,
    layout: SampleLayout,
    planes: SmallVec<[Plane<'a>; 3]>,
}

impl<'a> SourcePicture<'a> {
    pub fn from_buffer(state: &'a BufferState) -> Result<Self, ConvertError> {
        let picture = state.format.ok_or(ConvertError::NotAPicture)?;
        let format = picture
            .fourcc
            .pic_format()
            .ok_or(ConvertError::UnknownFourCc(picture.fourcc))?;
        let ids: &[PlaneId] = match format.order {
            ChromaOrder::NoChroma => &[PlaneId::Y],
            ChromaOrder::SemiPlanar => &[PlaneId::Y, PlaneId::Uv],
            ChromaOrder::Planar => &[PlaneId::Y, PlaneId::U, PlaneId::V],
        };
        let chroma_rows = format.chroma.chroma_dim(picture.dim).height;
        let mut planes = SmallVec::new();
        for &id in ids {
            let plane = state.plane(id).ok_or(ConvertError::MissingPlane(id))?;
            let rows = if id == PlaneId::Y {
                picture.dim.height
            } else {
                chroma_rows
            };
            let needed = plane.pitch() * storage_rows(rows, format.storage) as usize;
            if plane.data().len() < needed {
                return Err(ConvertError::PlaneTooShort {
                    plane: id,
                    needed,
                    actual: plane.data().len(),
                });
            }
            planes.push(plane);
        }
        Ok(Self {
            fourcc: picture.fourcc,
            format,
            dim: picture.dim,
            layout: SampleLayout::of(&format),
            planes,
        })
    }

    /// Sample of `component` at chroma-resolution coordinates for U/V.
    #[inline]
    pub fn sample(&self, component: Component, x: usize, y: usize) -> u16 {
        let (plane, column) = match (self.format.order, component) {
            (_, Component::Y) => (&self.planes[0], x),
            (ChromaOrder::SemiPlanar, Component::U) => (&self.planes[1], 2 * x),
            (ChromaOrder::SemiPlanar, Component::V) => (&self.planes[1], 2 * x + 1),
            (ChromaOrder::Planar, Component::U) => (&self.planes[1], x),
            (ChromaOrder::Planar, Component::V) => (&self.planes[2], x),
            (ChromaOrder::NoChroma, _) => return 0,
        };
        self.layout.read(plane.data(), plane.pitch(), column, y)
    }

    /// Raw bytes and pitch of the n-th plane, in plane-map order.
    pub fn plane(&self, index: usize) -> Option<Plane<'a>> {
        self.planes.get(index).copied()
    }
}
