//! Metadata records attached to buffers.

use crate::buffer::Buffer;

/// One supplemental enhancement message as parsed from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeiMessage {
    /// Prefix (before the picture) or suffix message.
    pub prefix: bool,
    pub payload_type: u32,
    pub payload: Vec<u8>,
}

/// Chromaticity of the mastering display, in 0.00002 units; luminance in 0.0001 cd/m².
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MasteringDisplay {
    pub primaries: [(u16, u16); 3],
    pub white_point: (u16, u16),
    pub max_luminance: u32,
    pub min_luminance: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContentLightLevel {
    pub max_content: u16,
    pub max_pic_average: u16,
}

/// HDR-related messages in effect for a picture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HdrSeis {
    pub mastering_display: Option<MasteringDisplay>,
    pub content_light_level: Option<ContentLightLevel>,
    pub alternative_transfer: Option<u8>,
}

impl HdrSeis {
    pub fn is_empty(&self) -> bool {
        self.mastering_display.is_none()
            && self.content_light_level.is_none()
            && self.alternative_transfer.is_none()
    }
}

/// Colour description plus HDR messages, filled by the decoder per picture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HdrMeta {
    pub colour_primaries: u8,
    pub transfer_characteristics: u8,
    pub matrix_coefficients: u8,
    pub seis: HdrSeis,
}

/// Flags of a stream section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionFlags {
    pub end_of_frame: bool,
}

/// Region of a compressed buffer holding one decoding unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSection {
    pub offset: usize,
    pub length: usize,
    pub flags: SectionFlags,
}

/// Description of the bytes a compressed buffer carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamMeta {
    pub sections: Vec<StreamSection>,
}

impl StreamMeta {
    pub fn add_section(&mut self, offset: usize, length: usize, flags: SectionFlags) {
        self.sections.push(StreamSection {
            offset,
            length,
            flags,
        });
    }

    pub fn clear(&mut self) {
        self.sections.clear();
    }
}

/// Lifecycle of a compressed buffer inside the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Pending,
    Processed,
}

/// Reference from a decoded picture to a compressed buffer it came from.
#[derive(Clone)]
pub struct DecodeHandle {
    pub stream: Buffer,
    pub state: HandleState,
}

impl std::fmt::Debug for DecodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeHandle")
            .field("stream", &self.stream.id())
            .field("state", &self.state)
            .finish()
    }
}

/// Compressed buffers consumed to produce a picture.
#[derive(Debug, Clone, Default)]
pub struct HandleMeta {
    pub handles: Vec<DecodeHandle>,
}

/// All metadata a buffer may carry.
#[derive(Debug, Default)]
pub struct BufferMeta {
    pub stream: Option<StreamMeta>,
    pub handles: Option<HandleMeta>,
    pub sei: Option<Vec<SeiMessage>>,
    pub hdr: Option<HdrMeta>,
}

impl BufferMeta {
    /// Drop per-use records; storage attachments such as HDR survive recycling.
    pub(crate) fn recycle(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            stream.clear();
        }
        self.handles = None;
        if let Some(sei) = self.sei.as_mut() {
            sei.clear();
        }
    }
}
