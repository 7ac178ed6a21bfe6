//! Per-picture output: decoder CRC lines, planar YUV and reference CRC.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use vdec_codec::prelude::*;
use vdec_core::prelude::*;

use crate::{engine::DecodeInfo, error::VdecError};

type Sink = Box<dyn Write + Send>;

pub(crate) fn create_sink(path: &Path) -> Result<Sink, VdecError> {
    let file = File::create(path).map_err(|err| VdecError::file(path, err))?;
    Ok(Box::new(BufWriter::new(file)))
}

/// Output bit depths are even; odd requests are raised to the next even depth.
pub fn even_bit_depth(bit_depth: u8) -> u8 {
    (bit_depth + 1) & !1
}

/// Writes one storage mode's pictures.
///
/// Every sink is optional: the decoder CRC is copied from the picture record, the
/// reference CRC and the YUV bytes come from the converted and cropped picture.
///
/// # Example
/// ```rust
/// use vdec::output::OutputWriter;
///
/// let writer = OutputWriter::new().with_crc(Box::new(Vec::new()));
/// assert!(!writer.converts());
/// ```
#[derive(Default)]
pub struct OutputWriter {
    yuv: Option<Sink>,
    crc: Option<Sink>,
    cert_crc: Option<Sink>,
    target: ConvertTarget,
}

impl OutputWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_yuv(mut self, sink: Sink) -> Self {
        self.yuv = Some(sink);
        self
    }

    pub fn with_crc(mut self, sink: Sink) -> Self {
        self.crc = Some(sink);
        self
    }

    pub fn with_cert_crc(mut self, sink: Sink) -> Self {
        self.cert_crc = Some(sink);
        self
    }

    /// Open the files named by the given paths.
    pub fn create(
        yuv: Option<&Path>,
        crc: Option<&Path>,
        cert_crc: Option<&Path>,
    ) -> Result<Self, VdecError> {
        Ok(Self {
            yuv: yuv.map(create_sink).transpose()?,
            crc: crc.map(create_sink).transpose()?,
            cert_crc: cert_crc.map(create_sink).transpose()?,
            target: ConvertTarget::new(),
        })
    }

    /// Whether pictures need converting at all.
    pub fn converts(&self) -> bool {
        self.yuv.is_some() || self.cert_crc.is_some()
    }

    pub fn process_output(
        &mut self,
        picture: &BufferState,
        info: &DecodeInfo,
        bd_out: u8,
    ) -> Result<(), VdecError> {
        if let Some(crc) = self.crc.as_mut() {
            writeln!(crc, "{}", crc_line(info.crc))?;
        }
        if !self.converts() {
            return Ok(());
        }
        let frame = self.target.convert(picture, even_bit_depth(bd_out))?;
        if info.crop.is_cropping() {
            crop_in_place(frame, &info.crop)?;
        }
        if let Some(cert) = self.cert_crc.as_mut() {
            writeln!(cert, "{}", crc_line(frame_crc(frame)))?;
        }
        if let Some(yuv) = self.yuv.as_mut() {
            yuv.write_all(frame.as_bytes())?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        for sink in [&mut self.yuv, &mut self.crc, &mut self.cert_crc].into_iter().flatten() {
            sink.flush()?;
        }
        Ok(())
    }
}
