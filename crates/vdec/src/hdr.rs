use std::{
    io::{self, Write},
    path::Path,
};

use serde::Serialize;
use vdec_core::prelude::HdrMeta;

use crate::{error::VdecError, output::create_sink};

#[derive(Serialize)]
struct HdrRecord<'a> {
    frame: u64,
    #[serde(flatten)]
    meta: &'a HdrMeta,
}

/// HDR dump: one JSON object per displayed picture carrying HDR metadata.
///
/// # Example
/// ```rust
/// use vdec::hdr::HdrWriter;
/// use vdec_core::prelude::HdrMeta;
///
/// let mut out = Vec::new();
/// HdrWriter::record(&mut out, 0, &HdrMeta { colour_primaries: 9, ..Default::default() }).unwrap();
/// let text = String::from_utf8(out).unwrap();
/// assert!(text.starts_with("{\"frame\":0,\"colour_primaries\":9,"));
/// assert!(text.ends_with("}\n"));
/// ```
pub struct HdrWriter {
    sink: Box<dyn Write + Send>,
    frames: u64,
}

impl HdrWriter {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self { sink, frames: 0 }
    }

    pub fn create(path: &Path) -> Result<Self, VdecError> {
        Ok(Self::new(create_sink(path)?))
    }

    pub fn write(&mut self, meta: &HdrMeta) -> io::Result<()> {
        Self::record(&mut self.sink, self.frames, meta)?;
        self.frames += 1;
        Ok(())
    }

    pub fn record(out: &mut dyn Write, frame: u64, meta: &HdrMeta) -> io::Result<()> {
        serde_json::to_writer(&mut *out, &HdrRecord { frame, meta })?;
        writeln!(out)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdec_core::prelude::{ContentLightLevel, HdrSeis};

    #[test]
    fn light_level_round_trips_through_json() {
        let meta = HdrMeta {
            transfer_characteristics: 16,
            seis: HdrSeis {
                content_light_level: Some(ContentLightLevel {
                    max_content: 1000,
                    max_pic_average: 400,
                }),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut writer_out = Vec::new();
        HdrWriter::record(&mut writer_out, 3, &meta).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&writer_out).unwrap();
        assert_eq!(value["frame"], 3);
        assert_eq!(value["transfer_characteristics"], 16);
        assert_eq!(value["seis"]["content_light_level"]["max_content"], 1000);
        assert!(value["seis"]["mastering_display"].is_null());
    }
}
