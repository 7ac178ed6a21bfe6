use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use vdec_core::prelude::SeiMessage;

use crate::{error::VdecError, output::create_sink};

const BYTES_PER_LINE: usize = 8;

/// Text dump of SEI messages, one block per message.
///
/// # Example
/// ```rust
/// use vdec::sei::SeiWriter;
/// use vdec_core::prelude::SeiMessage;
///
/// let mut out = Vec::new();
/// let sei = SeiMessage { prefix: true, payload_type: 5, payload: (0..10).collect() };
/// SeiWriter::dump(&mut out, &sei).unwrap();
/// assert_eq!(
///     String::from_utf8(out).unwrap(),
///     "is_prefix: true\nsei_payload_type: 5\nsei_payload_size: 10\nraw:\n\
///      00 01 02 03 04 05 06 07\n08 09\n\n"
/// );
/// ```
pub struct SeiWriter {
    sink: Box<dyn Write + Send>,
}

impl SeiWriter {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self { sink }
    }

    pub fn create(path: &Path) -> Result<Self, VdecError> {
        Ok(Self::new(create_sink(path)?))
    }

    /// Companion file receiving the messages of each decoded picture, `<path>_sync.txt`.
    pub fn sync_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push("_sync.txt");
        PathBuf::from(name)
    }

    pub fn write(&mut self, sei: &SeiMessage) -> io::Result<()> {
        Self::dump(&mut self.sink, sei)
    }

    pub fn dump(out: &mut dyn Write, sei: &SeiMessage) -> io::Result<()> {
        writeln!(out, "is_prefix: {}", sei.prefix)?;
        writeln!(out, "sei_payload_type: {}", sei.payload_type)?;
        writeln!(out, "sei_payload_size: {}", sei.payload.len())?;
        writeln!(out, "raw:")?;
        let lines: Vec<String> = sei
            .payload
            .chunks(BYTES_PER_LINE)
            .map(|line| {
                let hex: Vec<String> = line.iter().map(|byte| format!("{byte:02x}")).collect();
                hex.join(" ")
            })
            .collect();
        write!(out, "{}\n\n", lines.join("\n"))
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}
