use std::{fmt, io, path::PathBuf};

use vdec_codec::ConvertError;
use vdec_core::prelude::{PoolError, TransformError};

use crate::config::ConfigError;

/// Status codes reported by a decode engine.
///
/// Codes below `0x80` are warnings; decoding goes on after them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ErrorCode {
    #[default]
    Success = 0x00,
    /// Part of a picture was concealed.
    WarnConcealDetect = 0x01,
    /// A sequence header did not fit the channel and was discarded.
    WarnSpsNotCompatible = 0x02,
    /// SEI messages were dropped, the metadata storage was too small.
    WarnSeiOverflow = 0x03,
    Error = 0x80,
    NoMemory = 0x81,
    StreamOverflow = 0x82,
    TooManySlices = 0x83,
    ChanCreationNoChannelAvailable = 0x84,
    ChanCreationResourceUnavailable = 0x85,
    ChanCreationNotEnoughCores = 0x86,
    RequestMalformed = 0x87,
}

impl ErrorCode {
    pub fn is_error(self) -> bool {
        self as u8 >= 0x80
    }

    pub fn is_warning(self) -> bool {
        !self.is_error() && self != ErrorCode::Success
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    /// Human readable text of the code.
    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::ChanCreationNoChannelAvailable => "Channel not created, no channel available",
            ErrorCode::ChanCreationResourceUnavailable => {
                "Channel not created, processing power of the available cores insufficient"
            }
            ErrorCode::ChanCreationNotEnoughCores => {
                "Channel not created, couldn't spread the load on enough cores"
            }
            ErrorCode::RequestMalformed => "Channel not created: request was malformed",
            ErrorCode::NoMemory => {
                "Memory shortage detected (dma, embedded memory or virtual memory shortage)"
            }
            ErrorCode::Success => "Success",
            _ => "Unknown error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Errors surfaced by a decode channel.
///
/// # Example
/// ```rust
/// use vdec::prelude::*;
///
/// let err = VdecError::Codec(ErrorCode::NoMemory);
/// assert_eq!(err.exit_code(), 0x81);
/// assert_eq!(VdecError::NoFrameDecoded.exit_code(), 1);
/// ```
#[derive(Debug, thiserror::Error)]
pub enum VdecError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Failure reported by the decode engine.
    #[error("Codec error: {0}")]
    Codec(ErrorCode),
    #[error("{path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Transform(#[from] TransformError),
    /// The decode engine and the harness disagree on buffer ownership or order.
    #[error("protocol violation: {0}")]
    Protocol(String),
    #[error("No frame decoded")]
    NoFrameDecoded,
}

impl VdecError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            VdecError::Codec(code) => code.code(),
            _ => 1,
        }
    }

    pub(crate) fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        VdecError::File {
            path: path.into(),
            source,
        }
    }
}

impl From<ErrorCode> for VdecError {
    fn from(code: ErrorCode) -> Self {
        VdecError::Codec(code)
    }
}
