#![doc = include_str!("../README.md")]

pub use vdec_codec as codec;
pub use vdec_core as core;

pub mod channel;
pub mod completion;
pub mod config;
pub mod device;
pub mod display;
pub mod engine;
pub mod error;
pub mod hdr;
pub mod input;
pub mod metrics;
pub mod output;
pub mod resolution;
pub mod sei;
pub mod tracker;

pub mod prelude {
    pub use crate::channel::{ChannelRunner, RunReport};
    pub use crate::config::{
        Codec, Config, ConfigError, DecSettings, DecodeUnit, DpbMode, InputMode, StreamSettings,
    };
    pub use crate::device::Device;
    pub use crate::engine::{
        DecodeInfo, DecoderEngine, DecoderListener, EngineError, ResolutionRequest, SoftEngine,
    };
    pub use crate::error::{ErrorCode, VdecError};
    pub use crate::metrics::StageMetrics;
    pub use vdec_codec::prelude::*;
    pub use vdec_core::prelude::*;
}
