//! Decode device: the core budget and the memory buffers are carved from.

use std::sync::Arc;

use tracing::debug;
use vdec_core::prelude::*;

use crate::{
    config::{DecSettings, MAX_CORES},
    engine::{DecoderEngine, DecoderListener, EngineError, HW_IP_BIT_DEPTH, SoftEngine},
    error::ErrorCode,
};

/// Handle on the decode hardware plus the allocator that owns its memory.
///
/// # Example
/// ```rust
/// use vdec::device::Device;
///
/// let device = Device::new(0).unwrap();
/// assert_eq!(device.cores(), 1);
/// assert!(Device::new(9).is_err());
/// ```
#[derive(Clone)]
pub struct Device {
    cores: u8,
    allocator: Arc<dyn Allocator>,
}

impl Device {
    /// Open a device with `num_core` cores, `0` picking one core.
    pub fn new(num_core: u8) -> Result<Self, EngineError> {
        Self::with_allocator(num_core, Arc::new(HeapAllocator))
    }

    /// Open a device whose buffers come from `allocator`.
    pub fn with_allocator(num_core: u8, allocator: Arc<dyn Allocator>) -> Result<Self, EngineError> {
        if num_core > MAX_CORES {
            return Err(EngineError {
                code: ErrorCode::ChanCreationNotEnoughCores,
            });
        }
        Ok(Self {
            cores: num_core.max(1),
            allocator,
        })
    }

    pub fn cores(&self) -> u8 {
        self.cores
    }

    pub fn allocator(&self) -> Arc<dyn Allocator> {
        Arc::clone(&self.allocator)
    }

    /// Create a decoder reporting to `listener`.
    ///
    /// The engine always decodes at its full depth; the output depth is picked per
    /// picture by the display side.
    pub fn create_decoder(
        &self,
        settings: &DecSettings,
        listener: Arc<dyn DecoderListener>,
        input_depth: usize,
    ) -> Result<Arc<dyn DecoderEngine>, EngineError> {
        if settings.num_core > self.cores {
            return Err(EngineError {
                code: ErrorCode::ChanCreationResourceUnavailable,
            });
        }
        let mut settings = settings.clone();
        settings.bit_depth = HW_IP_BIT_DEPTH as i32;
        debug!(cores = self.cores, storage = ?settings.storage, "creating decoder");
        let engine: Arc<dyn DecoderEngine> = SoftEngine::create(settings, listener, input_depth)?;
        Ok(engine)
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device").field("cores", &self.cores).finish()
    }
}
