use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;
use tracing::{trace, warn};
use vdec_core::prelude::*;

use crate::{completion::Completion, error::VdecError, sei::SeiWriter};

/// Follows compressed buffers from parsing to the end of decoding.
///
/// Parsed handles stay attached to the decoded picture until its decoding ends; the
/// stream buffers are then released and their SEI messages dumped to the synchronous
/// SEI file when one is configured.
pub struct DecodeTracker {
    completion: Arc<Completion>,
    sync_sei: Option<Mutex<SeiWriter>>,
    decoded: AtomicU64,
}

impl DecodeTracker {
    pub fn new(completion: Arc<Completion>, sync_sei: Option<SeiWriter>) -> Self {
        Self {
            completion,
            sync_sei: sync_sei.map(Mutex::new),
            decoded: AtomicU64::new(0),
        }
    }

    /// Pictures whose decoding ended.
    pub fn decoded(&self) -> u64 {
        self.decoded.load(Ordering::Acquire)
    }

    pub fn on_end_parsing(&self, picture: &Buffer, parsing_id: usize) {
        let handle = picture
            .lock()
            .meta
            .handles
            .as_ref()
            .and_then(|meta| meta.handles.get(parsing_id))
            .map(|handle| (handle.state, handle.stream.id()));
        match handle {
            Some((HandleState::Processed, stream)) => {
                trace!(picture = picture.id(), stream, "stream buffer parsed");
            }
            Some((state, _)) => {
                self.completion.fail(VdecError::Protocol(format!(
                    "handle {parsing_id} of picture {} ended parsing in state {state:?}",
                    picture.id()
                )));
            }
            None => {
                self.completion.fail(VdecError::Protocol(format!(
                    "picture {} has no handle {parsing_id}",
                    picture.id()
                )));
            }
        }
    }

    pub fn on_end_decoding(&self, picture: Option<&Buffer>) {
        let Some(picture) = picture else {
            self.completion.signal();
            return;
        };
        self.decoded.fetch_add(1, Ordering::AcqRel);
        let handles = picture.lock().meta.handles.take();
        let Some(handles) = handles else {
            return;
        };
        let Some(sync_sei) = self.sync_sei.as_ref() else {
            return;
        };
        let mut writer = sync_sei.lock();
        for handle in handles
            .handles
            .iter()
            .filter(|handle| handle.state == HandleState::Processed)
        {
            let stream = handle.stream.lock();
            for sei in stream.meta.sei.iter().flatten() {
                if let Err(err) = writer.write(sei) {
                    warn!(%err, "cannot write synchronous SEI");
                }
            }
        }
    }

    pub fn flush(&self) -> std::io::Result<()> {
        match self.sync_sei.as_ref() {
            Some(writer) => writer.lock().flush(),
            None => Ok(()),
        }
    }
}
