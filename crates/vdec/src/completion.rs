use parking_lot::Mutex;
use std::time::Duration;
use vdec_core::prelude::Event;

use crate::error::VdecError;

/// End-of-pass signal shared by the feeder, the display side and the runner.
///
/// Any party may signal; the first failure reported is the one the runner sees.
#[derive(Debug, Default)]
pub struct Completion {
    event: Event,
    failure: Mutex<Option<VdecError>>,
}

impl Completion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        self.event.set();
    }

    /// Record `err` unless an earlier failure is pending, then signal.
    pub fn fail(&self, err: VdecError) {
        self.failure.lock().get_or_insert(err);
        self.event.set();
    }

    pub fn take_failure(&self) -> Option<VdecError> {
        self.failure.lock().take()
    }

    /// Wait for the signal; `false` on timeout.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        self.event.wait(timeout)
    }

    pub fn reset(&self) {
        self.event.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_failure_wins() {
        let completion = Completion::new();
        completion.fail(VdecError::Protocol("first".into()));
        completion.fail(VdecError::NoFrameDecoded);
        assert!(completion.wait(Some(Duration::ZERO)));
        assert!(matches!(completion.take_failure(), Some(VdecError::Protocol(_))));
        assert!(completion.take_failure().is_none());
    }
}
