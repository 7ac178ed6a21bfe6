use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Binary, auto-resetting event.
///
/// Setting an already set event has no further effect. A successful wait consumes the
/// signal so the next wait blocks again.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use vdec_core::prelude::Event;
///
/// let event = Event::new();
/// event.set();
/// event.set();
/// assert!(event.wait(Some(Duration::from_millis(1))));
/// assert!(!event.wait(Some(Duration::from_millis(1))));
/// ```
#[derive(Debug, Default)]
pub struct Event {
    signalled: Mutex<bool>,
    cond: Condvar,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        *self.signalled.lock() = true;
        self.cond.notify_all();
    }

    pub fn reset(&self) {
        *self.signalled.lock() = false;
    }

    pub fn is_set(&self) -> bool {
        *self.signalled.lock()
    }

    /// Wait for the event; `None` waits forever. Returns `false` on timeout.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut signalled = self.signalled.lock();
        while !*signalled {
            match deadline {
                Some(deadline) => {
                    if self.cond.wait_until(&mut signalled, deadline).timed_out() {
                        break;
                    }
                }
                None => self.cond.wait(&mut signalled),
            }
        }
        std::mem::replace(&mut *signalled, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn wait_returns_when_set_from_another_thread() {
        let event = Arc::new(Event::new());
        let setter = {
            let event = event.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                event.set();
            })
        };
        assert!(event.wait(None));
        setter.join().unwrap();
        assert!(!event.is_set());
    }

    #[test]
    fn timeout_reports_false() {
        let event = Event::new();
        let start = Instant::now();
        assert!(!event.wait(Some(Duration::from_millis(30))));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn reset_clears_pending_signal() {
        let event = Event::new();
        event.set();
        event.reset();
        assert!(!event.wait(Some(Duration::ZERO)));
    }
}
