//! Lock-free FIFO handing compressed buffers from a feeder to a decode scheduler.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use crossbeam_queue::ArrayQueue;

/// What happened to a pushed value. Refused values come back to the caller.
///
/// # Example
/// ```rust
/// use vdec_core::prelude::{bounded, SendOutcome};
///
/// let (tx, _rx) = bounded::<u8>(1);
/// assert!(tx.send(1).is_ok());
/// assert!(matches!(tx.send(2), SendOutcome::Full(2)));
/// ```
#[derive(Debug, PartialEq, Eq)]
pub enum SendOutcome<T> {
    Ok,
    Full(T),
    Closed(T),
}

impl<T> SendOutcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, SendOutcome::Ok)
    }
}

#[derive(Debug)]
pub enum RecvOutcome<T> {
    Data(T),
    /// Closed and nothing left to drain.
    Closed,
    Empty,
}

struct Fifo<T> {
    slots: ArrayQueue<T>,
    closed: AtomicBool,
}

impl<T> Fifo<T> {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Producer side.
#[derive(Clone)]
pub struct BoundedTx<T> {
    fifo: Arc<Fifo<T>>,
}

impl<T> BoundedTx<T> {
    /// Push without blocking.
    pub fn send(&self, value: T) -> SendOutcome<T> {
        if self.fifo.is_closed() {
            return SendOutcome::Closed(value);
        }
        self.fifo
            .slots
            .push(value)
            .map_or_else(SendOutcome::Full, |()| SendOutcome::Ok)
    }

    /// Refuse further pushes. Queued values can still be drained.
    pub fn close(&self) {
        self.fifo.close();
    }

    pub fn is_closed(&self) -> bool {
        self.fifo.is_closed()
    }
}

/// Consumer side.
pub struct BoundedRx<T> {
    fifo: Arc<Fifo<T>>,
}

impl<T> BoundedRx<T> {
    pub fn recv(&self) -> RecvOutcome<T> {
        match self.fifo.slots.pop() {
            Some(value) => RecvOutcome::Data(value),
            None if self.fifo.is_closed() => RecvOutcome::Closed,
            None => RecvOutcome::Empty,
        }
    }

    /// Wait for a value, polling every `poll`, until the queue closes or `stop` is raised.
    ///
    /// `Empty` is only returned once `stop` is set.
    pub fn recv_blocking(&self, poll: Duration, stop: &AtomicBool) -> RecvOutcome<T> {
        loop {
            let outcome = self.recv();
            if !matches!(outcome, RecvOutcome::Empty) || stop.load(Ordering::Acquire) {
                return outcome;
            }
            if poll.is_zero() {
                thread::yield_now();
            } else {
                thread::sleep(poll);
            }
        }
    }

    pub fn close(&self) {
        self.fifo.close();
    }
}

/// FIFO holding at most `capacity` values, at least one.
///
/// # Example
/// ```rust
/// use vdec_core::prelude::{bounded, RecvOutcome};
///
/// let (tx, rx) = bounded::<u8>(2);
/// assert!(tx.send(1).is_ok());
/// tx.close();
/// assert!(matches!(rx.recv(), RecvOutcome::Data(1)));
/// assert!(matches!(rx.recv(), RecvOutcome::Closed));
/// ```
pub fn bounded<T>(capacity: usize) -> (BoundedTx<T>, BoundedRx<T>) {
    let fifo = Arc::new(Fifo {
        slots: ArrayQueue::new(capacity.max(1)),
        closed: AtomicBool::new(false),
    });
    (BoundedTx { fifo: fifo.clone() }, BoundedRx { fifo })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_queue_hands_value_back() {
        let (tx, rx) = bounded::<u8>(1);
        rx.close();
        assert_eq!(tx.send(3), SendOutcome::Closed(3));
        assert!(tx.is_closed());
    }

    #[test]
    fn raised_stop_ends_the_wait() {
        let (_tx, rx) = bounded::<u8>(1);
        let stop = AtomicBool::new(true);
        assert!(matches!(
            rx.recv_blocking(Duration::from_millis(1), &stop),
            RecvOutcome::Empty
        ));
    }

    #[test]
    fn waiting_consumer_gets_a_late_value() {
        let (tx, rx) = bounded::<u8>(1);
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            tx.send(9)
        });
        let stop = AtomicBool::new(false);
        assert!(matches!(
            rx.recv_blocking(Duration::from_millis(1), &stop),
            RecvOutcome::Data(9)
        ));
        assert!(producer.join().unwrap().is_ok());
    }
}
