//! A small, never-blocking record of host/stream-level hiccups raised outside the
//! render path itself. The render path's own invariants are enforced by
//! `assert_no_alloc`, which aborts rather than reporting, so this exists for the
//! events a host backend can actually recover from and hand back: a dropped block, a
//! device hiccup mid-stream. Fed from the stream's error callback, drained on query.

use crossbeam_channel::{Receiver, Sender};
use std::collections::VecDeque;
use std::sync::Mutex;

/// One noteworthy event raised by the host adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    /// The output stream reported an error (a dropped block, a device hiccup).
    StreamError(String),
}

/// Creates the bounded channel a host adapter's error callback sends into. Bounded
/// rather than unbounded so a misbehaving backend spamming errors can't grow this
/// without limit; a full channel just drops the newest event, same as the metrics
/// channel.
pub fn channel(capacity: usize) -> (Sender<DiagnosticEvent>, Receiver<DiagnosticEvent>) {
    crossbeam_channel::bounded(capacity)
}

/// Fixed-capacity ring owned by the control context. `events()` drains anything
/// received since the last call and folds it into the ring, evicting the oldest entry
/// once `capacity` is reached, then returns a snapshot in oldest-to-newest order.
pub struct DiagnosticLog {
    receiver: Receiver<DiagnosticEvent>,
    ring: Mutex<VecDeque<DiagnosticEvent>>,
    capacity: usize,
}

impl DiagnosticLog {
    pub fn new(receiver: Receiver<DiagnosticEvent>, capacity: usize) -> Self {
        Self {
            receiver,
            ring: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        let mut ring = self.ring.lock().unwrap();
        for event in self.receiver.try_iter() {
            if ring.len() == self.capacity {
                ring.pop_front();
            }
            ring.push_back(event);
        }
        ring.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_and_caps_at_capacity() {
        let (tx, rx) = channel(8);
        let log = DiagnosticLog::new(rx, 2);
        tx.try_send(DiagnosticEvent::StreamError("a".into())).unwrap();
        tx.try_send(DiagnosticEvent::StreamError("b".into())).unwrap();
        tx.try_send(DiagnosticEvent::StreamError("c".into())).unwrap();
        let events = log.events();
        assert_eq!(events, vec![
            DiagnosticEvent::StreamError("b".into()),
            DiagnosticEvent::StreamError("c".into()),
        ]);
    }

    #[test]
    fn empty_log_has_no_events() {
        let (_tx, rx) = channel(8);
        let log = DiagnosticLog::new(rx, 8);
        assert!(log.events().is_empty());
    }
}
