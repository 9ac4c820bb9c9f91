// Inbound radio queue between interrupt context and the receiver task
//
// The radio driver calls `Inbox::on_receive` from its IRQ handler or
// callback; that path only decodes and enqueues, it never touches a
// task record. The receiver task drains the queue once per revolution
// and feeds each packet through the scheduler's delivery calls.
// Every access goes through the critical-section lock.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::config::INBOX_DEPTH;
use crate::context::Context;
use crate::packet::Packet;
use crate::step::Step;

pub struct Inbox {
    queue: Channel<CriticalSectionRawMutex, Packet, INBOX_DEPTH>,
    // cs: not every target has atomic RMW
    dropped: critical_section::Mutex<Cell<u32>>,
}

impl Inbox {
    pub const fn new() -> Self {
        Self {
            queue: Channel::new(),
            dropped: critical_section::Mutex::new(Cell::new(0)),
        }
    }

    /// Decode `frame` and queue it. Returns false and counts a drop if
    /// the frame is malformed or the queue is full.
    pub fn on_receive(&self, frame: &[u8]) -> bool {
        let packet = match Packet::decode(frame) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("inbox: bad frame: {}", e);
                self.bump_dropped();
                return false;
            }
        };
        if self.queue.try_send(packet).is_err() {
            log::warn!("inbox: queue full, dropped frame from node {}", packet.origin.node);
            self.bump_dropped();
            return false;
        }
        true
    }

    pub fn try_receive(&self) -> Option<Packet> {
        self.queue.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn bump_dropped(&self) {
        critical_section::with(|cs| {
            let n = self.dropped.borrow(cs);
            n.set(n.get().wrapping_add(1));
        });
    }

    /// Frames lost since boot.
    pub fn dropped(&self) -> u32 {
        critical_section::with(|cs| self.dropped.borrow(cs).get())
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Body of the radio monitor task. Always runnable; drains whatever
/// arrived since its last turn.
pub fn receiver_task(inbox: &'static Inbox) -> impl FnMut(&mut Context<'_>) -> Step + 'static {
    move |ctx: &mut Context<'_>| {
        let mut n = 0usize;
        while let Some(packet) = inbox.try_receive() {
            ctx.dispatch_packet(&packet);
            n += 1;
        }
        if n > 0 {
            log::trace!("inbox: handled {} packets", n);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{INBOX_DEPTH, MIN_FRAME_SIZE};
    use crate::packet::Body;
    use crate::task::Source;

    fn signal_frame(sig: u8) -> ([u8; MIN_FRAME_SIZE], usize) {
        let mut buf = [0u8; MIN_FRAME_SIZE];
        let len = Packet::new(Source { node: 2, task: 1 }, Body::Signal(sig)).encode(&mut buf);
        (buf, len)
    }

    #[test]
    fn test_enqueue_and_drain() {
        let inbox = Inbox::new();
        let (buf, len) = signal_frame(3);
        assert!(inbox.on_receive(&buf[..len]));
        assert_eq!(inbox.len(), 1);
        let p = inbox.try_receive().unwrap();
        assert_eq!(p.body, Body::Signal(3));
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_bad_frame_counted() {
        let inbox = Inbox::new();
        assert!(!inbox.on_receive(&[9, 0, 0, 0]));
        assert!(!inbox.on_receive(&[]));
        assert_eq!(inbox.dropped(), 2);
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_full_queue_drops() {
        let inbox = Inbox::new();
        let (buf, len) = signal_frame(1);
        for _ in 0..INBOX_DEPTH {
            assert!(inbox.on_receive(&buf[..len]));
        }
        assert!(!inbox.on_receive(&buf[..len]));
        assert_eq!(inbox.dropped(), 1);
        assert_eq!(inbox.len(), INBOX_DEPTH);
    }
}
