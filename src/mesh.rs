// In-memory mesh standing in for the radio
//
// Each node owns an `Inbox`; a `MeshLink` holds routes to its peers'
// inboxes and pushes frames straight into them, the way a radio IRQ
// would on the receiving side. A lossy link drops every Nth attempt so
// the retry path gets exercised.

use tasklet_kernel::config::{MIN_FRAME_SIZE, NodeId, SEND_ATTEMPTS};
use tasklet_kernel::{Inbox, Transport, TransportError};

pub struct MeshLink {
    routes: Vec<(NodeId, &'static Inbox)>,
    // drop every Nth attempt, 0 = never
    loss_every: u32,
    attempts: u32,
    sent: u32,
}

impl MeshLink {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            loss_every: 0,
            attempts: 0,
            sent: 0,
        }
    }

    pub fn route(mut self, node: NodeId, inbox: &'static Inbox) -> Self {
        self.routes.push((node, inbox));
        self
    }

    pub fn lossy(mut self, every: u32) -> Self {
        self.loss_every = every;
        self
    }

    /// Frames delivered so far.
    pub fn sent(&self) -> u32 {
        self.sent
    }

    fn inbox(&self, node: NodeId) -> Option<&'static Inbox> {
        self.routes
            .iter()
            .find(|(n, _)| *n == node)
            .map(|(_, inbox)| *inbox)
    }

    fn attempt(&mut self, inbox: &Inbox, frame: &[u8]) -> bool {
        self.attempts = self.attempts.wrapping_add(1);
        if self.loss_every > 0 && self.attempts % self.loss_every == 0 {
            return false;
        }
        inbox.on_receive(frame)
    }
}

impl Default for MeshLink {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MeshLink {
    fn send(&mut self, node: NodeId, frame: &[u8]) -> Result<(), TransportError> {
        debug_assert!(frame.len() <= MIN_FRAME_SIZE);
        let inbox = self.inbox(node).ok_or(TransportError::UnknownNode(node))?;
        for attempt in 1..=SEND_ATTEMPTS {
            if self.attempt(inbox, frame) {
                self.sent += 1;
                if attempt > 1 {
                    log::debug!("mesh: node {} took frame on attempt {}", node, attempt);
                }
                return Ok(());
            }
        }
        log::warn!("mesh: gave up on node {} after {} attempts", node, SEND_ATTEMPTS);
        Err(TransportError::Rejected {
            attempts: SEND_ATTEMPTS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasklet_kernel::config::INBOX_DEPTH;
    use tasklet_kernel::{Body, Packet, Source};

    fn leak_inbox() -> &'static Inbox {
        Box::leak(Box::new(Inbox::new()))
    }

    fn signal(sig: u8) -> ([u8; MIN_FRAME_SIZE], usize) {
        let mut buf = [0u8; MIN_FRAME_SIZE];
        let len = Packet::new(Source { node: 1, task: 1 }, Body::Signal(sig)).encode(&mut buf);
        (buf, len)
    }

    #[test]
    fn test_unknown_node() {
        let mut link = MeshLink::new();
        let (buf, len) = signal(1);
        assert_eq!(
            link.send(4, &buf[..len]),
            Err(TransportError::UnknownNode(4))
        );
    }

    #[test]
    fn test_lossy_link_retries() {
        let inbox = leak_inbox();
        let mut link = MeshLink::new().route(2, inbox).lossy(1);
        let (buf, len) = signal(3);
        assert_eq!(
            link.send(2, &buf[..len]),
            Err(TransportError::Rejected { attempts: SEND_ATTEMPTS })
        );

        let mut link = MeshLink::new().route(2, inbox).lossy(2);
        assert!(link.send(2, &buf[..len]).is_ok());
        // attempt 2 is dropped, attempt 3 lands
        assert!(link.send(2, &buf[..len]).is_ok());
        assert_eq!(link.sent(), 2);
        assert_eq!(inbox.len(), 2);
    }

    #[test]
    fn test_full_inbox_rejects() {
        let inbox = leak_inbox();
        let mut link = MeshLink::new().route(2, inbox);
        let (buf, len) = signal(3);
        for _ in 0..INBOX_DEPTH {
            link.send(2, &buf[..len]).unwrap();
        }
        assert!(link.send(2, &buf[..len]).is_err());
        assert_eq!(inbox.dropped(), SEND_ATTEMPTS as u32);
    }
}
