// Outbound link to other nodes
//
// The scheduler only encodes frames and hands them over; framing below
// the packet layer, addressing and retries belong to the transport.

use core::fmt;

use crate::config::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// No route to this node
    UnknownNode(NodeId),
    /// Peer did not take the frame after this many tries
    Rejected { attempts: usize },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::UnknownNode(node) => write!(f, "no route to node {}", node),
            TransportError::Rejected { attempts } => {
                write!(f, "frame rejected after {} attempts", attempts)
            }
        }
    }
}

pub trait Transport {
    /// Send one encoded frame to `node`. Implementations retry on their
    /// own; the scheduler never does.
    fn send(&mut self, node: NodeId, frame: &[u8]) -> Result<(), TransportError>;
}
