// Radio frame codec
//
// Every frame fits the smallest supported radio payload:
//
//   [cmd u8][origin node u16 LE][origin task u8][data ..]
//
// data: Signal/SignalAll = [sig], Message = [target][payload ..],
// Suspend/Resume = [target], Noop/Status = nothing.

use core::fmt;

use crate::config::{FRAME_HEADER, MESSAGE_SIZE, MIN_FRAME_SIZE, NodeId, TaskId};
use crate::task::Source;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Noop = 0,
    Status = 1,
    Signal = 2,
    SignalAll = 3,
    Message = 4,
    Suspend = 5,
    Resume = 6,
}

impl Command {
    pub const fn from_u8(b: u8) -> Option<Self> {
        Some(match b {
            0 => Command::Noop,
            1 => Command::Status,
            2 => Command::Signal,
            3 => Command::SignalAll,
            4 => Command::Message,
            5 => Command::Suspend,
            6 => Command::Resume,
            _ => return None,
        })
    }
}

/// Message bytes, at most `MESSAGE_SIZE`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Payload {
    buf: [u8; MESSAGE_SIZE],
    len: u8,
}

impl Payload {
    pub fn new(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > MESSAGE_SIZE {
            return None;
        }
        let mut buf = [0u8; MESSAGE_SIZE];
        buf[..bytes.len()].copy_from_slice(bytes);
        Some(Self {
            buf,
            len: bytes.len() as u8,
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x?}", self.as_slice())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Body {
    Noop,
    Status,
    Signal(u8),
    SignalAll(u8),
    Message { target: TaskId, payload: Payload },
    Suspend(TaskId),
    Resume(TaskId),
}

impl Body {
    pub const fn command(&self) -> Command {
        match self {
            Body::Noop => Command::Noop,
            Body::Status => Command::Status,
            Body::Signal(_) => Command::Signal,
            Body::SignalAll(_) => Command::SignalAll,
            Body::Message { .. } => Command::Message,
            Body::Suspend(_) => Command::Suspend,
            Body::Resume(_) => Command::Resume,
        }
    }
}

/// A decoded frame: who sent it and what it asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub origin: Source,
    pub body: Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Frame shorter than its command needs, holds the frame length
    Short(usize),
    UnknownCommand(u8),
    /// Frame longer than any radio can carry
    Oversized(usize),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Short(len) => write!(f, "short frame ({} bytes)", len),
            DecodeError::UnknownCommand(cmd) => write!(f, "unknown command {}", cmd),
            DecodeError::Oversized(len) => {
                write!(f, "frame of {} bytes exceeds {}", len, MIN_FRAME_SIZE)
            }
        }
    }
}

impl Packet {
    pub const fn new(origin: Source, body: Body) -> Self {
        Self { origin, body }
    }

    /// Write the frame into `buf`, returning its length.
    pub fn encode(&self, buf: &mut [u8; MIN_FRAME_SIZE]) -> usize {
        buf[0] = self.body.command() as u8;
        buf[1..3].copy_from_slice(&self.origin.node.to_le_bytes());
        buf[3] = self.origin.task;
        let data = &mut buf[FRAME_HEADER..];
        let n = match &self.body {
            Body::Noop | Body::Status => 0,
            Body::Signal(v) | Body::SignalAll(v) | Body::Suspend(v) | Body::Resume(v) => {
                data[0] = *v;
                1
            }
            Body::Message { target, payload } => {
                let bytes = payload.as_slice();
                data[0] = *target;
                data[1..1 + bytes.len()].copy_from_slice(bytes);
                1 + bytes.len()
            }
        };
        FRAME_HEADER + n
    }

    pub fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        if frame.len() > MIN_FRAME_SIZE {
            return Err(DecodeError::Oversized(frame.len()));
        }
        if frame.len() < FRAME_HEADER {
            return Err(DecodeError::Short(frame.len()));
        }
        let command = Command::from_u8(frame[0]).ok_or(DecodeError::UnknownCommand(frame[0]))?;
        let origin = Source {
            node: NodeId::from_le_bytes([frame[1], frame[2]]),
            task: frame[3],
        };
        let data = &frame[FRAME_HEADER..];
        let first = || data.first().copied().ok_or(DecodeError::Short(frame.len()));

        let body = match command {
            Command::Noop => Body::Noop,
            Command::Status => Body::Status,
            Command::Signal => Body::Signal(first()?),
            Command::SignalAll => Body::SignalAll(first()?),
            Command::Suspend => Body::Suspend(first()?),
            Command::Resume => Body::Resume(first()?),
            Command::Message => {
                let target = first()?;
                // frame length cap keeps this within MESSAGE_SIZE
                let payload =
                    Payload::new(&data[1..]).ok_or(DecodeError::Oversized(frame.len()))?;
                Body::Message { target, payload }
            }
        };
        Ok(Packet { origin, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FROM: Source = Source { node: 0x0102, task: 7 };

    fn frame(packet: &Packet) -> ([u8; MIN_FRAME_SIZE], usize) {
        let mut buf = [0u8; MIN_FRAME_SIZE];
        let len = packet.encode(&mut buf);
        (buf, len)
    }

    #[test]
    fn test_header_layout() {
        let (buf, len) = frame(&Packet::new(FROM, Body::Signal(9)));
        assert_eq!(&buf[..len], &[2, 0x02, 0x01, 7, 9]);
    }

    #[test]
    fn test_message_layout() {
        let payload = Payload::new(b"hi").unwrap();
        let (buf, len) = frame(&Packet::new(FROM, Body::Message { target: 3, payload }));
        assert_eq!(&buf[..len], &[4, 0x02, 0x01, 7, 3, b'h', b'i']);
        let back = Packet::decode(&buf[..len]).unwrap();
        assert_eq!(back.origin, FROM);
        match back.body {
            Body::Message { target, payload } => {
                assert_eq!(target, 3);
                assert_eq!(payload.as_slice(), b"hi");
            }
            other => panic!("wrong body {:?}", other),
        }
    }

    #[test]
    fn test_full_message_fills_frame() {
        let payload = Payload::new(&[0x55; MESSAGE_SIZE]).unwrap();
        let (_, len) = frame(&Packet::new(FROM, Body::Message { target: 1, payload }));
        assert_eq!(len, MIN_FRAME_SIZE);
    }

    #[test]
    fn test_payload_too_long() {
        assert!(Payload::new(&[0; MESSAGE_SIZE + 1]).is_none());
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(Packet::decode(&[2, 0, 0]), Err(DecodeError::Short(3)));
        assert_eq!(Packet::decode(&[2, 0, 0, 1]), Err(DecodeError::Short(4)));
        assert_eq!(
            Packet::decode(&[42, 0, 0, 1]),
            Err(DecodeError::UnknownCommand(42))
        );
        assert_eq!(
            Packet::decode(&[0u8; MIN_FRAME_SIZE + 1]),
            Err(DecodeError::Oversized(MIN_FRAME_SIZE + 1))
        );
    }

    #[test]
    fn test_noop_ignores_trailing_data() {
        let p = Packet::decode(&[0, 5, 0, 1, 0xFF]).unwrap();
        assert_eq!(p.body, Body::Noop);
        assert_eq!(p.origin, Source { node: 5, task: 1 });
    }
}
