// Compile-time limits and reserved identifiers
//
// Everything here is fixed at build time; nothing is negotiated at
// runtime. Frame sizes come from the smallest radio we talk over
// (nRF24, 32 byte payload) so a message that fits locally always fits
// on the wire.

/// Task identifier. Small on purpose; not required to be unique.
pub type TaskId = u8;

/// Node (device) identifier within a mesh.
pub type NodeId = u16;

/// Largest radio payload of the smallest supported transport.
pub const MIN_FRAME_SIZE: usize = 32;

/// Command byte + origin node (u16) + origin task.
pub const FRAME_HEADER: usize = 1 + core::mem::size_of::<NodeId>() + 1;

/// Maximum message payload. A message frame also carries the target
/// task id, hence the trailing `- 1`.
pub const MESSAGE_SIZE: usize = MIN_FRAME_SIZE - FRAME_HEADER - 1;

/// Highest id intended for user tasks; everything above is reserved.
pub const MAX_USER_TASK: TaskId = 127;

/// The null task. Always present, always runnable.
pub const IDLE_TASK: TaskId = 255;

/// Drains the inbound radio queue once per revolution.
pub const RADIO_MONITOR_TASK: TaskId = IDLE_TASK - 1;

/// Reserved for the clock-sync server collaborator.
pub const CLOCK_SYNC_SERVER_TASK: TaskId = IDLE_TASK - 2;

/// Reserved for the clock-sync client collaborator.
pub const CLOCK_SYNC_CLIENT_TASK: TaskId = IDLE_TASK - 3;

/// Node id 0 always means "this node" in addressing calls.
pub const LOCAL_NODE: NodeId = 0;

/// Attempts a transport makes per frame before reporting failure.
pub const SEND_ATTEMPTS: usize = 5;

/// Depth of the inbound radio queue.
///
/// The receiver task drains it every revolution, so a handful of slots
/// covers bursts while a long task body is hogging the CPU.
pub const INBOX_DEPTH: usize = 16;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_fits_smallest_frame() {
        assert_eq!(MESSAGE_SIZE, 27);
        assert_eq!(FRAME_HEADER + 1 + MESSAGE_SIZE, MIN_FRAME_SIZE);
    }

    #[test]
    fn reserved_ids_above_user_range() {
        for id in [
            IDLE_TASK,
            RADIO_MONITOR_TASK,
            CLOCK_SYNC_SERVER_TASK,
            CLOCK_SYNC_CLIENT_TASK,
        ] {
            assert!(id > MAX_USER_TASK);
        }
    }
}
