// tasklet kernel: cooperative single-stack task scheduler
//
// Many small task bodies share one call stack. A body runs until it
// returns or yields; a yield records why and when it should run again
// and abandons the body, which restarts from the top on its next turn.
//
//   ring       circular task store with one live cursor
//   task       task record and its wait state machine
//   scheduler  dispatcher, delivery, remote routing
//   context    what a running body can do (yield, send, spawn)
//   packet     radio frame codec
//   inbox      IRQ-safe inbound queue + receiver task
//   transport  outbound link trait
//   resume     opt-in resume points for multi-step bodies

#![no_std]

extern crate alloc;

pub mod clock;
pub mod config;
pub mod context;
pub mod inbox;
pub mod packet;
pub mod resume;
pub mod ring;
pub mod scheduler;
pub mod step;
pub mod task;
pub mod transport;

pub use clock::{Clock, ManualClock, Millis};
pub use context::Context;
pub use inbox::Inbox;
pub use packet::{Body, Packet};
pub use resume::ResumePoint;
pub use scheduler::{Dispatched, Scheduler, SendError};
pub use step::{Step, Suspend};
pub use task::{Flag, Source, StateFlags, TaskRecord};
pub use transport::{Transport, TransportError};
