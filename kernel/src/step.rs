// Suspension discriminant handed back to the dispatcher
//
// A task body returns `Step`. `Ok(())` is a normal return and lets the
// auto re-arm setting apply. `Err(Suspend::..)` means the body abandoned
// itself through one of the yield calls; the wait condition is already
// written on its record, and the next dispatch starts the body over
// from the top. `?` propagates a yield out of nested helpers.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspend {
    /// Plain yield: runnable again next revolution.
    Yield,
    /// Timed yield (`yield_until` / `yield_delay`).
    Until,
    /// Waiting for a signal, maybe with a timeout.
    Signal,
    /// Waiting for a message, maybe with a timeout.
    Message,
    /// Suspended until someone resumes it.
    Suspend,
    /// Remove the task for good.
    Kill,
}

impl fmt::Display for Suspend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suspend::Yield => write!(f, "yield"),
            Suspend::Until => write!(f, "yield-until"),
            Suspend::Signal => write!(f, "yield-signal"),
            Suspend::Message => write!(f, "yield-message"),
            Suspend::Suspend => write!(f, "suspend"),
            Suspend::Kill => write!(f, "kill"),
        }
    }
}

pub type Step = Result<(), Suspend>;
