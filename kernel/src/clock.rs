// Millisecond time source
//
// The kernel never reads hardware itself. Boards hand it something that
// implements `Clock`: a closure over the HAL's millis counter works, and
// `ManualClock` drives deterministic tests and host simulations.

use alloc::rc::Rc;
use core::cell::Cell;

/// Milliseconds since some board-defined epoch.
pub type Millis = u64;

pub trait Clock {
    fn now_ms(&self) -> Millis;
}

impl<F> Clock for F
where
    F: Fn() -> Millis,
{
    fn now_ms(&self) -> Millis {
        self()
    }
}

/// Settable clock. Clones share the same time, so a task body holding
/// a clone can "spend" time while it runs.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Millis>>,
}

impl ManualClock {
    pub fn new(start: Millis) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn set(&self, now: Millis) {
        self.now.set(now);
    }

    pub fn advance(&self, ms: Millis) {
        self.now.set(self.now.get().saturating_add(ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new(10);
        let other = clock.clone();
        other.advance(5);
        assert_eq!(clock.now_ms(), 15);
        clock.set(100);
        assert_eq!(other.now_ms(), 100);
    }

    #[test]
    fn test_closure_clock() {
        let clock = || 42u64;
        assert_eq!(clock.now_ms(), 42);
    }
}
