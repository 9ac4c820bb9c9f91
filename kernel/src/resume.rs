// Opt-in resume points for task bodies
//
// A body always restarts from its entry point. A body that wants to
// continue "after" a yield keeps a ResumePoint in its captured state,
// matches on the label at entry, and records the next label when it
// yields:
//
//     let mut at = ResumePoint::new();
//     move |ctx| match at.label() {
//         0 => at.suspend_at(1, ctx.yield_delay(100)),
//         1 => at.suspend_at(2, ctx.yield_for_signal(3, 0)),
//         _ => at.finish(),
//     }

use crate::step::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResumePoint(u16);

impl ResumePoint {
    pub const fn new() -> Self {
        Self(0)
    }

    /// Label to continue from. Zero is the top of the body.
    pub const fn label(&self) -> u16 {
        self.0
    }

    /// Remember `label` if `step` suspends, then pass it through.
    pub fn suspend_at(&mut self, label: u16, step: Step) -> Step {
        if step.is_err() {
            self.0 = label;
        }
        step
    }

    /// Normal return from the last label; the next run starts at zero.
    pub fn finish(&mut self) -> Step {
        self.0 = 0;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::scheduler::Scheduler;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    #[test]
    fn test_label_only_moves_on_suspend() {
        let mut at = ResumePoint::new();
        assert!(at.suspend_at(4, Ok(())).is_ok());
        assert_eq!(at.label(), 0);
        assert!(at.suspend_at(4, Err(crate::step::Suspend::Yield)).is_err());
        assert_eq!(at.label(), 4);
        assert_eq!(at.finish(), Ok(()));
        assert_eq!(at.label(), 0);
    }

    #[test]
    fn test_body_continues_after_yields() {
        let clock = ManualClock::new(0);
        let mut s = Scheduler::new(clock.clone());
        let trace = Rc::new(RefCell::new(Vec::new()));
        let seen = trace.clone();
        let mut at = ResumePoint::new();
        s.add(1, move |ctx| {
            seen.borrow_mut().push(at.label());
            match at.label() {
                0 => at.suspend_at(1, ctx.yield_now()),
                1 => at.suspend_at(2, ctx.yield_delay(10)),
                _ => at.finish(),
            }
        });
        for _ in 0..6 {
            s.run_once();
        }
        clock.advance(11);
        for _ in 0..2 {
            s.run_once();
        }
        assert_eq!(trace.borrow().as_slice(), &[0, 1, 2]);
    }
}
