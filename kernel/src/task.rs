// Task records and the per-task wait state machine
//
// A `TaskRecord` carries two layers of wait state:
//
//   current waits            auto re-arm setting (applied on normal return)
//   ─────────────            ──────────────────────────────────────────
//   WaitSignal        ◄───── AutoSignal
//   WaitMessage       ◄───── AutoMessage
//   WaitUntil         ◄───── AutoUntil
//
//   Suspended (persistent) and TimedOut (one-shot) are plain markers
//
// `WaitUntil` is dual purpose. Alone it is a plain timer. Together with
// `WaitSignal` or `WaitMessage` it is a timeout on that wait, and when it
// fires first the record wakes with `TimedOut` set.

use alloc::boxed::Box;
use core::fmt;

use crate::clock::Millis;
use crate::config::{MESSAGE_SIZE, NodeId, TaskId};
use crate::context::Context;
use crate::step::Step;

/// A task body. Invoked from its entry point on every dispatch.
pub type Procedure = Box<dyn FnMut(&mut Context<'_>) -> Step>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Flag {
    WaitSignal = 0x01,
    WaitMessage = 0x02,
    WaitUntil = 0x04,
    AutoSignal = 0x08,
    AutoMessage = 0x10,
    AutoUntil = 0x20,
    TimedOut = 0x40,
    Suspended = 0x80,
}

impl Flag {
    const ALL: [Flag; 8] = [
        Flag::WaitSignal,
        Flag::WaitMessage,
        Flag::WaitUntil,
        Flag::AutoSignal,
        Flag::AutoMessage,
        Flag::AutoUntil,
        Flag::TimedOut,
        Flag::Suspended,
    ];

    const fn tag(self) -> &'static str {
        match self {
            Flag::WaitSignal => "WS",
            Flag::WaitMessage => "WM",
            Flag::WaitUntil => "WU",
            Flag::AutoSignal => "AS",
            Flag::AutoMessage => "AM",
            Flag::AutoUntil => "AU",
            Flag::TimedOut => "TO",
            Flag::Suspended => "SU",
        }
    }
}

/// Set of [`Flag`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateFlags(u8);

impl StateFlags {
    pub const fn empty() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn contains(self, flag: Flag) -> bool {
        self.0 & flag as u8 != 0
    }

    #[inline]
    pub fn any(self, flags: &[Flag]) -> bool {
        flags.iter().any(|&f| self.contains(f))
    }

    #[inline]
    pub fn insert(&mut self, flag: Flag) {
        self.0 |= flag as u8;
    }

    #[inline]
    pub fn remove(&mut self, flag: Flag) {
        self.0 &= !(flag as u8);
    }

    #[inline]
    pub fn set(&mut self, flag: Flag, on: bool) {
        if on {
            self.insert(flag);
        } else {
            self.remove(flag);
        }
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for StateFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "-");
        }
        let mut first = true;
        for flag in Flag::ALL {
            if self.contains(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", flag.tag())?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Who sent the last signal or message, for reply routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Source {
    pub node: NodeId,
    pub task: TaskId,
}

pub struct TaskRecord {
    id: TaskId,
    // None only while the body is running
    procedure: Option<Procedure>,
    flags: StateFlags,
    wake_time: Millis,
    period: Millis,
    signal: u8,
    restart_signal: u8,
    message: [u8; MESSAGE_SIZE],
    message_len: usize,
    origin: Source,
}

impl TaskRecord {
    pub fn new<F>(id: TaskId, procedure: F) -> Self
    where
        F: FnMut(&mut Context<'_>) -> Step + 'static,
    {
        Self {
            id,
            procedure: Some(Box::new(procedure)),
            flags: StateFlags::empty(),
            wake_time: 0,
            period: 0,
            signal: 0,
            restart_signal: 0,
            message: [0u8; MESSAGE_SIZE],
            message_len: 0,
            origin: Source::default(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn flags(&self) -> StateFlags {
        self.flags
    }

    pub fn wake_time(&self) -> Millis {
        self.wake_time
    }

    pub fn period(&self) -> Millis {
        self.period
    }

    /// Signal currently awaited (meaningful while `WaitSignal` is set).
    pub fn signal(&self) -> u8 {
        self.signal
    }

    pub fn message(&self) -> &[u8] {
        &self.message[..self.message_len]
    }

    pub fn source(&self) -> Source {
        self.origin
    }

    pub fn is_suspended(&self) -> bool {
        self.flags.contains(Flag::Suspended)
    }

    pub fn timed_out(&self) -> bool {
        self.flags.contains(Flag::TimedOut)
    }

    pub fn waits_for_signal(&self, sig: u8) -> bool {
        self.flags.contains(Flag::WaitSignal) && self.signal == sig
    }

    pub(crate) fn take_procedure(&mut self) -> Option<Procedure> {
        self.procedure.take()
    }

    pub(crate) fn restore_procedure(&mut self, procedure: Procedure) {
        self.procedure = Some(procedure);
    }

    // ── Runnability ────────────────────────────────────────────────

    /// Decide whether the record may run at `now`.
    ///
    /// Mutates the wait state: a fired timer is consumed, and a timeout
    /// on a signal/message wait cancels that wait and sets `TimedOut`.
    /// Call at most once per record per scheduling decision.
    pub(crate) fn is_runnable(&mut self, now: Millis) -> bool {
        self.flags.remove(Flag::TimedOut);
        if self.flags.contains(Flag::Suspended) {
            false
        } else if self.flags.contains(Flag::WaitUntil) && self.wake_time < now {
            self.flags.remove(Flag::WaitUntil);
            if self.flags.any(&[Flag::WaitSignal, Flag::WaitMessage]) {
                self.flags.remove(Flag::WaitSignal);
                self.flags.remove(Flag::WaitMessage);
                self.flags.insert(Flag::TimedOut);
            }
            true
        } else {
            !self
                .flags
                .any(&[Flag::WaitUntil, Flag::WaitMessage, Flag::WaitSignal])
        }
    }

    // ── Wait setters ───────────────────────────────────────────────

    pub(crate) fn set_wait_until(&mut self, when: Millis) {
        self.wake_time = when;
        self.flags.insert(Flag::WaitUntil);
    }

    pub(crate) fn set_wait_signal(&mut self, sig: u8, timeout: Millis, now: Millis) {
        self.signal = sig;
        self.flags.insert(Flag::WaitSignal);
        if timeout > 0 {
            self.set_wait_until(now.saturating_add(timeout));
        }
    }

    pub(crate) fn set_wait_message(&mut self, timeout: Millis, now: Millis) {
        self.flags.insert(Flag::WaitMessage);
        if timeout > 0 {
            self.set_wait_until(now.saturating_add(timeout));
        }
    }

    /// Re-arm a timer of `period` after every normal return. Zero is
    /// ignored.
    pub(crate) fn set_auto_delay(&mut self, period: Millis) {
        if period > 0 {
            self.period = period;
            self.flags.insert(Flag::AutoUntil);
        }
    }

    /// Re-arm a wait for `sig` after every normal return, with an
    /// optional timeout.
    pub(crate) fn set_auto_signal(&mut self, sig: u8, timeout: Millis) {
        self.restart_signal = sig;
        self.flags.insert(Flag::AutoSignal);
        self.set_auto_delay(timeout);
    }

    pub(crate) fn set_auto_message(&mut self, timeout: Millis) {
        self.flags.insert(Flag::AutoMessage);
        self.set_auto_delay(timeout);
    }

    pub(crate) fn set_suspended(&mut self, on: bool) {
        self.flags.set(Flag::Suspended, on);
    }

    // ── Dispatcher bookkeeping ─────────────────────────────────────

    /// Provisional next wake time, staged before the body runs so a
    /// periodic task measures its period start-to-start.
    pub(crate) fn stage_wake(&mut self, now: Millis) {
        self.wake_time = now.saturating_add(self.period);
    }

    /// Apply the auto re-arm setting after a normal (non-yield) return.
    pub(crate) fn auto_restart(&mut self, now: Millis) {
        let until = self.flags.contains(Flag::AutoUntil);
        if self.flags.any(&[Flag::AutoSignal, Flag::AutoMessage]) {
            if until {
                // timeout on the re-armed wait, measured from now
                self.wake_time = now.saturating_add(self.period);
            }
        } else if until && self.period > 0 && self.wake_time <= now {
            // skip every missed period in one step
            let missed = (now - self.wake_time) / self.period + 1;
            self.wake_time = self
                .wake_time
                .saturating_add(missed.saturating_mul(self.period));
        }
        self.reset_current_state();
    }

    /// Replace the current waits with the auto re-arm setting.
    fn reset_current_state(&mut self) {
        let auto_signal = self.flags.contains(Flag::AutoSignal);
        self.flags.set(Flag::WaitSignal, auto_signal);
        self.flags
            .set(Flag::WaitMessage, self.flags.contains(Flag::AutoMessage));
        self.flags
            .set(Flag::WaitUntil, self.flags.contains(Flag::AutoUntil));
        if auto_signal {
            self.signal = self.restart_signal;
        }
    }

    // ── Delivery ───────────────────────────────────────────────────

    /// Wake on a signal. The caller has already matched the number.
    pub(crate) fn deliver_signal(&mut self, from: Source) {
        self.origin = from;
        self.flags.remove(Flag::WaitSignal);
        self.flags.remove(Flag::WaitUntil);
        self.flags.remove(Flag::TimedOut);
    }

    /// Store a message, overwriting any unread one. Oversized payloads
    /// leave the record untouched.
    pub(crate) fn deliver_message(&mut self, from: Source, payload: &[u8]) -> bool {
        if payload.len() > MESSAGE_SIZE {
            return false;
        }
        self.message[..payload.len()].copy_from_slice(payload);
        self.message_len = payload.len();
        self.origin = from;
        self.flags.remove(Flag::WaitMessage);
        self.flags.remove(Flag::WaitUntil);
        self.flags.remove(Flag::TimedOut);
        true
    }

    pub(crate) fn shift_wake(&mut self, delta: i64) {
        self.wake_time = self.wake_time.saturating_add_signed(delta);
    }
}

impl fmt::Display for TaskRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[task {} flags {} wake {} period {} sig {}]",
            self.id, self.flags, self.wake_time, self.period, self.signal
        )
    }
}

impl fmt::Debug for TaskRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRecord")
            .field("id", &self.id)
            .field("flags", &self.flags)
            .field("wake_time", &self.wake_time)
            .field("period", &self.period)
            .field("signal", &self.signal)
            .field("message_len", &self.message_len)
            .field("origin", &self.origin)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    fn record() -> TaskRecord {
        TaskRecord::new(1, |_| Ok(()))
    }

    #[test]
    fn test_fresh_record_is_runnable() {
        let mut t = record();
        assert!(t.is_runnable(0));
        assert!(t.flags().is_empty());
    }

    #[test]
    fn test_suspended_never_runs() {
        let mut t = record();
        t.set_suspended(true);
        t.set_wait_until(0);
        assert!(!t.is_runnable(1_000));
        // suspension does not consume the timer
        assert!(t.flags().contains(Flag::WaitUntil));
    }

    #[test]
    fn test_wait_until_is_strict() {
        let mut t = record();
        t.set_wait_until(100);
        assert!(!t.is_runnable(99));
        assert!(!t.is_runnable(100));
        assert!(t.is_runnable(101));
        assert!(!t.flags().contains(Flag::WaitUntil));
        assert!(!t.timed_out());
    }

    #[test]
    fn test_signal_timeout_sets_timed_out() {
        let mut t = record();
        t.set_wait_signal(7, 50, 1_000);
        assert!(!t.is_runnable(1_050));
        assert!(t.is_runnable(1_051));
        assert!(t.timed_out());
        assert!(!t.flags().contains(Flag::WaitSignal));
    }

    #[test]
    fn test_timed_out_is_one_shot() {
        let mut t = record();
        t.set_wait_message(10, 0);
        assert!(t.is_runnable(11));
        assert!(t.timed_out());
        assert!(t.is_runnable(12));
        assert!(!t.timed_out());
    }

    #[test]
    fn test_wait_without_timeout_blocks() {
        let mut t = record();
        t.set_wait_message(0, 0);
        assert!(!t.is_runnable(u64::MAX));
        assert!(!t.flags().contains(Flag::WaitUntil));
    }

    #[test]
    fn test_signal_clears_timeout() {
        let mut t = record();
        t.set_wait_signal(3, 100, 0);
        t.deliver_signal(Source { node: 2, task: 9 });
        assert!(t.is_runnable(1));
        assert!(!t.timed_out());
        assert_eq!(t.source(), Source { node: 2, task: 9 });
    }

    #[test]
    fn test_message_overwrites_previous() {
        let mut t = record();
        t.set_wait_message(0, 0);
        assert!(t.deliver_message(Source::default(), b"first"));
        assert!(t.deliver_message(Source::default(), b"two"));
        assert_eq!(t.message(), b"two");
    }

    #[test]
    fn test_oversized_message_untouched() {
        let mut t = record();
        t.set_wait_message(0, 0);
        t.deliver_message(Source::default(), b"keep");
        t.set_wait_message(0, 0);
        let big = [0xAAu8; MESSAGE_SIZE + 1];
        assert!(!t.deliver_message(Source { node: 1, task: 1 }, &big));
        assert_eq!(t.message(), b"keep");
        assert!(t.flags().contains(Flag::WaitMessage));
        assert_eq!(t.source(), Source::default());
    }

    #[test]
    fn test_periodic_catch_up() {
        let mut t = record();
        t.set_auto_delay(500);
        t.stage_wake(1_000);
        t.auto_restart(1_700);
        assert_eq!(t.wake_time(), 2_000);
        assert!(t.flags().contains(Flag::WaitUntil));
    }

    #[test]
    fn test_periodic_short_run_keeps_staged() {
        let mut t = record();
        t.set_auto_delay(500);
        t.stage_wake(1_000);
        t.auto_restart(1_100);
        assert_eq!(t.wake_time(), 1_500);
    }

    #[test]
    fn test_periodic_skips_many_periods_at_once() {
        let mut t = record();
        t.set_auto_delay(10);
        t.stage_wake(0);
        t.auto_restart(1_000_000);
        assert_eq!(t.wake_time(), 1_000_010);

        // landing exactly on a boundary still moves past it
        t.stage_wake(2_000);
        t.auto_restart(2_010);
        assert_eq!(t.wake_time(), 2_020);
    }

    #[test]
    fn test_periodic_catch_up_saturates() {
        let mut t = record();
        t.set_auto_delay(1_000);
        t.stage_wake(Millis::MAX - 1_500);
        t.auto_restart(Millis::MAX - 100);
        assert_eq!(t.wake_time(), Millis::MAX);
        assert!(t.flags().contains(Flag::WaitUntil));
    }

    #[test]
    fn test_auto_signal_with_timeout() {
        let mut t = record();
        t.set_auto_signal(4, 250);
        t.stage_wake(1_000);
        t.auto_restart(1_300);
        assert!(t.waits_for_signal(4));
        assert!(t.flags().contains(Flag::WaitUntil));
        assert_eq!(t.wake_time(), 1_550);
    }

    #[test]
    fn test_no_auto_rearm_clears_waits() {
        let mut t = record();
        t.set_wait_until(10);
        t.auto_restart(0);
        assert!(!t.flags().contains(Flag::WaitUntil));
        assert!(t.is_runnable(0));
    }

    #[test]
    fn test_auto_restart_keeps_suspension() {
        let mut t = record();
        t.set_suspended(true);
        t.auto_restart(0);
        assert!(t.is_suspended());
    }

    #[test]
    fn test_zero_period_ignored() {
        let mut t = record();
        t.set_auto_delay(0);
        assert!(!t.flags().contains(Flag::AutoUntil));
    }

    #[test]
    fn test_flags_display() {
        let mut t = record();
        assert_eq!(format!("{}", t.flags()), "-");
        t.set_auto_delay(500);
        t.set_wait_until(1_500);
        assert_eq!(format!("{}", t), "[task 1 flags WU|AU wake 1500 period 500 sig 0]");
    }
}
