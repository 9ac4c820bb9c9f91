// Handle given to a task body while it is being dispatched
//
// Yielding is only possible through a Context, and a Context only
// exists inside `Scheduler::run_once`, so there is no way to yield
// from outside the dispatcher. Each yield writes the wait condition on
// the running record first, then hands back the discriminant for the
// body to return.

use crate::clock::Millis;
use crate::config::{NodeId, TaskId};
use crate::packet::Packet;
use crate::scheduler::{Scheduler, SendError};
use crate::step::{Step, Suspend};
use crate::task::{Source, TaskRecord};

pub struct Context<'a> {
    sched: &'a mut Scheduler,
}

impl<'a> Context<'a> {
    pub(crate) fn new(sched: &'a mut Scheduler) -> Self {
        Self { sched }
    }

    fn me(&self) -> &TaskRecord {
        match self.sched.running() {
            Some(rec) => rec,
            None => panic!("context: no running task"),
        }
    }

    fn me_mut(&mut self) -> &mut TaskRecord {
        match self.sched.running_mut() {
            Some(rec) => rec,
            None => panic!("context: no running task"),
        }
    }

    // ── Yield family ───────────────────────────────────────────────

    /// Give up the CPU; runnable again on the next revolution.
    pub fn yield_now(&mut self) -> Step {
        Err(Suspend::Yield)
    }

    /// Sleep for `ms` from now.
    pub fn yield_delay(&mut self, ms: Millis) -> Step {
        let when = self.sched.now().saturating_add(ms);
        self.yield_until(when)
    }

    pub fn yield_until(&mut self, when: Millis) -> Step {
        self.me_mut().set_wait_until(when);
        Err(Suspend::Until)
    }

    /// Wait for `sig`. A zero timeout waits forever.
    pub fn yield_for_signal(&mut self, sig: u8, timeout: Millis) -> Step {
        let now = self.sched.now();
        self.me_mut().set_wait_signal(sig, timeout, now);
        Err(Suspend::Signal)
    }

    /// Wait for a message. A zero timeout waits forever.
    pub fn yield_for_message(&mut self, timeout: Millis) -> Step {
        let now = self.sched.now();
        self.me_mut().set_wait_message(timeout, now);
        Err(Suspend::Message)
    }

    /// Park until someone calls `resume` with this task's id.
    pub fn yield_suspend(&mut self) -> Step {
        self.me_mut().set_suspended(true);
        Err(Suspend::Suspend)
    }

    /// Remove the running task from the scheduler.
    pub fn kill(&mut self) -> Step {
        Err(Suspend::Kill)
    }

    // ── Queries ────────────────────────────────────────────────────

    pub fn my_id(&self) -> TaskId {
        self.me().id()
    }

    pub fn node_id(&self) -> NodeId {
        self.sched.node_id()
    }

    /// True only on the dispatch right after a wait timed out.
    pub fn timed_out(&self) -> bool {
        self.me().timed_out()
    }

    /// Last message delivered to this task.
    pub fn message(&self) -> &[u8] {
        self.me().message()
    }

    /// Sender of the last signal or message.
    pub fn source(&self) -> Source {
        self.me().source()
    }

    pub fn now(&self) -> Millis {
        self.sched.now()
    }

    pub fn runtime(&self) -> Millis {
        self.sched.runtime()
    }

    // ── Delivery ───────────────────────────────────────────────────

    pub fn send_signal(&mut self, sig: u8) -> bool {
        self.sched.send_signal(sig)
    }

    pub fn send_signal_all(&mut self, sig: u8) -> usize {
        self.sched.send_signal_all(sig)
    }

    pub fn send_message(&mut self, target: TaskId, payload: &[u8]) -> Result<(), SendError> {
        self.sched.send_message(target, payload)
    }

    pub fn send_signal_to(&mut self, node: NodeId, sig: u8) -> Result<(), SendError> {
        self.sched.send_signal_to(node, sig)
    }

    pub fn send_signal_all_to(&mut self, node: NodeId, sig: u8) -> Result<(), SendError> {
        self.sched.send_signal_all_to(node, sig)
    }

    pub fn send_message_to(
        &mut self,
        node: NodeId,
        target: TaskId,
        payload: &[u8],
    ) -> Result<(), SendError> {
        self.sched.send_message_to(node, target, payload)
    }

    /// Reply to whoever sent the last signal or message.
    pub fn reply(&mut self, payload: &[u8]) -> Result<(), SendError> {
        let to = self.source();
        self.sched.send_message_to(to.node, to.task, payload)
    }

    pub fn suspend(&mut self, id: TaskId) -> bool {
        self.sched.suspend(id)
    }

    pub fn resume(&mut self, id: TaskId) -> bool {
        self.sched.resume(id)
    }

    pub fn suspend_on(&mut self, node: NodeId, id: TaskId) -> Result<(), SendError> {
        self.sched.suspend_on(node, id)
    }

    pub fn resume_on(&mut self, node: NodeId, id: TaskId) -> Result<(), SendError> {
        self.sched.resume_on(node, id)
    }

    pub fn dispatch_packet(&mut self, packet: &Packet) {
        self.sched.dispatch_packet(packet);
    }

    pub fn find_task_by_id(&self, id: TaskId) -> Option<&TaskRecord> {
        self.sched.find_task_by_id(id)
    }

    // ── Spawning ───────────────────────────────────────────────────

    pub fn add<F>(&mut self, id: TaskId, f: F)
    where
        F: FnMut(&mut Context<'_>) -> Step + 'static,
    {
        self.sched.add(id, f);
    }

    pub fn add_wait_delay<F>(&mut self, id: TaskId, delay: Millis, f: F)
    where
        F: FnMut(&mut Context<'_>) -> Step + 'static,
    {
        self.sched.add_wait_delay(id, delay, f);
    }

    pub fn add_wait_signal<F>(&mut self, id: TaskId, sig: u8, timeout: Millis, f: F)
    where
        F: FnMut(&mut Context<'_>) -> Step + 'static,
    {
        self.sched.add_wait_signal(id, sig, timeout, f);
    }

    pub fn add_wait_message<F>(&mut self, id: TaskId, timeout: Millis, f: F)
    where
        F: FnMut(&mut Context<'_>) -> Step + 'static,
    {
        self.sched.add_wait_message(id, timeout, f);
    }

    pub fn add_wait_until<F>(&mut self, id: TaskId, when: Millis, f: F)
    where
        F: FnMut(&mut Context<'_>) -> Step + 'static,
    {
        self.sched.add_wait_until(id, when, f);
    }

    pub fn add_auto_wait_delay<F>(&mut self, id: TaskId, period: Millis, start_waiting: bool, f: F)
    where
        F: FnMut(&mut Context<'_>) -> Step + 'static,
    {
        self.sched.add_auto_wait_delay(id, period, start_waiting, f);
    }

    pub fn add_auto_wait_signal<F>(
        &mut self,
        id: TaskId,
        sig: u8,
        timeout: Millis,
        start_waiting: bool,
        f: F,
    ) where
        F: FnMut(&mut Context<'_>) -> Step + 'static,
    {
        self.sched
            .add_auto_wait_signal(id, sig, timeout, start_waiting, f);
    }

    pub fn add_auto_wait_message<F>(&mut self, id: TaskId, timeout: Millis, start_waiting: bool, f: F)
    where
        F: FnMut(&mut Context<'_>) -> Step + 'static,
    {
        self.sched
            .add_auto_wait_message(id, timeout, start_waiting, f);
    }
}
