// Cooperative dispatcher over the task ring
//
// One physical stack, no preemption. Each `run_once` advances the ring
// to the next runnable record, stages its next wake time, runs its body
// to completion or to a yield, and then applies the auto re-arm setting
// (normal return) or removes the record (kill). Delivery calls mutate
// records directly and never move the dispatcher's cursor.

use alloc::boxed::Box;
use core::fmt;

use crate::clock::{Clock, Millis};
use crate::config::{
    IDLE_TASK, LOCAL_NODE, MESSAGE_SIZE, MIN_FRAME_SIZE, NodeId, RADIO_MONITOR_TASK, TaskId,
};
use crate::context::Context;
use crate::inbox::{Inbox, receiver_task};
use crate::packet::{Body, Packet, Payload};
use crate::ring::{Cursor, Ring};
use crate::step::{Step, Suspend};
use crate::task::{Source, TaskRecord};
use crate::transport::{Transport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// Payload longer than a message buffer
    TooLong { len: usize, max: usize },
    /// No record with this id on the target node
    NoSuchTask(TaskId),
    /// Remote node addressed but no transport installed
    NoTransport,
    Transport(TransportError),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::TooLong { len, max } => {
                write!(f, "payload of {} bytes exceeds {}", len, max)
            }
            SendError::NoSuchTask(id) => write!(f, "no task {}", id),
            SendError::NoTransport => write!(f, "no transport for remote node"),
            SendError::Transport(e) => write!(f, "transport: {}", e),
        }
    }
}

impl From<TransportError> for SendError {
    fn from(e: TransportError) -> Self {
        SendError::Transport(e)
    }
}

/// What a single `run_once` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatched {
    pub id: TaskId,
    pub outcome: Step,
}

pub struct Scheduler {
    ring: Ring<TaskRecord>,
    clock: Box<dyn Clock>,
    // clock-sync correction applied on top of the raw clock
    offset: i64,
    start_time: Millis,
    node: NodeId,
    transport: Option<Box<dyn Transport>>,
}

impl Scheduler {
    /// A scheduler holding only the idle task.
    pub fn new(clock: impl Clock + 'static) -> Self {
        let start_time = clock.now_ms();
        let mut sched = Self {
            ring: Ring::new(),
            clock: Box::new(clock),
            offset: 0,
            start_time,
            node: LOCAL_NODE,
            transport: None,
        };
        sched.add(IDLE_TASK, |_| Ok(()));
        sched
    }

    pub fn with_node(mut self, node: NodeId) -> Self {
        self.node = node;
        self
    }

    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Install the receiver task that drains `inbox` every revolution.
    pub fn start_receiver(&mut self, inbox: &'static Inbox) {
        self.add(RADIO_MONITOR_TASK, receiver_task(inbox));
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn now(&self) -> Millis {
        self.clock.now_ms().saturating_add_signed(self.offset)
    }

    /// Milliseconds since the scheduler was created.
    pub fn runtime(&self) -> Millis {
        self.now().saturating_sub(self.start_time)
    }

    pub fn task_count(&self) -> usize {
        self.ring.len()
    }

    /// Shift the time base by `delta` ms. Every pending timer moves with
    /// it, so remaining delays and their order are unchanged.
    pub fn resync(&mut self, delta: i64) {
        self.offset = self.offset.saturating_add(delta);
        self.start_time = self.start_time.saturating_add_signed(delta);
        let mut scan = self.ring.scan();
        while let Some(at) = scan.next(&self.ring) {
            if let Some(rec) = self.ring.get_mut(at) {
                rec.shift_wake(delta);
            }
        }
        log::info!("sched: resync by {} ms", delta);
    }

    pub(crate) fn running(&self) -> Option<&TaskRecord> {
        self.ring.current()
    }

    pub(crate) fn running_mut(&mut self) -> Option<&mut TaskRecord> {
        self.ring.current_mut()
    }

    fn current_id(&self) -> TaskId {
        self.ring.current().map_or(IDLE_TASK, TaskRecord::id)
    }

    // ── Adding tasks ───────────────────────────────────────────────

    fn insert(&mut self, rec: TaskRecord) {
        log::debug!("sched: add {}", rec);
        self.ring.insert_near(rec);
    }

    /// Add a task that is runnable right away.
    pub fn add<F>(&mut self, id: TaskId, f: F)
    where
        F: FnMut(&mut Context<'_>) -> Step + 'static,
    {
        self.insert(TaskRecord::new(id, f));
    }

    pub fn add_wait_until<F>(&mut self, id: TaskId, when: Millis, f: F)
    where
        F: FnMut(&mut Context<'_>) -> Step + 'static,
    {
        let mut rec = TaskRecord::new(id, f);
        rec.set_wait_until(when);
        self.insert(rec);
    }

    pub fn add_wait_delay<F>(&mut self, id: TaskId, delay: Millis, f: F)
    where
        F: FnMut(&mut Context<'_>) -> Step + 'static,
    {
        let when = self.now().saturating_add(delay);
        self.add_wait_until(id, when, f);
    }

    pub fn add_wait_signal<F>(&mut self, id: TaskId, sig: u8, timeout: Millis, f: F)
    where
        F: FnMut(&mut Context<'_>) -> Step + 'static,
    {
        let mut rec = TaskRecord::new(id, f);
        rec.set_wait_signal(sig, timeout, self.now());
        self.insert(rec);
    }

    pub fn add_wait_message<F>(&mut self, id: TaskId, timeout: Millis, f: F)
    where
        F: FnMut(&mut Context<'_>) -> Step + 'static,
    {
        let mut rec = TaskRecord::new(id, f);
        rec.set_wait_message(timeout, self.now());
        self.insert(rec);
    }

    /// Periodic task, start-to-start. With `start_waiting` the first run
    /// is one period out; otherwise it runs on the next revolution.
    pub fn add_auto_wait_delay<F>(&mut self, id: TaskId, period: Millis, start_waiting: bool, f: F)
    where
        F: FnMut(&mut Context<'_>) -> Step + 'static,
    {
        let mut rec = TaskRecord::new(id, f);
        rec.set_auto_delay(period);
        if start_waiting {
            rec.set_wait_until(self.now().saturating_add(period));
        }
        self.insert(rec);
    }

    /// Task re-armed on `sig` after every normal return. A non-zero
    /// timeout wakes it with `timed_out()` set when nothing arrives.
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
        let mut rec = TaskRecord::new(id, f);
        rec.set_auto_signal(sig, timeout);
        if start_waiting {
            rec.set_wait_signal(sig, timeout, self.now());
        }
        self.insert(rec);
    }

    pub fn add_auto_wait_message<F>(
        &mut self,
        id: TaskId,
        timeout: Millis,
        start_waiting: bool,
        f: F,
    ) where
        F: FnMut(&mut Context<'_>) -> Step + 'static,
    {
        let mut rec = TaskRecord::new(id, f);
        rec.set_auto_message(timeout);
        if start_waiting {
            rec.set_wait_message(timeout, self.now());
        }
        self.insert(rec);
    }

    // ── Dispatch ───────────────────────────────────────────────────

    /// Advance the cursor to the next runnable record. Checks every
    /// record at most once; the idle task guarantees a hit.
    fn find_next_runnable(&mut self, now: Millis) {
        for _ in 0..self.ring.len() {
            self.ring.advance();
            if let Some(rec) = self.ring.current_mut() {
                if rec.is_runnable(now) {
                    return;
                }
            }
        }
        panic!("sched: no runnable task among {}", self.ring.len());
    }

    /// Run one task body.
    pub fn run_once(&mut self) -> Dispatched {
        assert!(!self.ring.is_empty(), "sched: task ring is empty");
        let now = self.now();
        self.find_next_runnable(now);

        let (id, procedure) = match self.ring.current_mut() {
            Some(rec) => {
                rec.stage_wake(now);
                (rec.id(), rec.take_procedure())
            }
            None => panic!("sched: cursor lost"),
        };
        let Some(mut procedure) = procedure else {
            panic!("sched: task {} re-entered", id);
        };

        log::trace!("sched: run task {}", id);
        let outcome = procedure(&mut Context::new(self));

        match outcome {
            Err(Suspend::Kill) => {
                if let Some(rec) = self.ring.remove_current() {
                    log::debug!("sched: killed {}", rec);
                }
                assert!(!self.ring.is_empty(), "sched: killed the last task");
            }
            result => {
                let now = self.now();
                if let Some(rec) = self.ring.current_mut() {
                    if result.is_ok() {
                        rec.auto_restart(now);
                    }
                    rec.restore_procedure(procedure);
                }
            }
        }
        Dispatched { id, outcome }
    }

    pub fn run(&mut self) -> ! {
        loop {
            self.run_once();
        }
    }

    // ── Lookup ─────────────────────────────────────────────────────

    fn find(&self, id: TaskId) -> Option<Cursor> {
        let mut scan = self.ring.scan();
        while let Some(at) = scan.next(&self.ring) {
            if self.ring.get(at).is_some_and(|rec| rec.id() == id) {
                return Some(at);
            }
        }
        None
    }

    /// First record with `id`, scanning from the cursor.
    pub fn find_task_by_id(&self, id: TaskId) -> Option<&TaskRecord> {
        self.find(id).and_then(|at| self.ring.get(at))
    }

    pub(crate) fn find_task_by_id_mut(&mut self, id: TaskId) -> Option<&mut TaskRecord> {
        let at = self.find(id)?;
        self.ring.get_mut(at)
    }

    /// Park a task until `resume`. The idle task cannot be suspended.
    pub fn suspend(&mut self, id: TaskId) -> bool {
        if id == IDLE_TASK {
            log::warn!("sched: refusing to suspend idle task");
            return false;
        }
        match self.find_task_by_id_mut(id) {
            Some(rec) => {
                rec.set_suspended(true);
                log::debug!("sched: suspend {}", id);
                true
            }
            None => false,
        }
    }

    pub fn resume(&mut self, id: TaskId) -> bool {
        match self.find_task_by_id_mut(id) {
            Some(rec) => {
                rec.set_suspended(false);
                log::debug!("sched: resume {}", id);
                true
            }
            None => false,
        }
    }

    // ── Delivery ───────────────────────────────────────────────────

    /// Wake the first task waiting on `sig`.
    pub fn deliver_signal(&mut self, from: Source, sig: u8) -> bool {
        let mut scan = self.ring.scan();
        while let Some(at) = scan.next(&self.ring) {
            if let Some(rec) = self.ring.get_mut(at) {
                if rec.waits_for_signal(sig) {
                    rec.deliver_signal(from);
                    log::debug!("sched: signal {} -> task {}", sig, rec.id());
                    return true;
                }
            }
        }
        false
    }

    /// Wake every task waiting on `sig`, returning how many woke.
    pub fn deliver_signal_all(&mut self, from: Source, sig: u8) -> usize {
        let mut woken = 0;
        let mut scan = self.ring.scan();
        while let Some(at) = scan.next(&self.ring) {
            if let Some(rec) = self.ring.get_mut(at) {
                if rec.waits_for_signal(sig) {
                    rec.deliver_signal(from);
                    woken += 1;
                }
            }
        }
        log::debug!("sched: signal {} -> {} tasks", sig, woken);
        woken
    }

    /// Store `payload` on task `target`, replacing any unread message.
    pub fn deliver_message(
        &mut self,
        from: Source,
        target: TaskId,
        payload: &[u8],
    ) -> Result<(), SendError> {
        if payload.len() > MESSAGE_SIZE {
            log::warn!(
                "sched: dropped {} byte message for task {}",
                payload.len(),
                target
            );
            return Err(SendError::TooLong {
                len: payload.len(),
                max: MESSAGE_SIZE,
            });
        }
        let Some(rec) = self.find_task_by_id_mut(target) else {
            log::warn!("sched: message for unknown task {}", target);
            return Err(SendError::NoSuchTask(target));
        };
        rec.deliver_message(from, payload);
        log::debug!("sched: {} byte message -> task {}", payload.len(), target);
        Ok(())
    }

    fn local_source(&self) -> Source {
        Source {
            node: LOCAL_NODE,
            task: self.current_id(),
        }
    }

    pub fn send_signal(&mut self, sig: u8) -> bool {
        let from = self.local_source();
        self.deliver_signal(from, sig)
    }

    pub fn send_signal_all(&mut self, sig: u8) -> usize {
        let from = self.local_source();
        self.deliver_signal_all(from, sig)
    }

    pub fn send_message(&mut self, target: TaskId, payload: &[u8]) -> Result<(), SendError> {
        let from = self.local_source();
        self.deliver_message(from, target, payload)
    }

    // ── Remote ─────────────────────────────────────────────────────

    fn is_local(&self, node: NodeId) -> bool {
        node == LOCAL_NODE || node == self.node
    }

    fn forward(&mut self, node: NodeId, body: Body) -> Result<(), SendError> {
        let origin = Source {
            node: self.node,
            task: self.current_id(),
        };
        let Some(transport) = self.transport.as_mut() else {
            log::warn!("sched: no transport, dropping {:?} for node {}", body, node);
            return Err(SendError::NoTransport);
        };
        let mut frame = [0u8; MIN_FRAME_SIZE];
        let len = Packet::new(origin, body).encode(&mut frame);
        transport.send(node, &frame[..len])?;
        Ok(())
    }

    pub fn send_signal_to(&mut self, node: NodeId, sig: u8) -> Result<(), SendError> {
        if self.is_local(node) {
            self.send_signal(sig);
            Ok(())
        } else {
            self.forward(node, Body::Signal(sig))
        }
    }

    pub fn send_signal_all_to(&mut self, node: NodeId, sig: u8) -> Result<(), SendError> {
        if self.is_local(node) {
            self.send_signal_all(sig);
            Ok(())
        } else {
            self.forward(node, Body::SignalAll(sig))
        }
    }

    pub fn send_message_to(
        &mut self,
        node: NodeId,
        target: TaskId,
        payload: &[u8],
    ) -> Result<(), SendError> {
        if self.is_local(node) {
            return self.send_message(target, payload);
        }
        let payload = Payload::new(payload).ok_or(SendError::TooLong {
            len: payload.len(),
            max: MESSAGE_SIZE,
        })?;
        self.forward(node, Body::Message { target, payload })
    }

    pub fn suspend_on(&mut self, node: NodeId, id: TaskId) -> Result<(), SendError> {
        if !self.is_local(node) {
            return self.forward(node, Body::Suspend(id));
        }
        if self.suspend(id) {
            Ok(())
        } else {
            Err(SendError::NoSuchTask(id))
        }
    }

    pub fn resume_on(&mut self, node: NodeId, id: TaskId) -> Result<(), SendError> {
        if !self.is_local(node) {
            return self.forward(node, Body::Resume(id));
        }
        if self.resume(id) {
            Ok(())
        } else {
            Err(SendError::NoSuchTask(id))
        }
    }

    /// Apply an inbound packet through the local delivery entry points.
    pub fn dispatch_packet(&mut self, packet: &Packet) {
        let from = packet.origin;
        match &packet.body {
            Body::Noop => {}
            Body::Status => log::debug!("sched: status request from node {}", from.node),
            Body::Signal(sig) => {
                self.deliver_signal(from, *sig);
            }
            Body::SignalAll(sig) => {
                self.deliver_signal_all(from, *sig);
            }
            Body::Message { target, payload } => {
                // failures are logged inside
                let _ = self.deliver_message(from, *target, payload.as_slice());
            }
            Body::Suspend(id) => {
                self.suspend(*id);
            }
            Body::Resume(id) => {
                self.resume(*id);
            }
        }
    }
}

impl fmt::Display for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "node {} tasks {} now {} runtime {}",
            self.node,
            self.ring.len(),
            self.now(),
            self.runtime()
        )?;
        for rec in self.ring.iter() {
            writeln!(f, "  {}", rec)?;
        }
        Ok(())
    }
}
