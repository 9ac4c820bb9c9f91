// tasklet demo: two nodes on an in-memory mesh
//
// Node 1 (sensor) samples every 250 ms and ships each sample to the
// collector's task 10, then waits up to 1 s for the ack. Every fourth
// sample it also broadcasts an alert signal.
// Node 2 (collector) acks each sample back to the sending node, and has
// two watchers parked on the alert signal.
//
// Main loop: one dispatch per node -> short sleep -> repeat, until the
// run length (ms, first argument, default 3000) has passed.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use log::info;
use static_cell::StaticCell;

use tasklet::clock::StdClock;
use tasklet::logger;
use tasklet::mesh::MeshLink;
use tasklet_kernel::config::NodeId;
use tasklet_kernel::{Inbox, Scheduler};

const SENSOR: NodeId = 1;
const COLLECTOR: NodeId = 2;

const SAMPLER: u8 = 1;
const ACK_WAITER: u8 = 2;
const STORE: u8 = 10;
const WATCH_A: u8 = 11;
const WATCH_B: u8 = 12;
const HEARTBEAT: u8 = 20;

const SIG_ALERT: u8 = 0xA1;

const SAMPLE_MS: u64 = 250;
const ACK_TIMEOUT_MS: u64 = 1_000;
const DEFAULT_RUN_MS: u64 = 3_000;

static SENSOR_INBOX: StaticCell<Inbox> = StaticCell::new();
static COLLECTOR_INBOX: StaticCell<Inbox> = StaticCell::new();

fn sensor(clock: StdClock, inbox: &'static Inbox, collector: &'static Inbox) -> Scheduler {
    let link = MeshLink::new().route(COLLECTOR, collector).lossy(7);
    let mut sched = Scheduler::new(clock).with_node(SENSOR).with_transport(link);
    sched.start_receiver(inbox);

    let seq = Rc::new(Cell::new(0u32));
    sched.add_auto_wait_delay(SAMPLER, SAMPLE_MS, true, move |ctx| {
        let n = seq.get().wrapping_add(1);
        seq.set(n);
        if let Err(e) = ctx.send_message_to(COLLECTOR, STORE, &n.to_le_bytes()) {
            log::warn!("sensor: sample {} lost: {}", n, e);
        }
        if n % 4 == 0 {
            if let Err(e) = ctx.send_signal_all_to(COLLECTOR, SIG_ALERT) {
                log::warn!("sensor: alert {} lost: {}", n, e);
            }
        }
        Ok(())
    });

    sched.add_auto_wait_message(ACK_WAITER, ACK_TIMEOUT_MS, true, |ctx| {
        if ctx.timed_out() {
            log::warn!("sensor: no ack within {} ms", ACK_TIMEOUT_MS);
        } else {
            let msg = String::from_utf8_lossy(ctx.message()).into_owned();
            info!("sensor: {} from node {}", msg, ctx.source().node);
        }
        Ok(())
    });
    sched
}

fn collector(clock: StdClock, inbox: &'static Inbox, sensor: &'static Inbox) -> Scheduler {
    let link = MeshLink::new().route(SENSOR, sensor);
    let mut sched = Scheduler::new(clock)
        .with_node(COLLECTOR)
        .with_transport(link);
    sched.start_receiver(inbox);

    sched.add_auto_wait_message(STORE, 0, true, |ctx| {
        let Ok(bytes) = <[u8; 4]>::try_from(ctx.message()) else {
            log::warn!("collector: malformed sample");
            return Ok(());
        };
        let n = u32::from_le_bytes(bytes);
        info!("collector: sample {} at {} ms", n, ctx.runtime());
        // the sample came from the sampler; acks go to its waiter
        let ack = format!("ack {}", n);
        let from = ctx.source().node;
        if let Err(e) = ctx.send_message_to(from, ACK_WAITER, ack.as_bytes()) {
            log::warn!("collector: {}", e);
        }
        Ok(())
    });

    for id in [WATCH_A, WATCH_B] {
        sched.add_auto_wait_signal(id, SIG_ALERT, 0, true, move |ctx| {
            let from = ctx.source();
            info!("watch {}: alert from node {} task {}", id, from.node, from.task);
            Ok(())
        });
    }

    sched.add_auto_wait_delay(HEARTBEAT, 1_000, true, |ctx| {
        info!("collector: up {} ms", ctx.runtime());
        Ok(())
    });
    sched
}

fn main() {
    logger::init_from_env();

    let run_ms = std::env::args()
        .nth(1)
        .and_then(|a| a.parse().ok())
        .unwrap_or(DEFAULT_RUN_MS);

    let sensor_inbox: &'static Inbox = SENSOR_INBOX.init(Inbox::new());
    let collector_inbox: &'static Inbox = COLLECTOR_INBOX.init(Inbox::new());

    let clock = StdClock::new();
    let mut nodes = [
        sensor(clock, sensor_inbox, collector_inbox),
        collector(clock, collector_inbox, sensor_inbox),
    ];
    info!("mesh ready, running {} ms", run_ms);

    while nodes[0].runtime() < run_ms {
        for node in nodes.iter_mut() {
            node.run_once();
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    for node in &nodes {
        info!("final state:\n{}", node);
    }
    info!(
        "dropped frames: sensor {} collector {}",
        sensor_inbox.dropped(),
        collector_inbox.dropped()
    );
}
