//! Coordinator and nodes talking over a simulated half-duplex radio with
//! echo and fragmented UART delivery.

use std::sync::Arc;
use std::time::Duration;

use dtd_coordinator::{Exchange, Orchestrator, RetryPolicy, Transport};
use dtd_core::config::ProtocolConfig;
use dtd_core::message::Message;
use dtd_core::node_id::NodeId;
use dtd_core::types::Presence;
use dtd_link::{BusLink, SimBus};
use dtd_node::{FixedSensor, MemoryIdStore, NodeRunner, NodeSettings, Responder};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

type Node = NodeRunner<BusLink, FixedSensor, MemoryIdStore>;

fn id(s: &str) -> NodeId {
    NodeId::parse(s).expect("valid id")
}

fn radio() -> SimBus {
    SimBus::new().with_echo(true).with_chunk_size(3)
}

fn config(nodes: &[&str]) -> ProtocolConfig {
    ProtocolConfig {
        nodes: nodes.iter().map(|n| id(n)).collect(),
        ..ProtocolConfig::default()
    }
}

struct RunningNode {
    stop: oneshot::Sender<()>,
    task: JoinHandle<Node>,
}

impl RunningNode {
    async fn stop(self) -> Node {
        let _ = self.stop.send(());
        self.task.await.expect("node task")
    }
}

fn spawn_node(bus: &SimBus, node_id: &str, present: bool, store: MemoryIdStore) -> RunningNode {
    let mut node = NodeRunner::new(
        bus.attach(),
        Responder::new(id(node_id)),
        FixedSensor(present),
        store,
        NodeSettings::default(),
    );
    let (stop, stopped) = oneshot::channel();
    let task = tokio::spawn(async move {
        tokio::select! {
            result = node.run() => result.expect("node link"),
            _ = stopped => {}
        }
        node
    });
    RunningNode { stop, task }
}

/// Let the nodes finish their boot grace and announce themselves.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(500)).await;
}

#[tokio::test(start_paused = true)]
async fn present_node_confirmed_after_two_cycles() {
    let bus = radio();
    let config = config(&["03"]);
    let transport = Arc::new(Transport::new(bus.attach(), &config.timing));
    let n03 = spawn_node(&bus, "03", true, MemoryIdStore::default());
    let n07 = spawn_node(&bus, "07", true, MemoryIdStore::default());
    settle().await;

    let mut orch = Orchestrator::new(Arc::clone(&transport), &config);

    let first = orch.scan_cycle().await.expect("cycle 1");
    assert_eq!(first.observations[0].raw_state, Presence::Present);
    assert_eq!(first.states[&id("03")], Presence::Unknown);
    assert!(first.changes.is_empty());

    let second = orch.scan_cycle().await.expect("cycle 2");
    assert_eq!(second.states[&id("03")], Presence::Present);
    assert_eq!(second.changes.len(), 1);
    assert_eq!(second.changes[0].from, Presence::Unknown);
    assert_eq!(second.changes[0].to, Presence::Present);

    let n03 = n03.stop().await;
    let n07 = n07.stop().await;
    assert_eq!(n03.stats().polls_answered, 2);
    assert_eq!(n07.stats().polls_answered, 0);
    assert_eq!(n07.stats().polls_not_for_me, 2);
    // 07 hears its own BOOT and 03's two ACKs. 03's BOOT goes out while 07
    // is still draining its boot noise, so it may never be seen.
    assert!(n07.stats().echoes_ignored >= 3);
    assert_eq!(n07.stats().unrecognized_total(), 0);
    assert_eq!(transport.stats().timeouts, 0);
}

#[tokio::test(start_paused = true)]
async fn absent_and_silent_nodes() {
    let bus = radio();
    let config = config(&["01", "02"]);
    let transport = Arc::new(Transport::new(bus.attach(), &config.timing));
    let n01 = spawn_node(&bus, "01", false, MemoryIdStore::default());
    settle().await;

    let mut orch = Orchestrator::new(transport, &config);
    orch.scan_cycle().await.expect("cycle 1");
    let report = orch.scan_cycle().await.expect("cycle 2");

    assert_eq!(report.states[&id("01")], Presence::Absent);
    assert_eq!(report.states[&id("02")], Presence::Unknown);
    assert_eq!(orch.aggregator().unknown_streak(&id("02")), 2);
    assert!(report.transport.timeouts >= 8);
    n01.stop().await;
}

#[tokio::test(start_paused = true)]
async fn failed_id_assignment_keeps_old_id() {
    let bus = radio();
    let timing = ProtocolConfig::default().timing;
    let transport = Transport::new(bus.attach(), &timing);
    let node = spawn_node(&bus, "01", true, MemoryIdStore::default().failing());
    settle().await;

    let policy = RetryPolicy::default();
    let got = transport.assign_id(&id("05"), &policy).await.expect("setid");
    assert_eq!(
        got,
        Exchange::Reply(Message::AckSetId {
            id: id("05"),
            ok: false
        })
    );

    let old = transport.poll(&id("01"), &policy).await.expect("poll 01");
    assert!(matches!(old.reply(), Some(Message::Ack { from, present: true }) if from == &id("01")));

    let once = RetryPolicy::once(timing.reply_timeout());
    let new = transport.poll(&id("05"), &once).await.expect("poll 05");
    assert!(new.is_timed_out());

    let node = node.stop().await;
    assert_eq!(node.responder().id(), &id("01"));
    assert_eq!(node.stats().setid_err, 1);
}

#[tokio::test(start_paused = true)]
async fn id_assignment_moves_the_node() {
    let bus = radio();
    let timing = ProtocolConfig::default().timing;
    let transport = Transport::new(bus.attach(), &timing);
    let node = spawn_node(&bus, "01", true, MemoryIdStore::default());
    settle().await;

    let policy = RetryPolicy::default();
    let got = transport.assign_id(&id("05"), &policy).await.expect("setid");
    assert!(matches!(got.reply(), Some(Message::AckSetId { ok: true, .. })));

    let new = transport.poll(&id("05"), &policy).await.expect("poll 05");
    assert!(new.reply().is_some());
    let once = RetryPolicy::once(timing.reply_timeout());
    assert!(transport.poll(&id("01"), &once).await.expect("poll 01").is_timed_out());

    let node = node.stop().await;
    assert_eq!(node.store().stored(), Some(&id("05")));
}

#[tokio::test(start_paused = true)]
async fn wildcard_poll_gets_an_answer() {
    let bus = radio();
    let timing = ProtocolConfig::default().timing;
    let transport = Transport::new(bus.attach(), &timing);
    let node = spawn_node(&bus, "04", true, MemoryIdStore::default());
    settle().await;

    let got = transport
        .poll(&NodeId::wildcard(), &RetryPolicy::default())
        .await
        .expect("poll");
    assert!(matches!(got.reply(), Some(Message::Ack { from, .. }) if from == &id("04")));
    node.stop().await;
}

#[tokio::test(start_paused = true)]
async fn request_without_nodes_is_bounded() {
    let bus = radio();
    let timing = ProtocolConfig::default().timing;
    let transport = Transport::new(bus.attach(), &timing);
    let policy = RetryPolicy {
        max_retries: 3,
        reply_timeout: Duration::from_millis(100),
        ..RetryPolicy::default()
    };

    let start = tokio::time::Instant::now();
    let got = transport.poll(&id("03"), &policy).await.expect("poll");
    assert!(got.is_timed_out());
    let allowance = timing.flush_window() * policy.attempts();
    assert!(start.elapsed() <= policy.worst_case() + allowance);
}
