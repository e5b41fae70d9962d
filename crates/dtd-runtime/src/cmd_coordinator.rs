//! `dtd coordinator`: scan loop with report output.

use std::sync::Arc;

use anyhow::Context;
use dtd_coordinator::{Orchestrator, ScanReport, Transport};
use dtd_core::config::ProtocolConfig;
use dtd_core::node_id::NodeId;
use dtd_link::SimBus;
use dtd_node::{FixedSensor, MemoryIdStore, NodeRunner, NodeSettings, Responder};
use tokio::task::JoinSet;

use crate::cli::CoordinatorOpts;
use crate::config::AppConfig;
use crate::link::{self, AnyLink};
use crate::shutdown;

pub async fn cmd_coordinator(opts: CoordinatorOpts, app: &AppConfig) -> anyhow::Result<()> {
    let mut protocol = app.protocol.clone();
    let mut simulated = JoinSet::new();

    let link = match opts.simulate {
        Some(count) => {
            let bus = SimBus::new().with_echo(true);
            let ids: Vec<NodeId> = (1..=count).map(NodeId::numbered).collect();
            for (i, node_id) in ids.iter().enumerate() {
                spawn_simulated_node(&mut simulated, &bus, node_id.clone(), i % 2 == 0, &protocol);
            }
            if opts.nodes.is_empty() {
                protocol.nodes = ids;
            }
            tracing::info!("simulating {count} nodes on an in-process bus");
            AnyLink::Sim(bus.attach())
        }
        None => link::open(&opts.link, &app.link).await?,
    };
    if !opts.nodes.is_empty() {
        protocol.nodes = opts.nodes.clone();
    }
    protocol.validate().context("invalid configuration")?;

    if opts.simulate.is_some() {
        // Let the simulated nodes finish booting before the first poll.
        tokio::time::sleep(protocol.timing.boot_grace() * 2).await;
    }

    let transport = Arc::new(Transport::new(link, &protocol.timing));
    let mut orchestrator = Orchestrator::new(Arc::clone(&transport), &protocol);
    let json = opts.json;

    let result = tokio::select! {
        () = shutdown::signal() => Ok(()),
        r = orchestrator.run(opts.cycles, |report| emit(report, json)) => r,
    };
    simulated.abort_all();

    let stats = transport.stats();
    match serde_json::to_string(&stats) {
        Ok(line) => tracing::info!("transport stats {line}"),
        Err(e) => tracing::warn!("stats serialization failed: {e}"),
    }
    result.context("radio link failed")
}

fn spawn_simulated_node(
    set: &mut JoinSet<()>,
    bus: &SimBus,
    node_id: NodeId,
    present: bool,
    protocol: &ProtocolConfig,
) {
    let mut runner = NodeRunner::new(
        bus.attach(),
        Responder::new(node_id.clone()),
        FixedSensor(present),
        MemoryIdStore::default(),
        NodeSettings::from_timing(&protocol.timing),
    );
    set.spawn(async move {
        if let Err(e) = runner.run().await {
            tracing::warn!("simulated node {node_id} stopped: {e}");
        }
    });
}

fn emit(report: &ScanReport, json: bool) {
    if json {
        match serde_json::to_string(report) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!("report serialization failed: {e}"),
        }
        return;
    }
    println!("{}", format_report(report));
}

/// One human-readable line per cycle.
pub fn format_report(report: &ScanReport) -> String {
    let states = report
        .states
        .iter()
        .map(|(id, presence)| format!("{id}={presence}"))
        .collect::<Vec<_>>()
        .join(" ");
    let time = report
        .started_at
        .with_timezone(&chrono::Local)
        .format("%H:%M:%S");
    let mut line = format!(
        "{time} #{} {states} ({} present, {} absent, {} unknown)",
        report.cycle, report.summary.present, report.summary.absent, report.summary.unknown
    );
    for change in &report.changes {
        line.push_str(&format!("\n  changed {change}"));
    }
    line
}
