//! `dtd node`: run a detector node on the radio link.

use anyhow::Context;
use dtd_node::{
    FileIdStore, FileSensor, FixedSensor, FixedStraps, IdStore, MemoryIdStore, NodeRunner,
    NodeSettings, PresenceSensor, Responder, resolve_identity,
};

use crate::cli::NodeOpts;
use crate::config::AppConfig;
use crate::link;
use crate::shutdown;

pub async fn cmd_node(opts: NodeOpts, app: &AppConfig) -> anyhow::Result<()> {
    let timing = &app.protocol.timing;
    if let Some(problem) = app.protocol.timing_problems().into_iter().next() {
        return Err(problem).context("invalid configuration");
    }

    let id_file = opts.id_file.clone().or_else(|| app.node.id_file.clone());
    let store: Box<dyn IdStore> = match id_file {
        Some(path) => Box::new(FileIdStore::new(path)),
        None => Box::new(MemoryIdStore::default()),
    };
    let straps = FixedStraps(opts.strap.or(app.node.strap));
    let configured = opts.id.clone().or_else(|| app.node.id.clone());
    let (node_id, source) = resolve_identity(configured.as_ref(), &store, &straps);
    tracing::info!("node id {node_id} (from {source})");

    let sensor = build_sensor(&opts, app);
    let link = link::open(&opts.link, &app.link).await?;
    let mut runner = NodeRunner::new(
        link,
        Responder::new(node_id),
        sensor,
        store,
        NodeSettings::from_timing(timing),
    );

    let result = tokio::select! {
        () = shutdown::signal() => Ok(()),
        r = runner.run() => r,
    };
    runner.log_stats();
    result.context("radio link failed")
}

fn build_sensor(opts: &NodeOpts, app: &AppConfig) -> Box<dyn PresenceSensor> {
    let active_low = opts.active_low || app.node.active_low;
    if let Some(path) = opts.presence_file.as_ref().or(app.node.presence_file.as_ref()) {
        if opts.present.is_none() {
            tracing::info!("presence from {}", path.display());
            return Box::new(FileSensor::new(path).with_active_low(active_low));
        }
    }
    let present = opts.present.or(app.node.present).unwrap_or(true);
    tracing::info!("presence fixed at {present}");
    Box::new(FixedSensor(present))
}
