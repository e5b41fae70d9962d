//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dtd_core::node_id::NodeId;

#[derive(Parser)]
#[command(
    name = "dtd",
    version,
    about = "Polling presence detection over a shared serial radio"
)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, short = 'c', global = true, env = "DTD_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Poll the detector nodes and report their presence
    Coordinator(CoordinatorOpts),
    /// Run a detector node
    Node(NodeOpts),
    /// Reassign the id of the node on the link
    AssignId(AssignIdOpts),
    /// Validate the configuration and print the effective settings
    CheckConfig,
}

/// Where the radio module is attached.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct LinkOpts {
    /// Serial device of the radio module
    #[arg(long, env = "DTD_PORT", conflicts_with = "connect")]
    pub port: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    pub baud: Option<u32>,

    /// Serial-over-TCP bridge (host:port)
    #[arg(long)]
    pub connect: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct CoordinatorOpts {
    #[command(flatten)]
    pub link: LinkOpts,

    /// Run against N in-process simulated nodes instead of a radio
    #[arg(
        long,
        value_name = "N",
        value_parser = clap::value_parser!(u8).range(1..=10),
        conflicts_with_all = ["port", "connect"]
    )]
    pub simulate: Option<u8>,

    /// Node ids to poll, in order (overrides the configuration)
    #[arg(long, value_delimiter = ',')]
    pub nodes: Vec<NodeId>,

    /// Stop after this many scan cycles
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Print every scan report as a JSON line
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args, Debug)]
pub struct NodeOpts {
    #[command(flatten)]
    pub link: LinkOpts,

    /// Fixed node id (takes precedence over the stored id and straps)
    #[arg(long)]
    pub id: Option<NodeId>,

    /// File persisting the assigned id
    #[arg(long)]
    pub id_file: Option<PathBuf>,

    /// Address strap reading, for boards without strap GPIOs exposed
    #[arg(long)]
    pub strap: Option<u8>,

    /// Presence input value file (e.g. a sysfs GPIO `value`)
    #[arg(long, conflicts_with = "present")]
    pub presence_file: Option<PathBuf>,

    /// Presence input is active low
    #[arg(long)]
    pub active_low: bool,

    /// Constant presence answer
    #[arg(long)]
    pub present: Option<bool>,
}

#[derive(clap::Args, Debug)]
pub struct AssignIdOpts {
    /// Id to assign
    pub new_id: NodeId,

    #[command(flatten)]
    pub link: LinkOpts,
}
