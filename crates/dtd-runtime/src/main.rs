//! dtd: presence detection over a shared serial radio.
//! One binary for both roles: the polling coordinator and the detector node.

use clap::Parser;

mod cli;
mod cmd_assign_id;
mod cmd_check_config;
mod cmd_coordinator;
mod cmd_node;
mod config;
mod link;
mod shutdown;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Reports go to stdout; logs stay on stderr.
    let filter = std::env::var("DTD_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let app = config::AppConfig::load(args.config.as_deref())?;

    match args.command {
        cli::Command::Coordinator(opts) => {
            tracing::info!("dtd coordinator starting");
            cmd_coordinator::cmd_coordinator(opts, &app).await?;
        }
        cli::Command::Node(opts) => {
            tracing::info!("dtd node starting");
            cmd_node::cmd_node(opts, &app).await?;
        }
        cli::Command::AssignId(opts) => {
            cmd_assign_id::cmd_assign_id(opts, &app).await?;
        }
        cli::Command::CheckConfig => {
            cmd_check_config::cmd_check_config(&app)?;
        }
    }

    Ok(())
}
