//! `dtd assign-id`: provision a node with a new id.
//!
//! Only the node being provisioned should be powered on the link: every
//! node that hears `SETID` adopts the id.

use anyhow::Context;
use dtd_coordinator::{Exchange, RetryPolicy, Transport};
use dtd_core::message::Message;

use crate::cli::AssignIdOpts;
use crate::config::AppConfig;
use crate::link;

pub async fn cmd_assign_id(opts: AssignIdOpts, app: &AppConfig) -> anyhow::Result<()> {
    if opts.new_id.is_wildcard() {
        anyhow::bail!("{} is reserved and cannot be assigned", opts.new_id);
    }
    let timing = &app.protocol.timing;
    if let Some(problem) = app.protocol.timing_problems().into_iter().next() {
        return Err(problem).context("invalid configuration");
    }

    let link = link::open(&opts.link, &app.link).await?;
    let transport = Transport::new(link, timing);
    let policy = RetryPolicy::from_config(&app.protocol.retry, timing.reply_timeout());

    let exchange = transport
        .assign_id(&opts.new_id, &policy)
        .await
        .context("radio link failed")?;
    match exchange {
        Exchange::Reply(Message::AckSetId { id, ok: true }) => {
            println!("node now answers as {id}");
            Ok(())
        }
        Exchange::Reply(Message::AckSetId { id, ok: false }) => {
            anyhow::bail!("node could not store id {id}, it keeps its previous id")
        }
        Exchange::Reply(other) => anyhow::bail!("unexpected reply {other}"),
        Exchange::TimedOut => anyhow::bail!(
            "no answer after {} attempts, is a node powered on the link?",
            policy.attempts()
        ),
    }
}
