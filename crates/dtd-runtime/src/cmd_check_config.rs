//! `dtd check-config`: validate and print the effective configuration.

use dtd_coordinator::RetryPolicy;

use crate::config::AppConfig;

pub fn cmd_check_config(app: &AppConfig) -> anyhow::Result<()> {
    let problems = app.protocol.problems();
    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("error: {problem}");
        }
        anyhow::bail!("configuration has {} problem(s)", problems.len());
    }

    print!("{}", app.to_toml()?);
    let policy = RetryPolicy::from_config(&app.protocol.retry, app.protocol.timing.reply_timeout());
    println!(
        "# ok: {} nodes, worst-case poll {}ms",
        app.protocol.nodes.len(),
        policy.worst_case().as_millis()
    );
    Ok(())
}
