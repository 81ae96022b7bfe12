use nvmeinfo_core::api::{AppConfig, CliError, RunCoordinator, RunOutcome};
use tokio::sync::mpsc;

use crate::commands::cli::RunArgs;
use crate::commands::join_coordinator;

/// Runs one request to completion. Ctrl-C aborts the tool; the aborted
/// outcome is still printed.
pub async fn handle_run(args: RunArgs, cfg: &AppConfig) -> Result<i32, CliError> {
    let mut cfg = cfg.clone();
    if let Some(ms) = args.timeout_ms {
        cfg.tool.timeout_ms = ms;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<RunOutcome>();
    let (handle, mut join) = RunCoordinator::spawn(&cfg, tx);
    handle.submit(args.target.into_request())?;

    let outcome = loop {
        tokio::select! {
            out = rx.recv() => match out {
                Some(out) => break out,
                None => {
                    join_coordinator(join).await?;
                    return Err(CliError::Command("coordinator stopped without an outcome".into()));
                }
            },
            res = &mut join => {
                return match res {
                    Ok(Ok(())) => Err(CliError::Command("coordinator stopped without an outcome".into())),
                    Ok(Err(e)) => Err(CliError::Fatal(e)),
                    Err(e) => Err(CliError::Command(e.to_string())),
                };
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(target: "nvmeinfo.coordinator", "interrupt received, aborting nvmecmd");
                handle.cancel();
            }
        }
    };

    handle.shutdown().await;
    join_coordinator(join).await?;

    let json = serde_json::to_string_pretty(&outcome)
        .map_err(|e| CliError::Command(format!("failed to encode outcome: {e}")))?;
    println!("{json}");

    if let Some(message) = &outcome.message {
        eprintln!("{message}");
    }
    Ok(if outcome.is_success() { 0 } else { 1 })
}
