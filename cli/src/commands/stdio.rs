use std::io::Write;

use nvmeinfo_core::api::{AppConfig, CliError, RunCoordinator, RunOutcome, RunRequest};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::commands::cli::StdioArgs;
use crate::commands::join_coordinator;

#[derive(Serialize)]
struct LineError<'a> {
    line: usize,
    error: &'a str,
}

/// JSON-lines session: every stdin line is a `RunRequest`; every delivered
/// outcome is one stdout line. A newer line preempts a running request.
/// Each accepted request is tagged with its line number as `seq`, and the
/// session ends once input is exhausted and the outcome carrying the last
/// accepted `seq` has been written.
pub async fn handle_stdio(args: StdioArgs, cfg: &AppConfig) -> Result<i32, CliError> {
    match args.input_file {
        Some(path) => {
            let file = tokio::fs::File::open(&path).await?;
            serve(BufReader::new(file), cfg).await
        }
        None => serve(BufReader::new(tokio::io::stdin()), cfg).await,
    }
}

async fn serve<R>(input: R, cfg: &AppConfig) -> Result<i32, CliError>
where
    R: AsyncBufRead + Unpin,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<RunOutcome>();
    let (handle, mut join) = RunCoordinator::spawn(cfg, tx);

    let mut lines = input.lines();
    let mut line_no = 0usize;
    let mut input_done = false;
    let mut last_seq: Option<u64> = None;
    let mut failures = 0usize;

    loop {
        if input_done && last_seq.is_none() {
            break;
        }

        tokio::select! {
            line = lines.next_line(), if !input_done => match line? {
                Some(line) => {
                    line_no += 1;
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<RunRequest>(&line) {
                        Ok(req) => match handle.submit(req.with_seq(line_no as u64)) {
                            Ok(()) => last_seq = Some(line_no as u64),
                            Err(e) => {
                                failures += 1;
                                emit(&LineError { line: line_no, error: &e.to_string() })?;
                            }
                        },
                        Err(e) => {
                            failures += 1;
                            emit(&LineError { line: line_no, error: &e.to_string() })?;
                        }
                    }
                }
                None => input_done = true,
            },
            out = rx.recv() => match out {
                Some(out) => {
                    if answers(last_seq, &out) {
                        last_seq = None;
                    }
                    if !out.is_success() {
                        failures += 1;
                    }
                    emit(&out)?;
                }
                None => break,
            },
            res = &mut join => {
                return match res {
                    Ok(Ok(())) => Ok(if failures == 0 { 0 } else { 1 }),
                    Ok(Err(e)) => Err(CliError::Fatal(e)),
                    Err(e) => Err(CliError::Command(e.to_string())),
                };
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(target: "nvmeinfo.coordinator", "interrupt received, aborting nvmecmd");
                handle.cancel();
                input_done = true;
            }
        }
    }

    handle.shutdown().await;
    join_coordinator(join).await?;
    Ok(if failures == 0 { 0 } else { 1 })
}

/// Whether `out` belongs to the newest accepted request rather than to an
/// earlier line that asked for the same thing.
fn answers(last_seq: Option<u64>, out: &RunOutcome) -> bool {
    last_seq.is_some() && out.request.seq == last_seq
}

fn emit<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string(value)
        .map_err(|e| CliError::Command(format!("failed to encode output: {e}")))?;
    let mut out = std::io::stdout().lock();
    writeln!(out, "{json}")?;
    out.flush()?;
    Ok(())
}
