use std::time::SystemTime;

use nvmeinfo_core::api::{AppConfig, CliError, RetentionPolicy};

use crate::commands::cli::PruneArgs;
use crate::retention::prune_sessions;

pub fn handle_prune(args: PruneArgs, cfg: &AppConfig) -> Result<i32, CliError> {
    let policy: RetentionPolicy = args
        .policy
        .map(Into::into)
        .unwrap_or(cfg.retention.policy);

    let report = prune_sessions(&cfg.log_root, policy, SystemTime::now(), args.dry_run)?;
    for path in &report.removed {
        println!("{}", path.display());
    }
    for (path, e) in &report.failed {
        eprintln!("failed to delete {}: {e}", path.display());
    }
    Ok(if report.failed.is_empty() { 0 } else { 1 })
}
