use std::time::SystemTime;

use clap::Parser;
use nvmeinfo_core::api::{self as core_api, AppConfig, CliError};

mod commands;
mod logging;
mod retention;

use commands::cli;

#[tokio::main]
async fn main() {
    let args = cli::Args::parse();

    let cfg = match core_api::load_from(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("nvmeinfo: {}", CliError::Config(format!("{e:#}")));
            std::process::exit(1);
        }
    };

    let guard = logging::init(&cfg.logging, args.log_level.as_deref());
    log_banner(&cfg);

    if !args.no_prune && !matches!(args.command, cli::Commands::Prune(_)) {
        prune_at_startup(&cfg);
    }

    let code = match dispatch(args.command, &cfg).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("fatal error: {e}");
            eprintln!("nvmeinfo: {e}");
            if matches!(e, CliError::Fatal(_)) {
                eprintln!("See the log sessions under {}", cfg.log_root.display());
            }
            1
        }
    };

    // Flush the file writer; process::exit skips destructors.
    drop(guard);
    std::process::exit(code);
}

async fn dispatch(cmd: cli::Commands, cfg: &AppConfig) -> Result<i32, CliError> {
    match cmd {
        cli::Commands::Run(run_args) => commands::run::handle_run(run_args, cfg).await,
        cli::Commands::Stdio(stdio_args) => commands::stdio::handle_stdio(stdio_args, cfg).await,
        cli::Commands::Prune(prune_args) => commands::prune::handle_prune(prune_args, cfg),
    }
}

fn log_banner(cfg: &AppConfig) {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        os = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        started = %chrono::Local::now().to_rfc3339(),
        "nvmeinfo starting"
    );
    tracing::info!(
        tool_dir = %cfg.tool.dir.display(),
        executable = %cfg.tool.executable_path().display(),
        read_template = %cfg.tool.read_template_path().display(),
        timeout_ms = cfg.tool.timeout_ms,
        log_root = %cfg.log_root.display(),
        retention = ?cfg.retention.policy,
        "configuration"
    );
}

fn prune_at_startup(cfg: &AppConfig) {
    if let Err(e) = retention::prune_sessions(
        &cfg.log_root,
        cfg.retention.policy,
        SystemTime::now(),
        false,
    ) {
        tracing::warn!(
            target: "nvmeinfo.retention",
            log_root = %cfg.log_root.display(),
            error = %e,
            "Failed to delete old log files"
        );
    }
}
