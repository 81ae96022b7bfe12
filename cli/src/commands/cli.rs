use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use nvmeinfo_core::api::{RetentionPolicy, RunRequest};

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Run nvmecmd against NVMe drives and collect its results")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to ./nvmeinfo.toml when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `nvmeinfo.supervisor=trace`. `RUST_LOG` wins.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Skip pruning old log sessions at startup.
    #[arg(long, global = true, default_value_t = false)]
    pub no_prune: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run nvmecmd once and print the outcome as JSON.
    Run(RunArgs),
    /// Read JSON-lines run requests on stdin, write JSON-lines outcomes on stdout.
    Stdio(StdioArgs),
    /// Delete log sessions older than the retention policy.
    Prune(PruneArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    #[command(subcommand)]
    pub target: RunTarget,

    /// Override the tool timeout.
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RunTarget {
    /// Read all information from a drive.
    Read {
        #[arg(long, default_value = "0")]
        drive: String,
    },
    /// Read the information shown on the dashboard.
    Dashboard {
        #[arg(long, default_value = "0")]
        drive: String,
    },
    /// Read a drive and compare it against an earlier result file.
    Compare {
        #[arg(long, default_value = "0")]
        drive: String,
        #[arg(long)]
        snapshot: PathBuf,
    },
    /// Read a drive and verify it against a rules file.
    Verify {
        #[arg(long, default_value = "0")]
        drive: String,
        #[arg(long)]
        rules: PathBuf,
    },
}

impl RunTarget {
    pub fn into_request(self) -> RunRequest {
        match self {
            RunTarget::Read { drive } => RunRequest::read(drive),
            RunTarget::Dashboard { drive } => RunRequest::dashboard(drive),
            RunTarget::Compare { drive, snapshot } => RunRequest::compare(drive, snapshot),
            RunTarget::Verify { drive, rules } => RunRequest::verify(drive, rules),
        }
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct StdioArgs {
    /// Read requests from a file instead of stdin.
    #[arg(long)]
    pub input_file: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
pub enum PolicyArg {
    OneDay,
    ThreeDays,
    TenDays,
    ThirtyDays,
    Keep,
}

impl From<PolicyArg> for RetentionPolicy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::OneDay => RetentionPolicy::OneDay,
            PolicyArg::ThreeDays => RetentionPolicy::ThreeDays,
            PolicyArg::TenDays => RetentionPolicy::TenDays,
            PolicyArg::ThirtyDays => RetentionPolicy::ThirtyDays,
            PolicyArg::Keep => RetentionPolicy::Keep,
        }
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PruneArgs {
    /// Override the configured retention policy.
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// List what would be deleted without deleting it.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_requires_snapshot() {
        assert!(Args::try_parse_from(["nvmeinfo", "run", "compare", "--drive", "1"]).is_err());

        let args = Args::try_parse_from([
            "nvmeinfo", "run", "compare", "--drive", "1", "--snapshot", "ref.json",
        ])
        .unwrap();
        let Commands::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(
            run.target.into_request(),
            RunRequest::compare("1", "ref.json")
        );
    }

    #[test]
    fn global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "nvmeinfo", "prune", "--policy", "ten-days", "--config", "x.toml", "--dry-run",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("x.toml")));
        let Commands::Prune(p) = args.command else {
            panic!("expected prune");
        };
        assert!(p.dry_run);
        assert!(matches!(p.policy, Some(PolicyArg::TenDays)));
    }

    #[test]
    fn read_defaults_to_drive_zero() {
        let args = Args::try_parse_from(["nvmeinfo", "run", "read"]).unwrap();
        let Commands::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.target.into_request(), RunRequest::read("0"));
    }
}
