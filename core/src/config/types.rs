use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::runner::exit::{
    ExitSentinels, EXCEPTION_EXIT_CODE, NO_TARGETS_EXIT_CODE, USAGE_ERROR_EXIT_CODE,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_root")]
    pub log_root: PathBuf,

    #[serde(default)]
    pub tool: ToolConfig,

    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_root: default_log_root(),
            tool: ToolConfig::default(),
            control: ControlConfig::default(),
            retention: RetentionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_log_root() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("NVMeInfo")
}

/// Where the external tool lives and how its exit codes and artifacts are named.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default = "default_tool_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_executable")]
    pub executable: PathBuf,

    #[serde(default = "default_read_template")]
    pub read_template: PathBuf,

    #[serde(default = "default_result_file")]
    pub result_file: String,

    #[serde(default = "default_trace_file")]
    pub trace_file: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub exit_codes: ExitCodeConfig,
}

impl ToolConfig {
    /// Absolute path of the executable. Relative names resolve against `dir`,
    /// the working directory the tool is started in.
    pub fn executable_path(&self) -> PathBuf {
        resolve_against(&self.dir, &self.executable)
    }

    pub fn read_template_path(&self) -> PathBuf {
        resolve_against(&self.dir, &self.read_template)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn sentinels(&self) -> ExitSentinels {
        ExitSentinels {
            exception: self.exit_codes.exception,
            usage_error: self.exit_codes.usage_error,
            no_targets: self.exit_codes.no_targets,
        }
    }
}

fn resolve_against(base: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

fn default_tool_dir() -> PathBuf {
    let base = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("resources").join("nvmecmd")
}

fn default_executable() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("nvmecmd.exe")
    } else {
        PathBuf::from("nvmecmd")
    }
}

fn default_read_template() -> PathBuf {
    PathBuf::from("read.cmd.json")
}

fn default_result_file() -> String {
    "nvme.info.json".to_string()
}

fn default_trace_file() -> String {
    "nvmecmd.trace.log".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            dir: default_tool_dir(),
            executable: default_executable(),
            read_template: default_read_template(),
            result_file: default_result_file(),
            trace_file: default_trace_file(),
            timeout_ms: default_timeout_ms(),
            exit_codes: ExitCodeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExitCodeConfig {
    #[serde(default = "default_exception_code")]
    pub exception: i32,

    #[serde(default = "default_usage_error_code")]
    pub usage_error: i32,

    #[serde(default = "default_no_targets_code")]
    pub no_targets: i32,
}

fn default_exception_code() -> i32 {
    EXCEPTION_EXIT_CODE
}

fn default_usage_error_code() -> i32 {
    USAGE_ERROR_EXIT_CODE
}

fn default_no_targets_code() -> i32 {
    NO_TARGETS_EXIT_CODE
}

impl Default for ExitCodeConfig {
    fn default() -> Self {
        Self {
            exception: default_exception_code(),
            usage_error: default_usage_error_code(),
            no_targets: default_no_targets_code(),
        }
    }
}

/// Re-submission bounds used when a new request preempts a running one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_resubmit_delay_ms")]
    pub resubmit_delay_ms: u64,

    #[serde(default = "default_max_resubmit_attempts")]
    pub max_resubmit_attempts: u32,
}

fn default_resubmit_delay_ms() -> u64 {
    50
}

fn default_max_resubmit_attempts() -> u32 {
    40
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            resubmit_delay_ms: default_resubmit_delay_ms(),
            max_resubmit_attempts: default_max_resubmit_attempts(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    OneDay,
    ThreeDays,
    TenDays,
    ThirtyDays,
    Keep,
}

impl RetentionPolicy {
    pub fn max_age(self) -> Option<Duration> {
        const DAY: u64 = 24 * 3600;
        match self {
            RetentionPolicy::OneDay => Some(Duration::from_secs(DAY)),
            RetentionPolicy::ThreeDays => Some(Duration::from_secs(3 * DAY)),
            RetentionPolicy::TenDays => Some(Duration::from_secs(10 * DAY)),
            RetentionPolicy::ThirtyDays => Some(Duration::from_secs(30 * DAY)),
            RetentionPolicy::Keep => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_retention_policy")]
    pub policy: RetentionPolicy,
}

fn default_retention_policy() -> RetentionPolicy {
    RetentionPolicy::ThreeDays
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            policy: default_retention_policy(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for the rolling application log; console only when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}
