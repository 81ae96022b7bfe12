use std::path::{Path, PathBuf};

use anyhow::Context;

use super::types::AppConfig;

pub const DEFAULT_CONFIG_FILE: &str = "nvmeinfo.toml";

/// Reads `explicit` when given, else `nvmeinfo.toml` in the working directory
/// when present, else defaults. Environment overrides are applied last.
pub fn load_from(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => Some(PathBuf::from(DEFAULT_CONFIG_FILE)),
        None => None,
    };

    let mut cfg: AppConfig = match path {
        Some(p) => {
            let s = std::fs::read_to_string(&p)
                .with_context(|| format!("reading config {}", p.display()))?;
            toml::from_str::<AppConfig>(&s)
                .with_context(|| format!("parsing config {}", p.display()))?
        }
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut cfg, |k| std::env::var(k).ok())?;
    expand_paths(&mut cfg)?;
    Ok(cfg)
}

fn apply_env_overrides(
    cfg: &mut AppConfig,
    var: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = var("NVMEINFO_LOG_ROOT") {
        if !v.trim().is_empty() {
            cfg.log_root = PathBuf::from(v.trim());
        }
    }
    if let Some(v) = var("NVMEINFO_TOOL_DIR") {
        if !v.trim().is_empty() {
            cfg.tool.dir = PathBuf::from(v.trim());
        }
    }
    if let Some(v) = var("NVMEINFO_TIMEOUT_MS") {
        if !v.trim().is_empty() {
            cfg.tool.timeout_ms = v
                .trim()
                .parse()
                .with_context(|| format!("NVMEINFO_TIMEOUT_MS is not a number: {v}"))?;
        }
    }
    Ok(())
}

fn expand_paths(cfg: &mut AppConfig) -> anyhow::Result<()> {
    cfg.log_root = expand(&cfg.log_root)?;
    cfg.tool.dir = expand(&cfg.tool.dir)?;
    if let Some(dir) = cfg.logging.directory.take() {
        cfg.logging.directory = Some(expand(&dir)?);
    }
    Ok(())
}

fn expand(p: &Path) -> anyhow::Result<PathBuf> {
    let raw = p.to_string_lossy();
    let expanded = shellexpand::full(&raw)
        .with_context(|| format!("expanding path {raw}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
