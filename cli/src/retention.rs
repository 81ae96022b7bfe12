use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use nvmeinfo_core::api::{RetentionPolicy, RunKind};

#[derive(Debug, Default)]
pub struct PruneReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, std::io::Error)>,
}

/// Applies `policy` to `{root}/{kind}/{session}` directories. Only the
/// session level is considered; anything else under `root` is left alone.
pub fn prune_sessions(
    root: &Path,
    policy: RetentionPolicy,
    now: SystemTime,
    dry_run: bool,
) -> std::io::Result<PruneReport> {
    let mut report = PruneReport::default();
    let Some(max_age) = policy.max_age() else {
        tracing::debug!(target: "nvmeinfo.retention", "retention policy keeps all logs");
        return Ok(report);
    };

    for kind in RunKind::ALL {
        let kind_dir = root.join(kind.as_str());
        let entries = match std::fs::read_dir(&kind_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let meta = match entry.metadata() {
                Ok(m) if m.is_dir() => m,
                Ok(_) => continue,
                Err(e) => {
                    report.failed.push((path, e));
                    continue;
                }
            };
            if !is_older_than(meta.modified().ok(), now, max_age) {
                continue;
            }

            if dry_run {
                report.removed.push(path);
                continue;
            }
            match std::fs::remove_dir_all(&path) {
                Ok(()) => report.removed.push(path),
                Err(e) => report.failed.push((path, e)),
            }
        }
    }

    let days = max_age.as_secs() / 86_400;
    if report.removed.is_empty() {
        tracing::info!(target: "nvmeinfo.retention", "No logs deleted, found no logs older than {days} day(s)");
    } else {
        tracing::info!(
            target: "nvmeinfo.retention",
            dry_run,
            "deleted {} logs older than {days} day(s)",
            report.removed.len()
        );
    }
    for (path, e) in &report.failed {
        tracing::warn!(target: "nvmeinfo.retention", path = %path.display(), error = %e, "failed to delete old log");
    }
    Ok(report)
}

fn is_older_than(modified: Option<SystemTime>, now: SystemTime, max_age: Duration) -> bool {
    match modified.and_then(|m| now.duration_since(m).ok()) {
        Some(age) => age > max_age,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(root: &Path, kind: RunKind, name: &str) -> PathBuf {
        let dir = root.join(kind.as_str()).join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("nvme.info.json"), b"{}").unwrap();
        dir
    }

    const DAY: Duration = Duration::from_secs(86_400);

    #[test]
    fn removes_sessions_older_than_policy() {
        let tmp = tempfile::tempdir().unwrap();
        let a = session(tmp.path(), RunKind::ReadInfo, "2024.01.01-10.00.00.000");
        let b = session(tmp.path(), RunKind::Dashboard, "2024.01.02-10.00.00.000");

        // Pretend four days have passed.
        let now = SystemTime::now() + 4 * DAY;
        let report = prune_sessions(tmp.path(), RetentionPolicy::ThreeDays, now, false).unwrap();

        assert_eq!(report.removed.len(), 2);
        assert!(report.failed.is_empty());
        assert!(!a.exists());
        assert!(!b.exists());
        assert!(tmp.path().join("ReadInfo").is_dir());
    }

    #[test]
    fn keeps_recent_sessions_and_foreign_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let recent = session(tmp.path(), RunKind::VerifyInfo, "2024.01.01-10.00.00.000");
        let foreign = tmp.path().join("notes");
        std::fs::create_dir_all(&foreign).unwrap();

        let now = SystemTime::now() + 2 * DAY;
        let report = prune_sessions(tmp.path(), RetentionPolicy::ThreeDays, now, false).unwrap();

        assert!(report.removed.is_empty());
        assert!(recent.exists());
        assert!(foreign.exists());
    }

    #[test]
    fn keep_policy_and_dry_run_delete_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let s = session(tmp.path(), RunKind::CompareInfo, "2024.01.01-10.00.00.000");
        let later = SystemTime::now() + 100 * DAY;

        let report = prune_sessions(tmp.path(), RetentionPolicy::Keep, later, false).unwrap();
        assert!(report.removed.is_empty());

        let report = prune_sessions(tmp.path(), RetentionPolicy::OneDay, later, true).unwrap();
        assert_eq!(report.removed, vec![s.clone()]);
        assert!(s.exists());
    }

    #[test]
    fn missing_root_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let report = prune_sessions(
            &tmp.path().join("absent"),
            RetentionPolicy::OneDay,
            SystemTime::now(),
            false,
        )
        .unwrap();
        assert!(report.removed.is_empty());
    }
}
