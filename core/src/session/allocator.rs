use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::{DateTime, Local};

use crate::error::SessionError;
use crate::runner::RunKind;

pub const SESSION_TIMESTAMP_FORMAT: &str = "%Y.%m.%d-%H.%M.%S.%3f";

const MAX_NAME_COLLISIONS: u32 = 1000;

/// Directory holding one run's result and trace artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSession {
    pub dir: PathBuf,
    pub created_at: DateTime<Local>,
}

#[derive(Debug, Clone)]
pub struct LogSessionAllocator {
    root: PathBuf,
}

impl LogSessionAllocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates `{root}/{kind}/{timestamp}`. The leaf is created exclusively, so
    /// two runs started within the same millisecond get `-1`, `-2`, ... suffixes
    /// instead of sharing a directory.
    pub fn allocate(
        &self,
        kind: RunKind,
        started_at: DateTime<Local>,
    ) -> Result<LogSession, SessionError> {
        let parent = self.root.join(kind.as_str());
        std::fs::create_dir_all(&parent).map_err(|source| SessionError {
            path: parent.clone(),
            source,
        })?;

        let stamp = started_at.format(SESSION_TIMESTAMP_FORMAT).to_string();
        let mut candidate = parent.join(&stamp);
        let mut n = 0u32;
        loop {
            match std::fs::create_dir(&candidate) {
                Ok(()) => break,
                Err(e) if e.kind() == ErrorKind::AlreadyExists && n < MAX_NAME_COLLISIONS => {
                    n += 1;
                    candidate = parent.join(format!("{stamp}-{n}"));
                }
                Err(source) => {
                    tracing::error!(
                        target: "nvmeinfo.session",
                        dir = %candidate.display(),
                        error = %source,
                        "failed to create log directory"
                    );
                    return Err(SessionError {
                        path: candidate,
                        source,
                    });
                }
            }
        }

        tracing::debug!(target: "nvmeinfo.session", dir = %candidate.display(), "created log session");
        Ok(LogSession {
            dir: candidate,
            created_at: started_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn instant() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .single()
            .unwrap()
    }

    #[test]
    fn builds_kind_and_timestamp_path() {
        let tmp = tempfile::tempdir().unwrap();
        let alloc = LogSessionAllocator::new(tmp.path());
        let s = alloc.allocate(RunKind::VerifyInfo, instant()).unwrap();

        assert!(s.dir.is_dir());
        assert_eq!(
            s.dir,
            tmp.path().join("VerifyInfo").join("2024.03.09-14.05.07.000")
        );
        assert_eq!(s.created_at, instant());
    }

    #[test]
    fn same_instant_never_reuses_a_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let alloc = LogSessionAllocator::new(tmp.path());
        let a = alloc.allocate(RunKind::ReadInfo, instant()).unwrap();
        let b = alloc.allocate(RunKind::ReadInfo, instant()).unwrap();
        let c = alloc.allocate(RunKind::ReadInfo, instant()).unwrap();

        assert_ne!(a.dir, b.dir);
        assert_ne!(b.dir, c.dir);
        assert!(b.dir.to_string_lossy().ends_with(".000-1"));
        assert!(c.dir.to_string_lossy().ends_with(".000-2"));
    }

    #[test]
    fn unwritable_root_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let err = LogSessionAllocator::new(&blocker)
            .allocate(RunKind::Dashboard, instant())
            .unwrap_err();
        assert!(err.path.starts_with(&blocker));
    }
}
