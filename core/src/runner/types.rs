use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::LaunchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunKind {
    ReadInfo,
    CompareInfo,
    VerifyInfo,
    Dashboard,
}

impl RunKind {
    pub const ALL: [RunKind; 4] = [
        RunKind::ReadInfo,
        RunKind::CompareInfo,
        RunKind::VerifyInfo,
        RunKind::Dashboard,
    ];

    /// Directory name under the log root.
    pub fn as_str(self) -> &'static str {
        match self {
            RunKind::ReadInfo => "ReadInfo",
            RunKind::CompareInfo => "CompareInfo",
            RunKind::VerifyInfo => "VerifyInfo",
            RunKind::Dashboard => "Dashboard",
        }
    }

    /// Human phrase used in outcome messages.
    pub fn action(self) -> &'static str {
        match self {
            RunKind::ReadInfo | RunKind::Dashboard => "Read information",
            RunKind::CompareInfo => "Compare information",
            RunKind::VerifyInfo => "Verify information",
        }
    }

    pub fn needs_aux_file(self) -> bool {
        matches!(self, RunKind::CompareInfo | RunKind::VerifyInfo)
    }
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub kind: RunKind,
    pub drive_id: String,
    /// Comparison snapshot for `CompareInfo`, rules file for `VerifyInfo`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux_file: Option<PathBuf>,
    /// Caller-assigned tag echoed back in the outcome. Two otherwise equal
    /// requests are told apart by it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl RunRequest {
    pub fn read(drive_id: impl Into<String>) -> Self {
        Self {
            kind: RunKind::ReadInfo,
            drive_id: drive_id.into(),
            aux_file: None,
            seq: None,
        }
    }

    pub fn dashboard(drive_id: impl Into<String>) -> Self {
        Self {
            kind: RunKind::Dashboard,
            drive_id: drive_id.into(),
            aux_file: None,
            seq: None,
        }
    }

    pub fn compare(drive_id: impl Into<String>, snapshot: impl Into<PathBuf>) -> Self {
        Self {
            kind: RunKind::CompareInfo,
            drive_id: drive_id.into(),
            aux_file: Some(snapshot.into()),
            seq: None,
        }
    }

    pub fn verify(drive_id: impl Into<String>, rules: impl Into<PathBuf>) -> Self {
        Self {
            kind: RunKind::VerifyInfo,
            drive_id: drive_id.into(),
            aux_file: Some(rules.into()),
            seq: None,
        }
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }

    pub fn validate(&self) -> Result<(), LaunchError> {
        if self.drive_id.trim().is_empty() {
            return Err(LaunchError::EmptyDriveId);
        }
        if self.kind.needs_aux_file() && self.aux_file.is_none() {
            return Err(LaunchError::MissingAuxFile {
                kind: self.kind.as_str(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_and_verify_require_aux_file() {
        let mut req = RunRequest::compare("0", "/tmp/ref.info.json");
        assert!(req.validate().is_ok());
        req.aux_file = None;
        assert!(matches!(
            req.validate(),
            Err(LaunchError::MissingAuxFile { kind: "CompareInfo" })
        ));

        let mut req = RunRequest::verify("0", "/tmp/x.rules.json");
        req.aux_file = None;
        assert!(req.validate().is_err());
    }

    #[test]
    fn blank_drive_id_is_rejected() {
        assert!(matches!(
            RunRequest::read("  ").validate(),
            Err(LaunchError::EmptyDriveId)
        ));
    }

    #[test]
    fn request_json_uses_variant_names() {
        let req: RunRequest =
            serde_json::from_str(r#"{"kind":"VerifyInfo","drive_id":"1","aux_file":"a.rules.json"}"#)
                .unwrap();
        assert_eq!(req, RunRequest::verify("1", "a.rules.json"));

        let s = serde_json::to_string(&RunRequest::read("nvme0")).unwrap();
        assert_eq!(s, r#"{"kind":"ReadInfo","drive_id":"nvme0"}"#);
    }

    #[test]
    fn seq_distinguishes_equal_requests() {
        let a = RunRequest::read("0").with_seq(1);
        let b = RunRequest::read("0").with_seq(2);
        assert_ne!(a, b);
        let s = serde_json::to_string(&b).unwrap();
        assert_eq!(s, r#"{"kind":"ReadInfo","drive_id":"0","seq":2}"#);
    }
}
