use std::path::{Path, PathBuf};

use crate::config::ToolConfig;
use crate::error::ResultError;
use crate::runner::RunKind;

use super::types::ParsedResult;

/// Reads the artifacts nvmecmd leaves in a log session directory.
#[derive(Debug, Clone)]
pub struct ResultLoader {
    result_file: String,
    trace_file: String,
}

impl ResultLoader {
    pub fn new(result_file: impl Into<String>, trace_file: impl Into<String>) -> Self {
        Self {
            result_file: result_file.into(),
            trace_file: trace_file.into(),
        }
    }

    pub fn from_tool(cfg: &ToolConfig) -> Self {
        Self::new(cfg.result_file.clone(), cfg.trace_file.clone())
    }

    pub fn result_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.result_file)
    }

    pub fn trace_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.trace_file)
    }

    /// Parses the result artifact and checks the collections `kind` depends on.
    pub async fn load(&self, dir: &Path, kind: RunKind) -> Result<ParsedResult, ResultError> {
        let path = self.result_path(dir);
        let raw = tokio::fs::read(&path)
            .await
            .map_err(|source| ResultError::Read {
                path: path.clone(),
                source,
            })?;
        let parsed = parse_result(&raw)?;
        validate_for_kind(&parsed, kind)?;

        tracing::debug!(
            target: "nvmeinfo.result",
            file = %path.display(),
            parameters = parsed.parameters().map_or(0, |p| p.len()),
            read_status = ?parsed.read_status(),
            "loaded result"
        );
        Ok(parsed)
    }

    /// Trace text, or `None` when the tool did not leave one behind.
    pub async fn read_trace(&self, dir: &Path) -> Option<String> {
        let path = self.trace_path(dir);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) => {
                tracing::warn!(
                    target: "nvmeinfo.result",
                    file = %path.display(),
                    error = %e,
                    "trace file unavailable"
                );
                None
            }
        }
    }
}

pub fn parse_result(raw: &[u8]) -> Result<ParsedResult, ResultError> {
    let value = serde_json::from_slice::<serde_json::Value>(raw).map_err(ResultError::InvalidJson)?;
    ParsedResult::from_value(value)
}

fn validate_for_kind(parsed: &ParsedResult, kind: RunKind) -> Result<(), ResultError> {
    match kind {
        RunKind::CompareInfo => {
            if parsed.compare_mismatches().is_none() {
                return Err(ResultError::MissingField("compare mismatches"));
            }
            if parsed.all_mismatches().is_none() {
                return Err(ResultError::MissingField("all mismatches"));
            }
        }
        RunKind::VerifyInfo => {
            if parsed.rule_violations().is_none() {
                return Err(ResultError::MissingField("rule violations"));
            }
        }
        RunKind::ReadInfo | RunKind::Dashboard => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fixture() -> serde_json::Value {
        json!({
            "_metadata": {
                "system": { "nvme list": ["0"], "os": "linux 6.1" },
                "read status": "All commands passed",
                "host": "bench-01"
            },
            "nvme": {
                "health status": "GOOD",
                "parameters": {
                    "Power On Hours": { "value": "1,024", "description": "Hours powered on" },
                    "Percentage Used": { "value": "3%", "description": "Life used", "unit": "%" }
                }
            }
        })
    }

    fn loader() -> ResultLoader {
        ResultLoader::new("nvme.info.json", "nvmecmd.trace.log")
    }

    #[tokio::test]
    async fn well_formed_result_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("nvme.info.json"),
            serde_json::to_vec(&fixture()).unwrap(),
        )
        .unwrap();

        let parsed = loader().load(tmp.path(), RunKind::ReadInfo).await.unwrap();
        assert_eq!(serde_json::to_value(&parsed).unwrap(), fixture());
        assert_eq!(
            parsed.parameter("Power On Hours").unwrap()["value"],
            json!("1,024")
        );
        assert_eq!(parsed.read_status(), Some(&json!("All commands passed")));
        assert_eq!(parsed.host(), Some(&json!("bench-01")));
        assert_eq!(
            parsed.parameter("Percentage Used").unwrap()["unit"],
            json!("%")
        );
    }

    #[tokio::test]
    async fn nulls_and_missing_optional_fields_survive() {
        let doc = json!({
            "_metadata": { "read status": null, "model": "X1" },
            "nvme": {
                "parameters": {
                    "Serial Number": { "value": "S1", "description": null },
                    "Vendor Flags": { "raw": [1, 2, 3] }
                },
                "telemetry": null
            },
            "nvme list": { "0": null }
        });
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("nvme.info.json"),
            serde_json::to_vec(&doc).unwrap(),
        )
        .unwrap();

        let parsed = loader().load(tmp.path(), RunKind::Dashboard).await.unwrap();
        assert_eq!(serde_json::to_value(&parsed).unwrap(), doc);
        assert_eq!(parsed.system(), None);
        assert_eq!(parsed.read_status(), Some(&serde_json::Value::Null));
        assert_eq!(parsed.parameter("Vendor Flags").unwrap().get("value"), None);
        assert_eq!(parsed.into_value(), doc);
    }

    #[test]
    fn required_objects_are_checked() {
        let no_meta = json!({ "nvme": { "parameters": {} } });
        assert!(matches!(
            parse_result(&serde_json::to_vec(&no_meta).unwrap()),
            Err(ResultError::MissingField("_metadata"))
        ));
        let null_params = json!({ "_metadata": {}, "nvme": { "parameters": null } });
        assert!(matches!(
            parse_result(&serde_json::to_vec(&null_params).unwrap()),
            Err(ResultError::MissingField("nvme.parameters"))
        ));
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = loader().load(tmp.path(), RunKind::ReadInfo).await.unwrap_err();
        assert!(matches!(err, ResultError::Read { .. }));
    }

    #[tokio::test]
    async fn truncated_json_is_invalid() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("nvme.info.json"), br#"{"_metadata": {"#).unwrap();
        let err = loader().load(tmp.path(), RunKind::ReadInfo).await.unwrap_err();
        assert!(matches!(err, ResultError::InvalidJson(_)));
    }

    #[tokio::test]
    async fn verify_requires_rule_violations() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("nvme.info.json"),
            serde_json::to_vec(&fixture()).unwrap(),
        )
        .unwrap();
        let err = loader().load(tmp.path(), RunKind::VerifyInfo).await.unwrap_err();
        assert!(matches!(err, ResultError::MissingField("rule violations")));

        let mut with_rules = fixture();
        with_rules["rule violations"] = json!([{ "rule": "Temperature", "actual": "80C" }]);
        std::fs::write(
            tmp.path().join("nvme.info.json"),
            serde_json::to_vec(&with_rules).unwrap(),
        )
        .unwrap();
        let parsed = loader().load(tmp.path(), RunKind::VerifyInfo).await.unwrap();
        assert_eq!(
            parsed.rule_violations().and_then(|v| v.as_array()).map(|v| v.len()),
            Some(1)
        );
    }

    #[tokio::test]
    async fn compare_requires_both_mismatch_lists() {
        let mut v = fixture();
        v["compare mismatches"] = json!([]);
        let parsed = parse_result(&serde_json::to_vec(&v).unwrap()).unwrap();
        assert!(matches!(
            validate_for_kind(&parsed, RunKind::CompareInfo),
            Err(ResultError::MissingField("all mismatches"))
        ));
    }

    #[tokio::test]
    async fn trace_is_read_lossily() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(loader().read_trace(tmp.path()).await, None);

        std::fs::write(tmp.path().join("nvmecmd.trace.log"), b"line one\n\xffline two\n").unwrap();
        let trace = loader().read_trace(tmp.path()).await.unwrap();
        assert!(trace.starts_with("line one"));
        assert!(trace.contains("line two"));
    }
}
