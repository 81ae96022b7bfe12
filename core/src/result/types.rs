use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ResultError;

/// The result document nvmecmd wrote, kept verbatim.
///
/// Only the `_metadata` and `nvme.parameters` objects are required; every
/// other key, including nulls and fields this crate never looks at, is
/// carried through to the consumer unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParsedResult {
    raw: Value,
}

impl ParsedResult {
    pub fn from_value(raw: Value) -> Result<Self, ResultError> {
        if !raw.get("_metadata").is_some_and(Value::is_object) {
            return Err(ResultError::MissingField("_metadata"));
        }
        let parameters = raw.get("nvme").and_then(|nvme| nvme.get("parameters"));
        if !parameters.is_some_and(Value::is_object) {
            return Err(ResultError::MissingField("nvme.parameters"));
        }
        Ok(Self { raw })
    }

    pub fn as_value(&self) -> &Value {
        &self.raw
    }

    pub fn into_value(self) -> Value {
        self.raw
    }

    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.raw.get("_metadata").and_then(Value::as_object)
    }

    pub fn system(&self) -> Option<&Value> {
        self.metadata().and_then(|m| m.get("system"))
    }

    pub fn read_status(&self) -> Option<&Value> {
        self.metadata().and_then(|m| m.get("read status"))
    }

    pub fn host(&self) -> Option<&Value> {
        self.metadata().and_then(|m| m.get("host"))
    }

    pub fn parameters(&self) -> Option<&Map<String, Value>> {
        self.raw
            .get("nvme")
            .and_then(|nvme| nvme.get("parameters"))
            .and_then(Value::as_object)
    }

    /// Entry for one named parameter, usually `{"value": .., "description": ..}`.
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters().and_then(|p| p.get(name))
    }

    pub fn compare_mismatches(&self) -> Option<&Value> {
        self.collection("compare mismatches")
    }

    pub fn all_mismatches(&self) -> Option<&Value> {
        self.collection("all mismatches")
    }

    pub fn rule_violations(&self) -> Option<&Value> {
        self.collection("rule violations")
    }

    fn collection(&self, key: &str) -> Option<&Value> {
        self.raw.get(key).filter(|v| !v.is_null())
    }
}
