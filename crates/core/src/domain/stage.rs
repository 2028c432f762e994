// Stage Reports - markers sent by the script wrapper
//
// Wire shape (payload of a `send` message):
//   {"stage":"boot","time":"...","msg":"..."}
//   {"stage":"finished","msg":"..."}
//   {"stage":"exports","export":"decrypt","hasDecrypt":true,"exportKeys":["decrypt"]}
//   {"stage":"exports","export":"decrypt","error":"..."}
//   {"stage":"fatal","error":"...","stack":"..."|null}

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wrapper stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Boot,
    Finished,
    Exports,
    Fatal,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Boot => "boot",
            Stage::Finished => "finished",
            Stage::Exports => "exports",
            Stage::Fatal => "fatal",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed view of a wrapper stage payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "lowercase")]
pub enum StageReport {
    Boot {
        #[serde(default)]
        time: String,
        #[serde(default)]
        msg: String,
    },
    Finished {
        #[serde(default)]
        msg: String,
    },
    Exports {
        export: String,
        #[serde(
            rename = "hasDecrypt",
            alias = "hasExport",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        has_export: Option<bool>,
        #[serde(rename = "exportKeys", default)]
        export_keys: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Fatal {
        error: String,
        #[serde(default)]
        stack: Option<String>,
    },
}

impl StageReport {
    /// Interpret a `send` payload as a stage report
    ///
    /// Returns None for payloads that are not wrapper markers (the wrapped
    /// body is free to `send()` its own data).
    pub fn from_payload(payload: &Value) -> Option<Self> {
        payload.get("stage")?;
        serde_json::from_value(payload.clone()).ok()
    }

    pub fn stage(&self) -> Stage {
        match self {
            StageReport::Boot { .. } => Stage::Boot,
            StageReport::Finished { .. } => Stage::Finished,
            StageReport::Exports { .. } => Stage::Exports,
            StageReport::Fatal { .. } => Stage::Fatal,
        }
    }

    pub fn to_payload(&self) -> Value {
        // Serializing a plain enum of strings/bools cannot fail
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_boot_report() {
        let report = StageReport::from_payload(&json!({
            "stage": "boot",
            "time": "2026-10-18T09:00:00+00:00",
            "msg": "wrapper entered"
        }))
        .unwrap();

        assert_eq!(report.stage(), Stage::Boot);
    }

    #[test]
    fn test_exports_report_present() {
        let report = StageReport::from_payload(&json!({
            "stage": "exports",
            "export": "decrypt",
            "hasDecrypt": true,
            "exportKeys": ["decrypt", "init"]
        }))
        .unwrap();

        assert_eq!(
            report,
            StageReport::Exports {
                export: "decrypt".to_string(),
                has_export: Some(true),
                export_keys: Some(vec!["decrypt".to_string(), "init".to_string()]),
                error: None,
            }
        );
    }

    #[test]
    fn test_exports_report_check_failed() {
        let report = StageReport::from_payload(&json!({
            "stage": "exports",
            "export": "decrypt",
            "error": "TypeError: cannot read property"
        }))
        .unwrap();

        match report {
            StageReport::Exports {
                has_export, error, ..
            } => {
                assert_eq!(has_export, None);
                assert!(error.unwrap().contains("TypeError"));
            }
            other => panic!("unexpected report: {:?}", other),
        }
    }

    #[test]
    fn test_fatal_report_null_stack() {
        let report = StageReport::from_payload(&json!({
            "stage": "fatal",
            "error": "Error: boom",
            "stack": null
        }))
        .unwrap();

        assert_eq!(
            report,
            StageReport::Fatal {
                error: "Error: boom".to_string(),
                stack: None
            }
        );
    }

    #[test]
    fn test_non_stage_payload_ignored() {
        assert!(StageReport::from_payload(&json!({"key": "abc"})).is_none());
        assert!(StageReport::from_payload(&json!("plain string")).is_none());
        assert!(StageReport::from_payload(&json!({"stage": "warmup"})).is_none());
    }

    #[test]
    fn test_payload_shape_matches_wrapper() {
        let payload = StageReport::Exports {
            export: "decrypt".to_string(),
            has_export: Some(false),
            export_keys: None,
            error: None,
        }
        .to_payload();

        assert_eq!(payload["stage"], "exports");
        assert_eq!(payload["hasDecrypt"], false);
        assert!(payload["exportKeys"].is_null());
        assert!(payload.get("error").is_none());
    }

    #[test]
    fn test_exports_flag_accepts_older_field_name() {
        let report = StageReport::from_payload(&json!({
            "stage": "exports",
            "export": "decrypt",
            "hasExport": true
        }))
        .unwrap();

        match report {
            StageReport::Exports { has_export, .. } => assert_eq!(has_export, Some(true)),
            other => panic!("unexpected report: {:?}", other),
        }
    }
}
