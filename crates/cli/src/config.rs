//! Environment configuration
//!
//! Everything beyond the four command-line flags comes from `SCRIPTPROBE_*`
//! environment variables.

use scriptprobe_core::application::wrapper::DEFAULT_EXPORT_NAME;
use scriptprobe_core::AppError;
use scriptprobe_infra_system::FridaInjectConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub export_name: String,
    pub frida: FridaInjectConfig,
    pub log_format: LogFormat,
    pub log_file: Option<PathBuf>,
}

impl HarnessConfig {
    /// Build from a key lookup (`std::env::var` in the binary, a map in tests)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let export_name = lookup("SCRIPTPROBE_EXPORT")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| DEFAULT_EXPORT_NAME.to_string());
        if export_name.is_empty() {
            return Err(AppError::Config(
                "SCRIPTPROBE_EXPORT must not be empty".to_string(),
            ));
        }

        let mut frida = FridaInjectConfig::default();

        if let Some(tool) = lookup("SCRIPTPROBE_FRIDA_INJECT") {
            frida.tool = PathBuf::from(shellexpand::tilde(&tool).into_owned());
        }

        if let Some(runtime) = lookup("SCRIPTPROBE_JS_RUNTIME") {
            match runtime.as_str() {
                "qjs" | "v8" => frida.js_runtime = Some(runtime),
                other => {
                    return Err(AppError::Config(format!(
                        "SCRIPTPROBE_JS_RUNTIME must be 'qjs' or 'v8', got '{}'",
                        other
                    )))
                }
            }
        }

        if let Some(ms) = lookup("SCRIPTPROBE_BOOT_TIMEOUT_MS") {
            let ms: u64 = ms.trim().parse().map_err(|e| {
                AppError::Config(format!("SCRIPTPROBE_BOOT_TIMEOUT_MS: {}", e))
            })?;
            frida.boot_timeout = Duration::from_millis(ms);
        }

        let log_format = lookup("SCRIPTPROBE_LOG_FORMAT")
            .map(|s| LogFormat::parse(&s))
            .unwrap_or(LogFormat::Compact);

        let log_file = lookup("SCRIPTPROBE_LOG_FILE")
            .filter(|s| !s.trim().is_empty())
            .map(|s| PathBuf::from(shellexpand::tilde(&s).into_owned()));

        Ok(Self {
            export_name,
            frida,
            log_format,
            log_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<HarnessConfig, AppError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        HarnessConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.export_name, "decrypt");
        assert_eq!(cfg.log_format, LogFormat::Compact);
        assert!(cfg.log_file.is_none());
        assert_eq!(cfg.frida.tool, PathBuf::from("frida-inject"));
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("SCRIPTPROBE_EXPORT", "decode"),
            ("SCRIPTPROBE_FRIDA_INJECT", "/opt/frida/frida-inject"),
            ("SCRIPTPROBE_JS_RUNTIME", "v8"),
            ("SCRIPTPROBE_BOOT_TIMEOUT_MS", "1500"),
            ("SCRIPTPROBE_LOG_FORMAT", "JSON"),
            ("SCRIPTPROBE_LOG_FILE", "/tmp/scriptprobe.log"),
        ])
        .unwrap();

        assert_eq!(cfg.export_name, "decode");
        assert_eq!(cfg.frida.tool, PathBuf::from("/opt/frida/frida-inject"));
        assert_eq!(cfg.frida.js_runtime.as_deref(), Some("v8"));
        assert_eq!(cfg.frida.boot_timeout, Duration::from_millis(1500));
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.log_file, Some(PathBuf::from("/tmp/scriptprobe.log")));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(config(&[("SCRIPTPROBE_EXPORT", "  ")]).is_err());
        assert!(config(&[("SCRIPTPROBE_JS_RUNTIME", "duktape")]).is_err());
        assert!(config(&[("SCRIPTPROBE_BOOT_TIMEOUT_MS", "soon")]).is_err());
    }

    #[test]
    fn test_unknown_log_format_falls_back() {
        let cfg = config(&[("SCRIPTPROBE_LOG_FORMAT", "xml")]).unwrap();
        assert_eq!(cfg.log_format, LogFormat::Compact);
    }
}
