// Message Sink - turns script messages into log lines

use crate::application::panic_guard::execute_guarded;
use crate::domain::{ScriptMessage, StageReport};
use crate::port::MessageHandler;
use std::panic::AssertUnwindSafe;
use tracing::{error, info, warn};

/// Log target for everything the injected script says
pub const SCRIPT_LOG_TARGET: &str = "scriptprobe::script";

/// Longest raw text echoed back on a parse failure
const MAX_RAW_ECHO: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One human-readable line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub text: String,
}

impl LogEntry {
    fn info(text: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Info,
            text: text.into(),
        }
    }

    fn warn(text: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Warn,
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Error,
            text: text.into(),
        }
    }
}

/// Render a message as log entries
///
/// A stack trace always gets its own entry.
pub fn render(message: &ScriptMessage) -> Vec<LogEntry> {
    match message {
        ScriptMessage::Send { payload } => match StageReport::from_payload(payload) {
            Some(report) => render_stage(&report),
            None => vec![LogEntry::info(format!("[script send] {}", payload))],
        },
        ScriptMessage::Error {
            description,
            stack,
            file_name,
            line_number,
        } => {
            let location = match (file_name, line_number) {
                (Some(file), Some(line)) => format!(" ({}:{})", file, line),
                (Some(file), None) => format!(" ({})", file),
                _ => String::new(),
            };
            let mut entries = vec![LogEntry::error(format!(
                "[script error] {}{}",
                description, location
            ))];
            if let Some(stack) = stack {
                entries.push(LogEntry::error(format!("[script stack]\n{}", stack)));
            }
            entries
        }
        ScriptMessage::Other(raw) => vec![LogEntry::info(format!("[script message] {}", raw))],
    }
}

fn render_stage(report: &StageReport) -> Vec<LogEntry> {
    match report {
        StageReport::Boot { time, msg } => {
            vec![LogEntry::info(format!("[stage boot] {} at {}", msg, time))]
        }
        StageReport::Finished { msg } => vec![LogEntry::info(format!("[stage finished] {}", msg))],
        StageReport::Exports {
            export,
            error: Some(error),
            ..
        } => vec![LogEntry::error(format!(
            "[stage exports] check for '{}' failed: {}",
            export, error
        ))],
        StageReport::Exports {
            export,
            has_export,
            export_keys,
            error: None,
        } => {
            let keys = export_keys
                .as_ref()
                .map(|k| format!("[{}]", k.join(", ")))
                .unwrap_or_else(|| "none".to_string());
            let text = match has_export {
                Some(present) => {
                    format!("[stage exports] '{}' present={} keys={}", export, present, keys)
                }
                None => format!("[stage exports] '{}' present=unknown keys={}", export, keys),
            };
            if *has_export == Some(true) {
                vec![LogEntry::info(text)]
            } else {
                vec![LogEntry::warn(text)]
            }
        }
        StageReport::Fatal { error, stack } => {
            let mut entries = vec![LogEntry::error(format!("[stage fatal] {}", error))];
            if let Some(stack) = stack {
                entries.push(LogEntry::error(format!("[stage fatal stack]\n{}", stack)));
            }
            entries
        }
    }
}

/// Production sink: parse, render, log
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSink;

impl LoggingSink {
    pub fn new() -> Self {
        Self
    }

    fn handle(&self, raw: &str) {
        match ScriptMessage::parse(raw) {
            Ok(message) => {
                for entry in render(&message) {
                    emit(&entry);
                }
            }
            Err(e) => {
                error!(
                    target: SCRIPT_LOG_TARGET,
                    error = %e,
                    raw = %truncate(raw, MAX_RAW_ECHO),
                    "Failed to parse script message"
                );
            }
        }
    }
}

impl MessageHandler for LoggingSink {
    fn on_message(&self, raw: &str) {
        // Never unwind into the runtime's delivery loop
        let _ = execute_guarded(AssertUnwindSafe(|| self.handle(raw)));
    }
}

fn emit(entry: &LogEntry) {
    match entry.level {
        LogLevel::Info => info!(target: SCRIPT_LOG_TARGET, "{}", entry.text),
        LogLevel::Warn => warn!(target: SCRIPT_LOG_TARGET, "{}", entry.text),
        LogLevel::Error => error!(target: SCRIPT_LOG_TARGET, "{}", entry.text),
    }
}

fn truncate(raw: &str, max: usize) -> &str {
    if raw.len() <= max {
        return raw;
    }
    let mut end = max;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    &raw[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_send_payload_logged_as_info() {
        let entries = render(&ScriptMessage::Send {
            payload: json!({"key": "abc"}),
        });
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Info);
        assert!(entries[0].text.contains(r#""key":"abc""#));
    }

    #[test]
    fn test_error_with_stack_yields_two_entries() {
        let entries = render(&ScriptMessage::Error {
            description: "TypeError: not a function".to_string(),
            stack: Some("TypeError: not a function\n    at main (/script1.js:10)".to_string()),
            file_name: Some("/script1.js".to_string()),
            line_number: Some(10),
        });

        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.level == LogLevel::Error));
        assert_eq!(
            entries[0].text,
            "[script error] TypeError: not a function (/script1.js:10)"
        );
        assert!(entries[1].text.starts_with("[script stack]\n"));
    }

    #[test]
    fn test_error_without_stack_yields_one_entry() {
        let entries = render(&ScriptMessage::Error {
            description: "Error: x".to_string(),
            stack: None,
            file_name: None,
            line_number: None,
        });
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "[script error] Error: x");
    }

    #[test]
    fn test_other_kind_logged_raw() {
        let entries = render(&ScriptMessage::Other(json!({"type": "log", "payload": "hi"})));
        assert_eq!(entries.len(), 1);
        assert!(entries[0].text.starts_with("[script message] "));
        assert!(entries[0].text.contains(r#""payload":"hi""#));
    }

    #[test]
    fn test_exports_present_and_missing_levels() {
        let present = render(&ScriptMessage::Send {
            payload: json!({"stage": "exports", "export": "decrypt", "hasDecrypt": true, "exportKeys": ["decrypt", "init"]}),
        });
        assert_eq!(present[0].level, LogLevel::Info);
        assert_eq!(
            present[0].text,
            "[stage exports] 'decrypt' present=true keys=[decrypt, init]"
        );

        let missing = render(&ScriptMessage::Send {
            payload: json!({"stage": "exports", "export": "decrypt", "hasDecrypt": false, "exportKeys": null}),
        });
        assert_eq!(missing[0].level, LogLevel::Warn);
        assert!(missing[0].text.ends_with("present=false keys=none"));
    }

    #[test]
    fn test_exports_check_error() {
        let entries = render(&ScriptMessage::Send {
            payload: json!({"stage": "exports", "export": "decrypt", "error": "ReferenceError: rpc"}),
        });
        assert_eq!(entries[0].level, LogLevel::Error);
        assert!(entries[0].text.contains("failed: ReferenceError: rpc"));
    }

    #[test]
    fn test_fatal_stack_separate_entry() {
        let entries = render(&ScriptMessage::Send {
            payload: json!({"stage": "fatal", "error": "Error: boom", "stack": "Error: boom\n    at x"}),
        });
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "[stage fatal] Error: boom");
    }

    #[test]
    fn test_sink_survives_garbage() {
        let sink = LoggingSink::new();
        sink.on_message("Failed to attach: unexpected output");
        sink.on_message("");
        sink.on_message("[1,2,3]");
        sink.on_message(r#"{"type":"send","payload":{"stage":"boot","time":"t","msg":"m"}}"#);
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        assert_eq!(truncate("abc", 10), "abc");
        assert_eq!(truncate("héllo", 2), "h");
    }
}
