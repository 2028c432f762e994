// Message Handler Port
// Callback invoked by the instrumentation runtime for every message the
// injected script emits.

/// Receives raw messages from the target
///
/// Implementations are called from the runtime's delivery mechanism (a reader
/// task or a runtime-owned thread), at arbitrary times relative to the host's
/// wait window. They must never panic or block for long.
pub trait MessageHandler: Send + Sync {
    /// Handle one raw JSON message as delivered by the runtime
    fn on_message(&self, raw: &str);
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::{ScriptMessage, StageReport};
    use std::sync::{Arc, Mutex};

    /// Records every raw message in arrival order
    #[derive(Clone, Default)]
    pub struct RecordingHandler {
        raw: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingHandler {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn raw(&self) -> Vec<String> {
            self.raw.lock().unwrap().clone()
        }

        pub fn count(&self) -> usize {
            self.raw.lock().unwrap().len()
        }

        /// Messages that parsed successfully
        pub fn messages(&self) -> Vec<ScriptMessage> {
            self.raw()
                .iter()
                .filter_map(|raw| ScriptMessage::parse(raw).ok())
                .collect()
        }

        /// Arrival order as labels: stage names for wrapper markers,
        /// "send" for other payloads, "error"/"other" for the remaining kinds
        pub fn timeline(&self) -> Vec<String> {
            self.messages()
                .iter()
                .map(|msg| match msg {
                    ScriptMessage::Send { payload } => StageReport::from_payload(payload)
                        .map(|r| r.stage().as_str().to_string())
                        .unwrap_or_else(|| "send".to_string()),
                    other => other.kind().as_str().to_string(),
                })
                .collect()
        }

        /// Stage reports in arrival order
        pub fn stage_reports(&self) -> Vec<StageReport> {
            self.messages()
                .iter()
                .filter_map(|msg| match msg {
                    ScriptMessage::Send { payload } => StageReport::from_payload(payload),
                    _ => None,
                })
                .collect()
        }
    }

    impl MessageHandler for RecordingHandler {
        fn on_message(&self, raw: &str) {
            self.raw.lock().unwrap().push(raw.to_string());
        }
    }
}
