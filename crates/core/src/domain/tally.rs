// Stage Tally - what the host observed during one run
// Only flags and counters are kept; message payloads are logged, never stored.

use super::message::ScriptMessage;
use super::stage::StageReport;

/// Per-run observation counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageTally {
    pub messages: usize,
    pub boot: bool,
    pub finished: bool,
    pub fatal: bool,
    pub export_present: Option<bool>,
    pub export_keys: Option<Vec<String>>,
    pub export_check_error: Option<String>,
    pub runtime_errors: usize,
    pub unparsed: usize,
}

/// Overall reading of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No boot marker: the script never started
    NeverStarted,
    /// Body threw at top level
    CrashedAtTopLevel,
    /// Booted but neither finished nor crashed within the window
    Incomplete,
    /// Export registry check itself threw
    ExportCheckFailed,
    /// Body finished but the export is not registered
    ExportMissing,
    /// Body finished and the export is registered
    Healthy,
}

impl Verdict {
    pub fn describe(&self) -> &'static str {
        match self {
            Verdict::NeverStarted => "script never reported boot",
            Verdict::CrashedAtTopLevel => "script threw at top level (see fatal message)",
            Verdict::Incomplete => "script booted but did not finish within the wait window",
            Verdict::ExportCheckFailed => "export registry check failed inside the target",
            Verdict::ExportMissing => "script finished but the export is not registered",
            Verdict::Healthy => "script finished and the export is registered",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Verdict::Healthy)
    }
}

impl StageTally {
    /// Account for one raw message
    pub fn record(&mut self, raw: &str) {
        self.messages += 1;

        let message = match ScriptMessage::parse(raw) {
            Ok(m) => m,
            Err(_) => {
                self.unparsed += 1;
                return;
            }
        };

        match message {
            ScriptMessage::Send { payload } => match StageReport::from_payload(&payload) {
                Some(StageReport::Boot { .. }) => self.boot = true,
                Some(StageReport::Finished { .. }) => self.finished = true,
                Some(StageReport::Fatal { .. }) => self.fatal = true,
                Some(StageReport::Exports {
                    has_export,
                    export_keys,
                    error,
                    ..
                }) => {
                    self.export_present = has_export;
                    self.export_keys = export_keys;
                    self.export_check_error = error;
                }
                None => {}
            },
            ScriptMessage::Error { .. } => self.runtime_errors += 1,
            ScriptMessage::Other(_) => {}
        }
    }

    pub fn verdict(&self) -> Verdict {
        if !self.boot {
            Verdict::NeverStarted
        } else if self.fatal {
            Verdict::CrashedAtTopLevel
        } else if !self.finished {
            Verdict::Incomplete
        } else if self.export_check_error.is_some() {
            Verdict::ExportCheckFailed
        } else {
            match self.export_present {
                Some(true) => Verdict::Healthy,
                Some(false) => Verdict::ExportMissing,
                None => Verdict::Incomplete,
            }
        }
    }
}
