// Diagnostic Runner - attach, inject, collect, detach

pub mod constants;
mod error;

pub use error::DiagnosticError;

use crate::application::gate::MessageGate;
use crate::application::wrapper::ScriptWrapper;
use crate::domain::{DomainError, StageTally, Verdict};
use crate::port::{
    ExportProbe, InjectedSession, InstrumentationRuntime, MessageHandler, TimeProvider,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Parameters of one run
#[derive(Debug, Clone)]
pub struct DiagnosticRequest {
    pub process_name: String,
    pub script_path: PathBuf,
    pub wait: Duration,
}

impl DiagnosticRequest {
    /// Build a request, validating the wait window
    ///
    /// # Errors
    /// - DomainError::InvalidWait if `wait_secs` is negative, NaN or infinite
    pub fn new(
        process_name: impl Into<String>,
        script_path: impl Into<PathBuf>,
        wait_secs: f64,
    ) -> crate::domain::error::Result<Self> {
        Ok(Self {
            process_name: process_name.into(),
            script_path: script_path.into(),
            wait: wait_from_secs(wait_secs)?,
        })
    }
}

/// Convert a user-supplied number of seconds into a wait window
pub fn wait_from_secs(secs: f64) -> crate::domain::error::Result<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(DomainError::InvalidWait(format!(
            "{} (expected a non-negative number of seconds)",
            secs
        )));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| DomainError::InvalidWait(e.to_string()))
}

/// Outcome of a run that reached the wait window
#[derive(Debug, Clone)]
pub struct DiagnosticReport {
    pub process_name: String,
    pub pid: Option<u32>,
    pub export_name: String,
    pub host_probe: ExportProbe,
    pub tally: StageTally,
    pub waited: Duration,
}

impl DiagnosticReport {
    pub fn verdict(&self) -> Verdict {
        self.tally.verdict()
    }
}

/// Runs the attach-inject-wait-detach sequence
pub struct DiagnosticRunner {
    runtime: Arc<dyn InstrumentationRuntime>,
    sink: Arc<dyn MessageHandler>,
    time_provider: Arc<dyn TimeProvider>,
    wrapper: ScriptWrapper,
}

impl DiagnosticRunner {
    pub fn new(
        runtime: Arc<dyn InstrumentationRuntime>,
        sink: Arc<dyn MessageHandler>,
        time_provider: Arc<dyn TimeProvider>,
        wrapper: ScriptWrapper,
    ) -> Self {
        Self {
            runtime,
            sink,
            time_provider,
            wrapper,
        }
    }

    /// Run one diagnostic
    ///
    /// The script is read before anything touches the target. Once attached,
    /// the session is detached exactly once on every path; detach errors are
    /// logged and ignored. Errors raised by the script inside the target do
    /// not fail the run.
    pub async fn run(
        &self,
        req: &DiagnosticRequest,
    ) -> Result<DiagnosticReport, DiagnosticError> {
        let body = read_script(&req.script_path).await?;

        info!(
            process = %req.process_name,
            script = %req.script_path.display(),
            bytes = body.len(),
            "Attaching to target process"
        );

        let mut session = match self.runtime.attach(&req.process_name).await {
            Ok(session) => session,
            Err(e) => {
                let err = DiagnosticError::from(e);
                match &err {
                    DiagnosticError::ProcessNotFound(name) => error!(
                        process = %name,
                        "Process not found; start the target program before running --diag"
                    ),
                    other => error!(error = %other, "Attach failed"),
                }
                return Err(err);
            }
        };

        let pid = session.pid();
        info!(process = %req.process_name, pid = ?pid, "Attached");

        let gate = Arc::new(MessageGate::new(Arc::clone(&self.sink)));
        let outcome = self
            .inject_and_collect(session.as_mut(), &gate, &body, req.wait)
            .await;

        release(session, &gate).await;

        let host_probe = outcome?;
        let report = DiagnosticReport {
            process_name: req.process_name.clone(),
            pid,
            export_name: self.wrapper.export_name().to_string(),
            host_probe,
            tally: gate.tally(),
            waited: req.wait,
        };

        info!(
            messages = report.tally.messages,
            verdict = ?report.verdict(),
            "Diagnostic finished; inspect [script error] and [stage fatal/exports] lines above"
        );
        Ok(report)
    }

    async fn inject_and_collect(
        &self,
        session: &mut dyn InjectedSession,
        gate: &Arc<MessageGate>,
        body: &str,
        wait: Duration,
    ) -> Result<ExportProbe, DiagnosticError> {
        let wrapped = self.wrapper.wrap(body, self.time_provider.now());
        let handler: Arc<dyn MessageHandler> = Arc::clone(gate) as Arc<dyn MessageHandler>;

        if let Err(e) = session.load_script(&wrapped, handler).await {
            error!(error = %e, "Failed to load/run script");
            return Err(DiagnosticError::Inject(e));
        }
        info!(export = %self.wrapper.export_name(), "Script loaded");

        let probe = session.probe_export(self.wrapper.export_name()).await;
        log_host_probe(self.wrapper.export_name(), &probe);

        info!(
            wait_secs = wait.as_secs_f64(),
            "Waiting to collect script messages"
        );
        tokio::time::sleep(wait).await;

        Ok(probe)
    }
}

/// Close the gate, then detach; detach failures never escape
async fn release(mut session: Box<dyn InjectedSession>, gate: &MessageGate) {
    gate.close();
    match session.detach().await {
        Ok(()) => debug!("Detached from target"),
        Err(e) => debug!(error = %e, "Detach failed (ignored)"),
    }
}

async fn read_script(path: &Path) -> Result<String, DiagnosticError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let shown = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
            error!(path = %shown.display(), "Script file not found");
            return Err(DiagnosticError::ScriptMissing(path.to_path_buf()));
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Cannot read script file");
            return Err(DiagnosticError::ScriptUnreadable {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    String::from_utf8(bytes).map_err(|e| {
        error!(path = %path.display(), error = %e, "Script file is not valid UTF-8");
        DiagnosticError::ScriptUnreadable {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        }
    })
}

fn log_host_probe(export: &str, probe: &ExportProbe) {
    // Advisory: the in-target exports stage is authoritative
    match probe {
        ExportProbe::Visible => info!(
            export = %export,
            "Host side: export is listed (confirm with hasDecrypt=true in the exports stage)"
        ),
        ExportProbe::Missing { available } => warn!(
            export = %export,
            available = ?available,
            "Host side: export not listed"
        ),
        ExportProbe::Unsupported => debug!(
            export = %export,
            "Host side: backend cannot list exports; relying on the exports stage"
        ),
        ExportProbe::Failed(reason) => warn!(
            export = %export,
            error = %reason,
            "Host side: export listing failed (script RPC likely not registered)"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::sink::LoggingSink;
    use crate::port::instrumentation::mocks::{MockAttach, MockRuntime, MockScript};
    use crate::port::time_provider::SystemTimeProvider;

    fn runner(runtime: Arc<MockRuntime>) -> DiagnosticRunner {
        DiagnosticRunner::new(
            runtime,
            Arc::new(LoggingSink::new()),
            Arc::new(SystemTimeProvider),
            ScriptWrapper::default(),
        )
    }

    fn script_file(name: &str, body: &str) -> PathBuf {
        let path =
            std::env::temp_dir().join(format!("scriptprobe-core-{}-{}.js", std::process::id(), name));
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_wait_validation() {
        assert_eq!(wait_from_secs(3.0).unwrap(), Duration::from_secs(3));
        assert_eq!(wait_from_secs(0.0).unwrap(), Duration::ZERO);
        assert!(wait_from_secs(-1.0).is_err());
        assert!(wait_from_secs(f64::NAN).is_err());
        assert!(wait_from_secs(f64::INFINITY).is_err());
    }

    #[test]
    fn test_missing_script_skips_attach() {
        let runtime = Arc::new(MockRuntime::healthy());
        let req = DiagnosticRequest::new("QQMusic.exe", "/nonexistent/hook_qq_music.js", 5.0)
            .unwrap();

        let result = tokio_test::block_on(runner(runtime.clone()).run(&req));

        assert!(matches!(result, Err(DiagnosticError::ScriptMissing(_))));
        assert_eq!(runtime.calls().attach, 0);
    }

    #[tokio::test]
    async fn test_healthy_run_detaches_once() {
        let runtime = Arc::new(MockRuntime::healthy());
        let path = script_file("healthy", "rpc.exports = { decrypt: function () {} };");
        let req = DiagnosticRequest::new("QQMusic.exe", &path, 0.0).unwrap();

        let report = runner(runtime.clone()).run(&req).await.unwrap();

        assert_eq!(report.verdict(), Verdict::Healthy);
        assert_eq!(report.pid, Some(4242));
        assert_eq!(runtime.calls().detach, 1);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_attach_failure_does_not_detach() {
        let runtime = Arc::new(
            MockRuntime::healthy().with_attach(MockAttach::Fail("access denied".into())),
        );
        let path = script_file("attach-fail", "// attach failure case");
        let req = DiagnosticRequest::new("QQMusic.exe", &path, 0.0).unwrap();

        let err = runner(runtime.clone()).run(&req).await.unwrap_err();

        assert!(matches!(err, DiagnosticError::Attach(_)));
        assert_eq!(runtime.calls().load, 0);
        assert_eq!(runtime.calls().detach, 0);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_load_failure_still_detaches() {
        let runtime = Arc::new(MockRuntime::new(MockScript::LoadFails(
            "SyntaxError: unexpected token".into(),
        )));
        let path = script_file("load-fail", "function (");
        let req = DiagnosticRequest::new("QQMusic.exe", &path, 0.0).unwrap();

        let err = runner(runtime.clone()).run(&req).await.unwrap_err();

        assert!(matches!(err, DiagnosticError::Inject(_)));
        assert_eq!(runtime.calls().probe, 0);
        assert_eq!(runtime.calls().detach, 1);
        let _ = std::fs::remove_file(path);
    }
}
