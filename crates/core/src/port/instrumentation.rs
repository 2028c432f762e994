// Instrumentation Runtime Port
// Abstraction over the dynamic instrumentation backend that attaches to a
// process and runs injected scripts inside it.

use crate::port::MessageHandler;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Attach errors
#[derive(Error, Debug)]
pub enum AttachError {
    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Attach failed: {0}")]
    Backend(String),
}

/// Script creation / load errors
#[derive(Error, Debug)]
pub enum InjectError {
    #[error("A script is already loaded in this session")]
    AlreadyLoaded,

    #[error("Script load failed: {0}")]
    Load(String),

    #[error("Script sent no message within {0}ms of injection")]
    BootTimeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Detach errors (always swallowed by callers)
#[derive(Error, Debug)]
#[error("Detach failed: {0}")]
pub struct DetachError(pub String);

/// Host-side view of an export, obtained without invoking it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportProbe {
    /// Export is listed by the runtime's RPC surface
    Visible,
    /// Export is not listed; `available` holds what is
    Missing { available: Vec<String> },
    /// Backend has no host-side export listing
    Unsupported,
    /// Listing was attempted and failed
    Failed(String),
}

/// Instrumentation runtime
///
/// Implementations:
/// - FridaInjectRuntime: drives the `frida-inject` tool as a child process
/// - MockRuntime: scripted outcomes for tests
#[async_trait]
pub trait InstrumentationRuntime: Send + Sync {
    /// Attach to a running process by name
    ///
    /// # Errors
    /// - AttachError::ProcessNotFound if no process has that name
    /// - AttachError::Backend for any other failure
    async fn attach(&self, process_name: &str) -> Result<Box<dyn InjectedSession>, AttachError>;
}

/// An attached session owning at most one injected script
#[async_trait]
pub trait InjectedSession: Send {
    /// Process id of the target, when the backend knows it
    fn pid(&self) -> Option<u32>;

    /// Create the script from `source`, subscribe `handler` to its messages,
    /// and load it
    ///
    /// # Errors
    /// - InjectError::AlreadyLoaded on a second call
    /// - InjectError::Load / BootTimeout / Io when the script cannot be started
    async fn load_script(
        &mut self,
        source: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), InjectError>;

    /// Check whether `name` is visible on the host-side export surface
    ///
    /// Must not invoke the export. Advisory only.
    async fn probe_export(&mut self, name: &str) -> ExportProbe;

    /// Detach from the target, unloading the script
    async fn detach(&mut self) -> Result<(), DetachError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::StageReport;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Attach outcome
    #[derive(Debug, Clone)]
    pub enum MockAttach {
        Ok,
        ProcessNotFound,
        Fail(String),
    }

    /// What the wrapped script does once loaded
    #[derive(Debug, Clone)]
    pub enum MockScript {
        /// Body runs to completion having registered `exports`
        Completes { exports: Vec<String> },
        /// Body completes but the export registry check throws
        ExportCheckFails(String),
        /// Body throws at top level
        Throws { error: String, stack: Option<String> },
        /// Runtime refuses the script before the body runs
        LoadFails(String),
    }

    /// Call counters shared with the test
    #[derive(Debug, Clone, Default)]
    pub struct MockCalls {
        pub attach: usize,
        pub load: usize,
        pub probe: usize,
        pub detach: usize,
        pub sources: Vec<String>,
    }

    /// Mock runtime emitting the messages the wrapper would emit
    pub struct MockRuntime {
        attach: MockAttach,
        script: MockScript,
        export_name: String,
        host_probe: ExportProbe,
        detach_error: Option<String>,
        late_message: bool,
        calls: Arc<Mutex<MockCalls>>,
    }

    impl MockRuntime {
        pub fn new(script: MockScript) -> Self {
            Self {
                attach: MockAttach::Ok,
                script,
                export_name: "decrypt".to_string(),
                host_probe: ExportProbe::Unsupported,
                detach_error: None,
                late_message: false,
                calls: Arc::new(Mutex::new(MockCalls::default())),
            }
        }

        pub fn healthy() -> Self {
            Self::new(MockScript::Completes {
                exports: vec!["decrypt".to_string()],
            })
        }

        pub fn with_attach(mut self, attach: MockAttach) -> Self {
            self.attach = attach;
            self
        }

        pub fn with_export_name(mut self, name: impl Into<String>) -> Self {
            self.export_name = name.into();
            self
        }

        pub fn with_host_probe(mut self, probe: ExportProbe) -> Self {
            self.host_probe = probe;
            self
        }

        pub fn with_detach_error(mut self, message: impl Into<String>) -> Self {
            self.detach_error = Some(message.into());
            self
        }

        /// Deliver one more message while detaching
        pub fn with_late_message(mut self) -> Self {
            self.late_message = true;
            self
        }

        pub fn calls(&self) -> MockCalls {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl InstrumentationRuntime for MockRuntime {
        async fn attach(
            &self,
            process_name: &str,
        ) -> Result<Box<dyn InjectedSession>, AttachError> {
            self.calls.lock().unwrap().attach += 1;

            match &self.attach {
                MockAttach::Ok => Ok(Box::new(MockSession {
                    script: self.script.clone(),
                    export_name: self.export_name.clone(),
                    host_probe: self.host_probe.clone(),
                    detach_error: self.detach_error.clone(),
                    late_message: self.late_message,
                    handler: None,
                    calls: Arc::clone(&self.calls),
                })),
                MockAttach::ProcessNotFound => {
                    Err(AttachError::ProcessNotFound(process_name.to_string()))
                }
                MockAttach::Fail(msg) => Err(AttachError::Backend(msg.clone())),
            }
        }
    }

    struct MockSession {
        script: MockScript,
        export_name: String,
        host_probe: ExportProbe,
        detach_error: Option<String>,
        late_message: bool,
        handler: Option<Arc<dyn MessageHandler>>,
        calls: Arc<Mutex<MockCalls>>,
    }

    fn send(handler: &dyn MessageHandler, report: StageReport) {
        let raw = json!({"type": "send", "payload": report.to_payload()});
        handler.on_message(&raw.to_string());
    }

    fn boot() -> StageReport {
        StageReport::Boot {
            time: chrono::Utc::now().to_rfc3339(),
            msg: "wrapper entered".to_string(),
        }
    }

    fn finished() -> StageReport {
        StageReport::Finished {
            msg: "top-level body completed".to_string(),
        }
    }

    #[async_trait]
    impl InjectedSession for MockSession {
        fn pid(&self) -> Option<u32> {
            Some(4242)
        }

        async fn load_script(
            &mut self,
            source: &str,
            handler: Arc<dyn MessageHandler>,
        ) -> Result<(), InjectError> {
            {
                let mut calls = self.calls.lock().unwrap();
                calls.load += 1;
                calls.sources.push(source.to_string());
            }

            if self.handler.is_some() {
                return Err(InjectError::AlreadyLoaded);
            }

            match &self.script {
                MockScript::LoadFails(msg) => return Err(InjectError::Load(msg.clone())),
                MockScript::Completes { exports } => {
                    send(handler.as_ref(), boot());
                    send(handler.as_ref(), finished());
                    send(
                        handler.as_ref(),
                        StageReport::Exports {
                            export: self.export_name.clone(),
                            has_export: Some(exports.contains(&self.export_name)),
                            export_keys: Some(exports.clone()),
                            error: None,
                        },
                    );
                }
                MockScript::ExportCheckFails(error) => {
                    send(handler.as_ref(), boot());
                    send(handler.as_ref(), finished());
                    send(
                        handler.as_ref(),
                        StageReport::Exports {
                            export: self.export_name.clone(),
                            has_export: None,
                            export_keys: None,
                            error: Some(error.clone()),
                        },
                    );
                }
                MockScript::Throws { error, stack } => {
                    send(handler.as_ref(), boot());
                    send(
                        handler.as_ref(),
                        StageReport::Fatal {
                            error: error.clone(),
                            stack: stack.clone(),
                        },
                    );
                    // The rethrown error surfaces as a runtime error message
                    let mut raw = json!({"type": "error", "description": error});
                    if let Some(stack) = stack {
                        raw["stack"] = Value::String(stack.clone());
                    }
                    handler.on_message(&raw.to_string());
                }
            }

            self.handler = Some(handler);
            Ok(())
        }

        async fn probe_export(&mut self, _name: &str) -> ExportProbe {
            self.calls.lock().unwrap().probe += 1;
            self.host_probe.clone()
        }

        async fn detach(&mut self) -> Result<(), DetachError> {
            self.calls.lock().unwrap().detach += 1;

            if self.late_message {
                if let Some(handler) = &self.handler {
                    handler.on_message(&json!({"type": "send", "payload": "late"}).to_string());
                }
            }

            match &self.detach_error {
                Some(msg) => Err(DetachError(msg.clone())),
                None => Ok(()),
            }
        }
    }
}
