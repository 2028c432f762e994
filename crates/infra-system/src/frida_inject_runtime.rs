// frida-inject runtime implementation
// reason: tokio::process for the injector child, nix for graceful stop on unix
//
// Protocol of the tool's stdout: one JSON message per line for everything the
// script sends; plain text for console output. Errors starting the script go
// to stderr and the tool exits non-zero.
use async_trait::async_trait;
use serde_json::{json, Value};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use scriptprobe_core::port::instrumentation::{
    AttachError, DetachError, ExportProbe, InjectError, InjectedSession, InstrumentationRuntime,
};
use scriptprobe_core::port::{select_target, MessageHandler, ProcessLocator};

/// Cap on retained stderr text used for load error reports
const MAX_STDERR_BYTES: usize = 8 * 1024;

/// How long to wait for output readers to drain after the child exits
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Injector settings
#[derive(Debug, Clone)]
pub struct FridaInjectConfig {
    /// Path or name of the `frida-inject` executable
    pub tool: PathBuf,
    /// JavaScript runtime passed as `-R` (`qjs` or `v8`)
    pub js_runtime: Option<String>,
    /// Max wait for the first message after spawning the injector
    pub boot_timeout: Duration,
    /// Max wait for `--version` during attach
    pub version_timeout: Duration,
    /// Grace period between SIGTERM and SIGKILL on detach
    pub shutdown_grace: Duration,
    /// Where wrapped scripts are written before injection
    pub scratch_dir: PathBuf,
}

impl Default for FridaInjectConfig {
    fn default() -> Self {
        Self {
            tool: PathBuf::from("frida-inject"),
            js_runtime: None,
            boot_timeout: Duration::from_secs(5),
            version_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(2),
            scratch_dir: std::env::temp_dir(),
        }
    }
}

/// Instrumentation runtime driving the `frida-inject` tool
pub struct FridaInjectRuntime {
    config: Arc<FridaInjectConfig>,
    locator: Arc<dyn ProcessLocator>,
}

impl FridaInjectRuntime {
    /// Create a new runtime
    ///
    /// # Example
    /// ```ignore
    /// let runtime = FridaInjectRuntime::new(
    ///     FridaInjectConfig::default(),
    ///     Arc::new(SysinfoProcessLocator::new()),
    /// );
    /// ```
    pub fn new(config: FridaInjectConfig, locator: Arc<dyn ProcessLocator>) -> Self {
        Self {
            config: Arc::new(config),
            locator,
        }
    }

    /// Run `<tool> --version` to make sure the injector is usable
    async fn check_tool(&self) -> Result<String, AttachError> {
        let tool = self.config.tool.display().to_string();

        let output = timeout(
            self.config.version_timeout,
            Command::new(&self.config.tool)
                .arg("--version")
                .stdin(Stdio::null())
                .output(),
        )
        .await
        .map_err(|_| AttachError::Backend(format!("{} --version timed out", tool)))?
        .map_err(|e| AttachError::Backend(format!("cannot run {}: {}", tool, e)))?;

        if !output.status.success() {
            return Err(AttachError::Backend(format!(
                "{} --version exited with {}: {}",
                tool,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl InstrumentationRuntime for FridaInjectRuntime {
    async fn attach(&self, process_name: &str) -> Result<Box<dyn InjectedSession>, AttachError> {
        let locator = Arc::clone(&self.locator);
        let name = process_name.to_string();
        let matches = tokio::task::spawn_blocking(move || locator.find_by_name(&name))
            .await
            .map_err(|e| AttachError::Backend(format!("process lookup failed: {}", e)))?;

        let target = select_target(&matches)
            .cloned()
            .ok_or_else(|| AttachError::ProcessNotFound(process_name.to_string()))?;

        if matches.len() > 1 {
            warn!(
                process = %process_name,
                pids = ?matches.iter().map(|p| p.pid).collect::<Vec<_>>(),
                chosen = target.pid,
                "Several processes match; attaching to the lowest pid"
            );
        }

        let version = self.check_tool().await?;
        info!(
            tool = %self.config.tool.display(),
            version = %version,
            pid = target.pid,
            "Injector ready"
        );

        Ok(Box::new(FridaInjectSession::new(
            Arc::clone(&self.config),
            target.pid,
        )))
    }
}

/// One injector child bound to one target pid
pub struct FridaInjectSession {
    config: Arc<FridaInjectConfig>,
    pid: u32,
    loaded: bool,
    child: Option<Child>,
    script_file: Option<PathBuf>,
    readers: Vec<JoinHandle<()>>,
}

enum Startup {
    Reported,
    Exited(std::io::Result<ExitStatus>),
    StdoutClosed,
    TimedOut,
}

impl FridaInjectSession {
    fn new(config: Arc<FridaInjectConfig>, pid: u32) -> Self {
        Self {
            config,
            pid,
            loaded: false,
            child: None,
            script_file: None,
            readers: Vec::new(),
        }
    }

    fn spawn_injector(&self, script: &Path) -> Result<Child, InjectError> {
        let mut cmd = Command::new(&self.config.tool);
        cmd.arg("-p")
            .arg(self.pid.to_string())
            .arg("-s")
            .arg(script);
        if let Some(runtime) = &self.config.js_runtime {
            cmd.arg("-R").arg(runtime);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                InjectError::Load(format!(
                    "cannot spawn {}: {}",
                    self.config.tool.display(),
                    e
                ))
            })
    }

    async fn remove_script_file(&mut self) {
        if let Some(path) = self.script_file.take() {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                debug!(path = %path.display(), error = %e, "Could not remove scratch script");
            }
        }
    }
}

#[async_trait]
impl InjectedSession for FridaInjectSession {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    async fn load_script(
        &mut self,
        source: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), InjectError> {
        if self.loaded {
            return Err(InjectError::AlreadyLoaded);
        }
        self.loaded = true;

        let path = self
            .config
            .scratch_dir
            .join(format!("scriptprobe-{}.js", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, source).await?;
        self.script_file = Some(path.clone());

        let mut child = self.spawn_injector(&path)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| InjectError::Load("injector stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| InjectError::Load("injector stderr unavailable".to_string()))?;

        let (first_tx, mut first_rx) = oneshot::channel();
        let mut stdout_task = tokio::spawn(forward_stdout(stdout, handler, first_tx));
        let stderr_text = Arc::new(Mutex::new(String::new()));
        let stderr_task = tokio::spawn(collect_stderr(stderr, Arc::clone(&stderr_text)));

        info!(
            pid = self.pid,
            script = %path.display(),
            "Injector started, waiting for the script to report"
        );

        let startup = tokio::select! {
            biased;
            first = &mut first_rx => {
                if first.is_ok() { Startup::Reported } else { Startup::StdoutClosed }
            }
            status = child.wait() => Startup::Exited(status),
            _ = tokio::time::sleep(self.config.boot_timeout) => Startup::TimedOut,
        };

        // The child may exit right after printing; drain stdout before deciding
        let startup = match startup {
            Startup::Exited(status) => {
                let _ = timeout(DRAIN_TIMEOUT, &mut stdout_task).await;
                if first_rx.try_recv().is_ok() {
                    Startup::Reported
                } else {
                    Startup::Exited(status)
                }
            }
            other => other,
        };

        self.child = Some(child);

        match startup {
            Startup::Reported => {
                self.readers.push(stdout_task);
                self.readers.push(stderr_task);
                Ok(())
            }
            Startup::TimedOut => {
                self.readers.push(stdout_task);
                self.readers.push(stderr_task);
                Err(InjectError::BootTimeout(
                    self.config.boot_timeout.as_millis() as u64,
                ))
            }
            Startup::Exited(_) | Startup::StdoutClosed => {
                let _ = timeout(DRAIN_TIMEOUT, stderr_task).await;
                self.readers.push(stdout_task);

                let status = match startup {
                    Startup::Exited(Ok(status)) => status.to_string(),
                    Startup::Exited(Err(e)) => format!("wait failed: {}", e),
                    _ => "output closed".to_string(),
                };
                let stderr = match stderr_text.lock() {
                    Ok(text) => text.trim().to_string(),
                    Err(poisoned) => poisoned.into_inner().trim().to_string(),
                };
                if stderr.is_empty() {
                    Err(InjectError::Load(format!("injector stopped ({})", status)))
                } else {
                    Err(InjectError::Load(format!("{} ({})", stderr, status)))
                }
            }
        }
    }

    async fn probe_export(&mut self, name: &str) -> ExportProbe {
        // frida-inject exposes no RPC listing to the host
        debug!(export = %name, "Host-side export listing not available via frida-inject");
        ExportProbe::Unsupported
    }

    async fn detach(&mut self) -> Result<(), DetachError> {
        let result = match self.child.take() {
            Some(child) => stop_child(child, self.config.shutdown_grace).await,
            None => Ok(()),
        };

        for reader in self.readers.drain(..) {
            reader.abort();
        }
        self.remove_script_file().await;

        result
    }
}

impl Drop for FridaInjectSession {
    fn drop(&mut self) {
        for reader in self.readers.drain(..) {
            reader.abort();
        }
        if let Some(path) = self.script_file.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Turn one stdout line into a runtime message
///
/// JSON objects with a `type` pass through; anything else is console output
/// and becomes a `log` message.
fn as_message(line: &str) -> Cow<'_, str> {
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(obj)) if obj.get("type").is_some_and(Value::is_string) => {
            Cow::Borrowed(line)
        }
        _ => Cow::Owned(json!({"type": "log", "level": "info", "payload": line}).to_string()),
    }
}

async fn forward_stdout(
    stdout: ChildStdout,
    handler: Arc<dyn MessageHandler>,
    first: oneshot::Sender<()>,
) {
    let mut lines = BufReader::new(stdout).lines();
    let mut first = Some(first);

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim_end();
                if line.is_empty() {
                    continue;
                }
                handler.on_message(&as_message(line));
                if let Some(tx) = first.take() {
                    let _ = tx.send(());
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read injector output");
                break;
            }
        }
    }
}

async fn collect_stderr(stderr: ChildStderr, buffer: Arc<Mutex<String>>) {
    let mut lines = BufReader::new(stderr).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        warn!(line = %line, "frida-inject stderr");
        if let Ok(mut buf) = buffer.lock() {
            if buf.len() + line.len() < MAX_STDERR_BYTES {
                buf.push_str(&line);
                buf.push('\n');
            }
        }
    }
}

/// Stop the injector: SIGTERM first on unix, kill after the grace period
async fn stop_child(mut child: Child, grace: Duration) -> Result<(), DetachError> {
    if let Ok(Some(status)) = child.try_wait() {
        debug!(status = %status, "Injector already exited");
        return Ok(());
    }

    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            info!(pid = pid, "Sending SIGTERM to injector");
            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                match timeout(grace, child.wait()).await {
                    Ok(Ok(_)) => return Ok(()),
                    Ok(Err(e)) => return Err(DetachError(e.to_string())),
                    Err(_) => warn!(pid = pid, "Injector ignored SIGTERM, killing"),
                }
            }
        }
    }

    #[cfg(not(unix))]
    let _ = grace;

    child
        .kill()
        .await
        .map_err(|e| DetachError(format!("kill failed: {}", e)))
}
