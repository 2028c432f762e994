//! scriptprobe - attach to a process, inject a script, and report how far it got

mod config;
mod logging;
mod summary;

use clap::Parser;
use colored::Colorize;
use config::HarnessConfig;
use scriptprobe_core::application::diagnostic::constants::{
    DEFAULT_PROCESS_NAME, DEFAULT_SCRIPT_PATH, DEFAULT_WAIT_SECS, EXIT_FAILURE, EXIT_SUCCESS,
};
use scriptprobe_core::application::diagnostic::wait_from_secs;
use scriptprobe_core::application::{
    DiagnosticReport, DiagnosticRequest, DiagnosticRunner, LoggingSink, ScriptWrapper,
};
use scriptprobe_core::port::time_provider::SystemTimeProvider;
use scriptprobe_core::AppError;
use scriptprobe_infra_system::{FridaInjectRuntime, SysinfoProcessLocator};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "scriptprobe")]
#[command(about = "Script injection diagnostic harness", long_about = None)]
#[command(version)]
struct Cli {
    /// Run the injection diagnostic
    #[arg(long)]
    diag: bool,

    /// Name of the process to attach to
    #[arg(long = "proc", env = "SCRIPTPROBE_PROC", default_value = DEFAULT_PROCESS_NAME)]
    process: String,

    /// Path of the script to inject
    #[arg(long = "js", env = "SCRIPTPROBE_JS", default_value = DEFAULT_SCRIPT_PATH)]
    script: String,

    /// Seconds to collect script messages before detaching
    #[arg(long, default_value_t = DEFAULT_WAIT_SECS, value_parser = parse_wait)]
    wait: f64,
}

fn parse_wait(value: &str) -> Result<f64, String> {
    let secs: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("'{}' is not a number: {}", value, e))?;
    wait_from_secs(secs).map_err(|e| e.to_string())?;
    Ok(secs)
}

fn print_usage() {
    println!("{}", "scriptprobe only provides the --diag mode.".bold());
    println!();
    println!("  Example: scriptprobe --diag --proc QQMusic.exe --js hook_qq_music.js --wait 3");
    println!("  Run with --help for all options.");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    ExitCode::from(run(cli, |key| std::env::var(key).ok()).await)
}

/// Returns the process exit status
///
/// Environment settings are only read in diagnostic mode, so the usage path
/// never fails.
async fn run(cli: Cli, env: impl Fn(&str) -> Option<String>) -> u8 {
    if !cli.diag {
        print_usage();
        return EXIT_SUCCESS;
    }

    let config = match HarnessConfig::from_lookup(env) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            return EXIT_FAILURE;
        }
    };

    let _log_guard = match logging::init_logging(config.log_format, config.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            return EXIT_FAILURE;
        }
    };

    match run_diagnostic(&cli, &config).await {
        Ok(report) => {
            println!("{}", summary::render_report(&report));
            EXIT_SUCCESS
        }
        // Already logged by the runner
        Err(AppError::Diagnostic(e)) => e.exit_code(),
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    }
}

async fn run_diagnostic(cli: &Cli, config: &HarnessConfig) -> Result<DiagnosticReport, AppError> {
    let script_path = PathBuf::from(shellexpand::tilde(&cli.script).into_owned());
    let request = DiagnosticRequest::new(&cli.process, script_path, cli.wait)?;

    // Dependency injection
    let locator = Arc::new(SysinfoProcessLocator::new());
    let runtime = Arc::new(FridaInjectRuntime::new(config.frida.clone(), locator));
    let runner = DiagnosticRunner::new(
        runtime,
        Arc::new(LoggingSink::new()),
        Arc::new(SystemTimeProvider),
        ScriptWrapper::new(config.export_name.clone()),
    );

    Ok(runner.run(&request).await?)
}
