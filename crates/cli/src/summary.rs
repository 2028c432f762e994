//! End-of-run summary printed after a completed diagnostic

use colored::Colorize;
use scriptprobe_core::application::DiagnosticReport;
use scriptprobe_core::domain::Verdict;
use scriptprobe_core::port::ExportProbe;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Check")]
    check: String,
    #[tabled(rename = "Observed")]
    observed: String,
}

fn row(check: impl Into<String>, observed: impl Into<String>) -> SummaryRow {
    SummaryRow {
        check: check.into(),
        observed: observed.into(),
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn rows(report: &DiagnosticReport) -> Vec<SummaryRow> {
    let tally = &report.tally;

    let target = match report.pid {
        Some(pid) => format!("{} (pid {})", report.process_name, pid),
        None => report.process_name.clone(),
    };

    let export = match (&tally.export_check_error, tally.export_present) {
        (Some(err), _) => format!("check failed: {}", err),
        (None, Some(true)) => "registered".to_string(),
        (None, Some(false)) => "not registered".to_string(),
        (None, None) => "not reported".to_string(),
    };

    let keys = match &tally.export_keys {
        Some(keys) if keys.is_empty() => "(none)".to_string(),
        Some(keys) => keys.join(", "),
        None => "-".to_string(),
    };

    let host_probe = match &report.host_probe {
        ExportProbe::Visible => "visible".to_string(),
        ExportProbe::Missing { available } => format!("missing (have: {})", available.join(", ")),
        ExportProbe::Unsupported => "unsupported by backend".to_string(),
        ExportProbe::Failed(err) => format!("failed: {}", err),
    };

    vec![
        row("Target", target),
        row("Messages received", tally.messages.to_string()),
        row("Boot marker", yes_no(tally.boot)),
        row("Finished marker", yes_no(tally.finished)),
        row("Fatal marker", yes_no(tally.fatal)),
        row(format!("Export '{}'", report.export_name), export),
        row("Export keys", keys),
        row("Host-side probe", host_probe),
        row("Runtime errors", tally.runtime_errors.to_string()),
        row("Unparsed messages", tally.unparsed.to_string()),
        row("Waited", format!("{:.1}s", report.waited.as_secs_f64())),
    ]
}

fn verdict_line(verdict: Verdict) -> String {
    let text = format!("{:?}: {}", verdict, verdict.describe());
    match verdict {
        Verdict::Healthy => format!("{} {}", "✓".green().bold(), text.green().bold()),
        Verdict::Incomplete | Verdict::ExportMissing => {
            format!("{} {}", "!".yellow().bold(), text.yellow().bold())
        }
        _ => format!("{} {}", "✗".red().bold(), text.red().bold()),
    }
}

/// Render the table and verdict; the verdict never affects the exit code
pub fn render_report(report: &DiagnosticReport) -> String {
    let table = Table::new(rows(report)).to_string();
    format!(
        "{}\n\n{}\n\n{}",
        "Diagnostic summary".cyan().bold(),
        table,
        verdict_line(report.verdict())
    )
}
