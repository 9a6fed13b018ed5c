//! Output formatting utilities for the CLI
//!
//! Tables for the bootstrap plan, run reports and host status, plus
//! colored status lines.

use tabled::{
    settings::{Style, Width},
    Table, Tabled,
};

use dt_core::sequencer::PlannedStep;
use dt_core::status::HostStatus;
use dt_core::{SequenceReport, StepOutcome};

/// Format the bootstrap plan as an ASCII table
///
/// Each step lists the commands it would run, in order. Skipped steps are
/// marked in the policy column.
pub fn format_plan(plan: &[PlannedStep]) -> String {
    #[derive(Tabled)]
    struct PlanRow {
        #[tabled(rename = "#")]
        index: usize,
        #[tabled(rename = "STEP")]
        step: String,
        #[tabled(rename = "POLICY")]
        policy: String,
        #[tabled(rename = "COMMAND")]
        command: String,
    }

    let rows: Vec<PlanRow> = plan
        .iter()
        .enumerate()
        .map(|(i, planned)| PlanRow {
            index: i + 1,
            step: planned.step.to_string(),
            policy: if planned.skipped {
                "skipped".to_string()
            } else {
                planned.policy.to_string()
            },
            command: planned.actions.join("\n"),
        })
        .collect();

    Table::new(rows)
        .with(Style::rounded())
        .with(Width::wrap(120))
        .to_string()
}

/// Describe how a step ended
pub fn describe_outcome(outcome: &StepOutcome) -> String {
    match outcome {
        StepOutcome::Succeeded => "ok".to_string(),
        StepOutcome::Downloaded { bytes } => format!("ok ({})", format_bytes(*bytes)),
        StepOutcome::Recovered { install, repair } => {
            let install = install
                .map(|o| format!("install exited with {}", o))
                .unwrap_or_else(|| "install not started".to_string());
            let repair = repair
                .map(|o| format!("repair exited with {}", o))
                .unwrap_or_else(|| "repair not started".to_string());
            format!("{}, {}", install, repair)
        }
        StepOutcome::TunnelExited(outcome) => format!("tunnel exited with {}", outcome),
        StepOutcome::Skipped => "skipped".to_string(),
    }
}

/// Format a finished run as an ASCII table
pub fn format_report(report: &SequenceReport) -> String {
    #[derive(Tabled)]
    struct ReportRow {
        #[tabled(rename = "STEP")]
        step: String,
        #[tabled(rename = "RESULT")]
        result: String,
    }

    let rows: Vec<ReportRow> = report
        .steps
        .iter()
        .map(|(step, outcome)| ReportRow {
            step: step.to_string(),
            result: describe_outcome(outcome),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format host status: one row per package, then the tunnel and artifact
pub fn format_status(status: &HostStatus) -> String {
    #[derive(Tabled)]
    struct PackageRow {
        #[tabled(rename = "PACKAGE")]
        name: String,
        #[tabled(rename = "INSTALLED")]
        installed: String,
    }

    let rows: Vec<PackageRow> = status
        .packages
        .iter()
        .map(|p| PackageRow {
            name: p.name.clone(),
            installed: if p.installed { "yes" } else { "no" }.to_string(),
        })
        .collect();

    let mut output = String::new();
    if rows.is_empty() {
        output.push_str("No packages configured\n");
    } else {
        output.push_str(&Table::new(rows).with(Style::rounded()).to_string());
        output.push('\n');
    }

    output.push_str(&format!(
        "Tunnel binary: {}\n",
        status.tunnel_version.as_deref().unwrap_or("not found")
    ));
    match &status.artifact_path {
        Some(path) => output.push_str(&format!(
            "Tunnel package: {} ({})\n",
            path.display(),
            if status.artifact_present {
                "downloaded"
            } else {
                "not downloaded"
            }
        )),
        None => output.push_str("Tunnel package: no release for this platform\n"),
    }

    output
}

/// Format a byte count in human-readable form
fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;

    if bytes < KIB {
        format!("{} B", bytes)
    } else if bytes < MIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    }
}

/// Print a success message in green with a checkmark prefix
///
/// Outputs to stdout with green coloring for positive feedback to the user.
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr with red coloring for error feedback to the user.
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow with a warning symbol prefix
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan with an info symbol prefix
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
