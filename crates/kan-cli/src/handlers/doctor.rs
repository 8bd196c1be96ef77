use std::path::Path;

use crate::cli::DoctorArgs;
use crate::context;
use crate::output;

/// Returns whether the project is healthy (no error-level findings).
pub async fn handle(dir: &Path, args: DoctorArgs, json: bool) -> anyhow::Result<bool> {
    let ctx = context::open(dir).await?;
    let mut doctor = ctx.doctor();
    if let Ok(store) = context::global_store() {
        doctor = doctor.with_global(store);
    }

    if args.fix {
        let summary = doctor.fix().await?;
        if !json && summary.total() > 0 {
            println!("Applied {} fix(es).", summary.total());
        }
    }

    let report = doctor.audit().await?;
    let healthy = !report.has_errors();

    if json {
        output::success(json, &report, || {});
        return Ok(healthy);
    }

    for finding in report.errors() {
        let board = finding
            .board
            .as_deref()
            .map(|b| format!(" [{b}]"))
            .unwrap_or_default();
        let subject = finding
            .subject
            .as_deref()
            .map(|s| format!(" {s}:"))
            .unwrap_or_default();
        println!("error{board}{subject} {} ({})", finding.message, finding.issue);
    }
    for finding in report.warnings() {
        let board = finding
            .board
            .as_deref()
            .map(|b| format!(" [{b}]"))
            .unwrap_or_default();
        let subject = finding
            .subject
            .as_deref()
            .map(|s| format!(" {s}:"))
            .unwrap_or_default();
        println!("warning{board}{subject} {} ({})", finding.message, finding.issue);
    }
    if report.findings.is_empty() {
        println!("No issues found.");
    }
    Ok(healthy)
}
