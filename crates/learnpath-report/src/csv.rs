//! CSV export, one row per learner.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use learnpath_core::report::ProgressReport;

#[derive(Serialize)]
struct LearnerRow<'a> {
    user_id: &'a str,
    average_completion: String,
    complete: usize,
    in_progress: usize,
    not_started: usize,
    status: &'static str,
    overdue_modules: String,
    due_soon_modules: String,
}

/// Write learner rows to any writer.
pub fn write_csv<W: std::io::Write>(report: &ProgressReport, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for u in &report.users {
        wtr.serialize(LearnerRow {
            user_id: &u.user_id,
            average_completion: format!("{:.1}", u.average_completion),
            complete: u.complete,
            in_progress: u.in_progress,
            not_started: u.not_started,
            status: u.status.label(),
            overdue_modules: u.overdue_modules.join(";"),
            due_soon_modules: u.due_soon_modules.join(";"),
        })
        .context("failed to write CSV row")?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write a CSV report to a file.
pub fn write_csv_report(report: &ProgressReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_csv(report, file)
}
