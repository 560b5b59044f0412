//! The `learnpath report` command.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;

use learnpath_core::mastery::GateBook;
use learnpath_core::report::{ProgressReport, ProgressSnapshot};
use learnpath_providers::config::load_config_from;
use learnpath_providers::ContentConfig;
use learnpath_report::csv::write_csv_report;
use learnpath_report::html::write_html_report;

use super::workspace::load_merged;

pub fn execute(
    progress_path: PathBuf,
    curriculum: Option<PathBuf>,
    output: Option<PathBuf>,
    format: String,
    lookahead_days: Option<u32>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let snapshot = ProgressSnapshot::load_json(&progress_path)?;

    // Without a curriculum every module gets the standard gate.
    let curriculum_path = curriculum.or_else(|| match &config.content {
        ContentConfig::File { path } if path.exists() => Some(path.clone()),
        _ => None,
    });
    let (gates, title) = match curriculum_path {
        Some(path) => {
            let curriculum = load_merged(&path)?;
            (
                GateBook::from_curriculum(&curriculum, config.concept_check_min_score),
                curriculum.name,
            )
        }
        None => (
            GateBook::new(config.concept_check_min_score),
            "Team progress".to_string(),
        ),
    };

    let mut policy = config.at_risk_policy();
    if let Some(days) = lookahead_days {
        policy.lookahead_days = days;
    }

    let report = ProgressReport::build(&snapshot, &gates, policy, Utc::now());
    print_summary(&report);

    let output = output.unwrap_or_else(|| config.output_dir.clone());
    std::fs::create_dir_all(&output)?;
    let timestamp = report.created_at.format("%Y-%m-%dT%H%M%S");

    let formats: Vec<&str> = if format == "all" {
        vec!["json", "html", "csv"]
    } else {
        format.split(',').map(str::trim).collect()
    };

    for fmt in &formats {
        match *fmt {
            // The summary table above is the text report.
            "text" => {}
            "json" => {
                let path = output.join(format!("report-{timestamp}.json"));
                report.save_json(&path)?;
                eprintln!("Report saved to: {}", path.display());
            }
            "html" => {
                let path = output.join(format!("report-{timestamp}.html"));
                write_html_report(&report, &title, &path)?;
                eprintln!("HTML report: {}", path.display());
            }
            "csv" => {
                let path = output.join(format!("report-{timestamp}.csv"));
                write_csv_report(&report, &path)?;
                eprintln!("CSV report: {}", path.display());
            }
            _ => {
                eprintln!("Unknown format: {fmt}");
            }
        }
    }

    Ok(())
}

fn print_summary(report: &ProgressReport) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec![
        "Learner",
        "Completion",
        "Complete",
        "In progress",
        "Not started",
        "Status",
    ]);

    for u in &report.users {
        table.add_row(vec![
            Cell::new(&u.user_id),
            Cell::new(format!("{:.1}%", u.average_completion)),
            Cell::new(u.complete),
            Cell::new(u.in_progress),
            Cell::new(u.not_started),
            Cell::new(u.status.label()),
        ]);
    }

    let team = &report.team;
    println!("{table}");
    println!(
        "Team: {} learners, {:.1}% average completion, {} on track, {} at risk, {} overdue",
        team.members, team.average_completion, team.on_track, team.at_risk, team.overdue
    );
}
