//! Progress report snapshots with JSON persistence and regression detection.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{summarize_team, summarize_users, AtRiskPolicy, TeamSummary, UserSummary};
use crate::mastery::GateBook;
use crate::model::{Assignment, ModuleProgress};

/// Raw progress data a report is built from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    #[serde(default)]
    pub records: Vec<ModuleProgress>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

impl ProgressSnapshot {
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read progress from {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse progress JSON: {}", path.display()))
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        write_json(self, path, "progress")
    }

    /// Progress records belonging to one learner.
    pub fn for_user<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a ModuleProgress> {
        self.records.iter().filter(move |r| r.user_id == user_id)
    }
}

/// A point-in-time progress report for a team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub policy: AtRiskPolicy,
    pub team: TeamSummary,
    pub users: Vec<UserSummary>,
}

impl ProgressReport {
    pub fn build(
        snapshot: &ProgressSnapshot,
        gates: &GateBook,
        policy: AtRiskPolicy,
        now: DateTime<Utc>,
    ) -> Self {
        let users = summarize_users(&snapshot.records, &snapshot.assignments, gates, &policy, now);
        let team = summarize_team(&users);
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            policy,
            team,
            users,
        }
    }

    /// Learners flagged at risk or overdue.
    pub fn at_risk_users(&self) -> impl Iterator<Item = &UserSummary> {
        self.users.iter().filter(|u| u.status.is_at_risk())
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        write_json(self, path, "report")
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: ProgressReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Compare this report against a baseline. `threshold` is in percentage
    /// points of average completion.
    pub fn compare(&self, baseline: &ProgressReport, threshold: f64) -> RegressionReport {
        let averages = |report: &ProgressReport| -> HashMap<String, f64> {
            report
                .users
                .iter()
                .map(|u| (u.user_id.clone(), u.average_completion))
                .collect()
        };
        let baseline_scores = averages(baseline);
        let current_scores = averages(self);

        let mut regressions = Vec::new();
        let mut improvements = Vec::new();
        let mut unchanged = 0usize;
        let mut new_learners = 0usize;

        for (user_id, &current) in &current_scores {
            let Some(&before) = baseline_scores.get(user_id) else {
                new_learners += 1;
                continue;
            };
            let delta = current - before;
            let change = CompletionChange {
                user_id: user_id.clone(),
                baseline: before,
                current,
                delta,
            };
            if delta < -threshold {
                regressions.push(change);
            } else if delta > threshold {
                improvements.push(change);
            } else {
                unchanged += 1;
            }
        }
        regressions.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        improvements.sort_by(|a, b| a.user_id.cmp(&b.user_id));

        let removed_learners = baseline_scores
            .keys()
            .filter(|k| !current_scores.contains_key(*k))
            .count();

        RegressionReport {
            baseline_average: baseline.team.average_completion,
            current_average: self.team.average_completion,
            regressions,
            improvements,
            unchanged,
            new_learners,
            removed_learners,
        }
    }
}

fn write_json<T: Serialize>(value: &T, path: &Path, what: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {what}"))?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, json)
        .with_context(|| format!("failed to write {what} to {}", path.display()))?;
    Ok(())
}

/// Result of comparing two reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionReport {
    pub baseline_average: f64,
    pub current_average: f64,
    /// Learners whose completion went down.
    pub regressions: Vec<CompletionChange>,
    /// Learners whose completion went up.
    pub improvements: Vec<CompletionChange>,
    /// Learners with no significant change.
    pub unchanged: usize,
    /// Learners in current but not baseline.
    pub new_learners: usize,
    /// Learners in baseline but not current.
    pub removed_learners: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionChange {
    pub user_id: String,
    pub baseline: f64,
    pub current: f64,
    pub delta: f64,
}

impl RegressionReport {
    /// Format the comparison as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**Team average:** {:.1}% -> {:.1}%\n\n",
            self.baseline_average, self.current_average
        ));
        md.push_str(&format!(
            "**Summary:** {} regressions, {} improvements, {} unchanged, {} new, {} removed\n\n",
            self.regressions.len(),
            self.improvements.len(),
            self.unchanged,
            self.new_learners,
            self.removed_learners
        ));

        for (title, rows) in [
            ("Regressions", &self.regressions),
            ("Improvements", &self.improvements),
        ] {
            if rows.is_empty() {
                continue;
            }
            md.push_str(&format!("### {title}\n\n"));
            md.push_str("| Learner | Baseline | Current | Delta |\n");
            md.push_str("|---------|----------|---------|-------|\n");
            for c in rows {
                md.push_str(&format!(
                    "| {} | {:.1}% | {:.1}% | {:+.1}% |\n",
                    c.user_id, c.baseline, c.current, c.delta
                ));
            }
            md.push('\n');
        }

        md
    }

    /// Returns true if there are any regressions.
    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty()
    }
}
