//! Per-user and per-team progress rollups with at-risk detection.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::mastery::GateBook;
use crate::model::{Assignment, ModuleProgress};

/// How far ahead of a due date an incomplete assignment counts as at risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtRiskPolicy {
    pub lookahead_days: u32,
}

impl Default for AtRiskPolicy {
    fn default() -> Self {
        Self { lookahead_days: 7 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleClass {
    Complete,
    InProgress,
    NotStarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnerStatus {
    OnTrack,
    AtRisk,
    Overdue,
}

impl LearnerStatus {
    /// Both approaching and missed deadlines count as at risk.
    pub fn is_at_risk(&self) -> bool {
        !matches!(self, LearnerStatus::OnTrack)
    }

    pub fn label(&self) -> &'static str {
        match self {
            LearnerStatus::OnTrack => "on-track",
            LearnerStatus::AtRisk => "at-risk",
            LearnerStatus::Overdue => "overdue",
        }
    }
}

/// One module's contribution to a user summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSummary {
    pub module_id: String,
    /// Mean requirement ratio as a percentage.
    pub completion: f64,
    pub class: ModuleClass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub user_id: String,
    /// Mean of per-module completion, 0 to 100.
    pub average_completion: f64,
    pub complete: usize,
    pub in_progress: usize,
    pub not_started: usize,
    pub status: LearnerStatus,
    /// Incomplete assignments whose due date has passed.
    #[serde(default)]
    pub overdue_modules: Vec<String>,
    /// Incomplete assignments due within the lookahead window.
    #[serde(default)]
    pub due_soon_modules: Vec<String>,
    #[serde(default)]
    pub modules: Vec<ModuleSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSummary {
    pub members: usize,
    /// Unweighted mean of member averages.
    pub average_completion: f64,
    pub on_track: usize,
    pub at_risk: usize,
    pub overdue: usize,
    pub modules_complete: usize,
    pub modules_in_progress: usize,
    pub modules_not_started: usize,
}

/// Summarize one user's records. Records belonging to other users are
/// ignored.
pub fn summarize_user(
    user_id: &str,
    records: &[ModuleProgress],
    assignments: &[Assignment],
    gates: &GateBook,
    policy: &AtRiskPolicy,
    now: DateTime<Utc>,
) -> UserSummary {
    let mut modules = Vec::new();
    for progress in records.iter().filter(|p| p.user_id == user_id) {
        let eval = gates.evaluate(progress);
        let class = if eval.all_met {
            ModuleClass::Complete
        } else if eval.is_started() || progress.is_started() {
            ModuleClass::InProgress
        } else {
            ModuleClass::NotStarted
        };
        modules.push(ModuleSummary {
            module_id: progress.module_id.clone(),
            completion: eval.completion_ratio() * 100.0,
            class,
        });
    }

    let average_completion = if modules.is_empty() {
        0.0
    } else {
        modules.iter().map(|m| m.completion).sum::<f64>() / modules.len() as f64
    };
    let count = |class: ModuleClass| modules.iter().filter(|m| m.class == class).count();

    let horizon = now + Duration::days(i64::from(policy.lookahead_days));
    let mut overdue_modules = Vec::new();
    let mut due_soon_modules = Vec::new();
    for assignment in assignments.iter().filter(|a| a.user_id == user_id) {
        let complete = modules
            .iter()
            .any(|m| m.module_id == assignment.module_id && m.class == ModuleClass::Complete);
        if complete {
            continue;
        }
        if assignment.due < now {
            overdue_modules.push(assignment.module_id.clone());
        } else if assignment.due <= horizon {
            due_soon_modules.push(assignment.module_id.clone());
        }
    }

    let status = if !overdue_modules.is_empty() {
        LearnerStatus::Overdue
    } else if !due_soon_modules.is_empty() {
        LearnerStatus::AtRisk
    } else {
        LearnerStatus::OnTrack
    };

    UserSummary {
        user_id: user_id.to_string(),
        average_completion,
        complete: count(ModuleClass::Complete),
        in_progress: count(ModuleClass::InProgress),
        not_started: count(ModuleClass::NotStarted),
        status,
        overdue_modules,
        due_soon_modules,
        modules,
    }
}

/// Summarize every user that appears in `records` or `assignments`, ordered
/// by user id.
pub fn summarize_users(
    records: &[ModuleProgress],
    assignments: &[Assignment],
    gates: &GateBook,
    policy: &AtRiskPolicy,
    now: DateTime<Utc>,
) -> Vec<UserSummary> {
    let users: BTreeSet<&str> = records
        .iter()
        .map(|r| r.user_id.as_str())
        .chain(assignments.iter().map(|a| a.user_id.as_str()))
        .collect();
    users
        .into_iter()
        .map(|user| summarize_user(user, records, assignments, gates, policy, now))
        .collect()
}

/// Roll member summaries up into a team summary.
pub fn summarize_team(users: &[UserSummary]) -> TeamSummary {
    let members = users.len();
    let average_completion = if members == 0 {
        0.0
    } else {
        users.iter().map(|u| u.average_completion).sum::<f64>() / members as f64
    };
    let status = |s: LearnerStatus| users.iter().filter(|u| u.status == s).count();
    TeamSummary {
        members,
        average_completion,
        on_track: status(LearnerStatus::OnTrack),
        at_risk: status(LearnerStatus::AtRisk),
        overdue: status(LearnerStatus::Overdue),
        modules_complete: users.iter().map(|u| u.complete).sum(),
        modules_in_progress: users.iter().map(|u| u.in_progress).sum(),
        modules_not_started: users.iter().map(|u| u.not_started).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished(user: &str, module: &str) -> ModuleProgress {
        let mut p = ModuleProgress::new(module, user, 2, 1);
        p.lessons_completed = 2;
        p.labs_completed = 1;
        p.concept_check_score = Some(90);
        p.project_submitted = true;
        p
    }

    fn untouched(user: &str, module: &str) -> ModuleProgress {
        ModuleProgress::new(module, user, 2, 1)
    }

    fn gates() -> GateBook {
        GateBook::new(75)
    }

    #[test]
    fn team_average_is_unweighted_mean_of_members() {
        let mut records = vec![];
        for u in ["a", "b", "c"] {
            records.push(finished(u, "m1"));
        }
        for u in ["d", "e"] {
            records.push(untouched(u, "m1"));
        }
        let now = Utc::now();
        let users = summarize_users(&records, &[], &gates(), &AtRiskPolicy::default(), now);
        assert_eq!(users.len(), 5);
        let team = summarize_team(&users);
        assert!((team.average_completion - 60.0).abs() < 1e-9);
        assert_eq!(team.modules_complete, 3);
        assert_eq!(team.modules_not_started, 2);
    }

    #[test]
    fn module_classes_and_average() {
        let mut partial = untouched("u", "m2");
        partial.lessons_completed = 1;
        let records = vec![finished("u", "m1"), partial, untouched("u", "m3")];
        let summary = summarize_user(
            "u",
            &records,
            &[],
            &gates(),
            &AtRiskPolicy::default(),
            Utc::now(),
        );
        assert_eq!(
            (summary.complete, summary.in_progress, summary.not_started),
            (1, 1, 1)
        );
        // m1: 100, m2: lessons 1/2 -> 12.5, m3: 0
        assert!((summary.average_completion - 37.5).abs() < 1e-9);
        assert_eq!(summary.status, LearnerStatus::OnTrack);
    }

    #[test]
    fn overdue_and_due_soon_assignments() {
        let now = Utc::now();
        let records = vec![untouched("u", "m1"), untouched("u", "m2"), finished("u", "m3")];
        let assignments = vec![
            Assignment {
                user_id: "u".into(),
                module_id: "m1".into(),
                due: now - Duration::days(1),
            },
            Assignment {
                user_id: "u".into(),
                module_id: "m2".into(),
                due: now + Duration::days(3),
            },
            Assignment {
                user_id: "u".into(),
                module_id: "m3".into(),
                due: now - Duration::days(10),
            },
        ];
        let summary = summarize_user(
            "u",
            &records,
            &assignments,
            &gates(),
            &AtRiskPolicy::default(),
            now,
        );
        assert_eq!(summary.status, LearnerStatus::Overdue);
        assert!(summary.status.is_at_risk());
        assert_eq!(summary.overdue_modules, vec!["m1"]);
        assert_eq!(summary.due_soon_modules, vec!["m2"]);
    }

    #[test]
    fn lookahead_is_configurable() {
        let now = Utc::now();
        let records = vec![untouched("u", "m1")];
        let assignments = vec![Assignment {
            user_id: "u".into(),
            module_id: "m1".into(),
            due: now + Duration::days(5),
        }];
        let narrow = AtRiskPolicy { lookahead_days: 2 };
        let wide = AtRiskPolicy { lookahead_days: 7 };
        let s = summarize_user("u", &records, &assignments, &gates(), &narrow, now);
        assert_eq!(s.status, LearnerStatus::OnTrack);
        let s = summarize_user("u", &records, &assignments, &gates(), &wide, now);
        assert_eq!(s.status, LearnerStatus::AtRisk);
    }

    #[test]
    fn assignment_without_progress_counts_as_incomplete() {
        let now = Utc::now();
        let assignments = vec![Assignment {
            user_id: "new".into(),
            module_id: "m1".into(),
            due: now - Duration::hours(1),
        }];
        let users = summarize_users(&[], &assignments, &gates(), &AtRiskPolicy::default(), now);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].status, LearnerStatus::Overdue);
        assert_eq!(users[0].average_completion, 0.0);
    }
}
