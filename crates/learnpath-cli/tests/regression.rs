//! Regression detection integration tests.
//!
//! Tests the report comparison workflow end-to-end, including building
//! reports from progress snapshots, JSON persistence and regression
//! detection.

use chrono::{Duration, Utc};

use learnpath_core::aggregate::{AtRiskPolicy, LearnerStatus};
use learnpath_core::mastery::GateBook;
use learnpath_core::model::{Assignment, ModuleProgress};
use learnpath_core::report::{ProgressReport, ProgressSnapshot};

/// A four-lesson, lab-free module record. Completion is the mean of the
/// lesson ratio, the (always met) lab requirement, the concept check and
/// the project.
fn make_progress(
    user_id: &str,
    module_id: &str,
    lessons: u32,
    concept_check: Option<u32>,
    project: bool,
) -> ModuleProgress {
    let mut progress = ModuleProgress::new(module_id, user_id, 4, 0);
    for i in 0..lessons {
        progress.complete_lesson(&format!("l{i}"));
    }
    if let Some(score) = concept_check {
        progress.record_concept_check(score);
    }
    if project {
        progress.submit_project();
    }
    progress
}

fn make_report(records: Vec<ModuleProgress>, assignments: Vec<Assignment>) -> ProgressReport {
    let snapshot = ProgressSnapshot {
        records,
        assignments,
    };
    ProgressReport::build(
        &snapshot,
        &GateBook::new(75),
        AtRiskPolicy { lookahead_days: 7 },
        Utc::now(),
    )
}

fn complete(user_id: &str) -> ModuleProgress {
    make_progress(user_id, "m1", 4, Some(90), true)
}

fn halfway(user_id: &str) -> ModuleProgress {
    make_progress(user_id, "m1", 2, None, false)
}

#[test]
fn detect_regression_when_progress_is_lost() {
    let baseline = make_report(vec![complete("alice"), halfway("bob")], vec![]);
    let current = make_report(vec![halfway("alice"), halfway("bob")], vec![]);

    let report = current.compare(&baseline, 1.0);

    assert!(report.has_regressions());
    assert_eq!(report.regressions.len(), 1);
    assert_eq!(report.regressions[0].user_id, "alice");
    assert!((report.regressions[0].delta + 62.5).abs() < 1e-9);
    assert_eq!(report.unchanged, 1);
}

#[test]
fn detect_improvement() {
    let baseline = make_report(vec![halfway("alice")], vec![]);
    let current = make_report(vec![complete("alice")], vec![]);

    let report = current.compare(&baseline, 1.0);

    assert!(!report.has_regressions());
    assert_eq!(report.improvements.len(), 1);
    assert!(report.improvements[0].delta > 0.0);
    assert!(report.current_average > report.baseline_average);
}

#[test]
fn no_change_with_identical_progress() {
    let baseline = make_report(vec![complete("alice"), halfway("bob")], vec![]);

    let report = baseline.compare(&baseline, 1.0);

    assert!(!report.has_regressions());
    assert!(report.improvements.is_empty());
    assert_eq!(report.unchanged, 2);
}

#[test]
fn detect_new_and_removed_learners() {
    let baseline = make_report(vec![complete("alice"), halfway("bob")], vec![]);
    let current = make_report(vec![complete("alice"), halfway("carol")], vec![]);

    let report = current.compare(&baseline, 1.0);

    assert_eq!(report.new_learners, 1);
    assert_eq!(report.removed_learners, 1);
    assert_eq!(report.unchanged, 1);
}

#[test]
fn threshold_controls_sensitivity() {
    // One lesson of four is 6.25 points of average completion.
    let baseline = make_report(vec![make_progress("alice", "m1", 3, None, false)], vec![]);
    let current = make_report(vec![make_progress("alice", "m1", 2, None, false)], vec![]);

    let strict = current.compare(&baseline, 1.0);
    assert!(strict.has_regressions());

    let relaxed = current.compare(&baseline, 10.0);
    assert!(!relaxed.has_regressions());
    assert_eq!(relaxed.unchanged, 1);
}

#[test]
fn overdue_assignments_flag_learners() {
    let now = Utc::now();
    let report = make_report(
        vec![complete("alice"), halfway("bob")],
        vec![
            Assignment {
                user_id: "alice".into(),
                module_id: "m1".into(),
                due: now - Duration::days(1),
            },
            Assignment {
                user_id: "bob".into(),
                module_id: "m1".into(),
                due: now - Duration::days(1),
            },
            Assignment {
                user_id: "carol".into(),
                module_id: "m2".into(),
                due: now + Duration::days(3),
            },
        ],
    );

    let status = |user: &str| {
        report
            .users
            .iter()
            .find(|u| u.user_id == user)
            .map(|u| u.status)
            .unwrap()
    };
    assert_eq!(status("alice"), LearnerStatus::OnTrack, "completed work is never overdue");
    assert_eq!(status("bob"), LearnerStatus::Overdue);
    assert_eq!(status("carol"), LearnerStatus::AtRisk);

    let flagged: Vec<_> = report.at_risk_users().map(|u| u.user_id.as_str()).collect();
    assert_eq!(flagged, vec!["bob", "carol"]);
    assert_eq!(report.team.members, 3);
    assert_eq!(report.team.overdue, 1);
    assert_eq!(report.team.at_risk, 1);
}

#[test]
fn json_roundtrip_preserves_data() {
    let report = make_report(vec![complete("alice"), halfway("bob")], vec![]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reports").join("report.json");

    report.save_json(&path).unwrap();
    let loaded = ProgressReport::load_json(&path).unwrap();

    assert_eq!(loaded.id, report.id);
    assert_eq!(loaded.users.len(), 2);
    assert_eq!(loaded.users[0].user_id, "alice");
    assert_eq!(loaded.users[0].complete, 1);
    assert_eq!(loaded.users[1].in_progress, 1);
    assert_eq!(loaded.policy.lookahead_days, 7);
    assert!(loaded.compare(&report, 0.0).regressions.is_empty());
}

#[test]
fn snapshot_roundtrip_builds_same_report() {
    let snapshot = ProgressSnapshot {
        records: vec![complete("alice"), halfway("bob")],
        assignments: vec![],
    };

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("progress.json");
    snapshot.save_json(&path).unwrap();
    let loaded = ProgressSnapshot::load_json(&path).unwrap();

    assert_eq!(loaded.records, snapshot.records);
    assert_eq!(loaded.for_user("bob").count(), 1);
}

#[test]
fn markdown_report_format() {
    let baseline = make_report(vec![complete("alice")], vec![]);
    let current = make_report(vec![halfway("alice")], vec![]);

    let report = current.compare(&baseline, 1.0);
    let md = report.to_markdown();

    assert!(md.contains("Regressions"));
    assert!(md.contains("alice"));
    assert!(md.contains("1 regressions"));
    assert!(md.contains("-62.5%"));
}
