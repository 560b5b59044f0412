//! Learning streaks and the achievement catalog.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Consecutive-day activity tracking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakTracker {
    pub current: u32,
    pub longest: u32,
    #[serde(default)]
    pub last_activity: Option<DateTime<Utc>>,
}

impl StreakTracker {
    /// Register activity at `now`. Days are UTC calendar days.
    pub fn record_activity(&mut self, now: DateTime<Utc>) {
        match self.last_activity {
            None => {
                self.current = 1;
            }
            Some(last) => {
                let gap = (now.date_naive() - last.date_naive()).num_days();
                match gap {
                    i64::MIN..=0 => {}
                    1 => self.current += 1,
                    _ => self.current = 1,
                }
            }
        }
        self.longest = self.longest.max(self.current);
        if self.last_activity.map_or(true, |last| now > last) {
            self.last_activity = Some(now);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    ModulesCompleted(u32),
    StreakDays(u32),
    PerfectScore,
    TimeSpentMinutes(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub points: u32,
    pub criterion: Criterion,
}

pub const ACHIEVEMENTS: &[Achievement] = &[
    Achievement {
        id: "first-module",
        name: "First Steps",
        description: "Complete your first training module",
        points: 50,
        criterion: Criterion::ModulesCompleted(1),
    },
    Achievement {
        id: "module-master-5",
        name: "Knowledge Seeker",
        description: "Complete 5 training modules",
        points: 150,
        criterion: Criterion::ModulesCompleted(5),
    },
    Achievement {
        id: "module-master-10",
        name: "Dedicated Learner",
        description: "Complete 10 training modules",
        points: 300,
        criterion: Criterion::ModulesCompleted(10),
    },
    Achievement {
        id: "module-master-25",
        name: "Training Champion",
        description: "Complete 25 training modules",
        points: 500,
        criterion: Criterion::ModulesCompleted(25),
    },
    Achievement {
        id: "streak-3",
        name: "Consistency",
        description: "Learn for 3 consecutive days",
        points: 75,
        criterion: Criterion::StreakDays(3),
    },
    Achievement {
        id: "streak-7",
        name: "Week Warrior",
        description: "Learn for 7 consecutive days",
        points: 150,
        criterion: Criterion::StreakDays(7),
    },
    Achievement {
        id: "streak-30",
        name: "Monthly Master",
        description: "Learn for 30 consecutive days",
        points: 500,
        criterion: Criterion::StreakDays(30),
    },
    Achievement {
        id: "perfect-score",
        name: "Perfectionist",
        description: "Achieve a perfect score on any quiz",
        points: 100,
        criterion: Criterion::PerfectScore,
    },
    Achievement {
        id: "time-10",
        name: "Time Invested",
        description: "Spend 10 hours learning",
        points: 100,
        criterion: Criterion::TimeSpentMinutes(600),
    },
];

pub fn find(id: &str) -> Option<&'static Achievement> {
    ACHIEVEMENTS.iter().find(|a| a.id == id)
}

/// The numbers achievements are checked against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LearnerStats {
    pub modules_completed: u32,
    pub current_streak: u32,
    pub best_quiz_percentage: Option<u32>,
    pub time_spent_minutes: u64,
}

impl Criterion {
    fn is_satisfied(&self, stats: &LearnerStats) -> bool {
        match *self {
            Criterion::ModulesCompleted(n) => stats.modules_completed >= n,
            Criterion::StreakDays(n) => stats.current_streak >= n,
            Criterion::PerfectScore => stats.best_quiz_percentage.is_some_and(|p| p >= 100),
            Criterion::TimeSpentMinutes(n) => stats.time_spent_minutes >= n,
        }
    }
}

/// An achievement earned by a learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarnedAchievement {
    pub achievement_id: String,
    pub earned_at: DateTime<Utc>,
}

/// Award every achievement newly satisfied by `stats`. Already earned
/// achievements are never awarded twice. Returns the new awards, which are
/// also appended to `earned`.
pub fn check_achievements(
    stats: &LearnerStats,
    earned: &mut Vec<EarnedAchievement>,
    now: DateTime<Utc>,
) -> Vec<EarnedAchievement> {
    let have: HashSet<String> = earned.iter().map(|e| e.achievement_id.clone()).collect();
    let fresh: Vec<EarnedAchievement> = ACHIEVEMENTS
        .iter()
        .filter(|a| !have.contains(a.id) && a.criterion.is_satisfied(stats))
        .map(|a| EarnedAchievement {
            achievement_id: a.id.to_string(),
            earned_at: now,
        })
        .collect();
    for award in &fresh {
        tracing::info!(achievement = %award.achievement_id, "achievement earned");
    }
    earned.extend(fresh.iter().cloned());
    fresh
}

/// Sum of catalog points for the earned achievements. Unknown ids score 0.
pub fn total_points(earned: &[EarnedAchievement]) -> u32 {
    earned
        .iter()
        .filter_map(|e| find(&e.achievement_id))
        .map(|a| a.points)
        .sum()
}
