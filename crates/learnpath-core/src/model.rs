//! Core data model types for learnpath.
//!
//! These are the plain data structures exchanged between the scoring engine,
//! the scheduler, the mastery gate evaluator and the external collaborators.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LearnError;

// ---------------------------------------------------------------------------
// Quiz content
// ---------------------------------------------------------------------------

/// The kind of a quiz question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    #[serde(alias = "mcq")]
    MultipleChoice,
    #[serde(alias = "tf")]
    TrueFalse,
    #[serde(alias = "short")]
    ShortAnswer,
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionKind::MultipleChoice => write!(f, "multiple-choice"),
            QuestionKind::TrueFalse => write!(f, "true-false"),
            QuestionKind::ShortAnswer => write!(f, "short-answer"),
        }
    }
}

/// A submitted or expected answer.
///
/// Serialized untagged, so JSON `2`, `true` and `"text"` map to
/// `Choice`, `Bool` and `Text` respectively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    /// Index into the question's options.
    Choice(usize),
    Bool(bool),
    Text(String),
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Choice(i) => write!(f, "option {}", i + 1),
            Answer::Bool(b) => write!(f, "{b}"),
            Answer::Text(s) => write!(f, "\"{s}\""),
        }
    }
}

/// A single quiz question with its answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(alias = "question")]
    pub prompt: String,
    /// Ordered options, only meaningful for multiple-choice.
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(alias = "answer")]
    pub correct_answer: Answer,
    #[serde(default)]
    pub explanation: String,
}

impl QuizQuestion {
    /// Check that the answer key is consistent with the question kind.
    pub fn validate(&self) -> Result<(), LearnError> {
        match (self.kind, &self.correct_answer) {
            (QuestionKind::MultipleChoice, Answer::Choice(i)) => {
                if *i >= self.options.len() {
                    return Err(LearnError::Validation(format!(
                        "question '{}': correct answer index {} out of range for {} options",
                        self.id,
                        i,
                        self.options.len()
                    )));
                }
                Ok(())
            }
            (QuestionKind::TrueFalse, Answer::Bool(_)) => Ok(()),
            (QuestionKind::ShortAnswer, Answer::Text(_)) => Ok(()),
            (kind, answer) => Err(LearnError::Validation(format!(
                "question '{}': {kind} question cannot have answer {answer}",
                self.id
            ))),
        }
    }

    /// Strict value equality against the answer key. Short answers are
    /// compared exactly and case-sensitively.
    pub fn is_correct(&self, answer: &Answer) -> bool {
        &self.correct_answer == answer
    }
}

// ---------------------------------------------------------------------------
// Spaced repetition
// ---------------------------------------------------------------------------

/// A learner's recall rating for a flashcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Rating {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    pub fn label(&self) -> &'static str {
        match self {
            Rating::Again => "Again",
            Rating::Hard => "Hard",
            Rating::Good => "Good",
            Rating::Easy => "Easy",
        }
    }
}

impl TryFrom<u8> for Rating {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Rating::Again),
            2 => Ok(Rating::Hard),
            3 => Ok(Rating::Good),
            4 => Ok(Rating::Easy),
            other => Err(format!("rating must be between 1 and 4, got {other}")),
        }
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating as u8
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label().to_lowercase())
    }
}

impl FromStr for Rating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "again" => Ok(Rating::Again),
            "2" | "hard" => Ok(Rating::Hard),
            "3" | "good" => Ok(Rating::Good),
            "4" | "easy" => Ok(Rating::Easy),
            other => Err(format!("unknown rating: {other}")),
        }
    }
}

pub const MIN_EASE: u8 = 1;
pub const MAX_EASE: u8 = 4;
pub const DEFAULT_EASE: u8 = 3;
pub const INITIAL_INTERVAL_DAYS: u32 = 1;

/// A flashcard with its review schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpacedRepetitionCard {
    pub id: String,
    pub front: String,
    pub back: String,
    #[serde(default)]
    pub category: String,
    #[serde(default = "default_ease")]
    pub ease: u8,
    /// Days until the next review.
    #[serde(default = "default_interval", alias = "interval")]
    pub interval_days: u32,
    #[serde(default)]
    pub last_reviewed: Option<DateTime<Utc>>,
}

fn default_ease() -> u8 {
    DEFAULT_EASE
}

fn default_interval() -> u32 {
    INITIAL_INTERVAL_DAYS
}

impl SpacedRepetitionCard {
    pub fn new(id: &str, front: &str, back: &str, category: &str) -> Self {
        Self {
            id: id.to_string(),
            front: front.to_string(),
            back: back.to_string(),
            category: category.to_string(),
            ease: DEFAULT_EASE,
            interval_days: INITIAL_INTERVAL_DAYS,
            last_reviewed: None,
        }
    }

    /// `last_reviewed + interval`, or `None` if the card was never reviewed.
    pub fn next_review(&self) -> Option<DateTime<Utc>> {
        self.last_reviewed
            .map(|last| last + Duration::days(i64::from(self.interval_days)))
    }

    /// A card is due when it was never reviewed or its next review is not in
    /// the future.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review().map_or(true, |next| next <= now)
    }
}

// ---------------------------------------------------------------------------
// Module progress
// ---------------------------------------------------------------------------

/// A learner's progress through one module.
///
/// Completion is never stored here; it is derived by evaluating a
/// [`MasteryGate`](crate::mastery::MasteryGate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleProgress {
    pub module_id: String,
    pub user_id: String,
    #[serde(default)]
    pub lessons_completed: u32,
    #[serde(default)]
    pub total_lessons: u32,
    #[serde(default)]
    pub labs_completed: u32,
    #[serde(default)]
    pub total_labs: u32,
    /// Best concept-check score, 0 to 100.
    #[serde(default)]
    pub concept_check_score: Option<u32>,
    #[serde(default)]
    pub project_submitted: bool,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub completed_lessons: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub completed_labs: BTreeSet<String>,
}

impl ModuleProgress {
    pub fn new(module_id: &str, user_id: &str, total_lessons: u32, total_labs: u32) -> Self {
        Self {
            module_id: module_id.to_string(),
            user_id: user_id.to_string(),
            lessons_completed: 0,
            total_lessons,
            labs_completed: 0,
            total_labs,
            concept_check_score: None,
            project_submitted: false,
            completed_lessons: BTreeSet::new(),
            completed_labs: BTreeSet::new(),
        }
    }

    /// Record a lesson completion. Returns `false` if the lesson was already
    /// counted.
    pub fn complete_lesson(&mut self, lesson_id: &str) -> bool {
        if !self.completed_lessons.insert(lesson_id.to_string()) {
            return false;
        }
        self.lessons_completed = capped_increment(self.lessons_completed, self.total_lessons);
        true
    }

    /// Record a lab completion. Returns `false` if the lab was already counted.
    pub fn complete_lab(&mut self, lab_id: &str) -> bool {
        if !self.completed_labs.insert(lab_id.to_string()) {
            return false;
        }
        self.labs_completed = capped_increment(self.labs_completed, self.total_labs);
        true
    }

    /// Record a concept-check score, keeping the best attempt.
    pub fn record_concept_check(&mut self, score: u32) {
        let score = score.min(100);
        self.concept_check_score = Some(self.concept_check_score.map_or(score, |s| s.max(score)));
    }

    pub fn submit_project(&mut self) {
        self.project_submitted = true;
    }

    /// Whether any activity has been recorded for this module.
    pub fn is_started(&self) -> bool {
        self.lessons_completed > 0
            || self.labs_completed > 0
            || self.concept_check_score.is_some()
            || self.project_submitted
    }
}

/// A zero total means the module did not declare one, so nothing caps the count.
fn capped_increment(count: u32, total: u32) -> u32 {
    let next = count.saturating_add(1);
    if total > 0 {
        next.min(total)
    } else {
        next
    }
}

// ---------------------------------------------------------------------------
// Attempts and completion events
// ---------------------------------------------------------------------------

/// What happened in a single recorded attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Answer { answer: Answer },
    Rating { rating: Rating },
    LessonCompleted,
    LabCompleted,
    ProjectSubmitted,
    QuizSubmitted { percentage: u32, passed: bool },
}

/// An immutable record of a quiz answer, card rating or completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub id: Uuid,
    /// Quiz question, card, lesson or module identifier.
    pub subject_id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: AttemptOutcome,
    /// Present where correctness applies.
    #[serde(default)]
    pub correct: Option<bool>,
}

impl AttemptRecord {
    pub fn new(user_id: &str, subject_id: &str, outcome: AttemptOutcome, correct: Option<bool>) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id: subject_id.to_string(),
            user_id: user_id.to_string(),
            timestamp: Utc::now(),
            outcome,
            correct,
        }
    }
}

/// The payload sent to the progress sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
    pub module_id: String,
    pub lesson_id: String,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_score: Option<u32>,
    /// Seconds spent on the activity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<u64>,
}

/// A module assigned to a learner with a due date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub user_id: String,
    pub module_id: String,
    pub due: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Curriculum
// ---------------------------------------------------------------------------

/// A certification track: an ordered sequence of modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    /// Module ids in the order they must be completed.
    #[serde(default)]
    pub modules: Vec<String>,
}

/// The definition of a module as authored in a curriculum file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub lessons: u32,
    #[serde(default)]
    pub labs: u32,
    /// Minimum concept-check score; falls back to the configured default.
    #[serde(default)]
    pub concept_check_min: Option<u32>,
    /// Whether a project submission is part of the gate.
    #[serde(default = "default_true")]
    pub project: bool,
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
}

fn default_true() -> bool {
    true
}

impl ModuleDefinition {
    /// Empty progress for a learner starting this module.
    pub fn new_progress(&self, user_id: &str) -> ModuleProgress {
        ModuleProgress::new(&self.id, user_id, self.lessons, self.labs)
    }
}

/// Tracks, modules and flashcards loaded from one curriculum file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Curriculum {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub modules: Vec<ModuleDefinition>,
    #[serde(default)]
    pub cards: Vec<SpacedRepetitionCard>,
}

impl Curriculum {
    pub fn module(&self, id: &str) -> Option<&ModuleDefinition> {
        self.modules.iter().find(|m| m.id == id)
    }
}
