//! Learner engine.
//!
//! Owns one learner's explicit state and routes every activity through the
//! scoring engine, scheduler and mastery gates before handing a completion
//! event to the progress sink. A failed save never rolls back local state.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::achievements::{check_achievements, EarnedAchievement, LearnerStats, StreakTracker};
use crate::aggregate::{summarize_user, AtRiskPolicy, UserSummary};
use crate::attempts::AttemptLog;
use crate::error::{LearnError, ProviderError};
use crate::mastery::{CurriculumPath, GateBook, MasteryEvaluation, DEFAULT_CONCEPT_CHECK_MIN};
use crate::model::{
    Answer, Assignment, AttemptOutcome, AttemptRecord, CompletionEvent, Curriculum,
    ModuleDefinition, ModuleProgress, QuizQuestion, Rating, SpacedRepetitionCard,
};
use crate::scheduler::{self, ReviewSession};
use crate::scoring::QuizScore;
use crate::session::{AnswerFeedback, QuizSession, ReviewItem, DEFAULT_MAX_QUESTIONS};
use crate::traits::{ContentSource, ProgressSink};

const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Configuration for the learner engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Questions presented per quiz session.
    pub max_quiz_questions: usize,
    /// Concept-check minimum for modules that do not set one.
    pub concept_check_min: u32,
    /// Retries on transient collaborator errors. 0 disables retrying.
    pub max_retries: u32,
    /// Initial delay between retries; doubles on every attempt.
    pub retry_delay: Duration,
    /// Maximum concurrent question-bank fetches.
    pub parallelism: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_quiz_questions: DEFAULT_MAX_QUESTIONS,
            concept_check_min: DEFAULT_CONCEPT_CHECK_MIN,
            max_retries: 0,
            retry_delay: Duration::from_millis(500),
            parallelism: 4,
        }
    }
}

/// Observer for learner activity.
pub trait ActivityReporter: Send + Sync {
    fn on_quiz_started(&self, module_id: &str, questions: usize);
    fn on_quiz_submitted(&self, module_id: &str, score: &QuizScore);
    fn on_module_complete(&self, module_id: &str);
    fn on_achievement(&self, achievement: &EarnedAchievement);
    fn on_persistence_failed(&self, event: &CompletionEvent, error: &str);
}

/// No-op activity reporter.
pub struct NoopReporter;

impl ActivityReporter for NoopReporter {
    fn on_quiz_started(&self, _: &str, _: usize) {}
    fn on_quiz_submitted(&self, _: &str, _: &QuizScore) {}
    fn on_module_complete(&self, _: &str) {}
    fn on_achievement(&self, _: &EarnedAchievement) {}
    fn on_persistence_failed(&self, _: &CompletionEvent, _: &str) {}
}

/// Everything known about one learner. Serializable so a CLI session can be
/// resumed from disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerState {
    pub user_id: String,
    #[serde(default)]
    pub progress: BTreeMap<String, ModuleProgress>,
    #[serde(default)]
    pub cards: Vec<SpacedRepetitionCard>,
    #[serde(default)]
    pub attempts: AttemptLog,
    #[serde(default)]
    pub streak: StreakTracker,
    #[serde(default)]
    pub achievements: Vec<EarnedAchievement>,
    #[serde(default)]
    pub time_spent_secs: u64,
    #[serde(default)]
    pub best_quiz_percentage: Option<u32>,
}

impl LearnerState {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize learner state")?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write learner state to {}", path.display()))
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read learner state from {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse learner state: {}", path.display()))
    }

    /// Load the state if the file exists, otherwise start fresh.
    pub fn load_or_new(path: &Path, user_id: &str) -> Result<Self> {
        if path.exists() {
            Self::load_json(path)
        } else {
            Ok(Self::new(user_id))
        }
    }

    /// Add cards whose ids are not in the deck yet. Returns how many were added.
    pub fn merge_cards(&mut self, cards: &[SpacedRepetitionCard]) -> usize {
        let mut added = 0;
        for card in cards {
            if !self.cards.iter().any(|c| c.id == card.id) {
                self.cards.push(card.clone());
                added += 1;
            }
        }
        added
    }
}

/// Whether a completion event reached the sink.
#[derive(Debug, Clone, PartialEq)]
pub enum Persistence {
    Saved,
    /// Local state is kept; `pending` can be re-sent with
    /// [`LearningEngine::persist`].
    Failed {
        pending: CompletionEvent,
        reason: String,
    },
}

impl Persistence {
    pub fn is_saved(&self) -> bool {
        matches!(self, Persistence::Saved)
    }

    pub fn error(&self) -> Option<LearnError> {
        match self {
            Persistence::Saved => None,
            Persistence::Failed { reason, .. } => Some(LearnError::PersistenceFailure {
                reason: reason.clone(),
            }),
        }
    }
}

/// Result of a quiz submission.
#[derive(Debug, Clone)]
pub struct QuizOutcome {
    pub score: QuizScore,
    pub time_spent_secs: u64,
    pub module_complete: bool,
    pub new_achievements: Vec<EarnedAchievement>,
    pub persistence: Persistence,
}

/// Result of a lesson, lab or project event.
#[derive(Debug, Clone)]
pub struct ActivityOutcome {
    /// `false` when the activity had already been recorded.
    pub changed: bool,
    pub module_complete: bool,
    pub new_achievements: Vec<EarnedAchievement>,
    pub persistence: Persistence,
}

/// Totals for a finished flashcard review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewSummary {
    pub reviewed: usize,
    pub requeued: usize,
    pub remaining_due: usize,
}

/// Question banks fetched ahead of time.
#[derive(Debug, Clone, Default)]
pub struct PrefetchSummary {
    pub loaded: Vec<(String, usize)>,
    pub failed: Vec<(String, String)>,
}

pub struct LearningEngine {
    content: Arc<dyn ContentSource>,
    sink: Arc<dyn ProgressSink>,
    reporter: Arc<dyn ActivityReporter>,
    config: EngineConfig,
    gates: GateBook,
    path: CurriculumPath,
    modules: HashMap<String, ModuleDefinition>,
    state: LearnerState,
    banks: HashMap<String, Vec<QuizQuestion>>,
    quiz: Option<QuizSession>,
    review: Option<ReviewSession>,
}

impl LearningEngine {
    pub fn new(
        content: Arc<dyn ContentSource>,
        sink: Arc<dyn ProgressSink>,
        state: LearnerState,
        config: EngineConfig,
    ) -> Self {
        let gates = GateBook::new(config.concept_check_min);
        Self {
            content,
            sink,
            reporter: Arc::new(NoopReporter),
            config,
            gates,
            path: CurriculumPath::default(),
            modules: HashMap::new(),
            state,
            banks: HashMap::new(),
            quiz: None,
            review: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ActivityReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Use the curriculum's module definitions for gates and progress totals,
    /// its tracks for unlock order, and add its flashcards to the deck.
    pub fn with_curriculum(mut self, curriculum: &Curriculum) -> Self {
        self.gates = GateBook::from_curriculum(curriculum, self.config.concept_check_min);
        self.path = CurriculumPath::new(curriculum.tracks.clone());
        for module in &curriculum.modules {
            self.modules.insert(module.id.clone(), module.clone());
            if let Some(progress) = self.state.progress.get_mut(&module.id) {
                progress.total_lessons = module.lessons;
                progress.total_labs = module.labs;
            }
        }
        self.state.merge_cards(&curriculum.cards);
        self
    }

    pub fn state(&self) -> &LearnerState {
        &self.state
    }

    pub fn into_state(self) -> LearnerState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn curriculum_path(&self) -> &CurriculumPath {
        &self.path
    }

    /// Fails with `InvalidTransition` while the module's prerequisite is
    /// incomplete. Modules outside every track are always open.
    pub fn ensure_unlocked(&self, module_id: &str) -> Result<(), LearnError> {
        match self.path.prerequisite(module_id) {
            Some(prereq) if !self.is_module_complete(prereq) => Err(LearnError::InvalidTransition(
                format!("module '{module_id}' is locked; complete '{prereq}' first"),
            )),
            _ => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Quiz
    // -----------------------------------------------------------------------

    /// Fetch (or reuse a prefetched) question bank and start a session.
    pub async fn start_quiz<R: Rng + ?Sized>(
        &mut self,
        module_id: &str,
        rng: &mut R,
    ) -> Result<&QuizSession, LearnError> {
        self.ensure_unlocked(module_id)?;
        let pool = match self.banks.get(module_id) {
            Some(pool) => pool.clone(),
            None => {
                let pool = self.fetch_bank(module_id).await?;
                self.banks.insert(module_id.to_string(), pool.clone());
                pool
            }
        };
        let session = QuizSession::start(module_id, &pool, self.config.max_quiz_questions, rng)?;
        self.reporter.on_quiz_started(module_id, session.len());
        tracing::info!(module = module_id, questions = session.len(), "quiz started");
        Ok(&*self.quiz.insert(session))
    }

    /// Start a fresh session over the same bank. The submitted session is
    /// replaced, never reset.
    pub fn retry_quiz<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<&QuizSession, LearnError> {
        let previous = self
            .quiz
            .as_ref()
            .ok_or_else(|| LearnError::InvalidTransition("no quiz to retry".into()))?;
        let pool = self
            .banks
            .get(previous.module_id())
            .ok_or_else(|| LearnError::content_unavailable(previous.module_id(), "question bank not loaded"))?;
        let session = previous.retry(pool, self.config.max_quiz_questions, rng)?;
        self.reporter.on_quiz_started(session.module_id(), session.len());
        Ok(&*self.quiz.insert(session))
    }

    pub fn quiz(&self) -> Option<&QuizSession> {
        self.quiz.as_ref()
    }

    /// Navigation access to the active session.
    pub fn quiz_mut(&mut self) -> Option<&mut QuizSession> {
        self.quiz.as_mut()
    }

    /// Answer the current question and log the attempt.
    pub fn answer(&mut self, answer: Answer) -> Result<AnswerFeedback, LearnError> {
        let session = self.active_quiz()?;
        let question_id = session
            .current()
            .map(|q| q.id.clone())
            .unwrap_or_default();
        let feedback = session.answer(answer.clone())?;
        let record = AttemptRecord::new(
            &self.state.user_id,
            &question_id,
            AttemptOutcome::Answer { answer },
            Some(feedback.correct),
        );
        self.state.attempts.append(record);
        Ok(feedback)
    }

    /// Submit the active quiz, record the concept-check score and send the
    /// completion event.
    pub async fn submit_quiz(&mut self) -> Result<QuizOutcome, LearnError> {
        let session = self.active_quiz()?;
        let score = session.submit()?;
        let time_spent_secs = session.time_spent_secs();
        let module_id = session.module_id().to_string();

        self.reporter.on_quiz_submitted(&module_id, &score);
        tracing::info!(
            module = %module_id,
            correct = score.correct,
            total = score.total,
            percentage = score.percentage,
            passed = score.passed,
            "quiz submitted"
        );

        let was_complete = self.is_module_complete(&module_id);
        self.progress_entry(&module_id).record_concept_check(score.percentage);
        self.state.attempts.append(AttemptRecord::new(
            &self.state.user_id,
            &module_id,
            AttemptOutcome::QuizSubmitted {
                percentage: score.percentage,
                passed: score.passed,
            },
            Some(score.passed),
        ));
        self.state.time_spent_secs += time_spent_secs;
        self.state.best_quiz_percentage = Some(
            self.state
                .best_quiz_percentage
                .map_or(score.percentage, |b| b.max(score.percentage)),
        );
        let (module_complete, new_achievements) = self.after_activity(&module_id, was_complete);

        let event = CompletionEvent {
            module_id: module_id.clone(),
            lesson_id: format!("quiz-{module_id}"),
            completed: true,
            quiz_score: Some(score.percentage),
            time_spent: Some(time_spent_secs),
        };
        let persistence = self.persist(event).await;

        Ok(QuizOutcome {
            score,
            time_spent_secs,
            module_complete,
            new_achievements,
            persistence,
        })
    }

    /// Read-only replay of the submitted quiz.
    pub fn review_quiz(&mut self) -> Result<Vec<ReviewItem>, LearnError> {
        self.active_quiz()?.review()
    }

    fn active_quiz(&mut self) -> Result<&mut QuizSession, LearnError> {
        self.quiz
            .as_mut()
            .ok_or_else(|| LearnError::InvalidTransition("no quiz in progress".into()))
    }

    // -----------------------------------------------------------------------
    // Lessons, labs, projects
    // -----------------------------------------------------------------------

    pub async fn complete_lesson(
        &mut self,
        module_id: &str,
        lesson_id: &str,
    ) -> Result<ActivityOutcome, LearnError> {
        self.ensure_unlocked(module_id)?;
        let was_complete = self.is_module_complete(module_id);
        let changed = self.progress_entry(module_id).complete_lesson(lesson_id);
        Ok(self
            .finish_activity(
                module_id,
                lesson_id,
                changed,
                was_complete,
                AttemptOutcome::LessonCompleted,
            )
            .await)
    }

    pub async fn complete_lab(
        &mut self,
        module_id: &str,
        lab_id: &str,
    ) -> Result<ActivityOutcome, LearnError> {
        self.ensure_unlocked(module_id)?;
        let was_complete = self.is_module_complete(module_id);
        let changed = self.progress_entry(module_id).complete_lab(lab_id);
        Ok(self
            .finish_activity(module_id, lab_id, changed, was_complete, AttemptOutcome::LabCompleted)
            .await)
    }

    pub async fn submit_project(&mut self, module_id: &str) -> Result<ActivityOutcome, LearnError> {
        self.ensure_unlocked(module_id)?;
        let was_complete = self.is_module_complete(module_id);
        let progress = self.progress_entry(module_id);
        let changed = !progress.project_submitted;
        progress.submit_project();
        let subject = format!("project-{module_id}");
        Ok(self
            .finish_activity(
                module_id,
                &subject,
                changed,
                was_complete,
                AttemptOutcome::ProjectSubmitted,
            )
            .await)
    }

    async fn finish_activity(
        &mut self,
        module_id: &str,
        subject_id: &str,
        changed: bool,
        was_complete: bool,
        outcome: AttemptOutcome,
    ) -> ActivityOutcome {
        if changed {
            self.state.attempts.append(AttemptRecord::new(
                &self.state.user_id,
                subject_id,
                outcome,
                None,
            ));
        }
        let (module_complete, new_achievements) = self.after_activity(module_id, was_complete);
        let event = CompletionEvent {
            module_id: module_id.to_string(),
            lesson_id: subject_id.to_string(),
            completed: true,
            quiz_score: None,
            time_spent: None,
        };
        let persistence = self.persist(event).await;
        ActivityOutcome {
            changed,
            module_complete,
            new_achievements,
            persistence,
        }
    }

    /// Streak, completion and achievement bookkeeping shared by every
    /// activity.
    fn after_activity(
        &mut self,
        module_id: &str,
        was_complete: bool,
    ) -> (bool, Vec<EarnedAchievement>) {
        let now = Utc::now();
        self.state.streak.record_activity(now);
        let module_complete = self.is_module_complete(module_id);
        if module_complete && !was_complete {
            tracing::info!(module = module_id, "module complete");
            self.reporter.on_module_complete(module_id);
        }
        let stats = self.stats();
        let fresh = check_achievements(&stats, &mut self.state.achievements, now);
        for award in &fresh {
            self.reporter.on_achievement(award);
        }
        (module_complete, fresh)
    }

    // -----------------------------------------------------------------------
    // Flashcards
    // -----------------------------------------------------------------------

    /// Rate a card outside of a review session.
    pub fn rate_card(
        &mut self,
        card_id: &str,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Result<&SpacedRepetitionCard, LearnError> {
        let idx = self
            .state
            .cards
            .iter()
            .position(|c| c.id == card_id)
            .ok_or_else(|| LearnError::Validation(format!("unknown card '{card_id}'")))?;
        scheduler::rate(&mut self.state.cards[idx], rating, now);
        self.log_rating(card_id, rating, now);
        Ok(&self.state.cards[idx])
    }

    /// Start reviewing every due card. Returns the number due.
    pub fn start_review<R: Rng + ?Sized>(&mut self, now: DateTime<Utc>, rng: &mut R) -> usize {
        let session = ReviewSession::start(&self.state.cards, now, rng);
        let due = session.remaining();
        tracing::debug!(due, "review started");
        self.review = Some(session);
        due
    }

    /// The card to show next, if the review is still going.
    pub fn review_card(&self) -> Option<&SpacedRepetitionCard> {
        let idx = self.review.as_ref()?.current()?;
        self.state.cards.get(idx)
    }

    pub fn review_rate(
        &mut self,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Result<&SpacedRepetitionCard, LearnError> {
        let session = self
            .review
            .as_mut()
            .ok_or_else(|| LearnError::InvalidTransition("no review in progress".into()))?;
        let idx = session
            .rate_current(&mut self.state.cards, rating, now)
            .ok_or_else(|| LearnError::InvalidTransition("review has no cards left".into()))?;
        let card_id = self.state.cards[idx].id.clone();
        self.log_rating(&card_id, rating, now);
        Ok(&self.state.cards[idx])
    }

    /// End the review (early or after the queue is exhausted).
    pub fn finish_review(&mut self, now: DateTime<Utc>) -> ReviewSummary {
        let (reviewed, requeued) = self
            .review
            .take()
            .map_or((0, 0), |s| (s.reviewed(), s.requeued()));
        ReviewSummary {
            reviewed,
            requeued,
            remaining_due: scheduler::due_cards(&self.state.cards, now).len(),
        }
    }

    fn log_rating(&mut self, card_id: &str, rating: Rating, now: DateTime<Utc>) {
        self.state.attempts.append(AttemptRecord::new(
            &self.state.user_id,
            card_id,
            AttemptOutcome::Rating { rating },
            None,
        ));
        self.state.streak.record_activity(now);
    }

    // -----------------------------------------------------------------------
    // Derived views
    // -----------------------------------------------------------------------

    pub fn mastery(&self, module_id: &str) -> MasteryEvaluation {
        match self.state.progress.get(module_id) {
            Some(progress) => self.gates.evaluate(progress),
            None => self
                .gates
                .evaluate(&fresh_progress(&self.modules, module_id, &self.state.user_id)),
        }
    }

    pub fn is_module_complete(&self, module_id: &str) -> bool {
        self.state
            .progress
            .get(module_id)
            .is_some_and(|p| self.gates.evaluate(p).all_met)
    }

    pub fn summary(
        &self,
        assignments: &[Assignment],
        policy: &AtRiskPolicy,
        now: DateTime<Utc>,
    ) -> UserSummary {
        let records: Vec<ModuleProgress> = self.state.progress.values().cloned().collect();
        summarize_user(&self.state.user_id, &records, assignments, &self.gates, policy, now)
    }

    pub fn stats(&self) -> LearnerStats {
        LearnerStats {
            modules_completed: self.gates.completed_modules(self.state.progress.values()).len()
                as u32,
            current_streak: self.state.streak.current,
            best_quiz_percentage: self.state.best_quiz_percentage,
            time_spent_minutes: self.state.time_spent_secs / 60,
        }
    }

    fn progress_entry(&mut self, module_id: &str) -> &mut ModuleProgress {
        let modules = &self.modules;
        let user_id = self.state.user_id.clone();
        self.state
            .progress
            .entry(module_id.to_string())
            .or_insert_with(|| fresh_progress(modules, module_id, &user_id))
    }

    // -----------------------------------------------------------------------
    // Collaborators
    // -----------------------------------------------------------------------

    /// Fetch several modules' question banks concurrently, bounded by
    /// `parallelism`. Loaded banks are reused by [`start_quiz`](Self::start_quiz).
    pub async fn prefetch_banks(&mut self, module_ids: &[String]) -> PrefetchSummary {
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));
        let mut futures = FuturesUnordered::new();

        for module_id in module_ids {
            if self.banks.contains_key(module_id) {
                continue;
            }
            let content = Arc::clone(&self.content);
            let semaphore = Arc::clone(&semaphore);
            let config = self.config.clone();
            let module_id = module_id.clone();
            futures.push(async move {
                let result = async {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| anyhow::anyhow!("semaphore closed"))?;
                    with_retry(&config, "fetch questions", || content.questions(&module_id)).await
                }
                .await;
                (module_id, result)
            });
        }

        let mut summary = PrefetchSummary::default();
        while let Some((module_id, result)) = futures.next().await {
            match result {
                Ok(questions) => {
                    let valid = keep_valid(&module_id, questions);
                    summary.loaded.push((module_id.clone(), valid.len()));
                    self.banks.insert(module_id, valid);
                }
                Err(e) => {
                    tracing::warn!("prefetch failed for {module_id}: {e:#}");
                    summary.failed.push((module_id, format!("{e:#}")));
                }
            }
        }
        summary.loaded.sort();
        summary.failed.sort();
        summary
    }

    async fn fetch_bank(&self, module_id: &str) -> Result<Vec<QuizQuestion>, LearnError> {
        let content = Arc::clone(&self.content);
        let questions = with_retry(&self.config, "fetch questions", || content.questions(module_id))
            .await
            .map_err(|e| {
                tracing::warn!("content source '{}' failed for {module_id}: {e:#}", content.name());
                LearnError::content_unavailable(module_id, format!("{e:#}"))
            })?;
        Ok(keep_valid(module_id, questions))
    }

    /// Send an event to the sink. Also used to re-send a pending event after
    /// a failure.
    pub async fn persist(&self, event: CompletionEvent) -> Persistence {
        let sink = Arc::clone(&self.sink);
        match with_retry(&self.config, "record progress", || sink.record(&event)).await {
            Ok(()) => Persistence::Saved,
            Err(e) => {
                let reason = format!("{e:#}");
                tracing::error!("failed to persist {}/{}: {reason}", event.module_id, event.lesson_id);
                self.reporter.on_persistence_failed(&event, &reason);
                Persistence::Failed {
                    pending: event,
                    reason,
                }
            }
        }
    }
}

/// Empty progress, with totals from the module definition when there is one.
fn fresh_progress(
    modules: &HashMap<String, ModuleDefinition>,
    module_id: &str,
    user_id: &str,
) -> ModuleProgress {
    match modules.get(module_id) {
        Some(def) => def.new_progress(user_id),
        None => ModuleProgress::new(module_id, user_id, 0, 0),
    }
}

/// Drop questions whose answer key does not match their kind.
fn keep_valid(module_id: &str, questions: Vec<QuizQuestion>) -> Vec<QuizQuestion> {
    questions
        .into_iter()
        .filter(|q| match q.validate() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(module = module_id, "dropping question: {e}");
                false
            }
        })
        .collect()
}

/// Retry transient collaborator errors with exponential backoff. Permanent
/// [`ProviderError`]s are returned immediately and a rate limit's retry-after
/// hint replaces the current delay.
async fn with_retry<T, F, Fut>(config: &EngineConfig, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = config.retry_delay;
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let provider = e.downcast_ref::<ProviderError>();
                if provider.is_some_and(ProviderError::is_permanent) || attempt >= config.max_retries
                {
                    return Err(e);
                }
                if let Some(ms) = provider.and_then(ProviderError::retry_after_ms) {
                    delay = Duration::from_millis(ms);
                }
                attempt += 1;
                tracing::warn!(
                    "{what} failed (attempt {attempt}/{}), retrying in {delay:?}: {e:#}",
                    config.max_retries
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_BACKOFF);
            }
        }
    }
}
