//! Quiz session state machine.
//!
//! ```text
//! NotStarted -> InProgress -> Submitted -> Reviewing
//! ```
//!
//! A session is created in `InProgress` (the first question is loaded as part
//! of starting). Submission is terminal; retrying builds a new session.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::LearnError;
use crate::model::{Answer, QuizQuestion};
use crate::scoring::{score_quiz, QuizScore};

/// Default number of questions presented per session.
pub const DEFAULT_MAX_QUESTIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    InProgress,
    Submitted,
    Reviewing,
}

/// Immediate feedback shown after an answer is given.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerFeedback {
    pub correct: bool,
    pub correct_answer: Answer,
    pub explanation: String,
}

/// A read-only question/answer pair shown during review.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewItem {
    pub question: QuizQuestion,
    pub given: Option<Answer>,
    pub correct: bool,
}

/// One learner's attempt at a module quiz.
#[derive(Debug, Clone)]
pub struct QuizSession {
    module_id: String,
    questions: Vec<QuizQuestion>,
    answers: HashMap<usize, Answer>,
    cursor: usize,
    state: SessionState,
    started_at: Instant,
    elapsed: Option<Duration>,
    score: Option<QuizScore>,
}

impl QuizSession {
    /// Shuffle the pool, keep at most `max_questions`, and start the session.
    ///
    /// An empty pool means the quiz cannot start.
    pub fn start<R: Rng + ?Sized>(
        module_id: &str,
        pool: &[QuizQuestion],
        max_questions: usize,
        rng: &mut R,
    ) -> Result<Self, LearnError> {
        if pool.is_empty() {
            return Err(LearnError::content_unavailable(
                module_id,
                "no questions available for this module yet",
            ));
        }
        let mut questions = pool.to_vec();
        questions.shuffle(rng);
        questions.truncate(max_questions.max(1));

        tracing::debug!(
            module = module_id,
            presented = questions.len(),
            pool = pool.len(),
            "quiz session started"
        );

        Ok(Self {
            module_id: module_id.to_string(),
            questions,
            answers: HashMap::new(),
            cursor: 0,
            state: SessionState::InProgress,
            started_at: Instant::now(),
            elapsed: None,
            score: None,
        })
    }

    /// Start a brand-new session over the same pool: new shuffle, no answers,
    /// fresh timer. The current session is left untouched.
    pub fn retry<R: Rng + ?Sized>(
        &self,
        pool: &[QuizQuestion],
        max_questions: usize,
        rng: &mut R,
    ) -> Result<Self, LearnError> {
        Self::start(&self.module_id, pool, max_questions, rng)
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&QuizQuestion> {
        self.questions.get(self.cursor)
    }

    pub fn answer_for(&self, index: usize) -> Option<&Answer> {
        self.answers.get(&index)
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub fn all_answered(&self) -> bool {
        self.answers.len() == self.questions.len()
    }

    /// Percentage of questions answered so far.
    pub fn progress_percent(&self) -> u32 {
        if self.questions.is_empty() {
            return 0;
        }
        ((self.answers.len() * 100 + self.questions.len() / 2) / self.questions.len()) as u32
    }

    /// Move to a question to view it. Navigating back never re-opens an
    /// answer.
    pub fn go_to(&mut self, index: usize) -> Result<&QuizQuestion, LearnError> {
        if index >= self.questions.len() {
            return Err(LearnError::InvalidTransition(format!(
                "question {index} out of range (session has {})",
                self.questions.len()
            )));
        }
        self.cursor = index;
        Ok(&self.questions[index])
    }

    /// Advance to the next question, if there is one.
    pub fn next(&mut self) -> Option<&QuizQuestion> {
        if self.cursor + 1 < self.questions.len() {
            self.cursor += 1;
            self.questions.get(self.cursor)
        } else {
            None
        }
    }

    /// Answer the current question. Each question can be answered once; the
    /// feedback reveals correctness and the explanation immediately.
    pub fn answer(&mut self, answer: Answer) -> Result<AnswerFeedback, LearnError> {
        if self.state != SessionState::InProgress {
            return Err(LearnError::InvalidTransition(format!(
                "cannot answer a quiz in state {:?}",
                self.state
            )));
        }
        if self.answers.contains_key(&self.cursor) {
            return Err(LearnError::InvalidTransition(format!(
                "question {} has already been answered",
                self.cursor + 1
            )));
        }
        let question = &self.questions[self.cursor];
        let feedback = AnswerFeedback {
            correct: question.is_correct(&answer),
            correct_answer: question.correct_answer.clone(),
            explanation: question.explanation.clone(),
        };
        self.answers.insert(self.cursor, answer);
        Ok(feedback)
    }

    /// Submit the quiz. Every question must be answered; submission is
    /// terminal and scores the attempt exactly once.
    pub fn submit(&mut self) -> Result<QuizScore, LearnError> {
        if self.state != SessionState::InProgress {
            return Err(LearnError::InvalidTransition(format!(
                "cannot submit a quiz in state {:?}",
                self.state
            )));
        }
        if !self.all_answered() {
            return Err(LearnError::InvalidTransition(format!(
                "{} of {} questions unanswered",
                self.questions.len() - self.answers.len(),
                self.questions.len()
            )));
        }
        let score = score_quiz(&self.questions, &self.answers);
        self.elapsed = Some(self.started_at.elapsed());
        self.state = SessionState::Submitted;
        self.score = Some(score);
        Ok(score)
    }

    /// The score, once submitted.
    pub fn score(&self) -> Option<QuizScore> {
        self.score
    }

    /// Seconds from session start to submission (or until now if still open).
    pub fn time_spent_secs(&self) -> u64 {
        self.elapsed
            .unwrap_or_else(|| self.started_at.elapsed())
            .as_secs()
    }

    /// Enter read-only review of every question/answer pair.
    pub fn review(&mut self) -> Result<Vec<ReviewItem>, LearnError> {
        match self.state {
            SessionState::Submitted | SessionState::Reviewing => {
                self.state = SessionState::Reviewing;
            }
            other => {
                return Err(LearnError::InvalidTransition(format!(
                    "cannot review a quiz in state {other:?}"
                )))
            }
        }
        Ok(self
            .questions
            .iter()
            .enumerate()
            .map(|(idx, q)| {
                let given = self.answers.get(&idx).cloned();
                let correct = given.as_ref().is_some_and(|a| q.is_correct(a));
                ReviewItem {
                    question: q.clone(),
                    given,
                    correct,
                }
            })
            .collect())
    }
}
