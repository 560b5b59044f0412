//! Quiz scoring.
//!
//! Scores are computed with integer arithmetic so the pass threshold is exact:
//! 7 of 10 correct is 70% and fails, it never rounds up to a pass.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{Answer, QuizQuestion};

/// Fraction of correct answers needed to pass, as a percentage.
pub const PASS_THRESHOLD_PERCENT: u32 = 75;

/// Result of scoring a set of answers against an answer key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizScore {
    pub correct: u32,
    pub total: u32,
    /// `round(100 * correct / total)`, 0 when there are no questions.
    pub percentage: u32,
    /// `correct / total >= 0.75`, false when there are no questions.
    pub passed: bool,
}

impl QuizScore {
    pub fn from_counts(correct: u32, total: u32) -> Self {
        if total == 0 {
            return Self {
                correct: 0,
                total: 0,
                percentage: 0,
                passed: false,
            };
        }
        let correct = correct.min(total);
        let (c, t) = (u64::from(correct), u64::from(total));
        // Round half up.
        let percentage = ((200 * c + t) / (2 * t)) as u32;
        let passed = 100 * c >= u64::from(PASS_THRESHOLD_PERCENT) * t;
        Self {
            correct,
            total,
            percentage,
            passed,
        }
    }
}

/// Score answers keyed by question index.
///
/// Unanswered questions count as incorrect, and answers for indexes past the
/// end of `questions` are ignored.
pub fn score_quiz(questions: &[QuizQuestion], answers: &HashMap<usize, Answer>) -> QuizScore {
    let correct = questions
        .iter()
        .enumerate()
        .filter(|(idx, q)| answers.get(idx).is_some_and(|a| q.is_correct(a)))
        .count() as u32;
    QuizScore::from_counts(correct, questions.len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionKind;

    fn tf_questions(n: usize) -> Vec<QuizQuestion> {
        (0..n)
            .map(|i| QuizQuestion {
                id: format!("q{i}"),
                kind: QuestionKind::TrueFalse,
                prompt: format!("Statement {i}"),
                options: vec![],
                correct_answer: Answer::Bool(true),
                explanation: String::new(),
            })
            .collect()
    }

    fn answers(correct: usize, wrong: usize) -> HashMap<usize, Answer> {
        (0..correct)
            .map(|i| (i, Answer::Bool(true)))
            .chain((correct..correct + wrong).map(|i| (i, Answer::Bool(false))))
            .collect()
    }

    #[test]
    fn seven_of_ten_fails() {
        let score = score_quiz(&tf_questions(10), &answers(7, 3));
        assert_eq!(score.correct, 7);
        assert_eq!(score.total, 10);
        assert_eq!(score.percentage, 70);
        assert!(!score.passed);
    }

    #[test]
    fn exactly_three_quarters_passes() {
        let score = score_quiz(&tf_questions(4), &answers(3, 1));
        assert_eq!(score.percentage, 75);
        assert!(score.passed);
    }

    #[test]
    fn empty_quiz_is_zero_and_failed() {
        let score = score_quiz(&[], &HashMap::new());
        assert_eq!(score.percentage, 0);
        assert!(!score.passed);
    }

    #[test]
    fn unanswered_count_as_incorrect() {
        let score = score_quiz(&tf_questions(4), &answers(2, 0));
        assert_eq!(score.correct, 2);
        assert_eq!(score.total, 4);
        assert_eq!(score.percentage, 50);
    }

    #[test]
    fn answer_type_mismatch_is_incorrect() {
        let mut given = HashMap::new();
        given.insert(0, Answer::Text("true".into()));
        given.insert(1, Answer::Choice(1));
        let score = score_quiz(&tf_questions(2), &given);
        assert_eq!(score.correct, 0);
    }

    #[test]
    fn percentage_matches_rounding_for_all_counts() {
        for total in 1..=40u32 {
            for correct in 0..=total {
                let score = QuizScore::from_counts(correct, total);
                let expected = (100.0 * correct as f64 / total as f64).round() as u32;
                assert_eq!(score.percentage, expected, "{correct}/{total}");
                assert_eq!(
                    score.passed,
                    correct as f64 / total as f64 >= 0.75,
                    "{correct}/{total}"
                );
            }
        }
    }
}
