//! End-to-end learner pipeline tests.
//!
//! These tests drive the learning engine through quizzes, activities and
//! reviews against in-memory and HTTP collaborators, and check that
//! progress, gates and completion events stay consistent.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use learnpath_core::engine::{EngineConfig, LearnerState, LearningEngine, Persistence};
use learnpath_core::error::LearnError;
use learnpath_core::mastery::{CurriculumPath, ModuleState};
use learnpath_core::model::{Answer, Curriculum, Rating};
use learnpath_core::parser::parse_curriculum_str;
use learnpath_providers::file::FileContentSource;
use learnpath_providers::http::{HttpContentSource, HttpProgressSink};
use learnpath_providers::mock::{MockContentSource, RecordingSink};

const CURRICULUM: &str = r#"
[curriculum]
id = "e2e"
name = "E2E"

[[tracks]]
id = "t1"
name = "Track One"
modules = ["m1"]

[[tracks]]
id = "t2"
name = "Track Two"
modules = ["m2"]

[[modules]]
id = "m1"
title = "Module One"
lessons = 2
labs = 1
concept_check_min = 75

[[modules.questions]]
id = "q1"
type = "mcq"
question = "Pick the second option."
options = ["first", "second", "third"]
answer = 1

[[modules.questions]]
id = "q2"
type = "tf"
question = "True is true."
answer = true

[[modules.questions]]
id = "q3"
type = "short"
question = "Type CRAFT."
answer = "CRAFT"

[[modules.questions]]
id = "q4"
type = "tf"
question = "False is true."
answer = false

[[modules]]
id = "m2"
title = "Module Two"
lessons = 1
labs = 0
project = false

[[modules.questions]]
id = "q5"
type = "tf"
question = "Second module."
answer = true

[[cards]]
id = "c1"
front = "f1"
back = "b1"

[[cards]]
id = "c2"
front = "f2"
back = "b2"
"#;

fn curriculum() -> Curriculum {
    parse_curriculum_str(CURRICULUM, std::path::Path::new("e2e.toml")).unwrap()
}

fn engine_with(sink: Arc<RecordingSink>) -> LearningEngine {
    let curriculum = curriculum();
    let content = Arc::new(FileContentSource::from_curricula(std::slice::from_ref(&curriculum)));
    LearningEngine::new(content, sink, LearnerState::new("alice"), EngineConfig::default())
        .with_curriculum(&curriculum)
}

/// The correct answer for whichever question is current.
fn correct_answer(engine: &LearningEngine) -> Answer {
    engine
        .quiz()
        .and_then(|s| s.current())
        .map(|q| q.correct_answer.clone())
        .unwrap()
}

async fn answer_all(engine: &mut LearningEngine, correct: usize) {
    let mut answered = 0;
    loop {
        let answer = if answered < correct {
            correct_answer(engine)
        } else {
            // A choice index never matches a true/false or short-answer key,
            // and index 2 is wrong for the only multiple-choice question.
            Answer::Choice(2)
        };
        engine.answer(answer).unwrap();
        answered += 1;
        if engine.quiz_mut().unwrap().next().is_none() {
            break;
        }
    }
}

#[tokio::test]
async fn e2e_full_module_completion_unlocks_next_track() {
    let sink = Arc::new(RecordingSink::new());
    let mut engine = engine_with(sink.clone());
    let mut rng = StdRng::seed_from_u64(42);

    engine.complete_lesson("m1", "l1").await.unwrap();
    engine.complete_lesson("m1", "l2").await.unwrap();
    engine.complete_lab("m1", "lab1").await.unwrap();

    engine.start_quiz("m1", &mut rng).await.unwrap();
    answer_all(&mut engine, 4).await;
    let outcome = engine.submit_quiz().await.unwrap();
    assert_eq!(outcome.score.percentage, 100);
    assert!(outcome.score.passed);
    assert!(!outcome.module_complete, "project still outstanding");

    let project = engine.submit_project("m1").await.unwrap();
    assert!(project.module_complete);
    assert!(project
        .new_achievements
        .iter()
        .any(|a| a.achievement_id == "first-module"));

    let complete = [String::from("m1")].into_iter().collect();
    let path = CurriculumPath::new(curriculum().tracks);
    assert_eq!(path.state_of("m2", &complete, None), ModuleState::Available);
    assert_eq!(path.next_module(&complete), Some("m2"));

    let events = sink.events();
    assert_eq!(events.len(), 5);
    assert_eq!(events[3].lesson_id, "quiz-m1");
    assert_eq!(events[3].quiz_score, Some(100));
    assert_eq!(events[4].lesson_id, "project-m1");
}

#[tokio::test]
async fn e2e_failed_quiz_keeps_best_score_across_retries() {
    let sink = Arc::new(RecordingSink::new());
    let mut engine = engine_with(sink);
    let mut rng = StdRng::seed_from_u64(1);

    engine.start_quiz("m1", &mut rng).await.unwrap();
    answer_all(&mut engine, 2).await;
    let first = engine.submit_quiz().await.unwrap();
    assert_eq!(first.score.percentage, 50);
    assert!(!first.score.passed);

    let review = engine.review_quiz().unwrap();
    assert_eq!(review.iter().filter(|r| !r.correct).count(), 2);

    engine.retry_quiz(&mut rng).unwrap();
    answer_all(&mut engine, 3).await;
    let second = engine.submit_quiz().await.unwrap();
    assert_eq!(second.score.percentage, 75);
    assert!(second.score.passed);

    engine.retry_quiz(&mut rng).unwrap();
    answer_all(&mut engine, 0).await;
    engine.submit_quiz().await.unwrap();

    let progress = &engine.state().progress["m1"];
    assert_eq!(progress.concept_check_score, Some(75));
    let concept = engine
        .mastery("m1")
        .requirements
        .into_iter()
        .find(|r| r.label == "Concept Check")
        .unwrap();
    assert!(concept.met);
}

#[tokio::test]
async fn e2e_sink_outage_keeps_local_progress() {
    let sink = Arc::new(RecordingSink::failing());
    let mut engine = engine_with(sink.clone());

    let outcome = engine.complete_lesson("m1", "l1").await.unwrap();
    assert!(outcome.changed);
    let Persistence::Failed { pending, .. } = outcome.persistence else {
        panic!("expected persistence failure");
    };
    assert_eq!(engine.state().progress["m1"].lessons_completed, 1);

    sink.set_failing(false);
    assert!(engine.persist(pending).await.is_saved());
    assert_eq!(sink.events().len(), 1);
}

#[tokio::test]
async fn e2e_empty_bank_cannot_start() {
    let content = Arc::new(MockContentSource::with_bank("m1", vec![]));
    let mut engine = LearningEngine::new(
        content,
        Arc::new(RecordingSink::new()),
        LearnerState::new("alice"),
        EngineConfig::default(),
    );
    let mut rng = StdRng::seed_from_u64(0);

    let err = engine.start_quiz("m1", &mut rng).await.unwrap_err();
    assert!(matches!(err, LearnError::ContentUnavailable { .. }));
    assert!(engine.quiz().is_none());
}

#[tokio::test]
async fn e2e_review_session_schedules_cards() {
    let mut engine = engine_with(Arc::new(RecordingSink::new()));
    let mut rng = StdRng::seed_from_u64(3);
    let now = Utc::now();

    assert_eq!(engine.start_review(now, &mut rng), 2);
    engine.review_rate(Rating::Again, now).unwrap();
    engine.review_rate(Rating::Easy, now).unwrap();
    // The card rated Again comes round once more.
    engine.review_rate(Rating::Good, now).unwrap();
    assert!(engine.review_card().is_none());

    let summary = engine.finish_review(now);
    assert_eq!(summary.reviewed, 3);
    assert_eq!(summary.requeued, 1);
    assert_eq!(summary.remaining_due, 0);

    let later = now + Duration::days(4);
    assert_eq!(engine.start_review(later, &mut rng), 1, "only the Good card is due");
}

#[tokio::test]
async fn e2e_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("alice.json");

    let mut engine = engine_with(Arc::new(RecordingSink::new()));
    engine.complete_lesson("m1", "l1").await.unwrap();
    engine.state().save_json(&state_path).unwrap();

    let curriculum = curriculum();
    let restored = LearningEngine::new(
        Arc::new(FileContentSource::from_curricula(std::slice::from_ref(&curriculum))),
        Arc::new(RecordingSink::new()),
        LearnerState::load_or_new(&state_path, "alice").unwrap(),
        EngineConfig::default(),
    )
    .with_curriculum(&curriculum);

    assert_eq!(restored.state().progress["m1"].lessons_completed, 1);
    assert_eq!(restored.state().cards.len(), 2, "cards are not duplicated");
    assert!(restored.state().streak.current >= 1);
}

#[tokio::test]
async fn e2e_http_collaborators() {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/content/quiz"))
        .and(query_param("module", "m1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "questions": [
                {"id": "h1", "type": "tf", "question": "Over HTTP?", "answer": true},
                {"id": "bad", "type": "mcq", "question": "Broken", "options": [], "answer": 3}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/progress"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let mut engine = LearningEngine::new(
        Arc::new(HttpContentSource::new(&server.uri(), None).unwrap()),
        Arc::new(HttpProgressSink::new(&server.uri(), None).unwrap()),
        LearnerState::new("alice"),
        EngineConfig::default(),
    );
    let mut rng = StdRng::seed_from_u64(5);

    let session = engine.start_quiz("m1", &mut rng).await.unwrap();
    assert_eq!(session.len(), 1, "invalid questions are dropped");
    engine.answer(Answer::Bool(true)).unwrap();
    let outcome = engine.submit_quiz().await.unwrap();
    assert!(outcome.persistence.is_saved());
    assert_eq!(outcome.score.percentage, 100);
}
