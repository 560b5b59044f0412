//! The `learnpath quiz` command.

use std::collections::HashSet;
use std::io::BufRead;
use std::path::PathBuf;

use anyhow::Result;

use learnpath_core::engine::LearningEngine;
use learnpath_core::model::{Answer, Curriculum, QuestionKind, QuizQuestion};

use super::workspace::{rng, Workspace};

pub async fn execute(
    module_id: String,
    user: Option<String>,
    curriculum: Option<PathBuf>,
    seed: Option<u64>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let workspace = Workspace::open(config_path.as_deref(), curriculum, user)?;
    workspace.module_exists(&module_id)?;

    let mut engine = workspace.engine()?;
    let mut rng = rng(seed);
    engine.start_quiz(&module_id, &mut rng).await?;

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        let Some(session) = engine.quiz() else { break };
        let Some(question) = session.current().cloned() else { break };
        println!("Question {}/{}: {}", session.cursor() + 1, session.len(), question.prompt);
        for (i, option) in question.options.iter().enumerate() {
            println!("  {}. {option}", i + 1);
        }
        println!("{}", hint(&question));

        let Some(line) = lines.next().transpose()? else {
            anyhow::bail!(
                "quiz abandoned: input ended before question {} was answered",
                session.cursor() + 1
            );
        };
        let answer = match parse_answer(&question, &line) {
            Ok(answer) => answer,
            Err(e) => {
                println!("  {e}");
                continue;
            }
        };

        let feedback = engine.answer(answer)?;
        if feedback.correct {
            println!("  Correct!");
        } else {
            println!("  Incorrect. Answer: {}", describe(&question, &feedback.correct_answer));
        }
        if !feedback.explanation.is_empty() {
            println!("  {}", feedback.explanation);
        }
        println!();

        if engine.quiz_mut().and_then(|s| s.next()).is_none() {
            break;
        }
    }

    let outcome = engine.submit_quiz().await?;
    println!(
        "Score: {}/{} ({}%) {}",
        outcome.score.correct,
        outcome.score.total,
        outcome.score.percentage,
        if outcome.score.passed { "PASSED" } else { "NOT PASSED" }
    );

    let missed: Vec<_> = engine
        .review_quiz()?
        .into_iter()
        .filter(|item| !item.correct)
        .collect();
    if !missed.is_empty() {
        println!("\nReview:");
        for item in &missed {
            let given = item
                .given
                .as_ref()
                .map(|a| describe(&item.question, a))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {} you said {given}, answer is {}",
                item.question.prompt,
                describe(&item.question, &item.question.correct_answer)
            );
        }
    }

    let evaluation = engine.mastery(&module_id);
    println!(
        "\nMastery: {}/{} requirements met{}",
        evaluation.met_count(),
        evaluation.requirements.len(),
        if outcome.module_complete { ", module complete" } else { "" }
    );

    workspace.save_state(engine.state())?;
    Ok(())
}

/// Modules whose gates are fully met.
pub fn completed_modules(engine: &LearningEngine, curriculum: &Curriculum) -> HashSet<String> {
    curriculum
        .modules
        .iter()
        .filter(|m| engine.is_module_complete(&m.id))
        .map(|m| m.id.clone())
        .collect()
}

fn hint(question: &QuizQuestion) -> &'static str {
    match question.kind {
        QuestionKind::MultipleChoice => "Answer with an option number:",
        QuestionKind::TrueFalse => "Answer true or false:",
        QuestionKind::ShortAnswer => "Answer:",
    }
}

/// Human-readable form of an answer, showing option text for choices.
fn describe(question: &QuizQuestion, answer: &Answer) -> String {
    match answer {
        Answer::Choice(i) => match question.options.get(*i) {
            Some(text) => format!("{}. {text}", i + 1),
            None => answer.to_string(),
        },
        other => other.to_string(),
    }
}

/// Parse one line of learner input for a question.
pub fn parse_answer(question: &QuizQuestion, input: &str) -> Result<Answer> {
    let input = input.trim();
    match question.kind {
        QuestionKind::MultipleChoice => {
            let n: usize = input
                .parse()
                .map_err(|_| anyhow::anyhow!("'{input}' is not an option number"))?;
            anyhow::ensure!(
                (1..=question.options.len()).contains(&n),
                "choose an option between 1 and {}",
                question.options.len()
            );
            Ok(Answer::Choice(n - 1))
        }
        QuestionKind::TrueFalse => match input.to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" => Ok(Answer::Bool(true)),
            "false" | "f" | "no" | "n" => Ok(Answer::Bool(false)),
            _ => anyhow::bail!("answer true or false"),
        },
        QuestionKind::ShortAnswer => {
            anyhow::ensure!(!input.is_empty(), "an answer is required");
            Ok(Answer::Text(input.to_string()))
        }
    }
}
