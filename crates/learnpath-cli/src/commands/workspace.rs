//! Shared loading for the learner-facing commands: config, curriculum,
//! learner state and the engine wired to the configured collaborators.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

use learnpath_core::achievements::{self, EarnedAchievement};
use learnpath_core::engine::{ActivityReporter, LearnerState, LearningEngine};
use learnpath_core::model::{CompletionEvent, Curriculum};
use learnpath_core::parser::load_curricula;
use learnpath_core::scoring::QuizScore;
use learnpath_core::traits::{ContentSource, ProgressSink};
use learnpath_providers::config::load_config_from;
use learnpath_providers::file::FileContentSource;
use learnpath_providers::{create_content_source, create_progress_sink, ContentConfig, LearnpathConfig};

/// Console activity reporter.
pub struct ConsoleReporter;

impl ActivityReporter for ConsoleReporter {
    fn on_quiz_started(&self, module_id: &str, questions: usize) {
        eprintln!("Quiz: {module_id} ({questions} questions)\n");
    }

    fn on_quiz_submitted(&self, module_id: &str, score: &QuizScore) {
        let verdict = if score.passed { "PASSED" } else { "NOT PASSED" };
        eprintln!(
            "Submitted: {module_id} {}/{} ({}%) {verdict}",
            score.correct, score.total, score.percentage
        );
    }

    fn on_module_complete(&self, module_id: &str) {
        eprintln!("Module complete: {module_id}");
    }

    fn on_achievement(&self, earned: &EarnedAchievement) {
        match achievements::find(&earned.achievement_id) {
            Some(a) => eprintln!("Achievement unlocked: {} (+{} pts) - {}", a.name, a.points, a.description),
            None => eprintln!("Achievement unlocked: {}", earned.achievement_id),
        }
    }

    fn on_persistence_failed(&self, event: &CompletionEvent, error: &str) {
        eprintln!(
            "  WARNING: progress for {}/{} was not saved: {error}",
            event.module_id, event.lesson_id
        );
    }
}

/// Everything a learner command needs.
pub struct Workspace {
    pub config: LearnpathConfig,
    pub curriculum: Curriculum,
    pub user_id: String,
    state_path: PathBuf,
}

impl Workspace {
    pub fn open(
        config_path: Option<&Path>,
        curriculum_path: Option<PathBuf>,
        user: Option<String>,
    ) -> Result<Self> {
        let config = load_config_from(config_path)?;
        let curriculum_path = curriculum_path.unwrap_or_else(|| match &config.content {
            ContentConfig::File { path } => path.clone(),
            ContentConfig::Http { .. } => PathBuf::from("curriculum"),
        });
        let curriculum = load_merged(&curriculum_path)?;
        let user_id = user.unwrap_or_else(|| config.user_id.clone());
        anyhow::ensure!(!user_id.trim().is_empty(), "learner id must not be empty");
        let state_path = config.state_path(&user_id);
        tracing::debug!(
            curriculum = %curriculum_path.display(),
            modules = curriculum.modules.len(),
            state = %state_path.display(),
            "workspace opened for {user_id}"
        );

        Ok(Self {
            config,
            curriculum,
            user_id,
            state_path,
        })
    }

    pub fn load_state(&self) -> Result<LearnerState> {
        LearnerState::load_or_new(&self.state_path, &self.user_id)
    }

    pub fn save_state(&self, state: &LearnerState) -> Result<()> {
        state.save_json(&self.state_path)
    }

    /// Build the engine over the configured content source and sink, with
    /// the learner's saved state.
    pub fn engine(&self) -> Result<LearningEngine> {
        let content: Arc<dyn ContentSource> = match &self.config.content {
            ContentConfig::File { .. } => Arc::new(FileContentSource::from_curricula(
                std::slice::from_ref(&self.curriculum),
            )),
            other => Arc::from(create_content_source(other)?),
        };
        let sink: Arc<dyn ProgressSink> = Arc::from(create_progress_sink(&self.config.sink)?);
        let engine = LearningEngine::new(content, sink, self.load_state()?, self.config.engine_config())
            .with_reporter(Arc::new(ConsoleReporter))
            .with_curriculum(&self.curriculum);
        Ok(engine)
    }

    pub fn module_exists(&self, module_id: &str) -> Result<()> {
        if self.curriculum.module(module_id).is_none() {
            let known: Vec<&str> = self.curriculum.modules.iter().map(|m| m.id.as_str()).collect();
            anyhow::bail!("unknown module '{module_id}'. Available: {known:?}");
        }
        Ok(())
    }
}

/// Load every curriculum under `path` and merge them into one.
pub fn load_merged(path: &Path) -> Result<Curriculum> {
    let curricula = load_curricula(path)
        .with_context(|| format!("failed to load curriculum from {}", path.display()))?;
    anyhow::ensure!(
        !curricula.is_empty(),
        "no curriculum files found in {}",
        path.display()
    );
    if curricula.len() == 1 {
        return Ok(curricula.into_iter().next().unwrap_or_default());
    }

    let mut merged = Curriculum {
        id: "merged".to_string(),
        name: curricula
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(" + "),
        ..Default::default()
    };
    for c in curricula {
        merged.tracks.extend(c.tracks);
        merged.modules.extend(c.modules);
        merged.cards.extend(c.cards);
    }
    Ok(merged)
}

pub fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
