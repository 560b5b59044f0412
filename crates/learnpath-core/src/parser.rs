//! TOML curriculum parser.
//!
//! Loads curricula (tracks, modules with their question banks, flashcards)
//! from TOML files and directories, and validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{Curriculum, ModuleDefinition, SpacedRepetitionCard, Track};

/// Intermediate TOML structure for parsing curriculum files.
#[derive(Debug, Deserialize)]
struct TomlCurriculumFile {
    curriculum: TomlCurriculumHeader,
    #[serde(default)]
    tracks: Vec<Track>,
    #[serde(default)]
    modules: Vec<ModuleDefinition>,
    #[serde(default)]
    cards: Vec<SpacedRepetitionCard>,
}

#[derive(Debug, Deserialize)]
struct TomlCurriculumHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

/// Parse a single TOML file into a `Curriculum`.
pub fn parse_curriculum(path: &Path) -> Result<Curriculum> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read curriculum file: {}", path.display()))?;

    parse_curriculum_str(&content, path)
}

/// Parse a TOML string into a `Curriculum` (useful for testing).
pub fn parse_curriculum_str(content: &str, source_path: &Path) -> Result<Curriculum> {
    let parsed: TomlCurriculumFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    Ok(Curriculum {
        id: parsed.curriculum.id,
        name: parsed.curriculum.name,
        description: parsed.curriculum.description,
        tracks: parsed.tracks,
        modules: parsed.modules,
        cards: parsed.cards,
    })
}

/// Recursively load all `.toml` curriculum files from a directory.
/// Files that fail to parse are skipped with a warning.
pub fn load_curriculum_directory(dir: &Path) -> Result<Vec<Curriculum>> {
    let mut curricula = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();

        if path.is_dir() {
            curricula.extend(load_curriculum_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_curriculum(&path) {
                Ok(curriculum) => curricula.push(curriculum),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(curricula)
}

/// Load a curriculum file, or every curriculum in a directory.
pub fn load_curricula(path: &Path) -> Result<Vec<Curriculum>> {
    if path.is_dir() {
        load_curriculum_directory(path)
    } else {
        Ok(vec![parse_curriculum(path)?])
    }
}

/// A warning from curriculum validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The module, question or card the warning is about (if applicable).
    pub subject_id: Option<String>,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn about(subject: &str, message: impl Into<String>) -> Self {
        Self {
            subject_id: Some(subject.to_string()),
            message: message.into(),
        }
    }
}

/// Validate a curriculum for common authoring issues.
pub fn validate_curriculum(curriculum: &Curriculum) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    // Duplicate ids
    let mut seen_modules = HashSet::new();
    for module in &curriculum.modules {
        if !seen_modules.insert(module.id.as_str()) {
            warnings.push(ValidationWarning::about(
                &module.id,
                format!("duplicate module ID: {}", module.id),
            ));
        }
    }
    let mut seen_cards = HashSet::new();
    for card in &curriculum.cards {
        if !seen_cards.insert(card.id.as_str()) {
            warnings.push(ValidationWarning::about(
                &card.id,
                format!("duplicate card ID: {}", card.id),
            ));
        }
    }

    // Track references
    let mut in_track = HashSet::new();
    for track in &curriculum.tracks {
        if track.modules.is_empty() {
            warnings.push(ValidationWarning::about(&track.id, "track has no modules"));
        }
        for module_id in &track.modules {
            if !seen_modules.contains(module_id.as_str()) {
                warnings.push(ValidationWarning::about(
                    module_id,
                    format!("track '{}' references undefined module", track.id),
                ));
            }
            if !in_track.insert(module_id.as_str()) {
                warnings.push(ValidationWarning::about(
                    module_id,
                    "module appears more than once across tracks",
                ));
            }
        }
    }
    if !curriculum.tracks.is_empty() {
        for module in &curriculum.modules {
            if !in_track.contains(module.id.as_str()) {
                warnings.push(ValidationWarning::about(
                    &module.id,
                    "module is not part of any track and can never unlock",
                ));
            }
        }
    }

    // Question banks and requirements
    for module in &curriculum.modules {
        if module.questions.is_empty() {
            warnings.push(ValidationWarning::about(
                &module.id,
                "question bank is empty; the concept check cannot start",
            ));
        }

        let mut seen_questions = HashSet::new();
        for question in &module.questions {
            if !seen_questions.insert(question.id.as_str()) {
                warnings.push(ValidationWarning::about(
                    &question.id,
                    format!("duplicate question ID in module '{}'", module.id),
                ));
            }
            if let Err(e) = question.validate() {
                warnings.push(ValidationWarning::about(&question.id, e.to_string()));
            }
            if question.prompt.trim().is_empty() {
                warnings.push(ValidationWarning::about(&question.id, "prompt is empty"));
            }
        }

        for (name, required) in [
            ("lessons", Some(module.lessons)),
            ("labs", Some(module.labs)),
            ("concept_check_min", module.concept_check_min),
        ] {
            if required == Some(0) {
                warnings.push(ValidationWarning::about(
                    &module.id,
                    format!("{name} = 0, requirement is trivially met"),
                ));
            }
        }
        if module.concept_check_min.is_some_and(|min| min > 100) {
            warnings.push(ValidationWarning::about(
                &module.id,
                "concept_check_min above 100 can never be met",
            ));
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Answer, QuestionKind};
    use std::path::PathBuf;

    const VALID_TOML: &str = r#"
[curriculum]
id = "prompting"
name = "Prompt Engineering"
description = "From basics to production prompting"

[[tracks]]
id = "foundations"
name = "Foundations"
modules = ["basics", "patterns"]

[[modules]]
id = "basics"
title = "Prompt Basics"
lessons = 4
labs = 2
concept_check_min = 75

[[modules.questions]]
id = "b1"
type = "mcq"
question = "Which phrase triggers chain-of-thought reasoning?"
options = ["Be concise", "Let's think step by step", "Answer quickly"]
answer = 1
explanation = "Asking the model to reason step by step elicits chain-of-thought."

[[modules.questions]]
id = "b2"
type = "tf"
question = "Few-shot prompts include worked examples."
answer = true

[[modules]]
id = "patterns"
title = "Prompt Patterns"
lessons = 5
labs = 3
project = true

[[modules.questions]]
id = "p1"
type = "short"
question = "Name the framework: Context, Role, Action, Format, Tone."
answer = "CRAFT"

[[cards]]
id = "card-1"
front = "Zero-shot prompting"
back = "Asking without examples"
category = "basics"
"#;

    #[test]
    fn parse_valid_toml() {
        let c = parse_curriculum_str(VALID_TOML, &PathBuf::from("test.toml")).unwrap();
        assert_eq!(c.id, "prompting");
        assert_eq!(c.tracks[0].modules, vec!["basics", "patterns"]);
        assert_eq!(c.modules.len(), 2);

        let basics = c.module("basics").unwrap();
        assert_eq!(basics.questions.len(), 2);
        assert_eq!(basics.questions[0].kind, QuestionKind::MultipleChoice);
        assert_eq!(basics.questions[0].correct_answer, Answer::Choice(1));
        assert_eq!(basics.questions[1].correct_answer, Answer::Bool(true));
        assert!(basics.project, "project defaults to required");

        let patterns = c.module("patterns").unwrap();
        assert_eq!(patterns.concept_check_min, None);
        assert_eq!(
            patterns.questions[0].correct_answer,
            Answer::Text("CRAFT".into())
        );
        assert_eq!(c.cards[0].ease, 3);
        assert_eq!(c.cards[0].interval_days, 1);

        assert!(validate_curriculum(&c).is_empty());
    }

    #[test]
    fn parse_minimal() {
        let toml = r#"
[curriculum]
id = "minimal"
name = "Minimal"
"#;
        let c = parse_curriculum_str(toml, &PathBuf::from("test.toml")).unwrap();
        assert!(c.tracks.is_empty());
        assert!(c.modules.is_empty());
        assert!(validate_curriculum(&c).is_empty());
    }

    #[test]
    fn validate_reports_authoring_problems() {
        let toml = r#"
[curriculum]
id = "broken"
name = "Broken"

[[tracks]]
id = "t1"
name = "Track"
modules = ["m1", "ghost"]

[[modules]]
id = "m1"
title = "One"
lessons = 3
labs = 0

[[modules.questions]]
id = "q1"
type = "mcq"
question = "Pick"
options = ["a", "b"]
answer = 5

[[modules.questions]]
id = "q1"
type = "tf"
question = "True?"
answer = "yes"

[[modules]]
id = "m1"
title = "Duplicate"

[[modules]]
id = "orphan"
title = "Orphan"
lessons = 1
labs = 1
"#;
        let c = parse_curriculum_str(toml, &PathBuf::from("test.toml")).unwrap();
        let messages: Vec<String> = validate_curriculum(&c)
            .into_iter()
            .map(|w| format!("{}: {}", w.subject_id.unwrap_or_default(), w.message))
            .collect();
        let has = |needle: &str| messages.iter().any(|m| m.contains(needle));

        assert!(has("duplicate module ID: m1"), "{messages:?}");
        assert!(has("ghost: track 't1' references undefined module"));
        assert!(has("orphan: module is not part of any track"));
        assert!(has("out of range"));
        assert!(has("duplicate question ID"));
        assert!(has("true-false question cannot have answer"));
        assert!(has("labs = 0"));
        assert!(has("orphan: question bank is empty"));
    }

    #[test]
    fn parse_malformed_toml() {
        let bad = "this is not [valid toml }{";
        let result = parse_curriculum_str(bad, &PathBuf::from("bad.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn load_directory_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.toml"), VALID_TOML).unwrap();
        std::fs::write(dir.path().join("bad.toml"), "not = [valid").unwrap();
        std::fs::write(dir.path().join("notes.md"), "# ignored").unwrap();

        let curricula = load_curriculum_directory(dir.path()).unwrap();
        assert_eq!(curricula.len(), 1);
        assert_eq!(curricula[0].id, "prompting");

        let single = load_curricula(&dir.path().join("good.toml")).unwrap();
        assert_eq!(single.len(), 1);
    }
}
