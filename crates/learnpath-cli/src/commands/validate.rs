//! The `learnpath validate` command.

use std::path::PathBuf;

use anyhow::Result;

use learnpath_core::parser::{load_curricula, validate_curriculum};

pub fn execute(curriculum_path: PathBuf) -> Result<()> {
    let curricula = load_curricula(&curriculum_path)?;
    anyhow::ensure!(
        !curricula.is_empty(),
        "no curriculum files found in {}",
        curriculum_path.display()
    );

    let mut total_warnings = 0;

    for curriculum in &curricula {
        let questions: usize = curriculum.modules.iter().map(|m| m.questions.len()).sum();
        println!(
            "Curriculum: {} ({} tracks, {} modules, {} questions, {} cards)",
            curriculum.name,
            curriculum.tracks.len(),
            curriculum.modules.len(),
            questions,
            curriculum.cards.len()
        );

        let warnings = validate_curriculum(curriculum);
        for w in &warnings {
            let prefix = w
                .subject_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All curricula valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
