//! The `learnpath complete` command.

use std::path::PathBuf;

use anyhow::Result;

use learnpath_core::engine::Persistence;

use super::workspace::Workspace;

/// What the learner finished.
pub enum Activity {
    Lesson(String),
    Lab(String),
    Project,
}

pub async fn execute(
    module_id: String,
    activity: Activity,
    user: Option<String>,
    curriculum: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let workspace = Workspace::open(config_path.as_deref(), curriculum, user)?;
    workspace.module_exists(&module_id)?;
    let mut engine = workspace.engine()?;

    let (what, outcome) = match &activity {
        Activity::Lesson(id) => (format!("lesson {id}"), engine.complete_lesson(&module_id, id).await?),
        Activity::Lab(id) => (format!("lab {id}"), engine.complete_lab(&module_id, id).await?),
        Activity::Project => ("project".to_string(), engine.submit_project(&module_id).await?),
    };

    if outcome.changed {
        println!("Recorded {what} for {module_id}.");
    } else {
        println!("{what} for {module_id} was already recorded.");
    }
    if let Persistence::Failed { reason, .. } = &outcome.persistence {
        println!("Saved locally only: {reason}");
    }

    let evaluation = engine.mastery(&module_id);
    for req in &evaluation.requirements {
        let required = req
            .required
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  [{}] {}: {}/{} ({}%)",
            if req.met { "x" } else { " " },
            req.label,
            req.current,
            required,
            req.percentage()
        );
    }
    if outcome.module_complete {
        println!("Module {module_id} complete.");
    }

    workspace.save_state(engine.state())?;
    Ok(())
}
