//! The `learnpath path` command.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use comfy_table::{Cell, Table};
use serde::Serialize;

use learnpath_core::achievements::total_points;
use learnpath_core::mastery::{CurriculumPath, MasteryEvaluation, ModuleState, TrackStatus};
use learnpath_core::scheduler::due_cards;

use super::quiz::completed_modules;
use super::workspace::Workspace;

#[derive(Serialize)]
struct PathView {
    user_id: String,
    tracks: Vec<TrackStatus>,
    next_module: Option<String>,
    mastery: Option<MasteryEvaluation>,
    streak_days: u32,
    longest_streak: u32,
    points: u32,
    achievements: Vec<String>,
    cards_due: usize,
}

pub fn execute(
    user: Option<String>,
    curriculum: Option<PathBuf>,
    module: Option<String>,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let workspace = Workspace::open(config_path.as_deref(), curriculum, user)?;
    if let Some(module_id) = &module {
        workspace.module_exists(module_id)?;
    }
    let engine = workspace.engine()?;
    let state = engine.state();

    let complete = completed_modules(&engine, &workspace.curriculum);
    let path = CurriculumPath::new(workspace.curriculum.tracks.clone());
    let next_module = path.next_module(&complete).map(str::to_string);
    let focus = module.or_else(|| next_module.clone());

    let view = PathView {
        user_id: state.user_id.clone(),
        tracks: path.statuses(&complete, next_module.as_deref()),
        mastery: focus.as_deref().map(|m| engine.mastery(m)),
        next_module,
        streak_days: state.streak.current,
        longest_streak: state.streak.longest,
        points: total_points(&state.achievements),
        achievements: state
            .achievements
            .iter()
            .map(|a| a.achievement_id.clone())
            .collect(),
        cards_due: due_cards(&state.cards, Utc::now()).len(),
    };

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&view)?),
        _ => print_text(&view),
    }
    Ok(())
}

fn print_text(view: &PathView) {
    println!("Learner: {}", view.user_id);

    let mut table = Table::new();
    table.set_header(vec!["Track", "Module", "State"]);
    for track in &view.tracks {
        for (i, status) in track.modules.iter().enumerate() {
            let track_cell = if i == 0 {
                format!("{} ({}%)", track.name, track.percent_complete)
            } else {
                String::new()
            };
            let marker = match status.state {
                ModuleState::Complete => "complete",
                ModuleState::Current => "current >",
                ModuleState::Available => "available",
                ModuleState::Locked => "locked",
            };
            table.add_row(vec![
                Cell::new(track_cell),
                Cell::new(&status.module_id),
                Cell::new(marker),
            ]);
        }
    }
    println!("{table}");

    match &view.next_module {
        Some(next) => println!("Next up: {next}"),
        None => println!("All modules complete."),
    }

    if let Some(mastery) = &view.mastery {
        println!(
            "\nMastery for {}: {}/{} requirements met",
            mastery.module_id,
            mastery.met_count(),
            mastery.requirements.len()
        );
        for req in &mastery.requirements {
            println!(
                "  [{}] {} {}%",
                if req.met { "x" } else { " " },
                req.label,
                req.percentage()
            );
        }
    }

    println!(
        "\nStreak: {} day(s) (best {}) | Points: {} | Cards due: {}",
        view.streak_days, view.longest_streak, view.points, view.cards_due
    );
}
