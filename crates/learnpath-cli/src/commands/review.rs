//! The `learnpath review` command.

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;

use learnpath_core::model::Rating;
use learnpath_core::scheduler::{interval_label, preview_intervals};

use super::workspace::{rng, Workspace};

pub fn execute(
    user: Option<String>,
    curriculum: Option<PathBuf>,
    seed: Option<u64>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let workspace = Workspace::open(config_path.as_deref(), curriculum, user)?;
    let mut engine = workspace.engine()?;

    let mut rng = rng(seed);
    let due = engine.start_review(Utc::now(), &mut rng);
    if due == 0 {
        println!("No cards due. Come back later.");
        workspace.save_state(engine.state())?;
        return Ok(());
    }
    println!("{due} card(s) due.\n");

    let choices = preview_intervals()
        .iter()
        .map(|(rating, days)| format!("{}={} ({})", u8::from(*rating), rating.label(), interval_label(*days)))
        .collect::<Vec<_>>()
        .join("  ");

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    while let Some(card) = engine.review_card().cloned() {
        println!("[{}] {}", card.category, card.front);
        println!("  {}", card.back);
        println!("Rate recall, or q to stop: {choices}");

        let Some(line) = lines.next().transpose()? else {
            break;
        };
        let input = line.trim();
        if input.eq_ignore_ascii_case("q") {
            break;
        }
        let rating: Rating = match input.parse() {
            Ok(rating) => rating,
            Err(e) => {
                println!("  {e}");
                continue;
            }
        };

        let rated = engine.review_rate(rating, Utc::now())?;
        println!(
            "  Next review in {} (ease {})\n",
            interval_label(rated.interval_days),
            rated.ease
        );
    }

    let summary = engine.finish_review(Utc::now());
    println!(
        "Reviewed {} card(s), {} repeated. {} still due.",
        summary.reviewed, summary.requeued, summary.remaining_due
    );

    workspace.save_state(engine.state())?;
    Ok(())
}
