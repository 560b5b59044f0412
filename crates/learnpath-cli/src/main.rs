//! learnpath CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{ArgGroup, Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "learnpath",
    version,
    about = "Quizzes, spaced repetition and mastery tracking for training curricula"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a module quiz, answering on stdin
    Quiz {
        /// Module to quiz on
        #[arg(long)]
        module: String,

        /// Learner id (defaults to the configured user)
        #[arg(long)]
        user: Option<String>,

        /// Curriculum file or directory
        #[arg(long)]
        curriculum: Option<PathBuf>,

        /// Seed for question order
        #[arg(long)]
        seed: Option<u64>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Review due flashcards, rating each 1-4 on stdin
    Review {
        #[arg(long)]
        user: Option<String>,

        #[arg(long)]
        curriculum: Option<PathBuf>,

        /// Seed for card order
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Record a completed lesson, lab or project submission
    #[command(group(ArgGroup::new("activity").required(true).args(["lesson", "lab", "project"])))]
    Complete {
        #[arg(long)]
        module: String,

        /// Lesson id
        #[arg(long)]
        lesson: Option<String>,

        /// Lab id
        #[arg(long)]
        lab: Option<String>,

        /// Mark the module project as submitted
        #[arg(long)]
        project: bool,

        #[arg(long)]
        user: Option<String>,

        #[arg(long)]
        curriculum: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show track progress, module states and mastery requirements
    Path {
        #[arg(long)]
        user: Option<String>,

        #[arg(long)]
        curriculum: Option<PathBuf>,

        /// Show requirements for this module instead of the next one
        #[arg(long)]
        module: Option<String>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Build a team progress report from a progress snapshot
    Report {
        /// Progress snapshot JSON (records and assignments)
        #[arg(long)]
        progress: PathBuf,

        #[arg(long)]
        curriculum: Option<PathBuf>,

        /// Output directory
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: text, json, html, csv, all
        #[arg(long, default_value = "json")]
        format: String,

        /// Days ahead of a due date at which a learner is flagged at risk
        #[arg(long)]
        lookahead_days: Option<u32>,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compare two progress reports
    Compare {
        /// Baseline report JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current report JSON
        #[arg(long)]
        current: PathBuf,

        /// Regression threshold in percentage points
        #[arg(long, default_value = "1.0")]
        threshold: f64,

        /// Exit code 1 if regressions found
        #[arg(long)]
        fail_on_regression: bool,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Validate curriculum TOML files
    Validate {
        /// Path to curriculum file or directory
        #[arg(long)]
        curriculum: PathBuf,
    },

    /// Create starter config and example curriculum
    Init,
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("learnpath=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Quiz {
            module,
            user,
            curriculum,
            seed,
            config,
        } => commands::quiz::execute(module, user, curriculum, seed, config).await,
        Commands::Review {
            user,
            curriculum,
            seed,
            config,
        } => commands::review::execute(user, curriculum, seed, config),
        Commands::Complete {
            module,
            lesson,
            lab,
            project: _,
            user,
            curriculum,
            config,
        } => {
            // The arg group guarantees exactly one of the three.
            let activity = match (lesson, lab) {
                (Some(id), _) => commands::complete::Activity::Lesson(id),
                (None, Some(id)) => commands::complete::Activity::Lab(id),
                (None, None) => commands::complete::Activity::Project,
            };
            commands::complete::execute(module, activity, user, curriculum, config).await
        }
        Commands::Path {
            user,
            curriculum,
            module,
            format,
            config,
        } => commands::path::execute(user, curriculum, module, format, config),
        Commands::Report {
            progress,
            curriculum,
            output,
            format,
            lookahead_days,
            config,
        } => commands::report::execute(progress, curriculum, output, format, lookahead_days, config),
        Commands::Compare {
            baseline,
            current,
            threshold,
            fail_on_regression,
            format,
        } => commands::compare::execute(baseline, current, threshold, fail_on_regression, format),
        Commands::Validate { curriculum } => commands::validate::execute(curriculum),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
