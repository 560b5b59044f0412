//! The `learnpath init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("learnpath.toml").exists() {
        println!("learnpath.toml already exists, skipping.");
    } else {
        std::fs::write("learnpath.toml", SAMPLE_CONFIG)?;
        println!("Created learnpath.toml");
    }

    std::fs::create_dir_all("curriculum")?;
    let example_path = std::path::Path::new("curriculum/example.toml");
    if example_path.exists() {
        println!("curriculum/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_CURRICULUM)?;
        println!("Created curriculum/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit learnpath.toml (learner id, content and progress endpoints)");
    println!("  2. Run: learnpath validate --curriculum curriculum/example.toml");
    println!("  3. Run: learnpath path");
    println!("  4. Run: learnpath quiz --module prompt-basics");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# learnpath configuration

user_id = "learner"
max_quiz_questions = 10
concept_check_min_score = 75
at_risk_lookahead_days = 7
max_retries = 2
retry_delay_ms = 500
state_dir = ".learnpath"
output_dir = "./learnpath-reports"

[content]
type = "file"
path = "curriculum"

# [content]
# type = "http"
# base_url = "https://learn.example.com"
# api_key = "${LEARNPATH_API_KEY}"

[sink]
type = "file"
path = "learnpath-events.jsonl"
"#;

const EXAMPLE_CURRICULUM: &str = r#"[curriculum]
id = "prompting"
name = "Prompt Engineering"
description = "From first prompts to reusable prompt patterns"

[[tracks]]
id = "foundations"
name = "Foundations"
modules = ["prompt-basics", "prompt-patterns"]

[[modules]]
id = "prompt-basics"
title = "Prompt Basics"
lessons = 3
labs = 1
concept_check_min = 75

[[modules.questions]]
id = "basics-1"
type = "mcq"
question = "Which phrase encourages step-by-step reasoning?"
options = ["Answer in one word", "Let's think step by step", "Be creative"]
answer = 1
explanation = "Asking for step-by-step reasoning elicits chain-of-thought."

[[modules.questions]]
id = "basics-2"
type = "tf"
question = "Few-shot prompts include worked examples."
answer = true
explanation = "Few-shot prompting shows the model examples of the task."

[[modules.questions]]
id = "basics-3"
type = "short"
question = "Name the prompt framework: Context, Role, Action, Format, Tone."
answer = "CRAFT"

[[modules]]
id = "prompt-patterns"
title = "Prompt Patterns"
lessons = 4
labs = 2

[[modules.questions]]
id = "patterns-1"
type = "tf"
question = "A system prompt sets behaviour for the whole conversation."
answer = true

[[cards]]
id = "card-zero-shot"
front = "Zero-shot prompting"
back = "Asking the model to do a task without examples"
category = "basics"

[[cards]]
id = "card-few-shot"
front = "Few-shot prompting"
back = "Including worked examples of the task in the prompt"
category = "basics"
"#;
