//! Configuration and collaborator factory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use learnpath_core::aggregate::AtRiskPolicy;
use learnpath_core::engine::EngineConfig;
use learnpath_core::mastery::DEFAULT_CONCEPT_CHECK_MIN;
use learnpath_core::session::DEFAULT_MAX_QUESTIONS;
use learnpath_core::traits::{ContentSource, DiscardSink, ProgressSink};

use crate::file::{FileContentSource, JsonlProgressSink};
use crate::http::{HttpContentSource, HttpProgressSink};

/// Where question banks come from.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentConfig {
    File {
        #[serde(default = "default_content_path")]
        path: PathBuf,
    },
    Http {
        base_url: String,
        #[serde(default)]
        api_key: Option<String>,
    },
}

/// Where completion events go.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkConfig {
    File {
        #[serde(default = "default_events_path")]
        path: PathBuf,
    },
    Http {
        base_url: String,
        #[serde(default)]
        api_key: Option<String>,
    },
    None,
}

fn masked(key: &Option<String>) -> Option<&'static str> {
    key.as_ref().map(|_| "***")
}

impl std::fmt::Debug for ContentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentConfig::File { path } => f.debug_struct("File").field("path", path).finish(),
            ContentConfig::Http { base_url, api_key } => f
                .debug_struct("Http")
                .field("base_url", base_url)
                .field("api_key", &masked(api_key))
                .finish(),
        }
    }
}

impl std::fmt::Debug for SinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkConfig::File { path } => f.debug_struct("File").field("path", path).finish(),
            SinkConfig::Http { base_url, api_key } => f
                .debug_struct("Http")
                .field("base_url", base_url)
                .field("api_key", &masked(api_key))
                .finish(),
            SinkConfig::None => f.write_str("None"),
        }
    }
}

fn default_content_path() -> PathBuf {
    PathBuf::from("curriculum")
}
fn default_events_path() -> PathBuf {
    PathBuf::from("learnpath-events.jsonl")
}

impl Default for ContentConfig {
    fn default() -> Self {
        ContentConfig::File {
            path: default_content_path(),
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::File {
            path: default_events_path(),
        }
    }
}

/// Top-level learnpath configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnpathConfig {
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    /// Learner id used when none is given on the command line.
    #[serde(default = "default_user")]
    pub user_id: String,
    /// Questions presented per quiz session.
    #[serde(default = "default_max_questions")]
    pub max_quiz_questions: usize,
    /// Concept-check minimum for modules that do not set their own.
    #[serde(default = "default_concept_check_min")]
    pub concept_check_min_score: u32,
    /// Days before a due date at which an incomplete module flags the learner.
    #[serde(default = "default_lookahead")]
    pub at_risk_lookahead_days: u32,
    /// Max retries on transient collaborator errors.
    #[serde(default)]
    pub max_retries: u32,
    /// Initial delay between retries in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Max concurrent question-bank fetches.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Directory holding per-learner state files.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Output directory for reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_user() -> String {
    std::env::var("USER").unwrap_or_else(|_| "learner".to_string())
}
fn default_max_questions() -> usize {
    DEFAULT_MAX_QUESTIONS
}
fn default_concept_check_min() -> u32 {
    DEFAULT_CONCEPT_CHECK_MIN
}
fn default_lookahead() -> u32 {
    AtRiskPolicy::default().lookahead_days
}
fn default_retry_delay() -> u64 {
    500
}
fn default_parallelism() -> usize {
    4
}
fn default_state_dir() -> PathBuf {
    PathBuf::from(".learnpath")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./learnpath-reports")
}

impl Default for LearnpathConfig {
    fn default() -> Self {
        Self {
            content: ContentConfig::default(),
            sink: SinkConfig::default(),
            user_id: default_user(),
            max_quiz_questions: default_max_questions(),
            concept_check_min_score: default_concept_check_min(),
            at_risk_lookahead_days: default_lookahead(),
            max_retries: 0,
            retry_delay_ms: default_retry_delay(),
            parallelism: default_parallelism(),
            state_dir: default_state_dir(),
            output_dir: default_output_dir(),
        }
    }
}

impl LearnpathConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_quiz_questions: self.max_quiz_questions.max(1),
            concept_check_min: self.concept_check_min_score,
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            parallelism: self.parallelism.max(1),
        }
    }

    pub fn at_risk_policy(&self) -> AtRiskPolicy {
        AtRiskPolicy {
            lookahead_days: self.at_risk_lookahead_days,
        }
    }

    /// Path of the state file for one learner.
    pub fn state_path(&self, user_id: &str) -> PathBuf {
        self.state_dir.join(format!("{user_id}.json"))
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_endpoint(base_url: &mut String, api_key: &mut Option<String>, env_key: Option<&str>) {
    *base_url = resolve_env_vars(base_url);
    if let Some(key) = env_key {
        *api_key = Some(key.to_string());
    }
    if let Some(key) = api_key.as_mut() {
        *key = resolve_env_vars(key);
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `learnpath.toml` in the current directory
/// 2. `~/.config/learnpath/config.toml`
///
/// `LEARNPATH_API_KEY` overrides the API key of any HTTP endpoint and
/// `LEARNPATH_USER` overrides the learner id.
pub fn load_config() -> Result<LearnpathConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<LearnpathConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("learnpath.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => parse_config(&path)?,
        None => LearnpathConfig::default(),
    };

    let env_key = std::env::var("LEARNPATH_API_KEY").ok();
    match &mut config.content {
        ContentConfig::Http { base_url, api_key } => {
            resolve_endpoint(base_url, api_key, env_key.as_deref())
        }
        ContentConfig::File { path } => *path = PathBuf::from(resolve_env_vars(&path.to_string_lossy())),
    }
    match &mut config.sink {
        SinkConfig::Http { base_url, api_key } => {
            resolve_endpoint(base_url, api_key, env_key.as_deref())
        }
        SinkConfig::File { path } => *path = PathBuf::from(resolve_env_vars(&path.to_string_lossy())),
        SinkConfig::None => {}
    }
    if let Ok(user) = std::env::var("LEARNPATH_USER") {
        if !user.is_empty() {
            config.user_id = user;
        }
    }

    Ok(config)
}

fn parse_config(path: &Path) -> Result<LearnpathConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    toml::from_str::<LearnpathConfig>(&content)
        .with_context(|| format!("failed to parse config: {}", path.display()))
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("learnpath"))
}

/// Create a content source from its configuration.
pub fn create_content_source(config: &ContentConfig) -> Result<Box<dyn ContentSource>> {
    match config {
        ContentConfig::File { path } => Ok(Box::new(FileContentSource::load(path)?)),
        ContentConfig::Http { base_url, api_key } => {
            Ok(Box::new(HttpContentSource::new(base_url, api_key.clone())?))
        }
    }
}

/// Create a progress sink from its configuration.
pub fn create_progress_sink(config: &SinkConfig) -> Result<Box<dyn ProgressSink>> {
    match config {
        SinkConfig::File { path } => Ok(Box::new(JsonlProgressSink::new(path))),
        SinkConfig::Http { base_url, api_key } => {
            Ok(Box::new(HttpProgressSink::new(base_url, api_key.clone())?))
        }
        SinkConfig::None => Ok(Box::new(DiscardSink)),
    }
}
