//! learnpath-core: Scoring, spaced repetition, mastery gates and progress.
//!
//! This crate defines the data model, the quiz session state machine, the
//! scheduling and gating rules, and the learner engine that the rest of
//! learnpath builds on.

pub mod achievements;
pub mod aggregate;
pub mod attempts;
pub mod engine;
pub mod error;
pub mod mastery;
pub mod model;
pub mod parser;
pub mod report;
pub mod scheduler;
pub mod scoring;
pub mod session;
pub mod traits;
