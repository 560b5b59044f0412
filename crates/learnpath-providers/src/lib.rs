//! learnpath-providers: Content sources and progress sinks.
//!
//! Implements the `ContentSource` and `ProgressSink` traits over HTTP and
//! local files, plus in-memory doubles for tests, and loads the learnpath
//! configuration that picks between them.

pub mod config;
pub mod file;
pub mod http;
pub mod mock;

pub use config::{
    create_content_source, create_progress_sink, load_config, load_config_from, ContentConfig,
    LearnpathConfig, SinkConfig,
};
pub use learnpath_core::error::ProviderError;
