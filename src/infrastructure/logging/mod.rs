//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber, to stderr in
//! JSON or human-readable form, with optional daily-rotated JSON files.

pub mod logger;

pub use logger::{LoggerImpl, LOG_FILE_NAME};
