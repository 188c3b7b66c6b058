//! Error taxonomy. Only session-lifecycle misuse and start-time setup
//! failures surface to callers; transient collection/query failures are
//! logged and degraded instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// `start()` was called while a session is already running.
    #[error("monitoring is already running")]
    AlreadyRunning,

    /// `stop()` was called on a session that never started or was
    /// already collected.
    #[error("monitoring is not running")]
    NotRunning,

    /// The metrics provider failed to produce a snapshot. Transient
    /// inside the loop (skip the tick); surfaced only by mock/test
    /// providers and after repeated consecutive failures.
    #[error("metrics provider unavailable: {0}")]
    Provider(String),

    /// Opening or writing the sample sink failed.
    #[error("sample sink: {0}")]
    Sink(#[from] std::io::Error),

    /// A process filter pattern failed to compile as a regex.
    #[error("invalid process filter: {0}")]
    InvalidFilter(#[from] regex::Error),
}
