//! Error taxonomy.
//!
//! ```text
//! ConfigError    fatal before dispatch (except Parse/Read, which degrade to defaults)
//! HostingError   fatal before dispatch
//! GitError       per repository, captured as a failed SyncOutcome
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A key the synchronizer cannot run without.
    #[error("missing hosting configuration `{0}` (set it in config.json or pass it on the command line)")]
    MissingHostingKey(&'static str),

    /// The configuration file exists but is not valid JSON.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The configuration file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures talking to the hosting API.
#[derive(Debug, Error)]
pub enum HostingError {
    #[error("invalid hosting URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("could not decode project list from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Two projects normalize to the same local directory.
    #[error("projects {first:?} and {second:?} both map to directory `{name}`")]
    NameCollision {
        name: String,
        first: String,
        second: String,
    },
}

/// Failures of a single git invocation.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to execute git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("git {args} failed: {stderr}")]
    CommandFailed { args: String, stderr: String },

    #[error("git {args} timed out after {}s", .timeout.as_secs())]
    Timeout { args: String, timeout: Duration },

    #[error("HEAD is detached")]
    DetachedHead,

    #[error("invalid branch name: {0:?}")]
    InvalidBranch(String),
}
