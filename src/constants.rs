//! Application-wide constants.
//!
//! Centralized configuration values to avoid magic numbers throughout the codebase.

use std::time::Duration;

/// Default timeout for individual git operations (in seconds).
/// Generous because a first clone of a large repository can take minutes.
/// On expiry only the git process is killed; an ssh or remote-helper child
/// it spawned is not and exits on its own once its pipe closes.
pub const DEFAULT_GIT_TIMEOUT_SECS: u64 = 600;

/// Environment variable overriding the git command timeout (in seconds).
pub const GIT_TIMEOUT_ENV: &str = "FLEET_GIT_TIMEOUT";

/// Returns the git command timeout.
///
/// Can be customized via the FLEET_GIT_TIMEOUT environment variable (in seconds).
/// Falls back to the default if not set or invalid.
///
/// Example: `FLEET_GIT_TIMEOUT=60 fleet sync`
pub fn git_timeout() -> Duration {
    std::env::var(GIT_TIMEOUT_ENV)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(DEFAULT_GIT_TIMEOUT_SECS))
}

/// How often a running git command is polled for completion.
pub const GIT_POLL_INTERVAL_MS: u64 = 20;

/// Number of repositories synchronized at the same time.
pub const DEFAULT_WORKER_COUNT: usize = 8;

/// Progress bar tick interval in milliseconds.
/// Controls how often the spinner/bar animates.
pub const PROGRESS_TICK_MS: u64 = 80;

/// Maximum number of completed repositories to show in the workspace progress display.
pub const MAX_VISIBLE_COMPLETIONS: usize = 5;

/// Branch kept current in every clone, whichever branch is checked out.
pub const DEFAULT_INTEGRATION_BRANCH: &str = "develop";

/// Remote every clone tracks.
pub const ORIGIN: &str = "origin";

/// Git directory name used to detect repositories.
pub const GIT_DIR: &str = ".git";

/// Workspace configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// GitLab asks for at most this many projects in one page.
pub const PROJECTS_PER_PAGE: u32 = 1000;

/// Glob used by the project runner to find launchable projects.
pub const PROJECT_GLOB: &str = "**/*.csproj";

/// Projects whose path contains this (case-insensitive) are never launched.
pub const TEST_PROJECT_MARKER: &str = "test";

/// Build output directories skipped while looking for projects.
pub const BUILD_OUTPUT_DIRS: &[&str] = &["bin", "obj"];
