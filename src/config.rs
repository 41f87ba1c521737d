//! Configuration types: runtime options and the workspace `config.json`.

use crate::constants::{DEFAULT_INTEGRATION_BRANCH, DEFAULT_WORKER_COUNT, git_timeout};
use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Runtime configuration derived from CLI arguments and the workspace file.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Controls the verbosity level of CLI output.
    pub verbosity: Verbosity,
    /// Upper bound on repositories synchronized at the same time.
    pub workers: usize,
    /// Upper bound on a single git invocation.
    pub git_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::default(),
            workers: DEFAULT_WORKER_COUNT,
            git_timeout: git_timeout(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    #[must_use]
    pub fn is_verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    /// Default `tracing` filter directive for this verbosity.
    ///
    /// Normal mode only surfaces errors so that log lines do not tear the
    /// progress bar. Conditions the operator must see are printed by
    /// [`crate::output`] instead.
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        match self.verbosity {
            Verbosity::Quiet => "off",
            Verbosity::Normal => "error",
            Verbosity::Verbose => "debug",
        }
    }
}

/// Verbosity level for CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

/// Contents of the workspace `config.json`.
///
/// Every key is optional; the synchronizer checks for the hosting keys itself.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Hosting API host, usually without a scheme (`gitlab.example.com`).
    pub gitlab_url: Option<String>,
    /// Private token sent with the project query.
    pub gitlab_token: Option<String>,
    /// Substrings that exclude a project by name or clone URL.
    pub ignore_list: Vec<String>,
    /// Service directories for the project runner (older key).
    pub apis: Vec<String>,
    /// Service directories for the project runner.
    pub dotnet_projects: Vec<String>,
    /// Pool capacity for `sync`.
    pub jobs: Option<usize>,
    /// Branch kept current regardless of the checked-out branch.
    pub integration_branch: Option<String>,
    pub git_timeout_secs: Option<u64>,
}

impl WorkspaceConfig {
    /// Parses a configuration document.
    pub fn from_json(path: &Path, text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads `path`, reporting every failure.
    pub fn read(path: &Path) -> Result<Option<Self>, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_json(path, &text).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Resolves hosting settings, letting command-line values win over the file.
    pub fn hosting(
        &self,
        url_override: Option<&str>,
        token_override: Option<&str>,
    ) -> Result<HostingSettings, ConfigError> {
        let url = pick(url_override, self.gitlab_url.as_deref())
            .ok_or(ConfigError::MissingHostingKey("gitlab_url"))?;
        let token = pick(token_override, self.gitlab_token.as_deref())
            .ok_or(ConfigError::MissingHostingKey("gitlab_token"))?;
        Ok(HostingSettings { url, token })
    }

    /// Service directories for the project runner.
    #[must_use]
    pub fn service_projects(&self) -> &[String] {
        if self.dotnet_projects.is_empty() {
            &self.apis
        } else {
            &self.dotnet_projects
        }
    }

    #[must_use]
    pub fn integration_branch(&self) -> &str {
        self.integration_branch
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or(DEFAULT_INTEGRATION_BRANCH)
    }
}

fn pick(primary: Option<&str>, fallback: Option<&str>) -> Option<String> {
    primary
        .or(fallback)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Where and as whom to query the hosting API.
#[derive(Clone, PartialEq, Eq)]
pub struct HostingSettings {
    pub url: String,
    pub token: String,
}

impl std::fmt::Debug for HostingSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostingSettings")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(text: &str) -> Result<WorkspaceConfig, ConfigError> {
        WorkspaceConfig::from_json(&PathBuf::from("config.json"), text)
    }

    #[test]
    fn test_config_quiet_and_verbose_flags() {
        let quiet = Config {
            verbosity: Verbosity::Quiet,
            ..Config::default()
        };
        assert!(quiet.is_quiet());
        assert!(!quiet.is_verbose());

        let verbose = Config {
            verbosity: Verbosity::Verbose,
            ..Config::default()
        };
        assert!(!verbose.is_quiet());
        assert!(verbose.is_verbose());
    }

    #[test]
    fn test_log_filter_follows_verbosity() {
        let mut config = Config::default();
        assert_eq!(config.log_filter(), "error");
        config.verbosity = Verbosity::Quiet;
        assert_eq!(config.log_filter(), "off");
        config.verbosity = Verbosity::Verbose;
        assert_eq!(config.log_filter(), "debug");
    }

    #[test]
    fn test_parses_all_recognized_keys() -> anyhow::Result<()> {
        let config = parse(
            r#"{
                "gitlab_url": "gitlab.example.com",
                "gitlab_token": "secret",
                "ignore_list": ["test", "tour"],
                "apis": ["orders-api"],
                "dotnet_projects": ["billing"],
                "jobs": 4,
                "integration_branch": "dev",
                "git_timeout_secs": 90
            }"#,
        )?;

        assert_eq!(config.gitlab_url.as_deref(), Some("gitlab.example.com"));
        assert_eq!(config.ignore_list, vec!["test", "tour"]);
        assert_eq!(config.service_projects(), ["billing".to_string()]);
        assert_eq!(config.jobs, Some(4));
        assert_eq!(config.integration_branch(), "dev");
        assert_eq!(config.git_timeout_secs, Some(90));
        Ok(())
    }

    #[test]
    fn test_empty_object_gives_defaults() -> anyhow::Result<()> {
        let config = parse("{}")?;
        assert_eq!(config, WorkspaceConfig::default());
        assert_eq!(config.integration_branch(), "develop");
        Ok(())
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        assert!(matches!(
            parse("{ gitlab_url: "),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_hosting_requires_url_and_token() {
        let config = WorkspaceConfig {
            gitlab_url: Some("gitlab.example.com".to_string()),
            ..WorkspaceConfig::default()
        };
        assert!(matches!(
            config.hosting(None, None),
            Err(ConfigError::MissingHostingKey("gitlab_token"))
        ));
        assert!(matches!(
            WorkspaceConfig::default().hosting(None, Some("t")),
            Err(ConfigError::MissingHostingKey("gitlab_url"))
        ));
    }

    #[test]
    fn test_hosting_overrides_win_and_blank_values_count_as_missing() -> anyhow::Result<()> {
        let config = WorkspaceConfig {
            gitlab_url: Some("file.example.com".to_string()),
            gitlab_token: Some("   ".to_string()),
            ..WorkspaceConfig::default()
        };
        assert!(config.hosting(None, None).is_err());

        let settings = config.hosting(Some("cli.example.com"), Some("cli-token"))?;
        assert_eq!(settings.url, "cli.example.com");
        assert_eq!(settings.token, "cli-token");
        Ok(())
    }

    #[test]
    fn test_hosting_settings_debug_hides_token() {
        let settings = HostingSettings {
            url: "gitlab.example.com".to_string(),
            token: "super-secret".to_string(),
        };
        assert!(!format!("{settings:?}").contains("super-secret"));
    }

    #[test]
    fn test_service_projects_falls_back_to_apis() {
        let config = WorkspaceConfig {
            apis: vec!["orders-api".to_string()],
            ..WorkspaceConfig::default()
        };
        assert_eq!(config.service_projects(), ["orders-api".to_string()]);
    }
}
