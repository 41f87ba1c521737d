//! Git command wrappers.
//!
//! This module provides a thin wrapper around git CLI commands,
//! handling command execution, timeouts and error formatting.

use crate::config::Config;
use crate::constants::{GIT_POLL_INTERVAL_MS, ORIGIN};
use crate::error::GitError;
use crate::sync::VersionControlClient;
use anyhow::Context;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Runs `git <args>` inside `repo` and returns its trimmed stdout.
///
/// The command is killed once `config.git_timeout` elapses. Prompts are
/// disabled so that a missing credential fails instead of hanging.
pub fn run_git(repo: &Path, config: &Config, args: &[&str]) -> anyhow::Result<String> {
    let joined = args.join(" ");
    debug!(repo = %repo.display(), "git {}", joined);

    let mut child = Command::new("git")
        .current_dir(repo)
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(GitError::Spawn)?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + config.git_timeout;
    let status = loop {
        if let Some(status) = child.try_wait().map_err(GitError::Spawn)? {
            break status;
        }
        if Instant::now() >= deadline {
            // Only git itself is killed. A transport helper it started (ssh,
            // a remote helper) is orphaned and may keep the pipes open, so
            // the readers are left detached instead of joined.
            let _ = child.kill();
            let _ = child.wait();
            return Err(GitError::Timeout {
                args: joined,
                timeout: config.git_timeout,
            }
            .into());
        }
        thread::sleep(Duration::from_millis(GIT_POLL_INTERVAL_MS));
    };

    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();

    if status.success() {
        let result = String::from_utf8_lossy(&stdout);
        trace!(output = %result, "git {} succeeded", joined);
        Ok(result.as_ref().trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&stderr);
        Err(GitError::CommandFailed {
            args: joined,
            stderr: stderr.trim().to_string(),
        }
        .into())
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn validate_branch_name(branch: &str) -> anyhow::Result<()> {
    if branch.is_empty()
        || branch.contains('\0')
        || branch.contains('\n')
        || branch.contains(':')
        || branch.starts_with('-')
    {
        return Err(GitError::InvalidBranch(branch.to_string()).into());
    }
    Ok(())
}

/// Parses `git ls-remote --heads` output into branch names.
#[must_use]
pub fn parse_remote_heads(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .filter_map(|(_, reference)| reference.trim().strip_prefix("refs/heads/"))
        .map(str::to_string)
        .collect()
}

/// Returns the checked-out branch, failing on a detached HEAD.
///
/// A branch without commits (an empty project) is still reported by name.
pub fn get_current_branch(repo: &Path, config: &Config) -> anyhow::Result<String> {
    let branch = match run_git(repo, config, &["rev-parse", "--abbrev-ref", "HEAD", "--"]) {
        // rev-parse echoes the `--` separator on its own line.
        Ok(output) => output.lines().next().unwrap_or_default().trim().to_string(),
        Err(e) => {
            debug!(repo = %repo.display(), "rev-parse failed, trying unborn HEAD: {:#}", e);
            run_git(repo, config, &["symbolic-ref", "--short", "HEAD"])
                .context("Failed to get current branch")?
        }
    };
    if branch == "HEAD" {
        return Err(GitError::DetachedHead.into());
    }
    Ok(branch)
}

pub fn get_commit(repo: &Path, config: &Config, reference: &str) -> anyhow::Result<String> {
    run_git(repo, config, &["rev-parse", "--verify", reference])
        .with_context(|| format!("Failed to resolve '{}'", reference))
}

pub fn fetch(repo: &Path, config: &Config) -> anyhow::Result<()> {
    run_git(repo, config, &["fetch"]).context("Failed to fetch from remote")?;
    Ok(())
}

pub fn list_remote_branches(repo: &Path, config: &Config) -> anyhow::Result<BTreeSet<String>> {
    run_git(repo, config, &["ls-remote", "--heads", ORIGIN])
        .map(|output| parse_remote_heads(&output))
        .context("Failed to list remote branches")
}

/// Moves the local `branch` ref to `origin/<branch>` without touching the
/// working tree. Refuses anything that is not a fast-forward.
pub fn fast_forward(repo: &Path, config: &Config, branch: &str) -> anyhow::Result<()> {
    validate_branch_name(branch)?;
    let refspec = format!("{branch}:{branch}");
    run_git(repo, config, &["fetch", "-u", ORIGIN, &refspec])
        .with_context(|| format!("Failed to fast-forward branch '{}'", branch))?;
    Ok(())
}

/// Clones `url` into `destination`, running git from `workspace`.
pub fn clone(workspace: &Path, config: &Config, url: &str, destination: &Path) -> anyhow::Result<()> {
    let destination = destination.to_string_lossy();
    run_git(workspace, config, &["clone", "--", url, &*destination])
        .with_context(|| format!("Failed to clone {}", url))?;
    Ok(())
}

/// `git branch -a`, one line per branch, the checked-out one marked with `*`.
pub fn list_all_branches(repo: &Path, config: &Config) -> anyhow::Result<String> {
    run_git(repo, config, &["branch", "-a"]).context("Failed to list branches")
}

pub fn reset_hard(repo: &Path, config: &Config) -> anyhow::Result<String> {
    run_git(repo, config, &["reset", "--hard"]).context("Failed to reset working tree")
}

/// [`VersionControlClient`] backed by the git binary.
#[derive(Debug, Clone, Copy)]
pub struct GitCli {
    config: Config,
}

impl GitCli {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl VersionControlClient for GitCli {
    fn clone_repository(&self, url: &str, destination: &Path) -> anyhow::Result<()> {
        let workspace = destination.parent().unwrap_or_else(|| Path::new("."));
        clone(workspace, &self.config, url, destination)
    }

    fn fetch(&self, repo: &Path) -> anyhow::Result<()> {
        fetch(repo, &self.config)
    }

    fn current_branch(&self, repo: &Path) -> anyhow::Result<String> {
        get_current_branch(repo, &self.config)
    }

    fn list_remote_branches(&self, repo: &Path) -> anyhow::Result<BTreeSet<String>> {
        list_remote_branches(repo, &self.config)
    }

    fn fast_forward(&self, repo: &Path, branch: &str) -> anyhow::Result<()> {
        fast_forward(repo, &self.config, branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remote_heads_extracts_branch_names() {
        let output = "\
3f786850e387550fdab836ed7e6dc881de23001b\trefs/heads/develop
89e6c98d92887913cadf06b2adb97f26cde4849b\trefs/heads/feature/login
2b66fd261ee5c6cfc8de7fa466bab600bcfe4f69\trefs/heads/master";

        let heads = parse_remote_heads(output);
        let expected: BTreeSet<String> = ["develop", "feature/login", "master"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(heads, expected);
    }

    #[test]
    fn test_parse_remote_heads_ignores_noise() {
        let output = "warning: redirecting\nabc\trefs/tags/v1\n\n";
        assert!(parse_remote_heads(output).is_empty());
    }

    #[test]
    fn test_validate_branch_name_rejects_refspec_injection() {
        assert!(validate_branch_name("develop").is_ok());
        assert!(validate_branch_name("feature/x").is_ok());
        assert!(validate_branch_name("").is_err());
        assert!(validate_branch_name("a:b").is_err());
        assert!(validate_branch_name("--upload-pack=x").is_err());
        assert!(validate_branch_name("a\nb").is_err());
    }

    #[test]
    fn test_current_branch_of_repository_without_commits() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let config = Config::default();
        run_git(dir.path(), &config, &["init", "-b", "trunk"]).expect("init");

        let branch = get_current_branch(dir.path(), &config).expect("unborn branch");
        assert_eq!(branch, "trunk");
    }

    #[test]
    fn test_run_git_reports_failed_command() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let err = run_git(dir.path(), &Config::default(), &["rev-parse", "HEAD"])
            .expect_err("not a repository");
        let git_error = err.downcast_ref::<GitError>().expect("git error");
        assert!(matches!(git_error, GitError::CommandFailed { .. }));
        assert!(err.to_string().contains("rev-parse HEAD"));
    }
}
