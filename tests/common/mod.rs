//! Test infrastructure for gitlab-fleet integration tests.
#![allow(dead_code)]

use anyhow::Result;
use gitlab_fleet::config::{Config, Verbosity};
use gitlab_fleet::git::{get_commit, run_git};
use gitlab_fleet::hosting::RepositoryDescriptor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub fn test_config() -> Config {
    Config {
        verbosity: Verbosity::Quiet,
        ..Config::default()
    }
}

/// A bare "remote" plus a seed clone used to push commits into it.
/// Automatically cleaned up when dropped.
pub struct TestRemote {
    _bare_dir: TempDir,
    _seed_dir: TempDir,
    bare: PathBuf,
    seed: PathBuf,
}

impl TestRemote {
    /// Creates a remote whose default branch is `master` with one commit.
    pub fn new() -> Result<Self> {
        let config = test_config();
        let bare_dir = TempDir::new()?;
        let seed_dir = TempDir::new()?;
        let bare = bare_dir.path().to_path_buf();
        let seed = seed_dir.path().to_path_buf();

        run_git(&bare, &config, &["init", "--bare", "-b", "master"])?;

        run_git(&seed, &config, &["init", "-b", "master"])?;
        run_git(&seed, &config, &["config", "user.email", "test@example.com"])?;
        run_git(&seed, &config, &["config", "user.name", "Test User"])?;
        std::fs::write(seed.join("README.md"), "# Test Repo\n")?;
        run_git(&seed, &config, &["add", "README.md"])?;
        run_git(&seed, &config, &["commit", "-m", "Initial commit"])?;
        run_git(
            &seed,
            &config,
            &["remote", "add", "origin", bare.to_str().unwrap()],
        )?;
        run_git(&seed, &config, &["push", "-u", "origin", "master"])?;

        Ok(Self {
            _bare_dir: bare_dir,
            _seed_dir: seed_dir,
            bare,
            seed,
        })
    }

    pub fn url(&self) -> String {
        self.bare.to_string_lossy().into_owned()
    }

    pub fn descriptor(&self, name: &str) -> RepositoryDescriptor {
        RepositoryDescriptor {
            name: name.to_string(),
            remote_url: self.url(),
        }
    }

    /// Commits a change on `branch` (created from master when new) and pushes it.
    /// Returns the pushed commit.
    pub fn push_commit(&self, branch: &str, message: &str) -> Result<String> {
        let config = test_config();
        let exists = run_git(&self.seed, &config, &["branch", "--list", branch])?;
        if exists.is_empty() {
            run_git(&self.seed, &config, &["checkout", "-b", branch, "master"])?;
        } else {
            run_git(&self.seed, &config, &["checkout", branch])?;
        }
        std::fs::write(self.seed.join(format!("{branch}.txt")), message)?;
        run_git(&self.seed, &config, &["add", "."])?;
        run_git(&self.seed, &config, &["commit", "-m", message])?;
        run_git(&self.seed, &config, &["push", "origin", branch])?;
        run_git(&self.seed, &config, &["checkout", "master"])?;
        run_git(&self.seed, &config, &["rev-parse", &format!("refs/heads/{branch}")])
    }
}

/// Clones `remote` into `workspace/<name>` the way the synchronizer would.
pub fn clone_into(workspace: &Path, remote: &TestRemote, name: &str) -> Result<PathBuf> {
    let config = test_config();
    let path = workspace.join(name);
    run_git(
        workspace,
        &config,
        &["clone", &remote.url(), path.to_str().unwrap()],
    )?;
    run_git(&path, &config, &["config", "user.email", "test@example.com"])?;
    run_git(&path, &config, &["config", "user.name", "Test User"])?;
    Ok(path)
}

pub fn rev(repo: &Path, reference: &str) -> Result<String> {
    get_commit(repo, &test_config(), reference)
}
