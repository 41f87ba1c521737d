//! Branch lister: shows `git branch -a` for every repository in the workspace,
//! optionally hard-resetting each one first.

use crate::config::Config;
use crate::constants::GIT_DIR;
use crate::git;
use crate::output;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

pub fn is_git_repo(path: &Path) -> bool {
    path.join(GIT_DIR).exists()
}

/// Every working tree below `root` (nested ones included), sorted by path.
/// `.git` directories themselves are not descended into.
#[must_use]
pub fn find_git_repos(root: &Path) -> Vec<PathBuf> {
    let mut repos: Vec<PathBuf> = ignore::WalkBuilder::new(root)
        .standard_filters(false)
        .filter_entry(|entry| entry.file_name() != GIT_DIR)
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_dir()))
        .map(ignore::DirEntry::into_path)
        .filter(|path| is_git_repo(path))
        .collect();
    repos.sort();
    debug!(count = repos.len(), root = %root.display(), "discovered repositories");
    repos
}

/// Keeps repositories whose directory name contains any of `filters`.
#[must_use]
pub fn filter_repos(repos: Vec<PathBuf>, filters: &[String]) -> Vec<PathBuf> {
    if filters.is_empty() {
        return repos;
    }
    repos
        .into_iter()
        .filter(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_default();
            filters.iter().any(|f| name.contains(f.as_str()))
        })
        .collect()
}

/// Outcome of visiting one repository.
#[derive(Debug)]
pub struct BranchReport {
    pub path: PathBuf,
    pub listing: anyhow::Result<String>,
}

/// Lists (and optionally resets) each repository, printing as it goes.
/// A failing repository is reported and skipped.
pub fn show_branches(repos: &[PathBuf], reset: bool, config: &Config) -> Vec<BranchReport> {
    repos
        .iter()
        .map(|repo| {
            if !config.is_quiet() {
                output::print_title(&repo.display().to_string());
            }
            let listing = visit(repo, reset, config);
            match &listing {
                Ok(text) if !config.is_quiet() => output::print_branches(text),
                Ok(_) => {}
                Err(e) => error!(repo = %repo.display(), "{:#}", e),
            }
            BranchReport {
                path: repo.clone(),
                listing,
            }
        })
        .collect()
}

fn visit(repo: &Path, reset: bool, config: &Config) -> anyhow::Result<String> {
    if reset {
        let message = git::reset_hard(repo, config)?;
        if !config.is_quiet() {
            println!("{}", message.yellow());
        }
    }
    git::list_all_branches(repo, config)
}
