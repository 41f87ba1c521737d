//! Repository sync worker: clone-or-fetch plus the branch-sync policy.
//!
//! ```text
//! descriptor
//!     |
//!     +-- no local dir --> clone --> current branch --> Synced(Cloned)
//!     |
//!     +-- local dir ----> fetch --> current branch --> remote heads
//!                                                        |
//!                          current on remote? -- yes --> fast-forward current
//!                                             \- no ---> BranchNotOnRemote warning
//!                                                        |
//!                          integration on remote && current != integration
//!                                             -- yes --> fast-forward integration
//!                                                        |
//!                                                   Synced(Fetched)
//! ```
//!
//! Only refs move. The working tree checkout is never switched.

use crate::hosting::RepositoryDescriptor;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// The git operations the synchronizer relies on.
///
/// [`crate::git::GitCli`] shells out to git; tests substitute stubs.
pub trait VersionControlClient: Sync {
    fn clone_repository(&self, url: &str, destination: &Path) -> anyhow::Result<()>;
    fn fetch(&self, repo: &Path) -> anyhow::Result<()>;
    fn current_branch(&self, repo: &Path) -> anyhow::Result<String>;
    fn list_remote_branches(&self, repo: &Path) -> anyhow::Result<BTreeSet<String>>;
    /// Updates the local `branch` ref from its remote counterpart, fast-forward only.
    fn fast_forward(&self, repo: &Path, branch: &str) -> anyhow::Result<()>;
}

/// Progress hooks invoked by [`sync_repository`].
pub trait SyncCallbacks: Send + Sync {
    fn on_sync_start(&self, _repo_name: &str) {}
    fn on_step(&self, step: &SyncStep);
    fn on_complete(&self, result: &SyncResult);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStep {
    Started,
    Cloning,
    Fetching,
    DetectingBranch,
    ListingRemoteBranches,
    FastForwarding { branch: String },
    UpdatingIntegration { branch: String },
    Completed,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "Starting"),
            Self::Cloning => write!(f, "Cloning"),
            Self::Fetching => write!(f, "Fetching"),
            Self::DetectingBranch => write!(f, "Detecting current branch"),
            Self::ListingRemoteBranches => write!(f, "Listing remote branches"),
            Self::FastForwarding { branch } => write!(f, "Fast-forwarding {branch}"),
            Self::UpdatingIntegration { branch } => write!(f, "Updating {branch}"),
            Self::Completed => write!(f, "Completed"),
        }
    }
}

/// Whether the repository was newly cloned or already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Cloned,
    Fetched,
}

/// Non-fatal conditions noticed while syncing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncWarning {
    /// The checked-out branch has no same-named branch on the remote.
    BranchNotOnRemote { branch: String },
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BranchNotOnRemote { branch } => {
                write!(f, "branch '{branch}' does not exist on the remote")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSuccess {
    pub action: SyncAction,
    pub branch: String,
    /// Integration branch whose ref was moved alongside the current one.
    pub integration_updated: Option<String>,
    pub warnings: Vec<SyncWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub step: SyncStep,
    pub error: String,
    /// Branch observed before the failure, if the worker got that far.
    pub last_branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced(SyncSuccess),
    Failed(SyncFailure),
}

/// One entry of the summary, produced exactly once per descriptor.
#[derive(Debug, Clone)]
pub struct SyncResult {
    pub name: String,
    pub url: String,
    pub outcome: SyncOutcome,
    pub duration: Duration,
}

impl SyncResult {
    /// Resolved branch, or the last one observed before a failure.
    #[must_use]
    pub fn branch(&self) -> Option<&str> {
        match &self.outcome {
            SyncOutcome::Synced(success) => Some(&success.branch),
            SyncOutcome::Failed(failure) => failure.last_branch.as_deref(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, SyncOutcome::Synced(_))
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        matches!(&self.outcome, SyncOutcome::Synced(s) if !s.warnings.is_empty())
    }
}

/// Where a repository lives and which branch to keep current.
#[derive(Debug, Clone)]
pub struct SyncTarget<'a> {
    pub workspace: &'a Path,
    pub integration_branch: &'a str,
}

impl SyncTarget<'_> {
    #[must_use]
    pub fn path_for(&self, descriptor: &RepositoryDescriptor) -> PathBuf {
        self.workspace.join(&descriptor.name)
    }
}

struct StepError {
    source: anyhow::Error,
    step: SyncStep,
    last_branch: Option<String>,
}

fn at_step<T>(step: SyncStep, result: anyhow::Result<T>) -> Result<T, StepError> {
    result.map_err(|e| StepError {
        source: e,
        step,
        last_branch: None,
    })
}

/// Synchronizes one repository. Never panics on git failures: every error
/// is turned into [`SyncOutcome::Failed`].
pub fn sync_repository<V, C>(
    descriptor: &RepositoryDescriptor,
    target: &SyncTarget<'_>,
    client: &V,
    callbacks: &C,
) -> SyncResult
where
    V: VersionControlClient + ?Sized,
    C: SyncCallbacks + ?Sized,
{
    let start = Instant::now();
    callbacks.on_sync_start(&descriptor.name);

    let outcome = match do_sync(descriptor, target, client, callbacks) {
        Ok(success) => {
            for warning in &success.warnings {
                warn!(repo = %descriptor.name, "{}", warning);
            }
            info!(repo = %descriptor.name, branch = %success.branch, action = ?success.action, "synced");
            SyncOutcome::Synced(success)
        }
        Err(e) => {
            error!(
                repo = %descriptor.name,
                url = %descriptor.remote_url,
                step = %e.step,
                "sync failed: {:#}",
                e.source
            );
            SyncOutcome::Failed(SyncFailure {
                step: e.step,
                error: format!("{:#}", e.source),
                last_branch: e.last_branch,
            })
        }
    };

    let result = SyncResult {
        name: descriptor.name.clone(),
        url: descriptor.remote_url.clone(),
        outcome,
        duration: start.elapsed(),
    };
    callbacks.on_complete(&result);
    result
}

fn do_sync<V, C>(
    descriptor: &RepositoryDescriptor,
    target: &SyncTarget<'_>,
    client: &V,
    callbacks: &C,
) -> Result<SyncSuccess, StepError>
where
    V: VersionControlClient + ?Sized,
    C: SyncCallbacks + ?Sized,
{
    callbacks.on_step(&SyncStep::Started);
    let path = target.path_for(descriptor);

    if !path.is_dir() {
        callbacks.on_step(&SyncStep::Cloning);
        debug!(repo = %descriptor.name, path = %path.display(), "cloning");
        // A killed clone leaves a `.git` behind that every later run would
        // take for an existing repository.
        at_step(
            SyncStep::Cloning,
            client
                .clone_repository(&descriptor.remote_url, &path)
                .inspect_err(|_| remove_partial_clone(&path)),
        )?;

        callbacks.on_step(&SyncStep::DetectingBranch);
        let branch = at_step(SyncStep::DetectingBranch, client.current_branch(&path))?;

        callbacks.on_step(&SyncStep::Completed);
        return Ok(SyncSuccess {
            action: SyncAction::Cloned,
            branch,
            integration_updated: None,
            warnings: Vec::new(),
        });
    }

    callbacks.on_step(&SyncStep::Fetching);
    at_step(SyncStep::Fetching, client.fetch(&path))?;

    callbacks.on_step(&SyncStep::DetectingBranch);
    let branch = at_step(SyncStep::DetectingBranch, client.current_branch(&path))?;

    // From here on a failure still knows which branch was checked out.
    let with_branch = |step: SyncStep, source: anyhow::Error| StepError {
        source,
        step,
        last_branch: Some(branch.clone()),
    };

    callbacks.on_step(&SyncStep::ListingRemoteBranches);
    let remote_branches = client
        .list_remote_branches(&path)
        .map_err(|e| with_branch(SyncStep::ListingRemoteBranches, e))?;

    let mut warnings = Vec::new();
    if remote_branches.contains(&branch) {
        let step = SyncStep::FastForwarding {
            branch: branch.clone(),
        };
        callbacks.on_step(&step);
        client
            .fast_forward(&path, &branch)
            .map_err(|e| with_branch(step, e))?;
    } else {
        warnings.push(SyncWarning::BranchNotOnRemote {
            branch: branch.clone(),
        });
    }

    let integration = target.integration_branch;
    let mut integration_updated = None;
    if branch != integration && remote_branches.contains(integration) {
        let step = SyncStep::UpdatingIntegration {
            branch: integration.to_string(),
        };
        callbacks.on_step(&step);
        client
            .fast_forward(&path, integration)
            .map_err(|e| with_branch(step, e))?;
        integration_updated = Some(integration.to_string());
    }

    callbacks.on_step(&SyncStep::Completed);
    Ok(SyncSuccess {
        action: SyncAction::Fetched,
        branch,
        integration_updated,
        warnings,
    })
}

fn remove_partial_clone(path: &Path) {
    if !path.is_dir() {
        return;
    }
    match std::fs::remove_dir_all(path) {
        Ok(()) => debug!(path = %path.display(), "removed partial clone"),
        Err(e) => warn!(path = %path.display(), "could not remove partial clone: {}", e),
    }
}
