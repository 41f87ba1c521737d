//! Command-line interface and command dispatch.

use crate::branches;
use crate::config::{Config, Verbosity, WorkspaceConfig};
use crate::constants::{CONFIG_FILE_NAME, DEFAULT_WORKER_COUNT, GIT_TIMEOUT_ENV, git_timeout};
use crate::dispatch::run_all;
use crate::git::GitCli;
use crate::hosting::{GitLabClient, ProjectFilter, list_projects};
use crate::logging::init_logging;
use crate::output;
use crate::runner::{self, LaunchCommand};
use crate::sync::SyncTarget;
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use dialoguer::{Confirm, theme::ColorfulTheme};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Workstation helpers for a fleet of GitLab repositories.
#[derive(Debug, Parser)]
#[command(name = "fleet", version, about)]
pub struct Cli {
    /// Workspace configuration file [default: <workspace>/config.json]
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding the repositories [default: current directory]
    #[arg(long, global = true, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Only print the final counts and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print every step and git command
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Seconds before a single git command is killed
    #[arg(long, global = true, env = GIT_TIMEOUT_ENV, value_name = "SECS")]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Clone missing repositories and fast-forward existing ones
    Sync(SyncArgs),
    /// Show the branches of every repository in the workspace
    Branches(BranchesArgs),
    /// Start every service project in parallel and wait for them
    #[command(visible_alias = "nuke")]
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Only projects whose name contains one of these
    pub filters: Vec<String>,

    /// GitLab host, overrides `gitlab_url`
    #[arg(long, env = "FLEET_GITLAB_URL")]
    pub url: Option<String>,

    /// GitLab private token, overrides `gitlab_token`
    #[arg(long, env = "FLEET_GITLAB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Repositories synchronized at the same time
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,
}

#[derive(Debug, Args)]
pub struct BranchesArgs {
    /// Only repositories whose directory name contains one of these
    pub filters: Vec<String>,

    /// Run `git reset --hard` in each repository first
    #[arg(long)]
    pub reset: bool,

    /// Do not ask before resetting
    #[arg(short, long, requires = "reset")]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Only services whose name contains one of these
    pub filters: Vec<String>,
}

impl Cli {
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    fn workspace_dir(&self) -> anyhow::Result<PathBuf> {
        match &self.workspace {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().context("Failed to determine current directory"),
        }
    }

    fn config_path(&self, workspace: &Path) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| workspace.join(CONFIG_FILE_NAME))
    }

    /// Runtime configuration: command line first, then the file, then defaults.
    #[must_use]
    pub fn runtime_config(&self, file: &WorkspaceConfig) -> Config {
        let jobs = match &self.command {
            Command::Sync(args) => args.jobs,
            _ => None,
        };
        Config {
            verbosity: self.verbosity(),
            workers: jobs.or(file.jobs).unwrap_or(DEFAULT_WORKER_COUNT).max(1),
            git_timeout: self
                .timeout
                .or(file.git_timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or_else(git_timeout),
        }
    }
}

/// Runs the parsed command line.
pub fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    init_logging(&Config {
        verbosity: cli.verbosity(),
        ..Config::default()
    });

    let workspace = cli.workspace_dir()?;
    if !workspace.is_dir() {
        anyhow::bail!("workspace {} is not a directory", workspace.display());
    }
    let file = load_workspace_config(&cli.config_path(&workspace), cli.verbosity());
    let config = cli.runtime_config(&file);

    match &cli.command {
        Command::Sync(args) => sync(args, &workspace, &file, &config),
        Command::Branches(args) => show_branches(args, &workspace, &config),
        Command::Run(args) => run_services(args, &workspace, &file, &config),
    }
}

/// Reads the workspace file, falling back to defaults with a visible notice
/// when it is missing, unreadable or malformed.
fn load_workspace_config(path: &Path, verbosity: Verbosity) -> WorkspaceConfig {
    match WorkspaceConfig::read(path) {
        Ok(Some(file)) => {
            debug!(path = %path.display(), "loaded workspace configuration");
            file
        }
        Ok(None) => {
            if verbosity != Verbosity::Quiet {
                output::print_alert(&format!(
                    "{} not found, using defaults",
                    path.display()
                ));
            }
            WorkspaceConfig::default()
        }
        Err(e) => {
            output::print_alert(&format!("Ignoring unusable configuration: {}", e));
            WorkspaceConfig::default()
        }
    }
}

fn sync(
    args: &SyncArgs,
    workspace: &Path,
    file: &WorkspaceConfig,
    config: &Config,
) -> anyhow::Result<ExitCode> {
    let settings = file.hosting(args.url.as_deref(), args.token.as_deref())?;
    let client = GitLabClient::from_settings(&settings)?;
    let filter = ProjectFilter::new(args.filters.clone(), file.ignore_list.clone());
    let descriptors = list_projects(&client, &filter)?;

    output::print_working_dir(workspace, config);
    output::print_sync_start(descriptors.len(), config);
    if descriptors.is_empty() {
        return Ok(ExitCode::SUCCESS);
    }

    let start = Instant::now();
    let target = SyncTarget {
        workspace,
        integration_branch: file.integration_branch(),
    };
    let progress = output::create_workspace_progress(descriptors.len(), config);
    let summary = run_all(
        &descriptors,
        &target,
        &GitCli::new(*config),
        |descriptor| progress.create_repo_tracker(&descriptor.name, *config),
        config,
    );
    progress.finish();

    info!(
        total = summary.len(),
        failed = summary.failed_count(),
        "synchronization finished"
    );
    output::print_summary(&summary, start.elapsed(), config);
    Ok(ExitCode::SUCCESS)
}

fn show_branches(
    args: &BranchesArgs,
    workspace: &Path,
    config: &Config,
) -> anyhow::Result<ExitCode> {
    let start = Instant::now();
    let repos = branches::filter_repos(branches::find_git_repos(workspace), &args.filters);

    if args.reset {
        output::print_alert("Reset mode enabled");
        if !args.yes && !repos.is_empty() {
            let proceed = Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(format!(
                    "Discard local changes in {} repositories?",
                    repos.len()
                ))
                .default(false)
                .interact()
                .context("Reset needs confirmation; pass --yes when not on a terminal")?;
            if !proceed {
                return Ok(ExitCode::SUCCESS);
            }
        }
    }

    branches::show_branches(&repos, args.reset, config);
    if !config.is_quiet() {
        output::print_elapsed(start.elapsed());
    }
    Ok(ExitCode::SUCCESS)
}

fn run_services(
    args: &RunArgs,
    workspace: &Path,
    file: &WorkspaceConfig,
    config: &Config,
) -> anyhow::Result<ExitCode> {
    let services = runner::select_services(file.service_projects(), &args.filters);
    if services.is_empty() {
        if !config.is_quiet() {
            output::print_alert("No service projects configured or matched");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let reports = runner::run_services(workspace, &services, &LaunchCommand::default());
    info!(
        launched = reports.len(),
        failed = runner::failed_count(&reports),
        "all projects exited"
    );
    output::print_launch_summary(&reports, config);
    Ok(ExitCode::SUCCESS)
}
