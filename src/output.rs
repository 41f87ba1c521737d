//! Progress bars, colored output, and summary formatting.
//!
//! This module provides visual feedback during synchronization including
//! a workspace progress bar, a verbose step trace and the final summary.

use crate::config::Config;
use crate::constants::{MAX_VISIBLE_COMPLETIONS, PROGRESS_TICK_MS};
use crate::dispatch::SyncSummary;
use crate::runner::{self, LaunchReport};
use crate::sync::{SyncAction, SyncCallbacks, SyncOutcome, SyncResult, SyncStep};
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// No-op callbacks for when progress tracking is not needed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoOpCallbacks;

impl SyncCallbacks for NoOpCallbacks {
    fn on_step(&self, _step: &SyncStep) {}
    fn on_complete(&self, _result: &SyncResult) {}
}

/// Marker shown next to a repository once its sync finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    Ok,
    Warning,
    Failed,
}

impl Completion {
    fn of(result: &SyncResult) -> Self {
        if !result.is_success() {
            Self::Failed
        } else if result.has_warnings() {
            Self::Warning
        } else {
            Self::Ok
        }
    }

    fn symbol(self) -> colored::ColoredString {
        match self {
            Self::Ok => "✓".green(),
            Self::Warning => "!".yellow(),
            Self::Failed => "✗".red(),
        }
    }
}

/// Consolidated state for workspace progress tracking, behind one lock.
struct CompletionState {
    /// Recently completed repos for display (bounded by MAX_VISIBLE_COMPLETIONS)
    repos: VecDeque<(String, Completion)>,
    failed_count: usize,
    total_completed: usize,
}

/// Thread-safe progress tracker for a sync run.
/// Shows a progress bar with the completion count and recent results.
#[derive(Clone)]
pub struct WorkspaceProgress {
    _multi: Arc<MultiProgress>,
    main_bar: ProgressBar,
    completion_slots: Vec<ProgressBar>,
    state: Arc<Mutex<CompletionState>>,
}

impl WorkspaceProgress {
    #[must_use]
    pub fn create_repo_tracker(&self, repo_name: &str, config: Config) -> RepoProgressTracker {
        RepoProgressTracker {
            repo_name: repo_name.to_string(),
            workspace: self.clone(),
            config,
        }
    }

    fn mark_completed(&self, repo_name: &str, completion: Completion) {
        self.main_bar.inc(1);

        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if completion == Completion::Failed {
            state.failed_count += 1;
            self.main_bar
                .set_message(format!("│ {} failed", state.failed_count).red().to_string());
        }

        state.total_completed += 1;
        state.repos.push_back((repo_name.to_string(), completion));

        while state.repos.len() > MAX_VISIBLE_COMPLETIONS {
            state.repos.pop_front();
        }

        self.redraw_completions(&state);
    }

    pub fn finish(&self) {
        self.main_bar.finish_and_clear();
        for slot in &self.completion_slots {
            slot.finish_and_clear();
        }
    }

    fn redraw_completions(&self, state: &CompletionState) {
        let show_ellipsis = state.total_completed > MAX_VISIBLE_COMPLETIONS;

        for (i, slot) in self.completion_slots.iter().enumerate() {
            if i == 0 && show_ellipsis {
                slot.set_message("...".dimmed().to_string());
                continue;
            }
            let idx = if show_ellipsis { i - 1 } else { i };
            match state.repos.get(idx) {
                Some((name, completion)) => {
                    slot.set_message(format!("{} {}", completion.symbol(), name));
                }
                None => slot.set_message(""),
            }
        }
    }
}

/// Per-repository progress tracker handed to the sync worker.
#[derive(Clone)]
pub struct RepoProgressTracker {
    repo_name: String,
    workspace: WorkspaceProgress,
    config: Config,
}

impl SyncCallbacks for RepoProgressTracker {
    fn on_sync_start(&self, repo_name: &str) {
        print_repo_header(&self.config, repo_name);
    }

    fn on_step(&self, step: &SyncStep) {
        print_step(&self.config, step);
    }

    fn on_complete(&self, result: &SyncResult) {
        print_completion_status(&self.config, result);
        self.workspace
            .mark_completed(&self.repo_name, Completion::of(result));
    }
}

/// Prints a repository header in verbose mode.
pub fn print_repo_header(config: &Config, repo_name: &str) {
    if !config.is_verbose() {
        return;
    }
    eprintln!("\n{}", format!("[{}]", repo_name).white().bold());
}

/// Prints a step progress message in verbose mode.
pub fn print_step(config: &Config, step: &SyncStep) {
    if !config.is_verbose() {
        return;
    }
    eprintln!("  {}...", step.to_string().dimmed());
}

/// Prints completion status (verbose mode only).
pub fn print_completion_status(config: &Config, result: &SyncResult) {
    if !config.is_verbose() {
        return;
    }
    match &result.outcome {
        SyncOutcome::Synced(success) => {
            eprintln!("  {} on {}", "✓".green(), success.branch.cyan());
            for warning in &success.warnings {
                eprintln!("  {} {}", "!".yellow(), warning.to_string().yellow());
            }
        }
        SyncOutcome::Failed(failure) => {
            eprintln!("  {} failed: {}", "✗".red(), failure.error);
        }
    }
}

/// Creates a progress bar for a sync run showing completion count.
/// Returns hidden progress bars in quiet or verbose mode.
#[must_use]
pub fn create_workspace_progress(total: usize, config: &Config) -> WorkspaceProgress {
    let multi = Arc::new(MultiProgress::new());
    let hide_progress = config.is_quiet() || config.is_verbose();

    let main_bar = if hide_progress {
        ProgressBar::hidden()
    } else {
        let bar = multi.add(ProgressBar::new(total as u64));
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{bar:40.cyan/blue} {pos}/{len} synced {spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█░"),
        );
        bar.enable_steady_tick(Duration::from_millis(PROGRESS_TICK_MS));
        bar
    };

    let completion_slots: Vec<ProgressBar> = if hide_progress {
        vec![]
    } else {
        (0..MAX_VISIBLE_COMPLETIONS)
            .map(|_| {
                let slot = multi.add(ProgressBar::new_spinner());
                slot.set_style(
                    ProgressStyle::default_spinner()
                        .template("  {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                slot
            })
            .collect()
    };

    WorkspaceProgress {
        _multi: multi,
        main_bar,
        completion_slots,
        state: Arc::new(Mutex::new(CompletionState {
            repos: VecDeque::new(),
            failed_count: 0,
            total_completed: 0,
        })),
    }
}

pub fn print_working_dir(path: &Path, config: &Config) {
    if config.is_quiet() {
        return;
    }
    println!(
        "{} {}",
        "Working in:".cyan(),
        path.display().to_string().white().bold()
    )
}

pub fn print_sync_start(count: usize, config: &Config) {
    if config.is_quiet() {
        return;
    }
    if count == 0 {
        println!("{}", "No matching projects".yellow().bold())
    } else {
        println!(
            "{}",
            format!("Synchronizing {} repositories", count).dimmed()
        )
    }
}

pub fn print_summary(summary: &SyncSummary, duration: Duration, config: &Config) {
    if config.is_quiet() {
        print_quiet_summary(summary);
    } else {
        print_normal_summary(summary, duration);
    }
}

fn print_quiet_summary(summary: &SyncSummary) {
    let synced = summary.len() - summary.failed_count();
    println!("{}/{} repositories synced", synced, summary.len());

    for result in summary.iter() {
        if let SyncOutcome::Failed(failure) = &result.outcome {
            eprintln!("error: {}: {}", result.name, failure.error);
        }
    }
}

fn print_normal_summary(summary: &SyncSummary, duration: Duration) {
    print_section("Summary");

    let width = name_column_width(summary);
    for result in summary.iter() {
        println!("{}", format_summary_line(result, width));
    }
    println!();

    let synced = summary.len() - summary.failed_count();
    let mut totals = format!(
        "{}: {}/{} repos in {}",
        "Total".white().bold(),
        synced,
        summary.len(),
        format_duration(duration)
    );
    if summary.warning_count() > 0 {
        totals.push_str(&format!(", {} with warnings", summary.warning_count()).yellow().to_string());
    }
    println!("{}", totals);
}

/// Widest repository name, in characters as `{:<width$}` pads.
fn name_column_width(summary: &SyncSummary) -> usize {
    summary
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0)
}

fn format_summary_line(result: &SyncResult, width: usize) -> String {
    let name = format!("{:<width$}", result.name, width = width);
    match &result.outcome {
        SyncOutcome::Synced(success) => {
            let action = match success.action {
                SyncAction::Cloned => " (cloned)".dimmed(),
                SyncAction::Fetched => "".normal(),
            };
            let integration = match &success.integration_updated {
                Some(branch) => format!(" (+{})", branch).dimmed(),
                None => "".normal(),
            };
            let (tag, note) = match success.warnings.first() {
                Some(warning) => ("WARN".yellow().bold(), format!("  {}", warning).yellow()),
                None => ("OK  ".green().bold(), "".normal()),
            };
            format!(
                "  {} {} -> {}{}{}{} in {}",
                tag,
                name.white(),
                success.branch.cyan(),
                action,
                integration,
                note,
                format_duration(result.duration).dimmed(),
            )
        }
        SyncOutcome::Failed(failure) => {
            let branch = failure.last_branch.as_deref().unwrap_or("?");
            format!(
                "  {} {} -> {} {} in {}",
                "FAIL".red().bold(),
                name.white(),
                branch.cyan(),
                format!("at {}: {} ({})", failure.step, failure.error, result.url).red(),
                format_duration(result.duration).dimmed(),
            )
        }
    }
}

/// Green `* text` title line.
pub fn print_title(text: &str) {
    println!("{}", format!("* {}", text).green());
}

/// Red `* text` notice line.
pub fn print_alert(text: &str) {
    println!("{}", format!("* {}", text).red());
}

/// Lists every launched project that did not exit cleanly, then the totals.
pub fn print_launch_summary(reports: &[LaunchReport], config: &Config) {
    let failed = runner::failed_count(reports);
    for report in reports.iter().filter(|r| !r.succeeded()) {
        println!("{}", format_launch_failure(report));
    }
    if config.is_quiet() && failed == 0 {
        return;
    }
    let totals = format!(
        "* {}/{} projects exited cleanly",
        reports.len() - failed,
        reports.len()
    );
    if failed == 0 {
        println!("{}", totals.green());
    } else {
        println!("{}", totals.red());
    }
}

pub fn format_launch_failure(report: &LaunchReport) -> String {
    let reason = match &report.status {
        Ok(status) => status.to_string(),
        Err(e) => format!("{:#}", e),
    };
    format!(
        "  {} {} {} {}",
        "FAIL".red().bold(),
        report.service.white(),
        report.project.display().to_string().dimmed(),
        reason.red()
    )
}

/// Prints `git branch -a` output with the checked-out branch highlighted.
pub fn print_branches(listing: &str) {
    for line in listing.lines() {
        if line.contains('*') {
            println!("{}", line.yellow());
        } else {
            println!("{}", line);
        }
    }
}

pub fn print_elapsed(duration: Duration) {
    println!(
        "{}",
        format!("* Time needed = {}.", format_duration(duration)).yellow()
    );
}

fn format_duration(duration: Duration) -> String {
    format!("{:.2}s", duration.as_secs_f32())
}

fn print_section(title: &str) {
    let line = "=".repeat(50).cyan().dimmed();
    let padding = 50usize.saturating_sub(title.len()) / 2;
    let centered = format!("{:>width$}", title, width = padding + title.len());
    println!("\n{}\n{}\n{}\n", line, centered.cyan().bold(), line);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ResultAggregator;
    use crate::sync::{SyncFailure, SyncSuccess, SyncWarning};

    fn synced(name: &str, branch: &str, warnings: Vec<SyncWarning>) -> SyncResult {
        SyncResult {
            name: name.to_string(),
            url: format!("git@example.com:{name}.git"),
            outcome: SyncOutcome::Synced(SyncSuccess {
                action: SyncAction::Fetched,
                branch: branch.to_string(),
                integration_updated: None,
                warnings,
            }),
            duration: Duration::from_millis(250),
        }
    }

    fn failed(name: &str) -> SyncResult {
        SyncResult {
            name: name.to_string(),
            url: format!("git@example.com:{name}.git"),
            outcome: SyncOutcome::Failed(SyncFailure {
                step: SyncStep::Fetching,
                error: "network unreachable".to_string(),
                last_branch: None,
            }),
            duration: Duration::from_millis(500),
        }
    }

    #[test]
    fn test_format_duration_rounds_to_two_decimals() {
        assert_eq!(format_duration(Duration::from_millis(1234)), "1.23s");
        assert_eq!(format_duration(Duration::from_millis(5678)), "5.68s");
        assert_eq!(format_duration(Duration::from_secs(42)), "42.00s");
    }

    #[test]
    fn test_completion_marks_warnings_separately() {
        let warning = SyncWarning::BranchNotOnRemote {
            branch: "feature-x".to_string(),
        };
        assert_eq!(Completion::of(&synced("a", "master", vec![])), Completion::Ok);
        assert_eq!(
            Completion::of(&synced("a", "feature-x", vec![warning])),
            Completion::Warning
        );
        assert_eq!(Completion::of(&failed("a")), Completion::Failed);
    }

    #[test]
    fn test_summary_lines_carry_branch_and_markers() {
        colored::control::set_override(false);

        let ok = format_summary_line(&synced("svc-a", "master", vec![]), 5);
        assert!(ok.contains("OK"));
        assert!(ok.contains("svc-a -> master"));

        let warned = format_summary_line(
            &synced(
                "svc-b",
                "feature-x",
                vec![SyncWarning::BranchNotOnRemote {
                    branch: "feature-x".to_string(),
                }],
            ),
            5,
        );
        assert!(warned.contains("WARN"));
        assert!(warned.contains("does not exist on the remote"));

        let mut moved = synced("svc-d", "feature-x", vec![]);
        if let SyncOutcome::Synced(success) = &mut moved.outcome {
            success.integration_updated = Some("develop".to_string());
        }
        assert!(format_summary_line(&moved, 5).contains("feature-x (+develop)"));

        let fail = format_summary_line(&failed("svc-c"), 5);
        assert!(fail.contains("FAIL"));
        assert!(fail.contains("at Fetching: network unreachable"));
        assert!(fail.contains("git@example.com:svc-c.git"));
    }

    #[test]
    fn test_name_column_counts_characters() {
        colored::control::set_override(false);
        let aggregator = ResultAggregator::new();
        aggregator.record(synced("café-api", "master", vec![]));
        aggregator.record(synced("orders", "master", vec![]));
        let summary = aggregator.into_summary();

        let width = name_column_width(&summary);
        assert_eq!(width, 8);

        let lines: Vec<String> = summary
            .iter()
            .map(|r| format_summary_line(r, width))
            .collect();
        let arrow_column = |line: &str| line.chars().position(|c| c == '>');
        assert_eq!(arrow_column(&lines[0]), arrow_column(&lines[1]));
    }

    #[test]
    fn test_no_op_callbacks_implements_all_required_methods() {
        let callbacks = NoOpCallbacks;
        callbacks.on_sync_start("test");
        callbacks.on_step(&SyncStep::Started);
        callbacks.on_complete(&failed("test"));
    }

    #[test]
    fn test_hidden_progress_tracks_completions() {
        let config = Config {
            verbosity: crate::config::Verbosity::Quiet,
            ..Config::default()
        };
        let progress = create_workspace_progress(2, &config);
        let tracker = progress.create_repo_tracker("svc-a", config);
        tracker.on_complete(&failed("svc-a"));

        let state = progress.state.lock().unwrap();
        assert_eq!(state.failed_count, 1);
        assert_eq!(state.total_completed, 1);
        drop(state);
        progress.finish();
    }

    #[test]
    fn test_quiet_summary_does_not_panic() {
        let aggregator = ResultAggregator::new();
        aggregator.record(synced("svc-a", "master", vec![]));
        aggregator.record(failed("svc-b"));
        print_quiet_summary(&aggregator.into_summary());
        print_quiet_summary(&SyncSummary::default());
    }
}
