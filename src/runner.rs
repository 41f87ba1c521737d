//! Project runner: launches every service project of the selected
//! directories in parallel with `dotnet run` and waits for all of them.

use crate::constants::{BUILD_OUTPUT_DIRS, PROJECT_GLOB, TEST_PROJECT_MARKER};
use crate::output;
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};
use tracing::{debug, error, info, warn};
use wax::{Glob, Pattern};

/// The command used to start one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for LaunchCommand {
    fn default() -> Self {
        Self {
            program: "dotnet".to_string(),
            args: vec!["run".to_string(), "--project".to_string()],
        }
    }
}

impl LaunchCommand {
    fn command_for(&self, project: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).arg(project);
        command
    }
}

/// Keeps project names containing any of `filters`; no filters keeps all.
#[must_use]
pub fn select_services<'a>(projects: &'a [String], filters: &[String]) -> Vec<&'a str> {
    projects
        .iter()
        .filter(|p| filters.is_empty() || filters.iter().any(|f| p.contains(f.as_str())))
        .map(String::as_str)
        .collect()
}

/// Launchable project files below `service_dir`, sorted. Build output and
/// projects whose path below `service_dir` mentions tests are skipped.
pub fn find_launchable_projects(service_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !service_dir.is_dir() {
        anyhow::bail!("service directory does not exist: {}", service_dir.display());
    }
    let glob = Glob::new(PROJECT_GLOB)
        .map_err(|e| anyhow::anyhow!("invalid glob pattern '{PROJECT_GLOB}': {e}"))?;

    let mut projects: Vec<PathBuf> = ignore::WalkBuilder::new(service_dir)
        .standard_filters(false)
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !(entry.file_type().is_some_and(|ft| ft.is_dir())
                && BUILD_OUTPUT_DIRS.iter().any(|dir| name == *dir))
        })
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .map(ignore::DirEntry::into_path)
        .filter(|path| {
            path.strip_prefix(service_dir).is_ok_and(|relative| {
                glob.is_match(relative)
                    && !relative
                        .to_string_lossy()
                        .to_lowercase()
                        .contains(TEST_PROJECT_MARKER)
            })
        })
        .collect();
    projects.sort();
    Ok(projects)
}

/// How one launched project ended.
#[derive(Debug)]
pub struct LaunchReport {
    pub service: String,
    pub project: PathBuf,
    pub status: anyhow::Result<ExitStatus>,
}

impl LaunchReport {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(&self.status, Ok(status) if status.success())
    }
}

#[must_use]
pub fn failed_count(reports: &[LaunchReport]) -> usize {
    reports.iter().filter(|r| !r.succeeded()).count()
}

/// Starts every launchable project of every service, then waits for all.
pub fn run_services(
    workspace: &Path,
    services: &[&str],
    launcher: &LaunchCommand,
) -> Vec<LaunchReport> {
    let mut running: Vec<(String, PathBuf, anyhow::Result<Child>)> = Vec::new();

    for service in services {
        let projects = match find_launchable_projects(&workspace.join(service)) {
            Ok(projects) => projects,
            Err(e) => {
                error!(service, "{:#}", e);
                continue;
            }
        };
        if projects.is_empty() {
            output::print_alert(&format!("No launchable project found in {}", service));
        }
        for project in projects {
            output::print_title(service);
            debug!(service, project = %project.display(), "launching");
            let child = launcher
                .command_for(&project)
                .spawn()
                .with_context(|| format!("Failed to launch {}", launcher.program));
            running.push((service.to_string(), project, child));
        }
    }

    info!(count = running.len(), "waiting for launched projects");
    running
        .into_iter()
        .map(|(service, project, child)| {
            let status = child.and_then(|mut child| {
                child
                    .wait()
                    .with_context(|| format!("Failed to wait for {}", project.display()))
            });
            match &status {
                Ok(code) if !code.success() => warn!(%service, %code, "project exited"),
                Err(e) => error!(%service, "{:#}", e),
                Ok(_) => {}
            }
            LaunchReport {
                service,
                project,
                status,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, "<Project />")?;
        Ok(())
    }

    #[test]
    fn test_select_services_by_substring() {
        let projects = vec!["orders-api".to_string(), "billing-api".to_string()];
        assert_eq!(
            select_services(&projects, &["orders".to_string()]),
            vec!["orders-api"]
        );
        assert_eq!(select_services(&projects, &[]).len(), 2);
    }

    #[test]
    fn test_find_launchable_projects_skips_tests_and_build_output() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let root = dir.path();
        touch(&root.join("src/Orders.Api/Orders.Api.csproj"))?;
        touch(&root.join("src/Orders.Worker/Orders.Worker.csproj"))?;
        touch(&root.join("tests/Orders.Api.Tests/Orders.Api.Tests.csproj"))?;
        touch(&root.join("src/Orders.IntegrationTest/Orders.IntegrationTest.csproj"))?;
        touch(&root.join("src/Orders.Api/obj/Stale.csproj"))?;
        touch(&root.join("src/Orders.Api/README.md"))?;

        let found = find_launchable_projects(root)?;

        assert_eq!(
            found,
            vec![
                root.join("src/Orders.Api/Orders.Api.csproj"),
                root.join("src/Orders.Worker/Orders.Worker.csproj"),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_find_launchable_projects_requires_directory() {
        assert!(find_launchable_projects(Path::new("/definitely/not/here")).is_err());
    }

    #[test]
    fn test_default_launcher_is_dotnet_run() {
        let launcher = LaunchCommand::default();
        let command = launcher.command_for(Path::new("Api.csproj"));
        assert_eq!(command.get_program(), "dotnet");
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(args, vec!["run", "--project", "Api.csproj"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_services_waits_for_every_project() -> anyhow::Result<()> {
        let workspace = tempfile::TempDir::new()?;
        touch(&workspace.path().join("svc-a/Api/Api.csproj"))?;
        touch(&workspace.path().join("svc-b/Web/Web.csproj"))?;

        let launcher = LaunchCommand {
            program: "true".to_string(),
            args: vec![],
        };
        let reports = run_services(workspace.path(), &["svc-a", "svc-b", "missing"], &launcher);

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(LaunchReport::succeeded));
        assert_eq!(failed_count(&reports), 0);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_run_services_reports_projects_that_exit_non_zero() -> anyhow::Result<()> {
        let workspace = tempfile::TempDir::new()?;
        touch(&workspace.path().join("svc-a/Api/Api.csproj"))?;
        touch(&workspace.path().join("svc-a/Worker/Worker.csproj"))?;

        let launcher = LaunchCommand {
            program: "false".to_string(),
            args: vec![],
        };
        let reports = run_services(workspace.path(), &["svc-a"], &launcher);

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| !r.succeeded()));
        assert_eq!(failed_count(&reports), 2);
        let line = output::format_launch_failure(&reports[0]);
        assert!(line.contains("svc-a"));
        assert!(line.contains("Api.csproj"));
        Ok(())
    }

    #[test]
    fn test_launch_that_cannot_start_counts_as_failed() -> anyhow::Result<()> {
        let workspace = tempfile::TempDir::new()?;
        touch(&workspace.path().join("svc-a/Api/Api.csproj"))?;

        let launcher = LaunchCommand {
            program: "fleet-test-no-such-launcher".to_string(),
            args: vec![],
        };
        let reports = run_services(workspace.path(), &["svc-a"], &launcher);

        assert_eq!(failed_count(&reports), 1);
        assert!(output::format_launch_failure(&reports[0]).contains("Failed to launch"));
        Ok(())
    }
}
