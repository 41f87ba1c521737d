//! Project lister: queries GitLab for member projects and filters them.
//!
//! ```text
//! HostingSettings --> GitLabClient::member_projects() --> Vec<RemoteProject>
//!                                                              |
//!                      ProjectFilter (include / exclude) <-----+
//!                                    |
//!                                    v
//!                     normalize names, reject collisions
//!                                    |
//!                                    v
//!                        Vec<RepositoryDescriptor>
//! ```

use crate::config::HostingSettings;
use crate::constants::PROJECTS_PER_PAGE;
use crate::error::HostingError;
use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// A project as returned by `GET /api/v4/projects`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteProject {
    pub name: String,
    pub ssh_url_to_repo: String,
}

/// A repository to synchronize: local directory name and clone URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryDescriptor {
    pub name: String,
    pub remote_url: String,
}

impl RepositoryDescriptor {
    #[must_use]
    pub fn from_project(project: &RemoteProject) -> Self {
        Self {
            name: normalize_name(&project.name),
            remote_url: project.ssh_url_to_repo.clone(),
        }
    }
}

/// Turns a display name into a directory name: spaces and dots become hyphens.
#[must_use]
pub fn normalize_name(display_name: &str) -> String {
    display_name.replace([' ', '.'], "-")
}

/// Include/exclude substring filters. Excludes win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl ProjectFilter {
    #[must_use]
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    #[must_use]
    pub fn matches(&self, project: &RemoteProject) -> bool {
        let excluded = self
            .exclude
            .iter()
            .filter(|needle| !needle.is_empty())
            .any(|needle| {
                project.name.contains(needle.as_str())
                    || project.ssh_url_to_repo.contains(needle.as_str())
            });
        if excluded {
            return false;
        }
        self.include.is_empty()
            || self
                .include
                .iter()
                .any(|needle| project.name.contains(needle.as_str()))
    }
}

/// Source of the projects the operator is a member of.
pub trait HostingApi {
    fn member_projects(&self) -> Result<Vec<RemoteProject>, HostingError>;
}

/// Blocking GitLab REST client.
pub struct GitLabClient {
    client: Client,
    base: Url,
    token: String,
}

impl GitLabClient {
    /// `host` is either a bare host (`gitlab.example.com`, https assumed) or a
    /// full base URL.
    pub fn new(host: &str, token: &str) -> Result<Self, HostingError> {
        let base = api_base(host)?;
        let client = Client::builder()
            .user_agent(format!("gitlab-fleet/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| HostingError::Request {
                url: base.to_string(),
                source: source.without_url(),
            })?;
        Ok(Self {
            client,
            base,
            token: token.to_string(),
        })
    }

    pub fn from_settings(settings: &HostingSettings) -> Result<Self, HostingError> {
        Self::new(&settings.url, &settings.token)
    }

    /// The project query URL, including the token.
    fn projects_url(&self) -> Result<Url, HostingError> {
        let per_page = PROJECTS_PER_PAGE.to_string();
        let endpoint = format!("{}/api/v4/projects", self.base.as_str().trim_end_matches('/'));
        Url::parse_with_params(
            &endpoint,
            &[
                ("membership", "1"),
                ("order_by", "path"),
                ("per_page", per_page.as_str()),
                ("private_token", self.token.as_str()),
            ],
        )
        .map_err(|e| HostingError::InvalidUrl {
            url: endpoint.clone(),
            message: e.to_string(),
        })
    }
}

impl HostingApi for GitLabClient {
    fn member_projects(&self) -> Result<Vec<RemoteProject>, HostingError> {
        let url = self.projects_url()?;
        let shown = redact(&url);
        debug!(url = %shown, "querying projects");

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|source| HostingError::Request {
                url: shown.clone(),
                source: source.without_url(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HostingError::Status {
                url: shown,
                status: status.as_u16(),
            });
        }

        let projects: Vec<RemoteProject> =
            response.json().map_err(|source| HostingError::Decode {
                url: shown.clone(),
                source: source.without_url(),
            })?;
        info!(count = projects.len(), "received project list");
        Ok(projects)
    }
}

fn api_base(host: &str) -> Result<Url, HostingError> {
    let host = host.trim().trim_end_matches('/');
    let candidate = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{host}")
    };
    Url::parse(&candidate).map_err(|e| HostingError::InvalidUrl {
        url: candidate.clone(),
        message: e.to_string(),
    })
}

/// Renders `url` with the private token masked.
#[must_use]
pub fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "private_token" {
                "***".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();
    shown.query_pairs_mut().clear().extend_pairs(pairs);
    shown.to_string()
}

/// Filters `projects` and turns them into descriptors.
///
/// Fails when two surviving projects normalize to the same directory name:
/// both would be written to one path.
pub fn select_projects(
    projects: &[RemoteProject],
    filter: &ProjectFilter,
) -> Result<Vec<RepositoryDescriptor>, HostingError> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    let mut descriptors = Vec::new();

    for project in projects.iter().filter(|p| filter.matches(p)) {
        let descriptor = RepositoryDescriptor::from_project(project);
        if let Some(first) = seen.insert(descriptor.name.clone(), &project.name) {
            return Err(HostingError::NameCollision {
                name: descriptor.name,
                first: first.to_string(),
                second: project.name.clone(),
            });
        }
        descriptors.push(descriptor);
    }

    debug!(
        total = projects.len(),
        selected = descriptors.len(),
        "filtered projects"
    );
    Ok(descriptors)
}

/// Lists the member projects of `api` that pass `filter`.
pub fn list_projects<A: HostingApi + ?Sized>(
    api: &A,
    filter: &ProjectFilter,
) -> Result<Vec<RepositoryDescriptor>, HostingError> {
    let projects = api.member_projects()?;
    select_projects(&projects, filter)
}
