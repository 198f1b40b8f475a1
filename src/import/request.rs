//! Import requests and the workspace records they come from.

use crate::error::ImportError;
use crate::source::RepoRef;
use crate::types::WorkspaceId;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Branch imported when a workspace does not name one.
pub const DEFAULT_BRANCH: &str = "main";

/// A workspace row as the CRUD layer stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Input of the import-trigger operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub workspace_id: WorkspaceId,
    pub repo_owner: String,
    pub repo_name: String,
    pub branch: String,
}

impl ImportRequest {
    pub fn new(
        workspace_id: impl Into<WorkspaceId>,
        repo_owner: impl Into<String>,
        repo_name: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            repo_owner: repo_owner.into(),
            repo_name: repo_name.into(),
            branch: branch.into(),
        }
    }

    /// Build a request from a workspace's linked repository.
    pub fn from_workspace(workspace: &Workspace) -> Result<Self, ImportError> {
        let url = workspace.repo_url.as_deref().ok_or_else(|| {
            ImportError::InvalidRequest(format!("workspace {} has no repository", workspace.id))
        })?;
        let (owner, repo) = parse_repo_url(url).ok_or_else(|| {
            ImportError::InvalidRequest(format!("unrecognized repository URL {:?}", url))
        })?;
        let branch = workspace
            .branch
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(DEFAULT_BRANCH);
        Ok(Self::new(workspace.id.clone(), owner, repo, branch))
    }

    pub fn repo_ref(&self) -> RepoRef {
        RepoRef::new(&self.repo_owner, &self.repo_name, &self.branch)
    }

    pub fn validate(&self) -> Result<(), ImportError> {
        let fields = [
            ("workspace id", self.workspace_id.as_str()),
            ("repository owner", self.repo_owner.as_str()),
            ("repository name", self.repo_name.as_str()),
            ("branch", self.branch.as_str()),
        ];
        for (label, value) in fields {
            if value.trim().is_empty() {
                return Err(ImportError::InvalidRequest(format!("{} is empty", label)));
            }
        }
        for (label, value) in [("owner", &self.repo_owner), ("name", &self.repo_name)] {
            if value.contains('/') {
                return Err(ImportError::InvalidRequest(format!(
                    "repository {} {:?} contains '/'",
                    label, value
                )));
            }
        }
        Ok(())
    }
}

/// Extract `(owner, repo)` from a GitHub repository reference.
///
/// Accepts `https://github.com/owner/repo[.git]`, `git@github.com:owner/repo[.git]`
/// and bare `owner/repo`.
pub fn parse_repo_url(input: &str) -> Option<(String, String)> {
    let input = input.trim();
    let path = if let Some(rest) = input.strip_prefix("git@github.com:") {
        rest.to_string()
    } else if input.contains("://") {
        let url = Url::parse(input).ok()?;
        match url.host_str()? {
            "github.com" | "www.github.com" => {}
            _ => return None,
        }
        url.path().to_string()
    } else {
        input.to_string()
    };

    let mut segments = path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let repo = segments.next()?;
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    if owner.contains(char::is_whitespace) || repo.is_empty() || repo.contains(char::is_whitespace)
    {
        return None;
    }
    // Bare form must be exactly owner/repo
    if !input.contains("://") && !input.starts_with("git@") && segments.next().is_some() {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}
