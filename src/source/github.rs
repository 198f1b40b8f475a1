//! GitHub REST implementation of `RepositorySource`.

use super::{EntryKind, RepoRef, RepositorySource, SourceEntry};
use crate::config::GitHubConfig;
use crate::error::SourceError;
use crate::tree::identity::RepoPath;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";
const API_VERSION: &str = "2022-11-28";

/// Reads repositories through the GitHub contents API, authenticated per user.
pub struct GitHubSource {
    client: Client,
    api_base: Url,
    token: Option<String>,
    user_agent: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Listing(Vec<ContentItem>),
    Single(ContentItem),
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    name: String,
    path: String,
    #[serde(rename = "type")]
    item_type: String,
    #[serde(default)]
    sha: Option<String>,
    #[serde(default)]
    size: u64,
}

impl GitHubSource {
    pub fn new(config: &GitHubConfig, token: Option<String>) -> Result<Self, SourceError> {
        Self::with_client(Client::new(), config, token)
    }

    /// Create a source with a custom reqwest client.
    pub fn with_client(
        client: Client,
        config: &GitHubConfig,
        token: Option<String>,
    ) -> Result<Self, SourceError> {
        let api_base = Url::parse(config.api_base.trim_end_matches('/')).map_err(|e| {
            SourceError::Invalid(format!("invalid API base {:?}: {}", config.api_base, e))
        })?;
        if api_base.cannot_be_a_base() {
            return Err(SourceError::Invalid(format!(
                "API base {:?} cannot carry a path",
                config.api_base
            )));
        }
        Ok(Self {
            client,
            api_base,
            token,
            user_agent: config.user_agent.clone(),
        })
    }

    fn contents_url(&self, repo: &RepoRef, path: &RepoPath) -> Result<Url, SourceError> {
        let mut url = self.api_base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| SourceError::Invalid("API base cannot carry a path".to_string()))?;
            segments.pop_if_empty();
            segments.extend(["repos", repo.owner.as_str(), repo.repo.as_str(), "contents"]);
            if !path.is_root() {
                segments.extend(path.as_str().split('/'));
            }
        }
        url.query_pairs_mut().append_pair("ref", &repo.git_ref);
        Ok(url)
    }

    fn request(&self, url: Url, accept: &'static str) -> RequestBuilder {
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, accept)
            .header(USER_AGENT, &self.user_agent)
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        request
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, SourceError> {
        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Transient(format!("{}: {}", what, e)))?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(classify_failure(response.status(), response.headers(), what))
    }
}

/// Map a failed GitHub response onto the source error taxonomy.
fn classify_failure(status: StatusCode, headers: &HeaderMap, what: &str) -> SourceError {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let retry_after = header("retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .or_else(|| {
            header("x-ratelimit-reset")
                .and_then(|v| v.trim().parse::<i64>().ok())
                .map(|reset| {
                    let wait = reset - chrono::Utc::now().timestamp();
                    Duration::from_secs(wait.max(0) as u64)
                })
        });
    let exhausted = header("x-ratelimit-remaining") == Some("0");

    match status {
        StatusCode::NOT_FOUND => SourceError::NotFound(what.to_string()),
        StatusCode::UNAUTHORIZED => {
            SourceError::Unauthorized(format!("{}: credentials rejected", what))
        }
        StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimited { retry_after },
        StatusCode::FORBIDDEN if exhausted || header("retry-after").is_some() => {
            SourceError::RateLimited { retry_after }
        }
        StatusCode::FORBIDDEN => SourceError::Unauthorized(format!("{}: access denied", what)),
        s if s.is_server_error() => SourceError::Transient(format!("{}: HTTP {}", what, s)),
        s => SourceError::Invalid(format!("{}: unexpected HTTP {}", what, s)),
    }
}

fn entry_kind(item_type: &str) -> Option<EntryKind> {
    match item_type {
        "file" => Some(EntryKind::File),
        "dir" => Some(EntryKind::Directory),
        "symlink" => Some(EntryKind::Symlink),
        "submodule" => Some(EntryKind::Submodule),
        _ => None,
    }
}

#[async_trait]
impl RepositorySource for GitHubSource {
    async fn list_directory(
        &self,
        repo: &RepoRef,
        path: &RepoPath,
    ) -> Result<Vec<SourceEntry>, SourceError> {
        let what = format!("{} /{}", repo, path);
        let url = self.contents_url(repo, path)?;
        let response = self.send(self.request(url, JSON_MEDIA_TYPE), &what).await?;
        let body: ContentsResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Transient(format!("{}: malformed listing: {}", what, e)))?;

        let items = match body {
            ContentsResponse::Listing(items) => items,
            ContentsResponse::Single(item) => vec![item],
        };

        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let Some(kind) = entry_kind(&item.item_type) else {
                debug!(path = %item.path, item_type = %item.item_type, "Skipping unknown entry type");
                continue;
            };
            let entry_path = RepoPath::parse(item.path.as_str())
                .map_err(|e| SourceError::Invalid(e.to_string()))?;
            entries.push(SourceEntry {
                name: item.name,
                path: entry_path,
                kind,
                sha: item.sha,
                size: item.size,
            });
        }
        Ok(entries)
    }

    async fn read_file(&self, repo: &RepoRef, path: &RepoPath) -> Result<Vec<u8>, SourceError> {
        let what = format!("{} /{}", repo, path);
        let url = self.contents_url(repo, path)?;
        let response = self.send(self.request(url, RAW_MEDIA_TYPE), &what).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::Transient(format!("{}: body read failed: {}", what, e)))?;
        Ok(bytes.to_vec())
    }
}
