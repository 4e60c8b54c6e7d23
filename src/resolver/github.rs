//! GitHub releases adapter.
//!
//! Queries `/repos/{owner}/{name}/releases/latest` or
//! `/repos/{owner}/{name}/releases/tags/{tag}` and picks the asset built for the
//! host platform.

use super::Resolver;
use crate::platform::{find_asset_for_platform, get_system_info};
use crate::types::{BinaryInfo, GitHubRelease, PlatformInfo, LATEST_VERSION};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use thiserror::Error;

pub const GITHUB_RESOLVER_NAME: &str = "github";
pub const ACCEPT_HEADER: &str = "application/vnd.github+json";
pub const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
pub const API_VERSION: &str = "2022-11-28";
pub const USER_AGENT_HEADER: &str = "azabox";

#[derive(Debug, Error)]
pub enum GitHubReleaseError {
    #[error("Release tag '{version}' not found in {repo}")]
    TagNotFound { repo: String, version: String },
    #[error("No releases found for {repo}")]
    LatestNotFound { repo: String },
    #[error("request error for {repo}: {status}")]
    RequestFailed { repo: String, status: StatusCode },
    #[error("failed to parse release data for {repo}")]
    Decode {
        repo: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("release of {repo} carries no version tag")]
    MissingVersion { repo: String },
}

#[derive(Debug, Clone)]
pub struct GitHubResolver {
    base_api_url: String,
    token: Option<String>,
    platform: PlatformInfo,
    client: reqwest::Client,
}

impl GitHubResolver {
    pub fn new(base_api_url: &str) -> Self {
        GitHubResolver {
            base_api_url: base_api_url.trim_end_matches('/').to_string(),
            token: None,
            platform: get_system_info(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Match assets against another platform than the running host.
    #[cfg(test)]
    pub fn with_platform(mut self, platform: PlatformInfo) -> Self {
        self.platform = platform;
        self
    }

    /// Release endpoint for `repo`; "latest" has its own route, anything else is a tag.
    pub fn release_url(&self, repo: &str, version: &str) -> String {
        if version == LATEST_VERSION {
            format!("{}/repos/{}/releases/latest", self.base_api_url, repo)
        } else {
            format!(
                "{}/repos/{}/releases/tags/{}",
                self.base_api_url, repo, version
            )
        }
    }

    async fn fetch_release(&self, repo: &str, version: &str) -> Result<GitHubRelease> {
        let url = self.release_url(repo, version);
        tracing::debug!("Fetching GitHub release info from: {}", url);

        let mut request = self
            .client
            .get(&url)
            .header(ACCEPT, ACCEPT_HEADER)
            .header(API_VERSION_HEADER, API_VERSION)
            .header(USER_AGENT, USER_AGENT_HEADER);

        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
            tracing::debug!("Using GITHUB_TOKEN");
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("GitHub API request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let repo = repo.to_string();
            let err = match status {
                StatusCode::NOT_FOUND if version == LATEST_VERSION => {
                    GitHubReleaseError::LatestNotFound { repo }
                }
                StatusCode::NOT_FOUND => GitHubReleaseError::TagNotFound {
                    repo,
                    version: version.to_string(),
                },
                _ => GitHubReleaseError::RequestFailed { repo, status },
            };
            return Err(err.into());
        }

        let body = response.text().await?;
        let release = serde_json::from_str(&body).map_err(|source| GitHubReleaseError::Decode {
            repo: repo.to_string(),
            source,
        })?;
        Ok(release)
    }
}

fn release_version(release: &GitHubRelease, repo: &str) -> Result<String> {
    release
        .version()
        .map(str::to_string)
        .ok_or_else(|| {
            GitHubReleaseError::MissingVersion {
                repo: repo.to_string(),
            }
            .into()
        })
}

#[async_trait]
impl Resolver for GitHubResolver {
    fn name(&self) -> &str {
        GITHUB_RESOLVER_NAME
    }

    async fn resolve(&self, binary: &mut BinaryInfo) -> Result<Option<String>> {
        tracing::debug!(
            "Resolving {} ({}) on GitHub for {}/{}",
            binary.full_name,
            binary.version,
            self.platform.os,
            self.platform.arch
        );

        let release = self.fetch_release(&binary.full_name, &binary.version).await?;
        let version = release_version(&release, &binary.full_name)?;

        match find_asset_for_platform(&release.assets, &self.platform) {
            Some(asset) => {
                tracing::info!(
                    "Resolved {} {} to {}",
                    binary.full_name,
                    version,
                    asset.browser_download_url
                );
                binary.installed_version = version;
                binary.resolver = GITHUB_RESOLVER_NAME.to_string();
                Ok(Some(asset.browser_download_url.clone()))
            }
            None => {
                tracing::debug!(
                    "Release {} of {} has no asset for {}/{}",
                    version,
                    binary.full_name,
                    self.platform.os,
                    self.platform.arch
                );
                Ok(None)
            }
        }
    }

    async fn resolve_latest_version(&self, binary: &BinaryInfo) -> Result<String> {
        let release = self
            .fetch_release(&binary.full_name, LATEST_VERSION)
            .await?;
        release_version(&release, &binary.full_name)
    }
}
