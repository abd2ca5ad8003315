use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::excerpt::{head_excerpt, head_tail_excerpt};
use crate::config::GithubConfig;
use crate::error::ToolError;

pub const MAX_CODE_HITS: usize = 3;
pub const MAX_REPOSITORIES: usize = 4;
pub const README_LINES: usize = 20;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CodeHit {
    pub name: String,
    pub path: String,
    pub html_url: String,
    pub repository: RepositoryRef,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RepositoryRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RepoSummary {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub stargazers_count: u64,
}

/// Read-only view of one GitHub account.
#[async_trait]
pub trait GithubApi: Send + Sync {
    fn owner(&self) -> &str;

    /// Code search scoped to the owner's repositories.
    async fn search_code(&self, query: &str) -> Result<Vec<CodeHit>, ToolError>;

    async fn list_repositories(&self) -> Result<Vec<RepoSummary>, ToolError>;

    /// Decoded text of one file.
    async fn file_content(&self, repo: &str, path: &str) -> Result<String, ToolError>;

    async fn readme(&self, repo: &str) -> Result<String, ToolError>;
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<CodeHit>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
    owner: String,
}

impl GithubClient {
    /// Build a client, or report which setting is missing.
    pub fn from_config(config: &GithubConfig, timeout: Duration) -> Result<Self, ToolError> {
        let token = config
            .token
            .as_deref()
            .ok_or_else(|| ToolError::Config("GITHUB_TOKEN is not set".to_string()))?;
        let owner = config
            .username
            .clone()
            .ok_or_else(|| ToolError::Config("GITHUB_USERNAME is not set".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ToolError::Config(format!("Invalid GitHub token: {}", e)))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("twinchat"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base.clone(),
            owner,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, ToolError> {
        debug!(url = %url, "GitHub GET");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<T>().await?)
    }

    async fn get_decoded(&self, url: &str) -> Result<String, ToolError> {
        let content: ContentResponse = self.get_json(url).await?;
        decode_content(content.content.as_deref(), content.encoding.as_deref())
    }
}

#[async_trait]
impl GithubApi for GithubClient {
    fn owner(&self) -> &str {
        &self.owner
    }

    async fn search_code(&self, query: &str) -> Result<Vec<CodeHit>, ToolError> {
        let q = format!("{} user:{}", query, self.owner);
        let url = format!(
            "{}/search/code?q={}&per_page=10",
            self.api_base,
            urlencoding::encode(&q)
        );
        let response: SearchResponse = self.get_json(&url).await?;
        Ok(response.items)
    }

    async fn list_repositories(&self) -> Result<Vec<RepoSummary>, ToolError> {
        let url = format!(
            "{}/users/{}/repos?per_page=100&sort=updated",
            self.api_base,
            urlencoding::encode(&self.owner)
        );
        self.get_json(&url).await
    }

    async fn file_content(&self, repo: &str, path: &str) -> Result<String, ToolError> {
        let encoded_path = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let url = format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base,
            urlencoding::encode(&self.owner),
            urlencoding::encode(repo),
            encoded_path
        );
        self.get_decoded(&url).await
    }

    async fn readme(&self, repo: &str) -> Result<String, ToolError> {
        let url = format!(
            "{}/repos/{}/{}/readme",
            self.api_base,
            urlencoding::encode(&self.owner),
            urlencoding::encode(repo)
        );
        self.get_decoded(&url).await
    }
}

/// Decode a contents-API payload. GitHub wraps base64 at 60 columns.
pub fn decode_content(content: Option<&str>, encoding: Option<&str>) -> Result<String, ToolError> {
    let content = content.ok_or_else(|| ToolError::Decode("no content field".to_string()))?;
    match encoding {
        Some("base64") | None => {
            let cleaned: String = content.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(cleaned)
                .map_err(|e| ToolError::Decode(e.to_string()))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        Some(_) => Ok(content.to_string()),
    }
}

/// Case-insensitive substring match on name, description and language.
pub fn filter_repositories<'a>(repos: &'a [RepoSummary], query: &str) -> Vec<&'a RepoSummary> {
    let needle = query.trim().to_lowercase();
    repos
        .iter()
        .filter(|repo| {
            let fields = [
                Some(repo.name.as_str()),
                repo.description.as_deref(),
                repo.language.as_deref(),
            ];
            fields
                .iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Search the owner's code, falling back to a repository listing when the
/// search endpoint fails or finds nothing.
pub async fn search_github(api: &dyn GithubApi, query: &str) -> Result<String, ToolError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ToolError::InvalidArguments(
            "query must not be empty".to_string(),
        ));
    }

    match api.search_code(query).await {
        Ok(hits) if !hits.is_empty() => {
            info!(query = %query, hits = hits.len(), "Code search matched");
            return Ok(render_code_hits(api, query, &hits).await);
        }
        Ok(_) => info!(query = %query, "Code search empty, listing repositories"),
        Err(e) => warn!(query = %query, error = %e, "Code search failed, listing repositories"),
    }

    let repos = api.list_repositories().await?;
    let matches = filter_repositories(&repos, query);
    if matches.is_empty() {
        return Ok(format!(
            "No code or repositories from {} matched '{}'. {} public repositories were checked.",
            api.owner(),
            query,
            repos.len()
        ));
    }

    Ok(render_repositories(api, query, &matches).await)
}

async fn render_code_hits(api: &dyn GithubApi, query: &str, hits: &[CodeHit]) -> String {
    let mut output = format!(
        "Code matching '{}' in {}'s repositories:\n",
        query,
        api.owner()
    );

    for hit in hits.iter().take(MAX_CODE_HITS) {
        output.push_str(&format!(
            "\n### {}/{}\n{}\n",
            hit.repository.name, hit.path, hit.html_url
        ));
        match api.file_content(&hit.repository.name, &hit.path).await {
            Ok(content) => {
                output.push_str("```\n");
                output.push_str(&head_tail_excerpt(&content));
                output.push_str("\n```\n");
            }
            Err(e) => output.push_str(&format!("(content unavailable: {})\n", e)),
        }
    }

    if hits.len() > MAX_CODE_HITS {
        output.push_str(&format!(
            "\n{} more matching files not shown.\n",
            hits.len() - MAX_CODE_HITS
        ));
    }
    output
}

async fn render_repositories(api: &dyn GithubApi, query: &str, repos: &[&RepoSummary]) -> String {
    let mut output = format!(
        "Repositories from {} related to '{}':\n",
        api.owner(),
        query
    );

    for repo in repos.iter().take(MAX_REPOSITORIES) {
        output.push_str(&format!(
            "\n### {} ({}, {} stars)\n{}\n",
            repo.name,
            repo.language.as_deref().unwrap_or("unknown language"),
            repo.stargazers_count,
            repo.html_url
        ));
        if let Some(description) = repo.description.as_deref().filter(|d| !d.is_empty()) {
            output.push_str(description);
            output.push('\n');
        }
        match api.readme(&repo.name).await {
            Ok(readme) => {
                output.push_str("README:\n");
                output.push_str(&head_excerpt(&readme, README_LINES));
                output.push('\n');
            }
            Err(e) => debug!(repo = %repo.name, error = %e, "README unavailable"),
        }
    }
    output
}
