//! GitHub REST client.

use std::time::Duration;

use serde::Deserialize;

use crate::retry::{with_retry, ApiError, RetryPolicy};

const GITHUB_API: &str = "https://api.github.com";
const USER_AGENT: &str = "tasksync-action";

/// One issue or PR comment.
#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    /// Comment body text.
    #[serde(default)]
    pub body: String,
}

/// HTTP client for the GitHub REST API, scoped to one repository.
#[derive(Clone)]
pub struct GithubClient {
    client: reqwest::Client,
    token: String,
    repo: String,
    api_base: String,
    retry: RetryPolicy,
}

impl GithubClient {
    /// Create a client for `owner/repo`.
    pub fn new(token: &str, repo: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            token: token.to_string(),
            repo: repo.to_string(),
            api_base: GITHUB_API.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Override the API base URL (tests, GitHub Enterprise).
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    /// Repository this client is scoped to.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Fetch comment bodies for an issue/PR (first page, up to 100).
    pub async fn list_comments(&self, number: u64) -> Result<Vec<String>, ApiError> {
        let url = format!(
            "{}/repos/{}/issues/{}/comments?per_page=100",
            self.api_base, self.repo, number
        );

        let comments: Vec<Comment> =
            with_retry(&self.retry, "list comments", || self.get_json(&url)).await?;

        Ok(comments.into_iter().map(|comment| comment.body).collect())
    }

    /// Post a comment on an issue/PR.
    pub async fn post_comment(&self, number: u64, body: &str) -> Result<(), ApiError> {
        let url = format!(
            "{}/repos/{}/issues/{}/comments",
            self.api_base, self.repo, number
        );
        let payload = serde_json::json!({ "body": body });

        with_retry(&self.retry, "post comment", || self.post_unit(&url, &payload)).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn post_unit(&self, url: &str, payload: &serde_json::Value) -> Result<(), ApiError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = GithubClient::new("token", "acme/app");
        assert_eq!(client.repo(), "acme/app");
        assert_eq!(client.api_base, "https://api.github.com");
    }

    #[test]
    fn test_api_base_override_trims_slash() {
        let client =
            GithubClient::new("token", "acme/app").with_api_base("https://ghe.internal/api/v3/");
        assert_eq!(client.api_base, "https://ghe.internal/api/v3");
    }

    #[test]
    fn test_comment_body_defaults_empty() {
        let comment: Comment = serde_json::from_str("{}").unwrap();
        assert_eq!(comment.body, "");
    }
}
