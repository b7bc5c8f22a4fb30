use crate::error::{DeppyError, Result};
use crate::maven::repository::validate_repository_url;
use crate::scm::{BranchRef, PullRequest, SourceControl, TreeEntry};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, header};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub const GITHUB_API_URL: &str = "https://api.github.com";

/// GitHub REST client scoped to one `owner/name` repository.
pub struct GitHubClient {
    client: Client,
    api_url: String,
    owner: String,
    repo: String,
    token: String,
}

#[derive(Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Deserialize)]
struct RefResponse {
    object: GitObject,
}

#[derive(Deserialize)]
struct CommitResponse {
    tree: GitObject,
}

impl GitHubClient {
    pub fn new(api_url: &str, repository: &str, token: impl Into<String>) -> Result<Self> {
        validate_repository_url(api_url)?;
        let (owner, repo) = parse_repository(repository)?;
        let token = token.into();
        if token.trim().is_empty() {
            return Err(DeppyError::Config("GitHub token is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("deppy/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            owner,
            repo,
            token,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_url, self.owner, self.repo, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> Result<Response> {
        let response = self.authorized(request).send().await?;
        Self::ensure_success(response, operation).await
    }

    async fn ensure_success(response: Response, operation: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(DeppyError::SourceControl(format!(
            "{operation} failed with {status}: {body}"
        )))
    }
}

/// Splits `owner/name`.
pub fn parse_repository(repository: &str) -> Result<(String, String)> {
    match repository.trim().split_once('/') {
        Some((owner, name))
            if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
        {
            Ok((owner.to_string(), name.to_string()))
        }
        _ => Err(DeppyError::Config(format!(
            "Repository must be given as 'owner/name', got '{repository}'"
        ))),
    }
}

#[async_trait]
impl SourceControl for GitHubClient {
    async fn find_branch(&self, name: &str) -> Result<Option<BranchRef>> {
        let url = self.endpoint(&format!("git/ref/heads/{name}"));
        let response = self.authorized(self.client.get(&url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let reference: RefResponse = Self::ensure_success(response, "get ref")
            .await?
            .json()
            .await?;
        Ok(Some(BranchRef {
            name: name.to_string(),
            head: reference.object.sha,
        }))
    }

    async fn commit_tree(&self, commit: &str) -> Result<String> {
        let url = self.endpoint(&format!("git/commits/{commit}"));
        let commit: CommitResponse = self
            .send(self.client.get(&url), "get commit")
            .await?
            .json()
            .await?;
        Ok(commit.tree.sha)
    }

    async fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> Result<String> {
        let url = self.endpoint("git/trees");
        let body = json!({ "base_tree": base_tree, "tree": entries });
        let tree: GitObject = self
            .send(self.client.post(&url).json(&body), "create tree")
            .await?
            .json()
            .await?;
        Ok(tree.sha)
    }

    async fn create_commit(&self, message: &str, tree: &str, parents: &[String]) -> Result<String> {
        let url = self.endpoint("git/commits");
        let body = json!({ "message": message, "tree": tree, "parents": parents });
        let commit: GitObject = self
            .send(self.client.post(&url).json(&body), "create commit")
            .await?
            .json()
            .await?;
        Ok(commit.sha)
    }

    async fn upsert_branch(&self, name: &str, commit: &str) -> Result<()> {
        if self.find_branch(name).await?.is_some() {
            tracing::debug!(branch = name, commit, "Force-updating branch");
            let url = self.endpoint(&format!("git/refs/heads/{name}"));
            let body = json!({ "sha": commit, "force": true });
            self.send(self.client.patch(&url).json(&body), "update ref")
                .await?;
        } else {
            tracing::debug!(branch = name, commit, "Creating branch");
            let url = self.endpoint("git/refs");
            let body = json!({ "ref": format!("refs/heads/{name}"), "sha": commit });
            self.send(self.client.post(&url).json(&body), "create ref")
                .await?;
        }
        Ok(())
    }

    async fn find_open_pull_request(&self, head: &str, base: &str) -> Result<Option<PullRequest>> {
        let url = self.endpoint("pulls");
        let head = format!("{}:{head}", self.owner);
        let pulls: Vec<PullRequest> = self
            .send(
                self.client
                    .get(&url)
                    .query(&[("state", "open"), ("head", head.as_str()), ("base", base)]),
                "list pull requests",
            )
            .await?
            .json()
            .await?;
        Ok(pulls.into_iter().next())
    }

    async fn create_pull_request(
        &self,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<PullRequest> {
        let url = self.endpoint("pulls");
        let payload = json!({ "title": title, "head": head, "base": base, "body": body });
        let pull = self
            .send(self.client.post(&url).json(&payload), "create pull request")
            .await?
            .json()
            .await?;
        Ok(pull)
    }

    async fn update_pull_request_body(&self, number: u64, body: &str) -> Result<()> {
        let url = self.endpoint(&format!("pulls/{number}"));
        self.send(
            self.client.patch(&url).json(&json!({ "body": body })),
            "update pull request",
        )
        .await?;
        Ok(())
    }
}
