//! Bitbucket Server API client implementation.

use async_trait::async_trait;
use bbmcp_core::{
    Auth, BitbucketApi, Comment, CommentAnchor, DiffOptions, Error, NewPullRequest, Page,
    PullRequest, PullRequestActivity, PullRequestFilter, PullRequestSettings, RemoteCredential,
    Repository, Result,
};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::types::{CreateCommentRequest, CreatePullRequestRequest};
use crate::API_PREFIX;

type Query = Vec<(&'static str, String)>;

/// Bitbucket Server API client.
pub struct BitbucketClient {
    base_url: String,
    auth: Auth,
    client: reqwest::Client,
}

impl BitbucketClient {
    /// Create a new client for the server and credentials in `credential`.
    pub fn new(credential: RemoteCredential) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("bbmcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: credential.base_url.trim_end_matches('/').to_string(),
            auth: credential.auth,
            client,
        })
    }

    /// Build request with auth and JSON headers.
    fn request(&self, method: Method, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}{}", self.base_url, API_PREFIX, endpoint);
        let builder = self
            .client
            .request(method, url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json");

        match &self.auth {
            Auth::Basic { username, password } => builder.basic_auth(username, Some(password)),
            Auth::Bearer { token } => builder.bearer_auth(token),
        }
    }

    /// Send a request, mapping connection failures to [`Error::Http`].
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        query: &Query,
        body: Option<&B>,
    ) -> Result<reqwest::Response> {
        debug!(method = %method, endpoint = endpoint, "Bitbucket request");

        let mut builder = self.request(method, endpoint);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        builder.send().await.map_err(|e| Error::Http(e.to_string()))
    }

    /// Make a GET request and decode the JSON body. Only 200 is accepted.
    async fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &Query) -> Result<T> {
        let response = self.send::<()>(Method::GET, endpoint, query, None).await?;
        let response = expect_status(response, StatusCode::OK, false).await?;
        decode(response).await
    }

    /// Make a write request; error messages carry the response body.
    async fn write<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        query: &Query,
        body: Option<&B>,
        expected: StatusCode,
    ) -> Result<reqwest::Response> {
        let response = self.send(method, endpoint, query, body).await?;
        expect_status(response, expected, true).await
    }
}

/// Fail unless the response has exactly the `expected` status.
async fn expect_status(
    response: reqwest::Response,
    expected: StatusCode,
    include_body: bool,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status == expected {
        return Ok(response);
    }

    let status_code = status.as_u16();
    let body = response.text().await.unwrap_or_default();
    warn!(
        status = status_code,
        body = body.as_str(),
        "Bitbucket API error response"
    );

    if include_body {
        Err(Error::from_status(status_code, body))
    } else {
        Err(Error::from_status(status_code, ""))
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| Error::InvalidData(format!("Failed to parse response: {}", e)))
}

// =============================================================================
// Endpoints and query strings
// =============================================================================

/// Check that `value` stays within one URL path segment.
fn path_segment<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let escapes = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\', '?', '#', '%']);
    if escapes {
        return Err(Error::InvalidArguments(format!(
            "{} must be a single path segment, got {:?}",
            field, value
        )));
    }
    Ok(value)
}

fn project_endpoint(project_key: &str) -> Result<String> {
    Ok(format!(
        "/projects/{}",
        path_segment("project_key", project_key)?
    ))
}

fn repo_endpoint(project_key: &str, repo_slug: &str) -> Result<String> {
    Ok(format!(
        "{}/repos/{}",
        project_endpoint(project_key)?,
        path_segment("repo_slug", repo_slug)?
    ))
}

fn pull_request_endpoint(project_key: &str, repo_slug: &str, id: u64) -> Result<String> {
    Ok(format!(
        "{}/pull-requests/{}",
        repo_endpoint(project_key, repo_slug)?,
        id
    ))
}

fn list_query(filter: &PullRequestFilter) -> Query {
    let mut query = Query::new();
    if let Some(state) = filter.state.as_ref().filter(|s| !s.is_empty()) {
        query.push(("state", state.clone()));
    }
    if let Some(limit) = filter.limit.filter(|l| *l > 0) {
        query.push(("limit", limit.to_string()));
    }
    query
}

fn diff_query(options: &DiffOptions) -> Query {
    let mut query = Query::new();
    if let Some(lines) = options.context_lines.filter(|l| *l > 0) {
        query.push(("contextLines", lines.to_string()));
    }
    let strings = [
        ("whitespace", &options.whitespace),
        ("since", &options.since),
        ("until", &options.until),
    ];
    for (name, value) in strings {
        if let Some(value) = value.as_ref().filter(|v| !v.is_empty()) {
            query.push((name, value.clone()));
        }
    }
    query
}

// =============================================================================
// Trait implementation
// =============================================================================

#[async_trait]
impl BitbucketApi for BitbucketClient {
    async fn list_pull_requests(
        &self,
        project_key: &str,
        repo_slug: &str,
        filter: &PullRequestFilter,
    ) -> Result<Vec<PullRequest>> {
        let endpoint = format!("{}/pull-requests", repo_endpoint(project_key, repo_slug)?);
        let page: Page<PullRequest> = self.get(&endpoint, &list_query(filter)).await?;
        Ok(page.values)
    }

    async fn get_pull_request(
        &self,
        project_key: &str,
        repo_slug: &str,
        id: u64,
    ) -> Result<PullRequest> {
        let endpoint = pull_request_endpoint(project_key, repo_slug, id)?;
        self.get(&endpoint, &Query::new()).await
    }

    async fn get_pull_request_activity(
        &self,
        project_key: &str,
        repo_slug: &str,
        id: u64,
    ) -> Result<PullRequestActivity> {
        let endpoint = format!(
            "{}/activities",
            pull_request_endpoint(project_key, repo_slug, id)?
        );
        self.get(&endpoint, &Query::new()).await
    }

    async fn create_pull_request(
        &self,
        project_key: &str,
        repo_slug: &str,
        pull_request: &NewPullRequest,
    ) -> Result<PullRequest> {
        let endpoint = format!("{}/pull-requests", repo_endpoint(project_key, repo_slug)?);
        let body = CreatePullRequestRequest::new(project_key, repo_slug, pull_request);
        let response = self
            .write(
                Method::POST,
                &endpoint,
                &Query::new(),
                Some(&body),
                StatusCode::CREATED,
            )
            .await?;
        decode(response).await
    }

    async fn approve_pull_request(
        &self,
        project_key: &str,
        repo_slug: &str,
        id: u64,
    ) -> Result<()> {
        let endpoint = format!(
            "{}/approve",
            pull_request_endpoint(project_key, repo_slug, id)?
        );
        self.write::<()>(Method::POST, &endpoint, &Query::new(), None, StatusCode::OK)
            .await?;
        Ok(())
    }

    async fn unapprove_pull_request(
        &self,
        project_key: &str,
        repo_slug: &str,
        id: u64,
    ) -> Result<()> {
        let endpoint = format!(
            "{}/approve",
            pull_request_endpoint(project_key, repo_slug, id)?
        );
        self.write::<()>(Method::DELETE, &endpoint, &Query::new(), None, StatusCode::OK)
            .await?;
        Ok(())
    }

    async fn merge_pull_request(
        &self,
        project_key: &str,
        repo_slug: &str,
        id: u64,
        version: i64,
    ) -> Result<PullRequest> {
        let endpoint = format!("{}/merge", pull_request_endpoint(project_key, repo_slug, id)?);
        let query = vec![("version", version.to_string())];
        let response = self
            .write::<()>(Method::POST, &endpoint, &query, None, StatusCode::OK)
            .await?;
        decode(response).await
    }

    async fn decline_pull_request(
        &self,
        project_key: &str,
        repo_slug: &str,
        id: u64,
        version: i64,
    ) -> Result<PullRequest> {
        let endpoint = format!(
            "{}/decline",
            pull_request_endpoint(project_key, repo_slug, id)?
        );
        let query = vec![("version", version.to_string())];
        let response = self
            .write::<()>(Method::POST, &endpoint, &query, None, StatusCode::OK)
            .await?;
        decode(response).await
    }

    async fn get_pull_request_diff(
        &self,
        project_key: &str,
        repo_slug: &str,
        id: u64,
        options: &DiffOptions,
    ) -> Result<String> {
        let endpoint = format!("{}/diff", pull_request_endpoint(project_key, repo_slug, id)?);
        let response = self
            .write::<()>(
                Method::GET,
                &endpoint,
                &diff_query(options),
                None,
                StatusCode::OK,
            )
            .await?;

        response
            .text()
            .await
            .map_err(|e| Error::InvalidData(format!("Failed to read diff: {}", e)))
    }

    async fn create_pull_request_comment(
        &self,
        project_key: &str,
        repo_slug: &str,
        id: u64,
        text: &str,
        anchor: Option<&CommentAnchor>,
    ) -> Result<Comment> {
        let endpoint = format!(
            "{}/comments",
            pull_request_endpoint(project_key, repo_slug, id)?
        );
        let body = CreateCommentRequest { text, anchor };
        let response = self
            .write(
                Method::POST,
                &endpoint,
                &Query::new(),
                Some(&body),
                StatusCode::CREATED,
            )
            .await?;
        decode(response).await
    }

    async fn get_repos(&self, project_key: &str, page_size: u32) -> Result<Vec<Repository>> {
        let endpoint = format!("{}/repos", project_endpoint(project_key)?);
        let mut repos = Vec::new();
        let mut start = 0u32;

        loop {
            let query = vec![("start", start.to_string()), ("limit", page_size.to_string())];
            let page: Page<Repository> = self.get(&endpoint, &query).await?;
            let fetched = page.values.len() as u32;
            repos.extend(page.values);

            if page.is_last_page || fetched == 0 {
                break;
            }

            let next = page
                .next_page_start
                .unwrap_or_else(|| start.saturating_add(page.limit.max(fetched)));
            if next <= start {
                warn!(start, next, "Repository page cursor did not advance");
                break;
            }
            start = next;
        }

        debug!(project_key, count = repos.len(), "Fetched repositories");
        Ok(repos)
    }

    async fn get_pull_request_settings(
        &self,
        project_key: &str,
        repo_slug: &str,
    ) -> Result<PullRequestSettings> {
        let endpoint = format!(
            "{}/settings/pull-requests",
            repo_endpoint(project_key, repo_slug)?
        );
        self.get(&endpoint, &Query::new()).await
    }
}
