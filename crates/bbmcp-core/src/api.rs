//! The pull-request API seam between the tool dispatcher and the REST client.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    Comment, CommentAnchor, DiffOptions, NewPullRequest, PullRequest, PullRequestActivity,
    PullRequestFilter, PullRequestSettings, Repository,
};

/// Operations the MCP tools need from a Bitbucket Server instance.
///
/// Every method performs its HTTP round-trips immediately and reports the
/// first failure; nothing is cached or retried.
#[async_trait]
pub trait BitbucketApi: Send + Sync {
    /// List pull requests of a repository.
    async fn list_pull_requests(
        &self,
        project_key: &str,
        repo_slug: &str,
        filter: &PullRequestFilter,
    ) -> Result<Vec<PullRequest>>;

    /// Get a single pull request.
    async fn get_pull_request(&self, project_key: &str, repo_slug: &str, id: u64)
        -> Result<PullRequest>;

    /// Get the first page of a pull request's activity stream.
    async fn get_pull_request_activity(
        &self,
        project_key: &str,
        repo_slug: &str,
        id: u64,
    ) -> Result<PullRequestActivity>;

    /// Open a new pull request.
    async fn create_pull_request(
        &self,
        project_key: &str,
        repo_slug: &str,
        pull_request: &NewPullRequest,
    ) -> Result<PullRequest>;

    /// Approve a pull request as the authenticated user.
    async fn approve_pull_request(&self, project_key: &str, repo_slug: &str, id: u64)
        -> Result<()>;

    /// Withdraw the authenticated user's approval.
    async fn unapprove_pull_request(
        &self,
        project_key: &str,
        repo_slug: &str,
        id: u64,
    ) -> Result<()>;

    /// Merge a pull request; `version` must match the current version.
    async fn merge_pull_request(
        &self,
        project_key: &str,
        repo_slug: &str,
        id: u64,
        version: i64,
    ) -> Result<PullRequest>;

    /// Decline a pull request; `version` must match the current version.
    async fn decline_pull_request(
        &self,
        project_key: &str,
        repo_slug: &str,
        id: u64,
        version: i64,
    ) -> Result<PullRequest>;

    /// Get the raw unified diff of a pull request.
    async fn get_pull_request_diff(
        &self,
        project_key: &str,
        repo_slug: &str,
        id: u64,
        options: &DiffOptions,
    ) -> Result<String>;

    /// Add a general or inline comment.
    async fn create_pull_request_comment(
        &self,
        project_key: &str,
        repo_slug: &str,
        id: u64,
        text: &str,
        anchor: Option<&CommentAnchor>,
    ) -> Result<Comment>;

    /// List every repository of a project, following the page cursor.
    async fn get_repos(&self, project_key: &str, page_size: u32) -> Result<Vec<Repository>>;

    /// Get the pull-request policy of a repository.
    async fn get_pull_request_settings(
        &self,
        project_key: &str,
        repo_slug: &str,
    ) -> Result<PullRequestSettings>;
}
