//! Tool handlers for MCP server.
//!
//! Each handler receives arguments that already passed schema validation,
//! deserializes them into a typed struct, calls the Bitbucket API and renders
//! the result as text.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bbmcp_core::{
    BitbucketApi, CommentAnchor, DiffOptions, Error, NewPullRequest, PullRequestFilter, Result,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::protocol::{ToolCallResult, ToolDefinition};
use crate::schema;
use crate::tools::{self, Tool};

/// Default `limit` for `list_pull_requests`.
pub const DEFAULT_LIST_LIMIT: u32 = 25;

/// Page size used when walking a project's repositories.
pub const REPO_PAGE_SIZE: u32 = 100;

/// Boxed future returned by a tool handler.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// Tool handler signature: validated arguments in, rendered text out.
pub type HandlerFn = for<'a> fn(&'a dyn BitbucketApi, Map<String, Value>) -> HandlerFuture<'a>;

/// Tool handler that executes tools against the Bitbucket API.
pub struct ToolHandler {
    api: Arc<dyn BitbucketApi>,
}

impl ToolHandler {
    /// Create a new tool handler.
    pub fn new(api: Arc<dyn BitbucketApi>) -> Self {
        Self { api }
    }

    /// Get available tool definitions.
    pub fn available_tools(&self) -> Vec<ToolDefinition> {
        tools::TOOLS.iter().map(Tool::definition).collect()
    }

    /// Execute a tool by name with arguments.
    ///
    /// Arguments are validated before any API call is made.
    pub async fn execute(&self, name: &str, arguments: Option<Value>) -> Result<ToolCallResult> {
        let tool = tools::find(name).ok_or_else(|| Error::UnknownTool(name.to_string()))?;
        let args = schema::validate(tool.params, arguments.as_ref())?;

        let text = (tool.handler)(self.api.as_ref(), args).await?;
        Ok(ToolCallResult::text(text))
    }
}

// =============================================================================
// Typed arguments
// =============================================================================

fn parse_args<T: DeserializeOwned>(args: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(args)).map_err(|e| Error::InvalidArguments(e.to_string()))
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Positive integers only; anything else counts as unset.
fn positive_u32(value: Option<i64>) -> Option<u32> {
    value
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
struct RepoArgs {
    project_key: String,
    repo_slug: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestArgs {
    project_key: String,
    repo_slug: String,
    pull_request_id: u64,
}

#[derive(Debug, Deserialize)]
struct ListPullRequestsArgs {
    project_key: String,
    repo_slug: String,
    state: Option<String>,
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CreatePullRequestArgs {
    project_key: String,
    repo_slug: String,
    title: String,
    from_branch: String,
    to_branch: String,
    description: Option<String>,
    #[serde(default)]
    reviewers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DiffArgs {
    project_key: String,
    repo_slug: String,
    pull_request_id: u64,
    context_lines: Option<i64>,
    whitespace: Option<String>,
    since: Option<String>,
    until: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentArgs {
    project_key: String,
    repo_slug: String,
    pull_request_id: u64,
    text: String,
    anchor: Option<AnchorArgs>,
}

#[derive(Debug, Default, Deserialize)]
struct AnchorArgs {
    line: Option<i64>,
    line_type: Option<String>,
    path: Option<String>,
    file_type: Option<String>,
    from_hash: Option<String>,
    to_hash: Option<String>,
    src_path: Option<String>,
    dst_path: Option<String>,
    diff_type: Option<String>,
    orphaned_type: Option<String>,
}

impl From<AnchorArgs> for CommentAnchor {
    fn from(args: AnchorArgs) -> Self {
        CommentAnchor {
            line: positive_u32(args.line),
            line_type: non_empty(args.line_type),
            path: non_empty(args.path),
            file_type: non_empty(args.file_type),
            from_hash: non_empty(args.from_hash),
            to_hash: non_empty(args.to_hash),
            src_path: non_empty(args.src_path),
            dst_path: non_empty(args.dst_path),
            diff_type: non_empty(args.diff_type),
            orphaned_type: non_empty(args.orphaned_type),
        }
        .with_defaults()
    }
}

#[derive(Debug, Deserialize)]
struct ProjectArgs {
    project_key: String,
}

// =============================================================================
// Handlers
// =============================================================================

pub(crate) fn list_pull_requests(
    api: &dyn BitbucketApi,
    args: Map<String, Value>,
) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: ListPullRequestsArgs = parse_args(args)?;
        let filter = PullRequestFilter {
            state: non_empty(args.state),
            limit: Some(positive_u32(args.limit).unwrap_or(DEFAULT_LIST_LIMIT)),
        };

        let prs = api
            .list_pull_requests(&args.project_key, &args.repo_slug, &filter)
            .await?;
        to_pretty_json(&prs)
    })
}

pub(crate) fn get_pull_request(
    api: &dyn BitbucketApi,
    args: Map<String, Value>,
) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: PullRequestArgs = parse_args(args)?;
        let pr = api
            .get_pull_request(&args.project_key, &args.repo_slug, args.pull_request_id)
            .await?;
        to_pretty_json(&pr)
    })
}

pub(crate) fn get_pull_request_activity(
    api: &dyn BitbucketApi,
    args: Map<String, Value>,
) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: PullRequestArgs = parse_args(args)?;
        let activity = api
            .get_pull_request_activity(&args.project_key, &args.repo_slug, args.pull_request_id)
            .await?;
        to_pretty_json(&activity)
    })
}

pub(crate) fn create_pull_request(
    api: &dyn BitbucketApi,
    args: Map<String, Value>,
) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: CreatePullRequestArgs = parse_args(args)?;
        let new_pr = NewPullRequest {
            title: args.title,
            description: args.description,
            from_branch: args.from_branch,
            to_branch: args.to_branch,
            reviewers: args.reviewers,
        };

        let pr = api
            .create_pull_request(&args.project_key, &args.repo_slug, &new_pr)
            .await?;
        to_pretty_json(&pr)
    })
}

pub(crate) fn approve_pull_request(
    api: &dyn BitbucketApi,
    args: Map<String, Value>,
) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: PullRequestArgs = parse_args(args)?;
        api.approve_pull_request(&args.project_key, &args.repo_slug, args.pull_request_id)
            .await?;
        Ok("Pull request approved successfully".to_string())
    })
}

pub(crate) fn unapprove_pull_request(
    api: &dyn BitbucketApi,
    args: Map<String, Value>,
) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: PullRequestArgs = parse_args(args)?;
        api.unapprove_pull_request(&args.project_key, &args.repo_slug, args.pull_request_id)
            .await?;
        Ok("Pull request approval removed successfully".to_string())
    })
}

pub(crate) fn merge_pull_request(
    api: &dyn BitbucketApi,
    args: Map<String, Value>,
) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: PullRequestArgs = parse_args(args)?;
        let current = api
            .get_pull_request(&args.project_key, &args.repo_slug, args.pull_request_id)
            .await?;

        tracing::debug!(
            pull_request_id = args.pull_request_id,
            version = current.version,
            "Merging pull request"
        );
        let pr = api
            .merge_pull_request(
                &args.project_key,
                &args.repo_slug,
                args.pull_request_id,
                current.version,
            )
            .await?;
        to_pretty_json(&pr)
    })
}

pub(crate) fn decline_pull_request(
    api: &dyn BitbucketApi,
    args: Map<String, Value>,
) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: PullRequestArgs = parse_args(args)?;
        let current = api
            .get_pull_request(&args.project_key, &args.repo_slug, args.pull_request_id)
            .await?;

        tracing::debug!(
            pull_request_id = args.pull_request_id,
            version = current.version,
            "Declining pull request"
        );
        let pr = api
            .decline_pull_request(
                &args.project_key,
                &args.repo_slug,
                args.pull_request_id,
                current.version,
            )
            .await?;
        to_pretty_json(&pr)
    })
}

pub(crate) fn get_pull_request_diff(
    api: &dyn BitbucketApi,
    args: Map<String, Value>,
) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: DiffArgs = parse_args(args)?;
        let options = DiffOptions {
            context_lines: positive_u32(args.context_lines),
            whitespace: non_empty(args.whitespace),
            since: non_empty(args.since),
            until: non_empty(args.until),
        };

        api.get_pull_request_diff(
            &args.project_key,
            &args.repo_slug,
            args.pull_request_id,
            &options,
        )
        .await
    })
}

pub(crate) fn create_pull_request_comment(
    api: &dyn BitbucketApi,
    args: Map<String, Value>,
) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: CommentArgs = parse_args(args)?;
        let anchor = args
            .anchor
            .map(CommentAnchor::from)
            .filter(|a| *a != CommentAnchor::default());

        let comment = api
            .create_pull_request_comment(
                &args.project_key,
                &args.repo_slug,
                args.pull_request_id,
                &args.text,
                anchor.as_ref(),
            )
            .await?;
        to_pretty_json(&comment)
    })
}

pub(crate) fn get_repos(api: &dyn BitbucketApi, args: Map<String, Value>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: ProjectArgs = parse_args(args)?;
        let repos = api.get_repos(&args.project_key, REPO_PAGE_SIZE).await?;
        to_pretty_json(&repos)
    })
}

pub(crate) fn get_pull_request_settings(
    api: &dyn BitbucketApi,
    args: Map<String, Value>,
) -> HandlerFuture<'_> {
    Box::pin(async move {
        let args: RepoArgs = parse_args(args)?;
        let settings = api
            .get_pull_request_settings(&args.project_key, &args.repo_slug)
            .await?;
        to_pretty_json(&settings)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ToolResultContent;
    use crate::testing::{FakeApi, MockApi};
    use bbmcp_core::PullRequest;
    use serde_json::json;

    fn handler(api: FakeApi) -> (ToolHandler, Arc<FakeApi>) {
        let api = Arc::new(api);
        (ToolHandler::new(api.clone()), api)
    }

    async fn run(handler: &ToolHandler, tool: &str, args: Value) -> Result<String> {
        let result = handler.execute(tool, Some(args)).await?;
        match result.content.into_iter().next() {
            Some(ToolResultContent::Text { text }) => Ok(text),
            None => panic!("empty content"),
        }
    }

    fn pr_args() -> Value {
        json!({"project_key": "PRJ", "repo_slug": "repo", "pull_request_id": 7})
    }

    #[tokio::test]
    async fn test_list_defaults() {
        let (handler, api) = handler(FakeApi::default());

        run(&handler, "list_pull_requests", json!({"project_key": "PRJ", "repo_slug": "repo"}))
            .await
            .unwrap();

        let filter = api.filter.lock().unwrap().clone().unwrap();
        assert_eq!(filter.limit, Some(DEFAULT_LIST_LIMIT));
        assert!(filter.state.is_none());
    }

    #[tokio::test]
    async fn test_list_ignores_non_positive_limit() {
        let (handler, api) = handler(FakeApi::default());

        run(
            &handler,
            "list_pull_requests",
            json!({"project_key": "PRJ", "repo_slug": "repo", "limit": -3, "state": ""}),
        )
        .await
        .unwrap();

        let filter = api.filter.lock().unwrap().clone().unwrap();
        assert_eq!(filter.limit, Some(25));
        assert!(filter.state.is_none());
    }

    #[tokio::test]
    async fn test_get_pull_request_twice() {
        let (handler, api) = handler(FakeApi::default());

        let first = run(&handler, "get_pull_request", pr_args()).await.unwrap();
        let second = run(&handler, "get_pull_request", pr_args()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            api.calls(),
            vec!["get_pull_request PRJ/repo#7", "get_pull_request PRJ/repo#7"]
        );
    }

    #[tokio::test]
    async fn test_merge_fetches_version_first() {
        let (handler, api) = handler(FakeApi {
            version: 3,
            ..Default::default()
        });

        let text = run(&handler, "merge_pull_request", pr_args()).await.unwrap();

        assert_eq!(
            api.calls(),
            vec![
                "get_pull_request PRJ/repo#7",
                "merge_pull_request PRJ/repo#7 version=3"
            ]
        );
        let pr: PullRequest = serde_json::from_str(&text).unwrap();
        assert_eq!(pr.state, "MERGED");
    }

    #[tokio::test]
    async fn test_decline_conflict_is_surfaced_once() {
        let (handler, api) = handler(FakeApi {
            version: 5,
            fail_writes: Some(409),
            ..Default::default()
        });

        let err = run(&handler, "decline_pull_request", pr_args())
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(409));
        assert_eq!(
            api.calls(),
            vec![
                "get_pull_request PRJ/repo#7",
                "decline_pull_request PRJ/repo#7 version=5"
            ]
        );
    }

    #[tokio::test]
    async fn test_merge_skips_write_when_fetch_fails() {
        let (handler, api) = handler(FakeApi {
            fail_reads: Some(404),
            ..Default::default()
        });

        let err = run(&handler, "merge_pull_request", pr_args())
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(404));
        assert_eq!(api.calls(), vec!["get_pull_request PRJ/repo#7"]);
    }

    #[tokio::test]
    async fn test_merge_with_mock_uses_fetched_version() {
        let mut mock = MockApi::new();
        mock.expect_get_pull_request()
            .withf(|project, repo, id| project == "PRJ" && repo == "repo" && *id == 7)
            .times(1)
            .returning(|_, _, id| {
                Ok(PullRequest {
                    id,
                    version: 12,
                    ..Default::default()
                })
            });
        mock.expect_merge_pull_request()
            .withf(|_, _, id, version| *id == 7 && *version == 12)
            .times(1)
            .returning(|_, _, _, _| Err(Error::from_status(409, "stale version")));

        let handler = ToolHandler::new(Arc::new(mock));
        let err = run(&handler, "merge_pull_request", pr_args())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Api { status: 409, .. }));
    }

    #[tokio::test]
    async fn test_approve_and_unapprove_messages() {
        let (handler, _) = handler(FakeApi::default());

        assert_eq!(
            run(&handler, "approve_pull_request", pr_args()).await.unwrap(),
            "Pull request approved successfully"
        );
        assert_eq!(
            run(&handler, "unapprove_pull_request", pr_args()).await.unwrap(),
            "Pull request approval removed successfully"
        );
    }

    #[tokio::test]
    async fn test_diff_passthrough_and_options() {
        let (handler, api) = handler(FakeApi::default());

        let text = run(
            &handler,
            "get_pull_request_diff",
            json!({
                "project_key": "PRJ",
                "repo_slug": "repo",
                "pull_request_id": 7,
                "context_lines": 0,
                "whitespace": "",
                "since": "abc",
                "until": 42
            }),
        )
        .await
        .unwrap();

        assert_eq!(text, "diff --git a/README.md b/README.md\n+hello\n");
        let options = api.diff_options.lock().unwrap().clone().unwrap();
        assert_eq!(
            options,
            DiffOptions {
                since: Some("abc".to_string()),
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn test_comment_anchor_defaults_to_range() {
        let (handler, api) = handler(FakeApi::default());

        run(
            &handler,
            "create_pull_request_comment",
            json!({
                "project_key": "PRJ",
                "repo_slug": "repo",
                "pull_request_id": 7,
                "text": "x",
                "anchor": {"from_hash": "abc"}
            }),
        )
        .await
        .unwrap();

        let anchor = api.anchor.lock().unwrap().clone().unwrap();
        assert_eq!(anchor.from_hash.as_deref(), Some("abc"));
        assert_eq!(anchor.diff_type.as_deref(), Some("RANGE"));
    }

    #[tokio::test]
    async fn test_comment_anchor_fields_checked_individually() {
        let (handler, api) = handler(FakeApi::default());

        run(
            &handler,
            "create_pull_request_comment",
            json!({
                "project_key": "PRJ",
                "repo_slug": "repo",
                "pull_request_id": 7,
                "text": "x",
                "anchor": {
                    "line": "12",
                    "path": "src/lib.rs",
                    "line_type": "ADDED",
                    "to_hash": 99,
                    "file_type": ""
                }
            }),
        )
        .await
        .unwrap();

        let anchor = api.anchor.lock().unwrap().clone().unwrap();
        assert_eq!(
            anchor,
            CommentAnchor {
                path: Some("src/lib.rs".to_string()),
                line_type: Some("ADDED".to_string()),
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn test_comment_without_anchor() {
        let (handler, api) = handler(FakeApi::default());

        let text = run(
            &handler,
            "create_pull_request_comment",
            json!({
                "project_key": "PRJ",
                "repo_slug": "repo",
                "pull_request_id": 7,
                "text": "Looks good",
                "anchor": {}
            }),
        )
        .await
        .unwrap();

        assert!(api.anchor.lock().unwrap().is_none());
        assert!(text.contains("Looks good"));
    }

    #[tokio::test]
    async fn test_create_pull_request_drops_bad_reviewers() {
        let (handler, api) = handler(FakeApi::default());

        run(
            &handler,
            "create_pull_request",
            json!({
                "project_key": "PRJ",
                "repo_slug": "repo",
                "title": "Add feature",
                "from_branch": "feature/x",
                "to_branch": "main",
                "reviewers": ["alice", 1, "bob"]
            }),
        )
        .await
        .unwrap();

        assert_eq!(
            api.calls(),
            vec!["create_pull_request PRJ/repo feature/x->main reviewers=alice,bob"]
        );
    }

    #[tokio::test]
    async fn test_get_repos_page_size() {
        let (handler, api) = handler(FakeApi::default());

        let text = run(&handler, "get_repos", json!({"project_key": "PRJ"}))
            .await
            .unwrap();

        assert_eq!(api.calls(), vec!["get_repos PRJ page_size=100"]);
        let repos: Vec<Value> = serde_json::from_str(&text).unwrap();
        assert_eq!(repos.len(), 2);
    }

    #[tokio::test]
    async fn test_settings_and_activity() {
        let (handler, _) = handler(FakeApi::default());

        let settings = run(
            &handler,
            "get_pull_request_settings",
            json!({"project_key": "PRJ", "repo_slug": "repo"}),
        )
        .await
        .unwrap();
        assert!(settings.contains("\"requiredApprovers\": 2"));

        let activity = run(&handler, "get_pull_request_activity", pr_args())
            .await
            .unwrap();
        assert!(activity.contains("\"isLastPage\": true"));
    }

    #[tokio::test]
    async fn test_negative_id_is_invalid() {
        let (handler, api) = handler(FakeApi::default());

        let err = run(
            &handler,
            "get_pull_request",
            json!({"project_key": "PRJ", "repo_slug": "repo", "pull_request_id": -1}),
        )
        .await
        .unwrap_err();

        assert!(
            matches!(err, Error::InvalidArguments(ref m) if m.contains("pull_request_id")),
            "{}",
            err
        );
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_integers_fall_back() {
        let (handler, api) = handler(FakeApi::default());

        run(
            &handler,
            "list_pull_requests",
            json!({"project_key": "PRJ", "repo_slug": "repo", "limit": u64::MAX}),
        )
        .await
        .unwrap();
        let filter = api.filter.lock().unwrap().clone().unwrap();
        assert_eq!(filter.limit, Some(DEFAULT_LIST_LIMIT));

        run(
            &handler,
            "create_pull_request_comment",
            json!({
                "project_key": "PRJ",
                "repo_slug": "repo",
                "pull_request_id": 7,
                "text": "x",
                "anchor": {"line": 18446744073709551615u64, "path": "a"}
            }),
        )
        .await
        .unwrap();
        let anchor = api.anchor.lock().unwrap().clone().unwrap();
        assert_eq!(anchor.path.as_deref(), Some("a"));
        assert!(anchor.line.is_none());
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (handler, _) = handler(FakeApi::default());
        let err = handler.execute("nope", None).await.unwrap_err();
        assert!(matches!(err, Error::UnknownTool(ref name) if name == "nope"));
    }

    #[test]
    fn test_available_tools_match_table() {
        let (handler, _) = handler(FakeApi::default());
        let names: Vec<String> = handler.available_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names.first().map(String::as_str), Some("list_pull_requests"));
        assert_eq!(names.len(), tools::TOOLS.len());
    }
}
