//! Bitbucket Server payload types.
//!
//! These mirror the JSON shapes of the Bitbucket Server REST API (1.0).
//! They are decoded from responses and serialized back out verbatim as tool
//! output, so every struct tolerates missing fields and keeps the API's
//! camelCase naming on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Paging
// =============================================================================

/// One page of a paged collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Page<T> {
    pub values: Vec<T>,
    pub size: u32,
    pub limit: u32,
    pub is_last_page: bool,
    pub start: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_start: Option<u32>,
}

// =============================================================================
// Users and repositories
// =============================================================================

/// Bitbucket user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct User {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    pub id: u64,
    pub display_name: String,
    pub active: bool,
    pub slug: String,
    #[serde(rename = "type")]
    pub user_type: String,
}

/// A user's involvement in a pull request (author, reviewer or participant).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Participant {
    pub user: User,
    pub role: String,
    pub approved: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reviewed_commit: Option<String>,
}

/// Reviewers share the participant shape.
pub type Reviewer = Participant;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Project {
    pub key: String,
    pub id: u64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub public: bool,
    #[serde(rename = "type")]
    pub project_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Repository {
    pub slug: String,
    pub id: u64,
    pub name: String,
    pub scm_id: String,
    pub state: String,
    pub status_message: String,
    pub forkable: bool,
    pub project: Project,
    pub public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
}

// =============================================================================
// Pull requests
// =============================================================================

/// Branch reference on either side of a pull request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PullRequestRef {
    pub id: String,
    pub display_id: String,
    pub latest_commit: String,
    pub repository: Repository,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PullRequest {
    pub id: u64,
    /// Optimistic-locking version; merge and decline must echo it back.
    pub version: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub state: String,
    pub open: bool,
    pub closed: bool,
    pub created_date: i64,
    pub updated_date: i64,
    pub from_ref: PullRequestRef,
    pub to_ref: PullRequestRef,
    pub locked: bool,
    pub author: Participant,
    pub reviewers: Vec<Reviewer>,
    pub participants: Vec<Participant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
}

/// Pull request to be created.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPullRequest {
    pub title: String,
    pub description: Option<String>,
    pub from_branch: String,
    pub to_branch: String,
    /// Reviewer user names
    pub reviewers: Vec<String>,
}

/// Filter for listing pull requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PullRequestFilter {
    /// OPEN, MERGED, DECLINED or ALL
    pub state: Option<String>,
    pub limit: Option<u32>,
}

/// Optional knobs for the raw diff endpoint. Unset values are left out of the query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffOptions {
    pub context_lines: Option<u32>,
    pub whitespace: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
}

// =============================================================================
// Comments and activity
// =============================================================================

/// Location of an inline comment inside a diff.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CommentAnchor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// ADDED, REMOVED or CONTEXT
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// FROM or TO
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_path: Option<String>,
    /// EFFECTIVE, RANGE or COMMIT
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orphaned_type: Option<String>,
}

impl CommentAnchor {
    /// Diff type assumed when a commit range is given without one.
    pub const DEFAULT_RANGE_DIFF_TYPE: &'static str = "RANGE";

    /// Fill in derived defaults: an anchor that names a commit hash but no
    /// diff type is anchored to the commit range.
    pub fn with_defaults(mut self) -> Self {
        let has_hash = self.from_hash.is_some() || self.to_hash.is_some();
        if has_hash && self.diff_type.is_none() {
            self.diff_type = Some(Self::DEFAULT_RANGE_DIFF_TYPE.to_string());
        }
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Comment {
    pub id: u64,
    pub version: i64,
    pub text: String,
    pub author: User,
    pub created_date: i64,
    pub updated_date: i64,
    pub comments: Vec<Comment>,
    pub tasks: Vec<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<CommentAnchor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permitted_operations: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Task {
    pub id: u64,
    pub text: String,
    pub state: String,
    pub author: User,
    pub created_date: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permitted_operations: Option<Value>,
}

/// One entry of a pull request's activity stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Activity {
    pub id: u64,
    pub created_date: i64,
    pub user: User,
    /// COMMENTED, APPROVED, RESCOPED, MERGED, ...
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<Comment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_anchor: Option<CommentAnchor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_from_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_to_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added: Option<Page<Commit>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<Page<Commit>>,
}

/// Paged activity stream of a pull request.
pub type PullRequestActivity = Page<Activity>;

// =============================================================================
// Commits
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Person {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CommitParent {
    pub id: String,
    pub display_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Commit {
    pub id: String,
    pub display_id: String,
    pub author: Person,
    pub author_timestamp: i64,
    pub committer: Person,
    pub committer_timestamp: i64,
    pub message: String,
    pub parents: Vec<CommitParent>,
}

// =============================================================================
// Repository pull-request settings
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct MergeStrategy {
    pub id: String,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub flag: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct MergeConfig {
    pub commit_summaries: u32,
    pub default_strategy: MergeStrategy,
    pub strategies: Vec<MergeStrategy>,
    #[serde(rename = "type")]
    pub config_type: String,
}

/// Settings of a repository hook such as required approvers or builds.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HookConfig {
    pub enable: bool,
    pub count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PullRequestSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_config: Option<MergeConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_approvers: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_all_approvers: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_all_tasks_complete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_successful_builds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_work: Option<bool>,
    #[serde(
        rename = "com.atlassian.bitbucket.server.bitbucket-bundled-hooks:requiredApprovers",
        skip_serializing_if = "Option::is_none"
    )]
    pub required_approvers_hook: Option<HookConfig>,
    #[serde(
        rename = "com.atlassian.bitbucket.server.bitbucket-build:requiredBuilds",
        skip_serializing_if = "Option::is_none"
    )]
    pub required_builds_hook: Option<HookConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_defaults_to_range_with_from_hash() {
        let anchor = CommentAnchor {
            from_hash: Some("abc".to_string()),
            ..Default::default()
        }
        .with_defaults();
        assert_eq!(anchor.diff_type.as_deref(), Some("RANGE"));
    }

    #[test]
    fn test_anchor_keeps_explicit_diff_type() {
        let anchor = CommentAnchor {
            to_hash: Some("def".to_string()),
            diff_type: Some("COMMIT".to_string()),
            ..Default::default()
        }
        .with_defaults();
        assert_eq!(anchor.diff_type.as_deref(), Some("COMMIT"));
    }

    #[test]
    fn test_anchor_without_hashes_has_no_diff_type() {
        let anchor = CommentAnchor {
            path: Some("src/lib.rs".to_string()),
            line: Some(3),
            ..Default::default()
        }
        .with_defaults();
        assert!(anchor.diff_type.is_none());

        let json = serde_json::to_value(&anchor).unwrap();
        assert_eq!(json, serde_json::json!({"line": 3, "path": "src/lib.rs"}));
    }

    #[test]
    fn test_pull_request_tolerates_partial_payload() {
        let pr: PullRequest = serde_json::from_value(serde_json::json!({
            "id": 7,
            "version": 3,
            "title": "Fix it",
            "state": "OPEN",
            "fromRef": {"id": "refs/heads/fix", "displayId": "fix"},
            "author": {"user": {"name": "jdoe", "displayName": "J. Doe"}, "role": "AUTHOR"}
        }))
        .unwrap();

        assert_eq!(pr.id, 7);
        assert_eq!(pr.version, 3);
        assert_eq!(pr.from_ref.display_id, "fix");
        assert_eq!(pr.author.user.name, "jdoe");
        assert!(pr.reviewers.is_empty());
        assert!(pr.description.is_none());
    }

    #[test]
    fn test_settings_hook_keys() {
        let settings: PullRequestSettings = serde_json::from_value(serde_json::json!({
            "requiredApprovers": 2,
            "com.atlassian.bitbucket.server.bitbucket-build:requiredBuilds": {"enable": true, "count": 1},
            "mergeConfig": {
                "defaultStrategy": {"id": "no-ff", "name": "Merge commit", "enabled": true},
                "strategies": [],
                "type": "REPOSITORY"
            }
        }))
        .unwrap();

        assert_eq!(settings.required_approvers, Some(2));
        assert_eq!(settings.required_builds_hook.unwrap().count, 1);
        let merge = settings.merge_config.unwrap();
        assert_eq!(merge.default_strategy.id, "no-ff");
        assert_eq!(merge.config_type, "REPOSITORY");
    }

    #[test]
    fn test_page_next_page_start() {
        let page: Page<Repository> = serde_json::from_value(serde_json::json!({
            "values": [{"slug": "a"}],
            "size": 1,
            "limit": 1,
            "isLastPage": false,
            "start": 0,
            "nextPageStart": 1
        }))
        .unwrap();

        assert_eq!(page.values[0].slug, "a");
        assert!(!page.is_last_page);
        assert_eq!(page.next_page_start, Some(1));
    }
}
