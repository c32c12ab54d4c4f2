//! MCP tool definitions.
//!
//! The tool set is a fixed table: name, description, declared parameters and
//! handler. Nothing is registered at runtime.

use crate::handlers::{self, HandlerFn};
use crate::protocol::ToolDefinition;
use crate::schema::{object_schema, ParamSpec};

/// A tool exposed over MCP.
pub struct Tool {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
    pub handler: HandlerFn,
}

impl Tool {
    /// Definition advertised by `tools/list`.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.to_string(),
            description: self.description.to_string(),
            input_schema: object_schema(self.params),
        }
    }
}

/// Look up a tool by name.
pub fn find(name: &str) -> Option<&'static Tool> {
    TOOLS.iter().find(|tool| tool.name == name)
}

// =============================================================================
// Parameters
// =============================================================================

const PROJECT_KEY: ParamSpec = ParamSpec::string("project_key", "The project key").required();
const REPO_SLUG: ParamSpec = ParamSpec::string("repo_slug", "The repository slug").required();
const PULL_REQUEST_ID: ParamSpec =
    ParamSpec::id("pull_request_id", "The pull request ID").required();

const REPO_PARAMS: &[ParamSpec] = &[PROJECT_KEY, REPO_SLUG];
const PULL_REQUEST_PARAMS: &[ParamSpec] = &[PROJECT_KEY, REPO_SLUG, PULL_REQUEST_ID];

const LIST_PARAMS: &[ParamSpec] = &[
    PROJECT_KEY,
    REPO_SLUG,
    ParamSpec::string("state", "Filter by state (OPEN, MERGED, DECLINED, ALL)")
        .one_of(&["OPEN", "MERGED", "DECLINED", "ALL"]),
    ParamSpec::integer(
        "limit",
        "Maximum number of results to return (default: 25)",
    ),
];

const CREATE_PARAMS: &[ParamSpec] = &[
    PROJECT_KEY,
    REPO_SLUG,
    ParamSpec::string("title", "The pull request title").required(),
    ParamSpec::string("from_branch", "Source branch name").required(),
    ParamSpec::string("to_branch", "Target branch name").required(),
    ParamSpec::string("description", "The pull request description"),
    ParamSpec::string_array("reviewers", "List of reviewer usernames"),
];

const DIFF_PARAMS: &[ParamSpec] = &[
    PROJECT_KEY,
    REPO_SLUG,
    PULL_REQUEST_ID,
    ParamSpec::integer(
        "context_lines",
        "Number of context lines around changes (optional)",
    ),
    ParamSpec::string("whitespace", "Whitespace handling (optional)").one_of(&[
        "ignore-all",
        "ignore-space-at-eol",
        "ignore-space-change",
        "ignore-trailing-space",
    ]),
    ParamSpec::string("since", "Base commit hash to diff from (optional)"),
    ParamSpec::string("until", "End commit hash to diff to (optional)"),
];

const ANCHOR_PARAMS: &[ParamSpec] = &[
    ParamSpec::integer("line", "Line number for inline comment"),
    ParamSpec::string("line_type", "Line type (ADDED, REMOVED, CONTEXT)")
        .one_of(&["ADDED", "REMOVED", "CONTEXT"]),
    ParamSpec::string("path", "File path for inline comment"),
    ParamSpec::string("file_type", "File type (FROM, TO)").one_of(&["FROM", "TO"]),
    ParamSpec::string("from_hash", "Source commit hash"),
    ParamSpec::string("to_hash", "Target commit hash"),
    ParamSpec::string("src_path", "Source file path (for renames)"),
    ParamSpec::string("dst_path", "Destination file path (for renames)"),
    ParamSpec::string(
        "diff_type",
        "Diff type (EFFECTIVE, RANGE, COMMIT); defaults to RANGE when a commit hash is given",
    )
    .one_of(&["EFFECTIVE", "RANGE", "COMMIT"]),
    ParamSpec::string("orphaned_type", "Orphaned comment type"),
];

const COMMENT_PARAMS: &[ParamSpec] = &[
    PROJECT_KEY,
    REPO_SLUG,
    PULL_REQUEST_ID,
    ParamSpec::string("text", "The comment text").required(),
    ParamSpec::object("anchor", ANCHOR_PARAMS, "Optional anchor for inline comments"),
];

const PROJECT_PARAMS: &[ParamSpec] = &[PROJECT_KEY];

// =============================================================================
// Tool table
// =============================================================================

/// All tools, in advertised order.
pub static TOOLS: &[Tool] = &[
    Tool {
        name: "list_pull_requests",
        description: "List pull requests for a repository",
        params: LIST_PARAMS,
        handler: handlers::list_pull_requests,
    },
    Tool {
        name: "get_pull_request",
        description: "Get details of a specific pull request",
        params: PULL_REQUEST_PARAMS,
        handler: handlers::get_pull_request,
    },
    Tool {
        name: "get_pull_request_activity",
        description: "Get activity (comments, approvals, etc.) for a pull request",
        params: PULL_REQUEST_PARAMS,
        handler: handlers::get_pull_request_activity,
    },
    Tool {
        name: "create_pull_request",
        description: "Create a new pull request",
        params: CREATE_PARAMS,
        handler: handlers::create_pull_request,
    },
    Tool {
        name: "approve_pull_request",
        description: "Approve a pull request",
        params: PULL_REQUEST_PARAMS,
        handler: handlers::approve_pull_request,
    },
    Tool {
        name: "unapprove_pull_request",
        description: "Remove approval from a pull request",
        params: PULL_REQUEST_PARAMS,
        handler: handlers::unapprove_pull_request,
    },
    Tool {
        name: "merge_pull_request",
        description:
            "Merge a pull request (automatically fetches current version for optimistic locking)",
        params: PULL_REQUEST_PARAMS,
        handler: handlers::merge_pull_request,
    },
    Tool {
        name: "decline_pull_request",
        description:
            "Decline a pull request (automatically fetches current version for optimistic locking)",
        params: PULL_REQUEST_PARAMS,
        handler: handlers::decline_pull_request,
    },
    Tool {
        name: "get_pull_request_diff",
        description: "Get the raw diff for a pull request",
        params: DIFF_PARAMS,
        handler: handlers::get_pull_request_diff,
    },
    Tool {
        name: "create_pull_request_comment",
        description: "Add a comment to a pull request",
        params: COMMENT_PARAMS,
        handler: handlers::create_pull_request_comment,
    },
    Tool {
        name: "get_repos",
        description: "List all repositories in a project",
        params: PROJECT_PARAMS,
        handler: handlers::get_repos,
    },
    Tool {
        name: "get_pull_request_settings",
        description: "Get pull request settings (required approvers, builds, merge strategies) for a repository",
        params: REPO_PARAMS,
        handler: handlers::get_pull_request_settings,
    },
];
