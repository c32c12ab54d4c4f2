//! Request bodies sent to Bitbucket Server.

use bbmcp_core::{CommentAnchor, NewPullRequest};
use serde::Serialize;

/// `{id, repository: {slug, project: {key}}}` reference used when opening a pull request.
#[derive(Debug, Clone, Serialize)]
pub struct RefRequest {
    pub id: String,
    pub repository: RepositoryRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepositoryRequest {
    pub slug: String,
    pub project: ProjectRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectRequest {
    pub key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewerRequest {
    pub user: UserRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserRequest {
    pub name: String,
}

/// Request body for opening a pull request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePullRequestRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub from_ref: RefRequest,
    pub to_ref: RefRequest,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reviewers: Vec<ReviewerRequest>,
}

impl CreatePullRequestRequest {
    /// Build the body for a pull request between two branches of the same repository.
    pub fn new(project_key: &str, repo_slug: &str, input: &NewPullRequest) -> Self {
        let branch = |id: &str| RefRequest {
            id: id.to_string(),
            repository: RepositoryRequest {
                slug: repo_slug.to_string(),
                project: ProjectRequest {
                    key: project_key.to_string(),
                },
            },
        };

        Self {
            title: input.title.clone(),
            description: input.description.clone(),
            from_ref: branch(&input.from_branch),
            to_ref: branch(&input.to_branch),
            reviewers: input
                .reviewers
                .iter()
                .map(|name| ReviewerRequest {
                    user: UserRequest { name: name.clone() },
                })
                .collect(),
        }
    }
}

/// Request body for adding a comment.
#[derive(Debug, Clone, Serialize)]
pub struct CreateCommentRequest<'a> {
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<&'a CommentAnchor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_pull_request_body() {
        let body = CreatePullRequestRequest::new(
            "PRJ",
            "repo",
            &NewPullRequest {
                title: "Add feature".to_string(),
                description: None,
                from_branch: "feature/x".to_string(),
                to_branch: "main".to_string(),
                reviewers: vec!["alice".to_string()],
            },
        );

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "title": "Add feature",
                "fromRef": {"id": "feature/x", "repository": {"slug": "repo", "project": {"key": "PRJ"}}},
                "toRef": {"id": "main", "repository": {"slug": "repo", "project": {"key": "PRJ"}}},
                "reviewers": [{"user": {"name": "alice"}}]
            })
        );
    }

    #[test]
    fn test_comment_body_without_anchor() {
        let body = CreateCommentRequest {
            text: "LGTM",
            anchor: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"text": "LGTM"})
        );
    }
}
