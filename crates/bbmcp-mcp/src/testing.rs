//! In-memory Bitbucket backend for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use bbmcp_core::{
    BitbucketApi, Comment, CommentAnchor, DiffOptions, Error, NewPullRequest, Page, PullRequest,
    PullRequestActivity, PullRequestFilter, PullRequestSettings, Repository, Result,
};

/// Records every call and answers with canned data.
#[derive(Default)]
pub(crate) struct FakeApi {
    pub(crate) calls: Mutex<Vec<String>>,
    /// Version reported by `get_pull_request`.
    pub version: i64,
    /// Status returned by every read.
    pub fail_reads: Option<u16>,
    /// Status returned by every write.
    pub fail_writes: Option<u16>,
    pub anchor: Mutex<Option<CommentAnchor>>,
    pub filter: Mutex<Option<PullRequestFilter>>,
    pub diff_options: Mutex<Option<DiffOptions>>,
}

impl FakeApi {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn read(&self) -> Result<()> {
        match self.fail_reads {
            Some(status) => Err(Error::from_status(status, "")),
            None => Ok(()),
        }
    }

    fn write(&self) -> Result<()> {
        match self.fail_writes {
            Some(status) => Err(Error::from_status(status, "{\"errors\":[]}")),
            None => Ok(()),
        }
    }

    fn pull_request(&self, id: u64, state: &str) -> PullRequest {
        PullRequest {
            id,
            version: self.version,
            title: format!("PR {}", id),
            state: state.to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl BitbucketApi for FakeApi {
    async fn list_pull_requests(
        &self,
        project_key: &str,
        repo_slug: &str,
        filter: &PullRequestFilter,
    ) -> Result<Vec<PullRequest>> {
        self.record(format!("list_pull_requests {}/{}", project_key, repo_slug));
        *self.filter.lock().unwrap() = Some(filter.clone());
        self.read()?;
        Ok(vec![self.pull_request(1, "OPEN"), self.pull_request(2, "OPEN")])
    }

    async fn get_pull_request(
        &self,
        project_key: &str,
        repo_slug: &str,
        id: u64,
    ) -> Result<PullRequest> {
        self.record(format!("get_pull_request {}/{}#{}", project_key, repo_slug, id));
        self.read()?;
        Ok(self.pull_request(id, "OPEN"))
    }

    async fn get_pull_request_activity(
        &self,
        project_key: &str,
        repo_slug: &str,
        id: u64,
    ) -> Result<PullRequestActivity> {
        self.record(format!("get_pull_request_activity {}/{}#{}", project_key, repo_slug, id));
        self.read()?;
        Ok(Page {
            is_last_page: true,
            ..Default::default()
        })
    }

    async fn create_pull_request(
        &self,
        project_key: &str,
        repo_slug: &str,
        pull_request: &NewPullRequest,
    ) -> Result<PullRequest> {
        self.record(format!(
            "create_pull_request {}/{} {}->{} reviewers={}",
            project_key,
            repo_slug,
            pull_request.from_branch,
            pull_request.to_branch,
            pull_request.reviewers.join(",")
        ));
        self.write()?;
        Ok(PullRequest {
            title: pull_request.title.clone(),
            description: pull_request.description.clone(),
            ..self.pull_request(10, "OPEN")
        })
    }

    async fn approve_pull_request(&self, project_key: &str, repo_slug: &str, id: u64) -> Result<()> {
        self.record(format!("approve_pull_request {}/{}#{}", project_key, repo_slug, id));
        self.write()
    }

    async fn unapprove_pull_request(
        &self,
        project_key: &str,
        repo_slug: &str,
        id: u64,
    ) -> Result<()> {
        self.record(format!("unapprove_pull_request {}/{}#{}", project_key, repo_slug, id));
        self.write()
    }

    async fn merge_pull_request(
        &self,
        project_key: &str,
        repo_slug: &str,
        id: u64,
        version: i64,
    ) -> Result<PullRequest> {
        self.record(format!(
            "merge_pull_request {}/{}#{} version={}",
            project_key, repo_slug, id, version
        ));
        self.write()?;
        Ok(self.pull_request(id, "MERGED"))
    }

    async fn decline_pull_request(
        &self,
        project_key: &str,
        repo_slug: &str,
        id: u64,
        version: i64,
    ) -> Result<PullRequest> {
        self.record(format!(
            "decline_pull_request {}/{}#{} version={}",
            project_key, repo_slug, id, version
        ));
        self.write()?;
        Ok(self.pull_request(id, "DECLINED"))
    }

    async fn get_pull_request_diff(
        &self,
        project_key: &str,
        repo_slug: &str,
        id: u64,
        options: &DiffOptions,
    ) -> Result<String> {
        self.record(format!("get_pull_request_diff {}/{}#{}", project_key, repo_slug, id));
        *self.diff_options.lock().unwrap() = Some(options.clone());
        self.read()?;
        Ok("diff --git a/README.md b/README.md\n+hello\n".to_string())
    }

    async fn create_pull_request_comment(
        &self,
        project_key: &str,
        repo_slug: &str,
        id: u64,
        text: &str,
        anchor: Option<&CommentAnchor>,
    ) -> Result<Comment> {
        self.record(format!(
            "create_pull_request_comment {}/{}#{}",
            project_key, repo_slug, id
        ));
        *self.anchor.lock().unwrap() = anchor.cloned();
        self.write()?;
        Ok(Comment {
            id: 77,
            text: text.to_string(),
            anchor: anchor.cloned(),
            ..Default::default()
        })
    }

    async fn get_repos(&self, project_key: &str, page_size: u32) -> Result<Vec<Repository>> {
        self.record(format!("get_repos {} page_size={}", project_key, page_size));
        self.read()?;
        Ok(vec![
            Repository {
                slug: "alpha".to_string(),
                ..Default::default()
            },
            Repository {
                slug: "beta".to_string(),
                ..Default::default()
            },
        ])
    }

    async fn get_pull_request_settings(
        &self,
        project_key: &str,
        repo_slug: &str,
    ) -> Result<PullRequestSettings> {
        self.record(format!("get_pull_request_settings {}/{}", project_key, repo_slug));
        self.read()?;
        Ok(PullRequestSettings {
            required_approvers: Some(2),
            ..Default::default()
        })
    }
}

mockall::mock! {
    pub Api {}

    #[async_trait]
    impl BitbucketApi for Api {
        async fn list_pull_requests(
            &self,
            project_key: &str,
            repo_slug: &str,
            filter: &PullRequestFilter,
        ) -> Result<Vec<PullRequest>>;
        async fn get_pull_request(&self, project_key: &str, repo_slug: &str, id: u64)
            -> Result<PullRequest>;
        async fn get_pull_request_activity(
            &self,
            project_key: &str,
            repo_slug: &str,
            id: u64,
        ) -> Result<PullRequestActivity>;
        async fn create_pull_request(
            &self,
            project_key: &str,
            repo_slug: &str,
            pull_request: &NewPullRequest,
        ) -> Result<PullRequest>;
        async fn approve_pull_request(&self, project_key: &str, repo_slug: &str, id: u64)
            -> Result<()>;
        async fn unapprove_pull_request(&self, project_key: &str, repo_slug: &str, id: u64)
            -> Result<()>;
        async fn merge_pull_request(
            &self,
            project_key: &str,
            repo_slug: &str,
            id: u64,
            version: i64,
        ) -> Result<PullRequest>;
        async fn decline_pull_request(
            &self,
            project_key: &str,
            repo_slug: &str,
            id: u64,
            version: i64,
        ) -> Result<PullRequest>;
        async fn get_pull_request_diff(
            &self,
            project_key: &str,
            repo_slug: &str,
            id: u64,
            options: &DiffOptions,
        ) -> Result<String>;
        async fn create_pull_request_comment<'life0, 'life1, 'life2, 'life3, 'life4>(
            &'life0 self,
            project_key: &'life1 str,
            repo_slug: &'life2 str,
            id: u64,
            text: &'life3 str,
            anchor: Option<&'life4 CommentAnchor>,
        ) -> Result<Comment>;
        async fn get_repos(&self, project_key: &str, page_size: u32) -> Result<Vec<Repository>>;
        async fn get_pull_request_settings(
            &self,
            project_key: &str,
            repo_slug: &str,
        ) -> Result<PullRequestSettings>;
    }
}
