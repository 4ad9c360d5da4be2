use crate::config::Config;
use crate::error::Result;
use crate::http::{self, encode_path_segment, RestResponse};
use crate::types::{Issue, IssueComment, Page, PullRequest, Repository, Review, SearchResults};
use reqwest::Client;
use serde::de::DeserializeOwned;

/// Typed GitHub REST endpoints. Every listing takes an explicit page number and page size and
/// returns a single [`Page`].
#[derive(Debug, Clone)]
pub struct Api {
    client: Client,
    cfg: Config,
}

fn into_page<T>(resp: RestResponse<Vec<T>>) -> Page<T> {
    Page {
        items: resp.value,
        next_page: resp.next_page,
        rate: resp.rate,
    }
}

fn paging(page: u32, per_page: u32) -> Vec<(&'static str, String)> {
    vec![("page", page.to_string()), ("per_page", per_page.to_string())]
}

impl Api {
    pub fn new(cfg: Config) -> Result<Self> {
        let client = http::build_client(&cfg)?;
        Ok(Self { client, cfg })
    }

    async fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        mut query: Vec<(&'static str, String)>,
        page: u32,
        per_page: u32,
    ) -> Result<Page<T>> {
        query.extend(paging(page, per_page));
        let resp = http::rest_get_json::<Vec<T>>(&self.client, &self.cfg, path, &query).await?;
        Ok(into_page(resp))
    }

    /// `GET /search/issues`, oldest first.
    pub async fn search_issues(&self, q: &str, page: u32, per_page: u32) -> Result<Page<Issue>> {
        let mut query = vec![
            ("q", q.to_string()),
            ("sort", "created".to_string()),
            ("order", "asc".to_string()),
        ];
        query.extend(paging(page, per_page));
        let resp = http::rest_get_json::<SearchResults<Issue>>(
            &self.client,
            &self.cfg,
            "/search/issues",
            &query,
        )
        .await?;
        Ok(Page {
            items: resp.value.items,
            next_page: resp.next_page,
            rate: resp.rate,
        })
    }

    pub async fn list_pulls(
        &self,
        owner: &str,
        repo: &str,
        state: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<PullRequest>> {
        let path = format!(
            "/repos/{}/{}/pulls",
            encode_path_segment(owner),
            encode_path_segment(repo)
        );
        self.list(&path, vec![("state", state.to_string())], page, per_page)
            .await
    }

    pub async fn list_reviews(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Page<Review>> {
        let path = format!(
            "/repos/{}/{}/pulls/{}/reviews",
            encode_path_segment(owner),
            encode_path_segment(repo),
            number
        );
        self.list(&path, Vec::new(), page, per_page).await
    }

    /// Conversation comments on an issue or pull request (not inline diff comments).
    pub async fn list_issue_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Page<IssueComment>> {
        let path = format!(
            "/repos/{}/{}/issues/{}/comments",
            encode_path_segment(owner),
            encode_path_segment(repo),
            number
        );
        self.list(&path, Vec::new(), page, per_page).await
    }

    pub async fn list_org_repos(
        &self,
        org: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<Repository>> {
        let path = format!("/orgs/{}/repos", encode_path_segment(org));
        self.list(&path, vec![("type", "all".to_string())], page, per_page)
            .await
    }
}
