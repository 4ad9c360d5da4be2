use crate::api::Api;
use crate::error::Result;
use crate::paginate::{collect_pages, fetch_all, Clock, ItemHandler, Outcome};
use crate::types::{login_of, PullRequest, Review};
use chrono::SecondsFormat;
use log::debug;

pub const PULLS_PAGE_SIZE: u32 = 50;
pub const REVIEWS_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct ReviewListOptions {
    pub owner: String,
    pub repo: String,
    /// `open`, `closed` or `all`.
    pub state: String,
    pub number: Option<u64>,
    pub per_page: u32,
}

pub fn format_review_line(repo: &str, pr: &PullRequest, review: &Review) -> String {
    let submitted = review
        .submitted_at
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} {} {} {} {} {}",
        repo,
        pr.number,
        login_of(&pr.user),
        login_of(&review.user),
        review.state,
        submitted
    )
}

struct ReviewLister<'a, C> {
    api: &'a Api,
    opts: &'a ReviewListOptions,
    clock: &'a C,
}

impl<C: Clock> ItemHandler<PullRequest> for ReviewLister<'_, C> {
    type Output = Vec<String>;

    async fn handle(&mut self, pr: &PullRequest) -> Outcome<Vec<String>> {
        if self.opts.number.is_some_and(|n| n != pr.number) {
            return Outcome::Skip;
        }
        let api = self.api;
        let opts = self.opts;
        let owner = opts.owner.as_str();
        let repo = opts.repo.as_str();
        let number = pr.number;
        let mut source =
            move |page: u32, per_page: u32| api.list_reviews(owner, repo, number, page, per_page);
        match collect_pages(&mut source, REVIEWS_PAGE_SIZE).await {
            Ok(reviews) => {
                debug!("{}#{}: {} reviews", repo, number, reviews.len());
                Outcome::Success(
                    reviews
                        .iter()
                        .map(|r| format_review_line(repo, pr, r))
                        .collect(),
                )
            }
            Err(e) if e.is_rate_limited() => Outcome::from_error(e, self.clock.now()),
            Err(e) => Outcome::Fatal(e.for_item(repo, number)),
        }
    }
}

/// One line per review record on every pull request of the repository.
pub async fn run<C: Clock>(
    api: &Api,
    opts: &ReviewListOptions,
    clock: &C,
) -> Result<Vec<String>> {
    let owner = opts.owner.as_str();
    let repo = opts.repo.as_str();
    let state = opts.state.as_str();
    let mut source =
        move |page: u32, per_page: u32| api.list_pulls(owner, repo, state, page, per_page);
    let mut handler = ReviewLister { api, opts, clock };
    let per_pr = fetch_all(&mut source, opts.per_page, &mut handler, clock)
        .await
        .map_err(|e| e.for_repo(repo))?;
    Ok(per_pr.into_iter().flatten().collect())
}
