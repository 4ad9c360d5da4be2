use crate::api::Api;
use crate::error::{Error, Result};
use crate::paginate::{collect_pages, fetch_all, handler_fn, Clock, ItemHandler, Outcome};
use crate::store::{RepoCache, ResultSink};
use crate::types::{login_of, IssueComment, PullRequest, Repository, Review};
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info};
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_SINCE: &str = "2017-01-01";
pub const REPOS_PAGE_SIZE: u32 = 100;
pub const SUBFETCH_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct CreditOptions {
    pub owner: String,
    /// Restrict the run to one repository; the repository cache is then not consulted.
    pub repo: Option<String>,
    pub number: Option<u64>,
    /// Pull requests merged before this instant earn no credit.
    pub since: DateTime<Utc>,
    /// Ignore the cached repository list and re-list the organization.
    pub refresh_cache: bool,
    pub per_page: u32,
}

/// Start of day (UTC) for a `YYYY-MM-DD` date.
pub fn parse_date_floor(s: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| Error::Config(format!("invalid date {:?}: {}", s, e)))?;
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| Error::Config(format!("invalid date {:?}", s)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditKind {
    Approved,
    Lgtm,
}

impl fmt::Display for CreditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreditKind::Approved => f.write_str("approved"),
            CreditKind::Lgtm => f.write_str("lgtm"),
        }
    }
}

pub fn is_lgtm(body: &str) -> bool {
    body.to_ascii_uppercase().contains("LGTM")
}

fn review_credit(review: &Review) -> Option<CreditKind> {
    if review.state.eq_ignore_ascii_case("APPROVED") {
        Some(CreditKind::Approved)
    } else if review.body.as_deref().is_some_and(is_lgtm) {
        Some(CreditKind::Lgtm)
    } else {
        None
    }
}

/// Why a pull request earns no credit, checked before any sub-fetch is issued.
pub fn skip_reason(pr: &PullRequest, opts: &CreditOptions) -> Option<&'static str> {
    if opts.number.is_some_and(|n| n != pr.number) {
        return Some("not the requested number");
    }
    match pr.merged_at {
        None => Some("not merged"),
        Some(merged) if merged < opts.since => Some("merged before date floor"),
        Some(_) => None,
    }
}

/// Credit lines for one merged pull request, one per actor, ordered by login.
///
/// Reviews are considered before comments and a later action by the same actor replaces the
/// earlier line. The author never credits themselves.
pub fn credit_lines(
    repo: &str,
    pr: &PullRequest,
    reviews: &[Review],
    comments: &[IssueComment],
) -> Vec<String> {
    let author = login_of(&pr.user);
    let merged = pr
        .merged_at
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string());

    let review_credits = reviews
        .iter()
        .filter_map(|r| review_credit(r).map(|kind| (login_of(&r.user), kind)));
    let comment_credits = comments
        .iter()
        .filter(|c| c.body.as_deref().is_some_and(is_lgtm))
        .map(|c| (login_of(&c.user), CreditKind::Lgtm));

    let mut by_actor: BTreeMap<&str, String> = BTreeMap::new();
    for (actor, kind) in review_credits.chain(comment_credits) {
        if actor == author {
            continue;
        }
        let line = format!(
            "{} {} {} {} {} {}",
            merged, repo, pr.number, author, actor, kind
        );
        by_actor.insert(actor, line);
    }
    by_actor.into_values().collect()
}

struct CreditHandler<'a, C> {
    api: &'a Api,
    opts: &'a CreditOptions,
    repo: &'a str,
    clock: &'a C,
}

impl<C: Clock> CreditHandler<'_, C> {
    async fn fetch_activity(&self, number: u64) -> Result<(Vec<Review>, Vec<IssueComment>)> {
        let api = self.api;
        let owner = self.opts.owner.as_str();
        let repo = self.repo;
        let mut reviews =
            move |page: u32, per_page: u32| api.list_reviews(owner, repo, number, page, per_page);
        let mut comments = move |page: u32, per_page: u32| {
            api.list_issue_comments(owner, repo, number, page, per_page)
        };
        let reviews = collect_pages(&mut reviews, SUBFETCH_PAGE_SIZE).await?;
        let comments = collect_pages(&mut comments, SUBFETCH_PAGE_SIZE).await?;
        Ok((reviews, comments))
    }
}

impl<C: Clock> ItemHandler<PullRequest> for CreditHandler<'_, C> {
    type Output = Vec<String>;

    async fn handle(&mut self, pr: &PullRequest) -> Outcome<Vec<String>> {
        if let Some(reason) = skip_reason(pr, self.opts) {
            debug!("{}#{} skipped: {}", self.repo, pr.number, reason);
            return Outcome::Skip;
        }
        match self.fetch_activity(pr.number).await {
            Ok((reviews, comments)) => {
                Outcome::Success(credit_lines(self.repo, pr, &reviews, &comments))
            }
            Err(e) if e.is_rate_limited() => Outcome::from_error(e, self.clock.now()),
            Err(e) => Outcome::Fatal(e.for_item(self.repo, pr.number)),
        }
    }
}

/// Repository names to process: the explicit one, else the cache, else a fresh org listing
/// (which then refreshes the cache).
pub async fn resolve_repos<C: Clock, R: RepoCache>(
    api: &Api,
    opts: &CreditOptions,
    cache: &R,
    clock: &C,
) -> Result<Vec<String>> {
    if let Some(repo) = &opts.repo {
        return Ok(vec![repo.clone()]);
    }
    if !opts.refresh_cache {
        if let Some(names) = cache.load()? {
            info!("using {} cached repositories", names.len());
            return Ok(names);
        }
    }
    let org = opts.owner.as_str();
    let mut source = move |page: u32, per_page: u32| api.list_org_repos(org, page, per_page);
    let mut to_name = handler_fn(|r: &Repository| Outcome::Success(r.name.clone()));
    let names = fetch_all(&mut source, REPOS_PAGE_SIZE, &mut to_name, clock).await?;
    cache.store(&names)?;
    info!("listed {} repositories for {}", names.len(), org);
    Ok(names)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoReport {
    pub repo: String,
    pub lines: usize,
}

pub async fn run<C: Clock, R: RepoCache, S: ResultSink>(
    api: &Api,
    opts: &CreditOptions,
    cache: &R,
    sink: &mut S,
    clock: &C,
) -> Result<Vec<RepoReport>> {
    let repos = resolve_repos(api, opts, cache, clock).await?;
    let owner = opts.owner.as_str();
    let mut reports = Vec::with_capacity(repos.len());
    for repo in &repos {
        info!("processing {}/{}", owner, repo);
        let repo = repo.as_str();
        let mut source =
            move |page: u32, per_page: u32| api.list_pulls(owner, repo, "closed", page, per_page);
        let mut handler = CreditHandler {
            api,
            opts,
            repo,
            clock,
        };
        let lines: Vec<String> = fetch_all(&mut source, opts.per_page, &mut handler, clock)
            .await
            .map_err(|e| e.for_repo(repo))?
            .into_iter()
            .flatten()
            .collect();
        sink.write(repo, &lines).map_err(|e| e.for_repo(repo))?;
        reports.push(RepoReport {
            repo: repo.to_string(),
            lines: lines.len(),
        });
    }
    Ok(reports)
}
