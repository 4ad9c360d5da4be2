use chrono::{DateTime, Utc};
use github_review_stats::api::Api;
use github_review_stats::config::Config;
use github_review_stats::credits::{self, parse_date_floor, CreditOptions, RepoReport};
use github_review_stats::paginate::Clock;
use github_review_stats::store::{RepoCache, ResultSink};
use github_review_stats::{Error, Result};
use httpmock::{Method::GET, Mock, MockServer};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::time::Duration;

fn config(server: &MockServer) -> Config {
    Config {
        token: "t".into(),
        api_url: server.base_url(),
        api_version: "2022-11-28".into(),
        user_agent: "github-review-stats-tests".into(),
        timeout_secs: 5,
    }
}

fn opts(repo: Option<&str>) -> CreditOptions {
    CreditOptions {
        owner: "o".into(),
        repo: repo.map(String::from),
        number: None,
        since: parse_date_floor("2017-01-01").unwrap(),
        refresh_cache: false,
        per_page: 50,
    }
}

#[derive(Default)]
struct MemoryCache {
    names: RefCell<Option<Vec<String>>>,
}

impl RepoCache for MemoryCache {
    fn load(&self) -> Result<Option<Vec<String>>> {
        Ok(self.names.borrow().clone())
    }

    fn store(&self, names: &[String]) -> Result<()> {
        *self.names.borrow_mut() = Some(names.to_vec());
        Ok(())
    }
}

#[derive(Default)]
struct MemorySink {
    files: BTreeMap<String, Vec<String>>,
}

impl ResultSink for MemorySink {
    fn write(&mut self, repo: &str, lines: &[String]) -> Result<()> {
        self.files.insert(repo.to_string(), lines.to_vec());
        Ok(())
    }
}

struct NoSleep;

impl Clock for NoSleep {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        panic!("unexpected sleep of {:?}", duration);
    }
}

async fn mock_json<'a>(
    server: &'a MockServer,
    path: &str,
    body: serde_json::Value,
) -> httpmock::Mock<'a> {
    server
        .mock_async(|when, then| {
            when.method(GET).path(path);
            then.status(200)
                .header("x-ratelimit-remaining", "4000")
                .json_body(body);
        })
        .await
}

/// Clock frozen on a whole second; its first pause replaces the throttled mock with the
/// successful response so the retried request goes through.
struct LiftingClock<'a> {
    server: &'a MockServer,
    now: DateTime<Utc>,
    pending: RefCell<Option<(Mock<'a>, &'static str, serde_json::Value)>>,
    sleeps: RefCell<Vec<Duration>>,
}

impl<'a> LiftingClock<'a> {
    fn new(server: &'a MockServer) -> Self {
        Self {
            server,
            now: DateTime::<Utc>::from_timestamp(Utc::now().timestamp(), 0).unwrap(),
            pending: RefCell::new(None),
            sleeps: RefCell::new(Vec::new()),
        }
    }
}

impl Clock for LiftingClock<'_> {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        let pending = self.pending.borrow_mut().take();
        if let Some((mut throttled, path, body)) = pending {
            throttled.delete_async().await;
            mock_json(self.server, path, body).await;
        }
    }
}

fn pr(number: u64, author: &str, merged_at: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "number": number,
        "title": format!("PR {}", number),
        "user": {"login": author},
        "merged_at": merged_at,
        "requested_reviewers": []
    })
}

#[tokio::test]
async fn lgtm_comment_is_the_only_credit() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    mock_json(
        &server,
        "/repos/o/alpha/pulls",
        serde_json::json!([pr(4, "alice", Some("2024-02-03T04:05:06Z"))]),
    )
    .await;
    mock_json(&server, "/repos/o/alpha/pulls/4/reviews", serde_json::json!([])).await;
    mock_json(
        &server,
        "/repos/o/alpha/issues/4/comments",
        serde_json::json!([{"user": {"login": "bob"}, "body": "LGTM"}]),
    )
    .await;

    let api = Api::new(config(&server))?;
    let cache = MemoryCache::default();
    let mut sink = MemorySink::default();
    let reports = credits::run(&api, &opts(Some("alpha")), &cache, &mut sink, &NoSleep).await?;

    assert_eq!(
        reports,
        vec![RepoReport {
            repo: "alpha".into(),
            lines: 1
        }]
    );
    assert_eq!(
        sink.files["alpha"],
        vec!["2024-02-03 alpha 4 alice bob lgtm".to_string()]
    );
    // An explicit repository never touches the cache.
    assert!(cache.names.borrow().is_none());
    Ok(())
}

#[tokio::test]
async fn skipped_pull_requests_cost_no_sub_fetches() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    mock_json(
        &server,
        "/repos/o/alpha/pulls",
        serde_json::json!([
            pr(1, "alice", Some("2024-01-01T00:00:00Z")),
            pr(2, "alice", None),
            pr(3, "alice", Some("2016-06-01T00:00:00Z")),
        ]),
    )
    .await;
    let reviews_1 = mock_json(
        &server,
        "/repos/o/alpha/pulls/1/reviews",
        serde_json::json!([
            {"user": {"login": "bob"}, "state": "APPROVED"},
            {"user": {"login": "bob"}, "state": "APPROVED"},
            {"user": {"login": "alice"}, "state": "COMMENTED", "body": "lgtm to me"}
        ]),
    )
    .await;
    mock_json(&server, "/repos/o/alpha/issues/1/comments", serde_json::json!([])).await;
    let reviews_2 = mock_json(&server, "/repos/o/alpha/pulls/2/reviews", serde_json::json!([])).await;
    let reviews_3 = mock_json(&server, "/repos/o/alpha/pulls/3/reviews", serde_json::json!([])).await;

    let api = Api::new(config(&server))?;
    let mut sink = MemorySink::default();
    credits::run(&api, &opts(Some("alpha")), &MemoryCache::default(), &mut sink, &NoSleep).await?;

    assert_eq!(
        sink.files["alpha"],
        vec!["2024-01-01 alpha 1 alice bob approved".to_string()]
    );
    reviews_1.assert_hits_async(1).await;
    reviews_2.assert_hits_async(0).await;
    reviews_3.assert_hits_async(0).await;
    Ok(())
}

#[tokio::test]
async fn org_listing_fills_the_cache() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let repos = mock_json(
        &server,
        "/orgs/o/repos",
        serde_json::json!([{"name": "alpha"}, {"name": "beta", "archived": true}]),
    )
    .await;
    mock_json(&server, "/repos/o/alpha/pulls", serde_json::json!([])).await;
    mock_json(&server, "/repos/o/beta/pulls", serde_json::json!([])).await;

    let api = Api::new(config(&server))?;
    let cache = MemoryCache::default();
    let mut sink = MemorySink::default();
    credits::run(&api, &opts(None), &cache, &mut sink, &NoSleep).await?;
    // Second run is served from the cache.
    credits::run(&api, &opts(None), &cache, &mut sink, &NoSleep).await?;

    repos.assert_hits_async(1).await;
    assert_eq!(
        *cache.names.borrow(),
        Some(vec!["alpha".to_string(), "beta".to_string()])
    );
    assert_eq!(sink.files.len(), 2);
    assert!(sink.files["alpha"].is_empty());
    Ok(())
}

#[tokio::test]
async fn fatal_error_abandons_remaining_repositories() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    mock_json(
        &server,
        "/repos/o/alpha/pulls",
        serde_json::json!([pr(1, "alice", Some("2024-01-01T00:00:00Z"))]),
    )
    .await;
    mock_json(
        &server,
        "/repos/o/alpha/pulls/1/reviews",
        serde_json::json!([{"user": {"login": "bob"}, "state": "APPROVED"}]),
    )
    .await;
    mock_json(&server, "/repos/o/alpha/issues/1/comments", serde_json::json!([])).await;
    mock_json(
        &server,
        "/repos/o/beta/pulls",
        serde_json::json!([pr(8, "alice", Some("2024-01-01T00:00:00Z"))]),
    )
    .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/o/beta/pulls/8/reviews");
            then.status(500).body("boom");
        })
        .await;
    let gamma = mock_json(&server, "/repos/o/gamma/pulls", serde_json::json!([])).await;

    let api = Api::new(config(&server))?;
    let cache = MemoryCache::default();
    cache.store(&["alpha".into(), "beta".into(), "gamma".into()])?;
    let mut sink = MemorySink::default();
    let err = credits::run(&api, &opts(None), &cache, &mut sink, &NoSleep)
        .await
        .unwrap_err();

    match err {
        Error::Repo { repo, source } => {
            assert_eq!(repo, "beta");
            match *source {
                Error::Item { repo, number, source } => {
                    assert_eq!((repo.as_str(), number), ("beta", 8));
                    assert!(matches!(*source, Error::Api { status: 500, .. }));
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(sink.files.keys().collect::<Vec<_>>(), vec!["alpha"]);
    gamma.assert_hits_async(0).await;
    Ok(())
}

#[tokio::test]
async fn throttled_comment_fetch_reprocesses_only_that_pull_request() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let clock = LiftingClock::new(&server);
    mock_json(
        &server,
        "/repos/o/alpha/pulls",
        serde_json::json!([
            pr(3, "alice", Some("2024-01-01T00:00:00Z")),
            pr(4, "alice", Some("2024-01-01T00:00:00Z")),
            pr(5, "alice", Some("2024-01-01T00:00:00Z")),
        ]),
    )
    .await;
    let reviews_3 = mock_json(&server, "/repos/o/alpha/pulls/3/reviews", serde_json::json!([])).await;
    let comments_3 =
        mock_json(&server, "/repos/o/alpha/issues/3/comments", serde_json::json!([])).await;
    let reviews_4 = mock_json(&server, "/repos/o/alpha/pulls/4/reviews", serde_json::json!([])).await;
    let reviews_5 = mock_json(&server, "/repos/o/alpha/pulls/5/reviews", serde_json::json!([])).await;
    let comments_5 =
        mock_json(&server, "/repos/o/alpha/issues/5/comments", serde_json::json!([])).await;
    let reset = clock.now.timestamp() + 7;
    let throttled = server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/o/alpha/issues/4/comments");
            then.status(403)
                .header("x-ratelimit-remaining", "0")
                .header("x-ratelimit-reset", reset.to_string())
                .body("API rate limit exceeded");
        })
        .await;
    *clock.pending.borrow_mut() = Some((
        throttled,
        "/repos/o/alpha/issues/4/comments",
        serde_json::json!([{"user": {"login": "bob"}, "body": "lgtm"}]),
    ));

    let api = Api::new(config(&server))?;
    let mut sink = MemorySink::default();
    credits::run(&api, &opts(Some("alpha")), &MemoryCache::default(), &mut sink, &clock).await?;

    assert_eq!(*clock.sleeps.borrow(), vec![Duration::from_secs(7)]);
    assert_eq!(
        sink.files["alpha"],
        vec!["2024-01-01 alpha 4 alice bob lgtm".to_string()]
    );
    reviews_3.assert_hits_async(1).await;
    comments_3.assert_hits_async(1).await;
    reviews_4.assert_hits_async(2).await;
    reviews_5.assert_hits_async(1).await;
    comments_5.assert_hits_async(1).await;
    Ok(())
}
