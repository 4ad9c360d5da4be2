use crate::api::Api;
use crate::error::Result;
use crate::paginate::{fetch_all, handler_fn, Clock, Outcome};
use crate::types::{login_of, Issue};
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Raw search qualifier string, e.g. `is:pr repo:owner/name author:someone`.
    pub query: String,
    /// Hits created before this instant are dropped.
    pub since: Option<DateTime<Utc>>,
    pub per_page: u32,
}

pub fn format_issue_line(issue: &Issue) -> String {
    format!(
        "{:<55} {} {:>3} {:<15} {}",
        issue.html_url,
        issue.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        issue.number,
        login_of(&issue.user),
        issue.title
    )
}

/// One formatted line per search hit, oldest first.
pub async fn run<C: Clock>(api: &Api, opts: &SearchOptions, clock: &C) -> Result<Vec<String>> {
    let query = opts.query.as_str();
    let since = opts.since;
    let mut source = move |page: u32, per_page: u32| api.search_issues(query, page, per_page);
    let mut handler = handler_fn(move |issue: &Issue| match since {
        Some(floor) if issue.created_at < floor => {
            debug!("skipping #{}: created before {}", issue.number, floor);
            Outcome::Skip
        }
        _ => Outcome::Success(format_issue_line(issue)),
    });
    fetch_all(&mut source, opts.per_page, &mut handler, clock).await
}
